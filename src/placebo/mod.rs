// SPDX-License-Identifier: PMPL-1.0-or-later

//! Placebo permutation orchestration.
//!
//! One iteration is: draw adoption years → rebuild both panels → fit the
//! battery → keep the law coefficients. Iterations share nothing but the
//! read-only inputs, so they run on a rayon pool. Each one seeds its own
//! generator from `(seed, iteration)`, which keeps a run reproducible
//! regardless of thread count or scheduling.
//!
//! The observed pass uses identity mode, is tagged iteration 0 and is
//! never part of the simulation table.

pub mod checkpoint;

use crate::engine::RegressionEngine;
use crate::error::{InputError, PlaceboError};
use crate::extract::extract_law_coefficients;
use crate::fit::{fit_battery, PanelPair};
use crate::panel::{build_law_panel, BuildOptions, IndicatorStyle, Panel};
use crate::permute::{iteration_rng, PermuteMode};
use crate::spec::Battery;
use crate::types::{AdoptionSchedule, CoefficientKey, CoefficientRecord, TableId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

pub use checkpoint::{read_checkpoint, CheckpointWriter};

/// Iteration id of the observed (non-permuted) pass
pub const OBSERVED_ITERATION: u32 = 0;

/// What to do when a fit fails inside a placebo iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the whole run
    #[default]
    Strict,
    /// Drop the iteration, record the failure, keep going
    Lenient,
}

/// Read-only inputs shared by every iteration
#[derive(Debug, Clone)]
pub struct PlaceboInputs {
    pub jurisdiction: Panel,
    pub sub_jurisdiction: Panel,
    pub schedule: AdoptionSchedule,
    pub battery: Battery,
    pub jurisdiction_options: BuildOptions,
    pub sub_jurisdiction_options: BuildOptions,
}

impl PlaceboInputs {
    /// State rows use the cumulative indicator, city rows the boolean one,
    /// and the city panel is aligned to the state panel's start year.
    pub fn new(
        jurisdiction: Panel,
        sub_jurisdiction: Panel,
        schedule: AdoptionSchedule,
        battery: Battery,
    ) -> Self {
        let jurisdiction_options = BuildOptions {
            style: IndicatorStyle::Cumulative,
            reference_start: None,
            event_window: None,
        };
        let sub_jurisdiction_options = BuildOptions {
            style: IndicatorStyle::Boolean,
            reference_start: Some(jurisdiction.start_year()),
            event_window: None,
        };
        Self {
            jurisdiction,
            sub_jurisdiction,
            schedule,
            battery,
            jurisdiction_options,
            sub_jurisdiction_options,
        }
    }

    pub fn with_event_window(mut self, window: Option<u32>) -> Self {
        self.jurisdiction_options.event_window = window;
        self.sub_jurisdiction_options.event_window = window;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceboConfig {
    pub iterations: u32,
    pub seed: u64,
    #[serde(default)]
    pub policy: FailurePolicy,
    /// Worker threads; 0 lets rayon decide
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
}

/// Abort switch checked before each iteration starts
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A placebo iteration dropped under the lenient policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationFailure {
    pub iteration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<TableId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    pub message: String,
}

impl IterationFailure {
    fn from_error(iteration: u32, err: &PlaceboError) -> Self {
        match err {
            PlaceboError::Iteration { failure, .. } => Self {
                iteration,
                table: Some(failure.table),
                model: Some(failure.model),
                outcome: Some(failure.outcome.clone()),
                message: failure.source.to_string(),
            },
            other => Self {
                iteration,
                table: None,
                model: None,
                outcome: None,
                message: other.to_string(),
            },
        }
    }
}

/// Law coefficients of every completed placebo iteration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationTable {
    pub requested: u32,
    /// Iteration ids that contributed records, ascending
    pub completed: Vec<u32>,
    pub records: Vec<CoefficientRecord>,
    #[serde(default)]
    pub failures: Vec<IterationFailure>,
    #[serde(default)]
    pub cancelled: bool,
}

impl SimulationTable {
    /// Number of iterations actually in the table
    pub fn effective_n(&self) -> usize {
        self.completed.len()
    }

    /// Simulated estimates for one (table, model, coefficient)
    pub fn draws(&self, key: &CoefficientKey) -> Vec<f64> {
        self.records
            .iter()
            .filter(|r| r.table == key.table && r.model == key.model && r.coefficient == key.coefficient)
            .map(|r| r.estimate)
            .collect()
    }
}

/// Run a single iteration end to end
#[instrument(level = "debug", skip(inputs, engine, seed))]
pub fn run_iteration<E: RegressionEngine + ?Sized>(
    inputs: &PlaceboInputs,
    engine: &E,
    iteration: u32,
    mode: PermuteMode,
    seed: u64,
) -> Result<Vec<CoefficientRecord>, PlaceboError> {
    let mut rng = iteration_rng(seed, iteration);
    let schedule = inputs.schedule.draw(mode, &mut rng);

    let panels = PanelPair {
        jurisdiction: build_law_panel(&inputs.jurisdiction, &schedule, &inputs.jurisdiction_options),
        sub_jurisdiction: build_law_panel(
            &inputs.sub_jurisdiction,
            &schedule,
            &inputs.sub_jurisdiction_options,
        ),
    };

    let fits = fit_battery(&inputs.battery, &panels, engine)
        .map_err(|failure| PlaceboError::Iteration { iteration, failure })?;
    Ok(extract_law_coefficients(iteration, &fits))
}

/// The observed, non-permuted coefficient table
pub fn observe<E: RegressionEngine + ?Sized>(
    inputs: &PlaceboInputs,
    engine: &E,
) -> Result<Vec<CoefficientRecord>, PlaceboError> {
    info!(engine = engine.name(), "fitting observed specifications");
    run_iteration(inputs, engine, OBSERVED_ITERATION, PermuteMode::Identity, 0)
}

enum Outcome {
    Done(Vec<CoefficientRecord>),
    Failed(PlaceboError),
    Skipped,
}

/// Run `config.iterations` placebo iterations
pub fn run_placebo<E: RegressionEngine + ?Sized>(
    inputs: &PlaceboInputs,
    engine: &E,
    config: &PlaceboConfig,
    cancel: &CancelFlag,
) -> Result<SimulationTable, PlaceboError> {
    if config.iterations == 0 {
        return Err(InputError::ZeroIterations.into());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.threads)
        .build()
        .map_err(|e| PlaceboError::WorkerPool(e.to_string()))?;
    let checkpoint = config
        .checkpoint
        .as_deref()
        .map(CheckpointWriter::create)
        .transpose()?;

    info!(
        iterations = config.iterations,
        seed = config.seed,
        policy = ?config.policy,
        threads = pool.current_num_threads(),
        models = inputs.battery.len(),
        "starting placebo run"
    );

    let abort = AtomicBool::new(false);
    let finished = AtomicU32::new(0);
    let progress_step = (config.iterations / 10).max(1);

    let outcomes: Vec<(u32, Outcome)> = pool.install(|| {
        (1..=config.iterations)
            .into_par_iter()
            .map(|iteration| {
                if cancel.is_cancelled() || abort.load(Ordering::SeqCst) {
                    return (iteration, Outcome::Skipped);
                }

                let outcome = match run_iteration(inputs, engine, iteration, PermuteMode::Permute, config.seed) {
                    Ok(records) => match &checkpoint {
                        Some(writer) => match writer.append(iteration, &records) {
                            Ok(()) => Outcome::Done(records),
                            Err(e) => {
                                abort.store(true, Ordering::SeqCst);
                                Outcome::Failed(PlaceboError::Checkpoint(e))
                            }
                        },
                        None => Outcome::Done(records),
                    },
                    Err(err) => {
                        warn!(iteration, error = %err, "placebo iteration failed");
                        if config.policy == FailurePolicy::Strict {
                            abort.store(true, Ordering::SeqCst);
                        }
                        Outcome::Failed(err)
                    }
                };

                let done = finished.fetch_add(1, Ordering::Relaxed) + 1;
                if done % progress_step == 0 {
                    info!(done, total = config.iterations, "placebo progress");
                } else {
                    debug!(iteration, "iteration finished");
                }
                (iteration, outcome)
            })
            .collect()
    });

    let mut table = SimulationTable {
        requested: config.iterations,
        ..SimulationTable::default()
    };
    for (iteration, outcome) in outcomes {
        match outcome {
            Outcome::Done(records) => {
                table.completed.push(iteration);
                table.records.extend(records);
            }
            Outcome::Failed(err @ PlaceboError::Checkpoint(_)) => return Err(err),
            Outcome::Failed(err) => match config.policy {
                FailurePolicy::Strict => return Err(err),
                FailurePolicy::Lenient => {
                    table.failures.push(IterationFailure::from_error(iteration, &err));
                }
            },
            Outcome::Skipped => table.cancelled = true,
        }
    }

    info!(
        completed = table.effective_n(),
        failed = table.failures.len(),
        cancelled = table.cancelled,
        "placebo run finished"
    );
    Ok(table)
}
