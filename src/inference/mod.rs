// SPDX-License-Identifier: PMPL-1.0-or-later

//! Empirical permutation inference.
//!
//! For every observed (table, model, coefficient) the placebo draws form
//! the null distribution. The two-tailed empirical p-value is
//! `min(#draws < observed, #draws > observed) / N`; ties count on neither
//! side. `N` is the number of draws present for that key, so iterations
//! dropped under the lenient policy shrink it.

use crate::error::InferenceError;
use crate::placebo::SimulationTable;
use crate::types::{CoefficientKey, CoefficientRecord, TableId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Conventional threshold for the engine's own p-value
pub const ALPHA: f64 = 0.05;

/// Star tier of an empirical p-value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Significance {
    P01,
    P05,
    P10,
    NotSignificant,
}

impl Significance {
    pub fn classify(p: f64) -> Self {
        if p < 0.01 {
            Significance::P01
        } else if p < 0.05 {
            Significance::P05
        } else if p < 0.10 {
            Significance::P10
        } else {
            Significance::NotSignificant
        }
    }

    pub fn stars(&self) -> &'static str {
        match self {
            Significance::P01 => "***",
            Significance::P05 => "**",
            Significance::P10 => "*",
            Significance::NotSignificant => "",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Significance::P01 => "p<0.01",
            Significance::P05 => "p<0.05",
            Significance::P10 => "p<0.10",
            Significance::NotSignificant => "n.s.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceRow {
    pub table: TableId,
    pub model: usize,
    pub coefficient: String,
    pub observed_estimate: f64,
    pub observed_p_value: f64,
    /// Engine p-value below [`ALPHA`]
    pub observed_significant: bool,
    pub draws: usize,
    pub below: usize,
    pub above: usize,
    pub empirical_p_value: f64,
    pub significance: Significance,
}

/// Counts and p-value for one observed estimate against its draws
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmpiricalTest {
    pub below: usize,
    pub above: usize,
    pub draws: usize,
    pub p_value: f64,
}

/// Two-tailed empirical p-value; `None` when there are no draws
pub fn empirical_test(observed: f64, draws: &[f64]) -> Option<EmpiricalTest> {
    if draws.is_empty() {
        return None;
    }
    let below = draws.iter().filter(|&&d| d < observed).count();
    let above = draws.iter().filter(|&&d| d > observed).count();
    Some(EmpiricalTest {
        below,
        above,
        draws: draws.len(),
        p_value: below.min(above) as f64 / draws.len() as f64,
    })
}

/// One row per observed law coefficient, in the observed table's order
pub fn infer(
    observed: &[CoefficientRecord],
    simulation: &SimulationTable,
) -> Result<Vec<InferenceRow>, InferenceError> {
    if observed.is_empty() {
        return Err(InferenceError::EmptyObserved);
    }

    let mut draws: HashMap<CoefficientKey, Vec<f64>> = HashMap::new();
    for record in &simulation.records {
        draws.entry(record.key()).or_default().push(record.estimate);
    }

    observed
        .iter()
        .map(|obs| {
            let key = obs.key();
            let test = draws
                .get(&key)
                .and_then(|d| empirical_test(obs.estimate, d))
                .ok_or_else(|| InferenceError::NoDraws(key.clone()))?;
            Ok::<_, InferenceError>(InferenceRow {
                table: obs.table,
                model: obs.model,
                coefficient: obs.coefficient.clone(),
                observed_estimate: obs.estimate,
                observed_p_value: obs.p_value,
                observed_significant: obs.p_value < ALPHA,
                draws: test.draws,
                below: test.below,
                above: test.above,
                empirical_p_value: test.p_value,
                significance: Significance::classify(test.p_value),
            })
        })
        .collect()
}
