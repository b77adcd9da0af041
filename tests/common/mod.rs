// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared fixtures: a small two-level panel and deterministic engines

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use syg_rtc_placebo::engine::{CoefficientEstimate, FittedModel, RegressionEngine};
use syg_rtc_placebo::error::FitError;
use syg_rtc_placebo::panel::{LawPanel, Panel};
use syg_rtc_placebo::placebo::PlaceboInputs;
use syg_rtc_placebo::spec::{default_outcomes, generate, BaseFormula, ModelSpec};
use syg_rtc_placebo::types::{
    AdoptionSchedule, AdoptionYears, DatasetLevel, PanelRow, TableId,
};

pub const STATES: [&str; 5] = ["AL", "FL", "GA", "MS", "TX"];

fn values(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

pub fn state_rows() -> Vec<PanelRow> {
    let mut rows = Vec::new();
    for (s, state) in STATES.iter().enumerate() {
        for year in 2000..=2009 {
            let t = f64::from(year - 2000);
            let s = s as f64;
            rows.push(PanelRow {
                jurisdiction: state.to_string(),
                sub_jurisdiction: None,
                year,
                values: values(&[
                    ("jh_total", 10.0 + 3.0 * s + t),
                    ("jh_civilian", 4.0 + s + 0.5 * t),
                    ("jh_police", 6.0 + 2.0 * s + 0.25 * t * t),
                    ("poverty", 12.0 + s - 0.1 * t),
                    ("unemployment", 5.0 + 0.2 * t),
                ]),
            });
        }
    }
    rows
}

/// Cities start a year after the states
pub fn city_rows() -> Vec<PanelRow> {
    let mut rows = Vec::new();
    for (s, state) in STATES.iter().take(3).enumerate() {
        for city in ["north", "south"] {
            for year in 2001..=2009 {
                let t = f64::from(year - 2001);
                let s = s as f64;
                let c = if city == "north" { 1.0 } else { 2.0 };
                rows.push(PanelRow {
                    jurisdiction: state.to_string(),
                    sub_jurisdiction: Some(format!("{}-{}", state, city)),
                    year,
                    values: values(&[
                        ("jh_civilian_city", 1.0 + s + c + 0.3 * t),
                        ("jh_police_city", 2.0 + c * t),
                        ("poverty", 14.0 + s + c),
                        ("unemployment", 6.0 + 0.1 * t),
                    ]),
                });
            }
        }
    }
    rows
}

pub fn schedule() -> AdoptionSchedule {
    let syg: AdoptionYears = [("AL", 2006), ("FL", 2005), ("GA", 2000), ("MS", 2007)]
        .into_iter()
        .map(|(s, y)| (s.to_string(), y))
        .collect();
    let rtc: AdoptionYears = [
        ("AL", 2001),
        ("FL", 2002),
        ("GA", 2004),
        ("MS", 2003),
        ("TX", 2008),
    ]
    .into_iter()
    .map(|(s, y)| (s.to_string(), y))
    .collect();
    AdoptionSchedule::new(syg, rtc)
}

pub fn inputs() -> PlaceboInputs {
    let states = Panel::new(DatasetLevel::Jurisdiction, state_rows()).expect("state panel");
    let cities = Panel::new(DatasetLevel::SubJurisdiction, city_rows()).expect("city panel");
    let base = BaseFormula::parse("{outcome} ~ poverty + (unemployment)").expect("formula");
    let battery = generate(&base, &default_outcomes()).expect("battery");
    PlaceboInputs::new(states, cities, schedule(), battery)
}

/// Every coefficient is a plain function of the panel it is handed: the
/// outcome-weighted mean of each regressor. Non-law controls are reported
/// too, ahead of the law terms, plus an intercept.
#[derive(Debug, Default)]
pub struct FakeEngine;

fn weighted_mean(panel: &LawPanel<'_>, outcome: &str, column: &str) -> f64 {
    let mut total = 0.0;
    for idx in 0..panel.len() {
        let y = panel.value(idx, outcome).unwrap_or(0.0);
        let x = panel.value(idx, column).unwrap_or(0.0);
        total += x * y;
    }
    total / panel.len() as f64
}

impl RegressionEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    fn fit(&self, spec: &ModelSpec, panel: &LawPanel<'_>) -> Result<FittedModel, FitError> {
        let mut coefficients = vec![CoefficientEstimate {
            name: "(Intercept)".to_string(),
            estimate: 1.0,
            std_error: 0.5,
            p_value: 0.04,
        }];
        for control in &spec.controls {
            coefficients.push(CoefficientEstimate {
                name: control.clone(),
                estimate: weighted_mean(panel, &spec.outcome, control),
                std_error: 0.1,
                p_value: 0.2,
            });
        }
        for term in &spec.law_terms {
            coefficients.push(CoefficientEstimate {
                name: term.clone(),
                estimate: weighted_mean(panel, &spec.outcome, term),
                std_error: 0.1,
                p_value: 0.01,
            });
        }
        Ok(FittedModel::new(coefficients))
    }
}

/// Fails exactly once, on the `fail_at`-th fit call (1-based)
#[derive(Debug)]
pub struct FailOnceEngine {
    calls: AtomicUsize,
    fail_at: usize,
}

impl FailOnceEngine {
    pub fn new(fail_at: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_at,
        }
    }
}

impl RegressionEngine for FailOnceEngine {
    fn name(&self) -> &str {
        "fail-once"
    }

    fn fit(&self, spec: &ModelSpec, panel: &LawPanel<'_>) -> Result<FittedModel, FitError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_at {
            return Err(FitError::NonConvergence {
                message: "iteration limit reached".to_string(),
            });
        }
        FakeEngine.fit(spec, panel)
    }
}

/// Never converges on the given table and model
#[derive(Debug)]
pub struct BrokenModelEngine {
    pub table: TableId,
    pub model: usize,
}

impl RegressionEngine for BrokenModelEngine {
    fn name(&self) -> &str {
        "broken-model"
    }

    fn fit(&self, spec: &ModelSpec, panel: &LawPanel<'_>) -> Result<FittedModel, FitError> {
        if spec.table == self.table && spec.model == self.model {
            return Err(FitError::NonConvergence {
                message: "theta diverged".to_string(),
            });
        }
        FakeEngine.fit(spec, panel)
    }
}
