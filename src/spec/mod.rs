// SPDX-License-Identifier: PMPL-1.0-or-later

//! Specification battery generation.
//!
//! One base formula expands into one model per outcome in each table:
//! the main-effects table (SYG and RTC indicators) and the interaction
//! table (adds SYG×RTC). The dataset level is fixed here and carried on
//! every [`ModelSpec`], which decides both the dataset a model is fit on
//! and its clustering.

pub mod formula;

use crate::error::InputError;
use crate::types::{DatasetLevel, TableId, RTC, SYG, SYG_X_RTC};
use serde::{Deserialize, Serialize};

pub use formula::BaseFormula;

/// An outcome variable and the panel it lives in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSpec {
    pub name: String,
    pub level: DatasetLevel,
}

impl OutcomeSpec {
    pub fn new(name: impl Into<String>, level: DatasetLevel) -> Self {
        Self {
            name: name.into(),
            level,
        }
    }
}

/// Justifiable-homicide outcomes of the standard battery: three state
/// counts and two city counts.
pub fn default_outcomes() -> Vec<OutcomeSpec> {
    vec![
        OutcomeSpec::new("jh_total", DatasetLevel::Jurisdiction),
        OutcomeSpec::new("jh_civilian", DatasetLevel::Jurisdiction),
        OutcomeSpec::new("jh_police", DatasetLevel::Jurisdiction),
        OutcomeSpec::new("jh_civilian_city", DatasetLevel::SubJurisdiction),
        OutcomeSpec::new("jh_police_city", DatasetLevel::SubJurisdiction),
    ]
}

/// Everything a regression engine needs to fit one model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub table: TableId,
    /// 1-based position inside the table
    pub model: usize,
    pub outcome: String,
    pub level: DatasetLevel,
    pub law_terms: Vec<String>,
    pub controls: Vec<String>,
    pub fixed_effects: Vec<String>,
    pub clusters: Vec<String>,
}

impl ModelSpec {
    /// Right-hand-side terms: law terms first, then controls
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.law_terms
            .iter()
            .chain(self.controls.iter())
            .map(String::as_str)
    }

    pub fn includes_interaction(&self) -> bool {
        self.law_terms.iter().any(|t| t == SYG_X_RTC)
    }

    /// Render as `outcome ~ terms | fixed effects` for text-based engines
    pub fn formula(&self) -> String {
        let rhs: Vec<&str> = self.terms().collect();
        let mut text = format!("{} ~ {}", self.outcome, rhs.join(" + "));
        if !self.fixed_effects.is_empty() {
            text.push_str(" | ");
            text.push_str(&self.fixed_effects.join(" + "));
        }
        text
    }

    /// Clustering in one-sided formula form, e.g. `~jurisdiction + sub_jurisdiction`
    pub fn cluster_formula(&self) -> String {
        format!("~{}", self.clusters.join(" + "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecTable {
    pub table: TableId,
    pub specs: Vec<ModelSpec>,
}

/// The full set of specifications fit in every iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battery {
    pub tables: Vec<SpecTable>,
}

impl Battery {
    pub fn len(&self) -> usize {
        self.tables.iter().map(|t| t.specs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn specs(&self) -> impl Iterator<Item = &ModelSpec> {
        self.tables.iter().flat_map(|t| t.specs.iter())
    }
}

/// Expand `base` into both tables for every outcome
pub fn generate(base: &BaseFormula, outcomes: &[OutcomeSpec]) -> Result<Battery, InputError> {
    if outcomes.is_empty() {
        return Err(InputError::NoOutcomes);
    }

    let tables = TableId::all()
        .into_iter()
        .map(|table| {
            let mut law_terms = vec![SYG.to_string(), RTC.to_string()];
            if table.includes_interaction() {
                law_terms.push(SYG_X_RTC.to_string());
            }
            let specs = outcomes
                .iter()
                .enumerate()
                .map(|(idx, outcome)| ModelSpec {
                    table,
                    model: idx + 1,
                    outcome: outcome.name.clone(),
                    level: outcome.level,
                    law_terms: law_terms.clone(),
                    controls: base.controls.clone(),
                    fixed_effects: outcome.level.fixed_effects(),
                    clusters: outcome.level.clusters(),
                })
                .collect();
            SpecTable { table, specs }
        })
        .collect();

    Ok(Battery { tables })
}
