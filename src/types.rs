// SPDX-License-Identifier: PMPL-1.0-or-later

//! Core type definitions shared by every pipeline stage.
//!
//! Panels are keyed by jurisdiction (state) and optionally a
//! sub-jurisdiction (city) nested inside it. Adoption years are always
//! keyed by jurisdiction, so city rows inherit their state's law timing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Coefficient name of the Stand-Your-Ground step indicator.
pub const SYG: &str = "syg";
/// Coefficient name of the Right-to-Carry step indicator.
pub const RTC: &str = "rtc";
/// Coefficient name of the cross-law interaction term.
pub const SYG_X_RTC: &str = "syg:rtc";
/// Coefficient name of the non-time-varying "ever adopts SYG" dummy.
pub const SYG_LAW: &str = "syg_law";
/// Coefficient name of the non-time-varying "ever adopts RTC" dummy.
pub const RTC_LAW: &str = "rtc_law";

/// Firearm law categories under study
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Law {
    /// Stand-Your-Ground
    Syg,
    /// Right-to-Carry (shall-issue)
    Rtc,
}

impl Law {
    pub fn all() -> [Law; 2] {
        [Law::Syg, Law::Rtc]
    }

    /// Column name of the time-varying step indicator
    pub fn column(&self) -> &'static str {
        match self {
            Law::Syg => SYG,
            Law::Rtc => RTC,
        }
    }

    /// Column name of the "ever adopts" dummy
    pub fn law_dummy(&self) -> &'static str {
        match self {
            Law::Syg => SYG_LAW,
            Law::Rtc => RTC_LAW,
        }
    }

    /// Column name of the windowed event-time variable
    pub fn event_column(&self) -> &'static str {
        match self {
            Law::Syg => "syg_event",
            Law::Rtc => "rtc_event",
        }
    }
}

impl fmt::Display for Law {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Law::Syg => write!(f, "SYG"),
            Law::Rtc => write!(f, "RTC"),
        }
    }
}

/// Granularity of a panel dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetLevel {
    /// One row per (state, year)
    Jurisdiction,
    /// One row per (city, year)
    SubJurisdiction,
}

impl DatasetLevel {
    /// Fixed-effect grouping columns used for models fit at this level
    pub fn fixed_effects(&self) -> Vec<String> {
        match self {
            DatasetLevel::Jurisdiction => vec!["jurisdiction".to_string(), "year".to_string()],
            DatasetLevel::SubJurisdiction => {
                vec!["sub_jurisdiction".to_string(), "year".to_string()]
            }
        }
    }

    /// Clustering columns: one-way for states, two-way for cities
    pub fn clusters(&self) -> Vec<String> {
        match self {
            DatasetLevel::Jurisdiction => vec!["jurisdiction".to_string()],
            DatasetLevel::SubJurisdiction => {
                vec!["jurisdiction".to_string(), "sub_jurisdiction".to_string()]
            }
        }
    }
}

impl fmt::Display for DatasetLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetLevel::Jurisdiction => write!(f, "jurisdiction"),
            DatasetLevel::SubJurisdiction => write!(f, "sub-jurisdiction"),
        }
    }
}

/// Grouping key of one time series inside a panel
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub jurisdiction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_jurisdiction: Option<String>,
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_jurisdiction {
            Some(sub) => write!(f, "{}/{}", self.jurisdiction, sub),
            None => write!(f, "{}", self.jurisdiction),
        }
    }
}

/// One unit×period observation with its outcome and covariate values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelRow {
    pub jurisdiction: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_jurisdiction: Option<String>,
    pub year: i32,
    #[serde(default)]
    pub values: BTreeMap<String, f64>,
}

impl PanelRow {
    pub fn unit(&self) -> UnitKey {
        UnitKey {
            jurisdiction: self.jurisdiction.clone(),
            sub_jurisdiction: self.sub_jurisdiction.clone(),
        }
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }
}

/// Jurisdiction → year of first law activation, for a single law.
///
/// Jurisdictions that never adopt inside the observed window are simply
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdoptionYears(BTreeMap<String, i32>);

impl AdoptionYears {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, jurisdiction: impl Into<String>, year: i32) {
        self.0.insert(jurisdiction.into(), year);
    }

    pub fn get(&self, jurisdiction: &str) -> Option<i32> {
        self.0.get(jurisdiction).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn jurisdictions(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Years in jurisdiction order
    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.0.values().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, i32)> for AdoptionYears {
    fn from_iter<I: IntoIterator<Item = (String, i32)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Both laws' adoption years. The loaded original is never mutated;
/// each placebo draw produces a fresh copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdoptionSchedule {
    pub syg: AdoptionYears,
    pub rtc: AdoptionYears,
}

impl AdoptionSchedule {
    pub fn new(syg: AdoptionYears, rtc: AdoptionYears) -> Self {
        Self { syg, rtc }
    }

    pub fn years(&self, law: Law) -> &AdoptionYears {
        match law {
            Law::Syg => &self.syg,
            Law::Rtc => &self.rtc,
        }
    }
}

/// The two result tables every iteration fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableId {
    /// Law main effects with fixed effects only
    MainEffects,
    /// Main effects plus the cross-law interaction
    Interaction,
}

impl TableId {
    pub fn all() -> [TableId; 2] {
        [TableId::MainEffects, TableId::Interaction]
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableId::MainEffects => "main_effects",
            TableId::Interaction => "interaction",
        }
    }

    pub fn includes_interaction(&self) -> bool {
        matches!(self, TableId::Interaction)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One law coefficient from one fitted model in one iteration.
///
/// Iteration 0 is the observed (non-permuted) pass; placebo draws are
/// numbered from 1. `model` is the 1-based position inside its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRecord {
    pub iteration: u32,
    pub table: TableId,
    pub model: usize,
    pub coefficient: String,
    pub estimate: f64,
    pub std_error: f64,
    pub p_value: f64,
}

impl CoefficientRecord {
    pub fn key(&self) -> CoefficientKey {
        CoefficientKey {
            table: self.table,
            model: self.model,
            coefficient: self.coefficient.clone(),
        }
    }
}

/// (table, model, coefficient): the unit inference is computed over
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoefficientKey {
    pub table: TableId,
    pub model: usize,
    pub coefficient: String,
}

impl fmt::Display for CoefficientKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:{}", self.table, self.model, self.coefficient)
    }
}
