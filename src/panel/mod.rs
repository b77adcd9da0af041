// SPDX-License-Identifier: PMPL-1.0-or-later

//! Panel datasets and their law-indicator enrichment

pub mod builder;
pub mod loader;

use crate::error::InputError;
use crate::types::{DatasetLevel, Law, PanelRow, UnitKey, RTC, RTC_LAW, SYG, SYG_LAW, SYG_X_RTC};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

pub use builder::{build_law_panel, BuildOptions};
pub use loader::{load_adoption_years, load_panel};

/// How the per-law "active" column is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorStyle {
    /// Running count of rows matching the adoption year. Exceeds 1 only
    /// if the adoption period appears more than once in a series.
    Cumulative,
    /// The cumulative count collapsed to 0/1
    #[default]
    Boolean,
}

/// A raw panel as delivered by data preparation. Immutable once loaded and
/// shared read-only by every iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    level: DatasetLevel,
    rows: Vec<PanelRow>,
}

impl Panel {
    /// Validate and wrap rows. Rows need not be sorted.
    pub fn new(level: DatasetLevel, rows: Vec<PanelRow>) -> Result<Self, InputError> {
        if rows.is_empty() {
            return Err(InputError::EmptyPanel { level });
        }

        let mut seen = HashSet::with_capacity(rows.len());
        for (idx, row) in rows.iter().enumerate() {
            if level == DatasetLevel::SubJurisdiction && row.sub_jurisdiction.is_none() {
                return Err(InputError::MissingSubJurisdiction { row: idx });
            }
            if !seen.insert((row.unit(), row.year)) {
                return Err(InputError::DuplicateRow {
                    unit: row.unit().to_string(),
                    year: row.year,
                });
            }
        }

        Ok(Self { level, rows })
    }

    pub fn level(&self) -> DatasetLevel {
        self.level
    }

    pub fn rows(&self) -> &[PanelRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First period of the series
    pub fn start_year(&self) -> i32 {
        self.rows.iter().map(|r| r.year).min().unwrap_or_default()
    }

    /// Row indices per unit, each sorted by year
    pub fn groups(&self) -> BTreeMap<UnitKey, Vec<usize>> {
        let mut groups: BTreeMap<UnitKey, Vec<usize>> = BTreeMap::new();
        for (idx, row) in self.rows.iter().enumerate() {
            groups.entry(row.unit()).or_default().push(idx);
        }
        for indices in groups.values_mut() {
            indices.sort_by_key(|&i| self.rows[i].year);
        }
        groups
    }
}

/// Law columns added to one panel row
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LawIndicators {
    pub syg: f64,
    pub rtc: f64,
    pub syg_x_rtc: f64,
    pub syg_law: f64,
    pub rtc_law: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub syg_event: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtc_event: Option<i32>,
}

impl LawIndicators {
    pub fn active(&self, law: Law) -> f64 {
        match law {
            Law::Syg => self.syg,
            Law::Rtc => self.rtc,
        }
    }

    pub fn ever(&self, law: Law) -> f64 {
        match law {
            Law::Syg => self.syg_law,
            Law::Rtc => self.rtc_law,
        }
    }

    pub fn event_time(&self, law: Law) -> Option<i32> {
        match law {
            Law::Syg => self.syg_event,
            Law::Rtc => self.rtc_event,
        }
    }
}

/// A panel enriched for one iteration's adoption schedule.
///
/// Borrows the shared raw panel; only the indicator columns are owned, so
/// building one per iteration never copies the covariates.
#[derive(Debug, Clone)]
pub struct LawPanel<'a> {
    base: &'a Panel,
    indicators: Vec<LawIndicators>,
}

impl<'a> LawPanel<'a> {
    pub(crate) fn new(base: &'a Panel, indicators: Vec<LawIndicators>) -> Self {
        debug_assert_eq!(base.len(), indicators.len());
        Self { base, indicators }
    }

    pub fn level(&self) -> DatasetLevel {
        self.base.level()
    }

    pub fn len(&self) -> usize {
        self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indicators.is_empty()
    }

    pub fn row(&self, idx: usize) -> &PanelRow {
        &self.base.rows()[idx]
    }

    pub fn indicators(&self, idx: usize) -> &LawIndicators {
        &self.indicators[idx]
    }

    /// Rows paired with their law columns, in the raw panel's order
    pub fn iter(&self) -> impl Iterator<Item = (&PanelRow, &LawIndicators)> {
        self.base.rows().iter().zip(self.indicators.iter())
    }

    /// Look up any numeric column, law columns included
    pub fn value(&self, idx: usize, column: &str) -> Option<f64> {
        let ind = &self.indicators[idx];
        match column {
            SYG => Some(ind.syg),
            RTC => Some(ind.rtc),
            SYG_X_RTC => Some(ind.syg_x_rtc),
            SYG_LAW => Some(ind.syg_law),
            RTC_LAW => Some(ind.rtc_law),
            "syg_event" => ind.syg_event.map(f64::from),
            "rtc_event" => ind.rtc_event.map(f64::from),
            "year" => Some(f64::from(self.row(idx).year)),
            other => self.row(idx).value(other),
        }
    }

    /// Activation sequence of one law for one unit, in year order
    pub fn series(&self, unit: &UnitKey, law: Law) -> Vec<f64> {
        let mut points: Vec<(i32, f64)> = self
            .iter()
            .filter(|(row, _)| row.jurisdiction == unit.jurisdiction
                && row.sub_jurisdiction == unit.sub_jurisdiction)
            .map(|(row, ind)| (row.year, ind.active(law)))
            .collect();
        points.sort_by_key(|(year, _)| *year);
        points.into_iter().map(|(_, v)| v).collect()
    }
}
