// SPDX-License-Identifier: PMPL-1.0-or-later

//! Law-indicator construction.
//!
//! Each unit's series is scanned in year order with a running count of
//! rows whose year equals the unit's assigned adoption year. The count is
//! the cumulative indicator; `count > 0` is the boolean one. A unit whose
//! jurisdiction has no assigned year never matches and stays at zero.

use super::{IndicatorStyle, LawIndicators, LawPanel, Panel};
use crate::types::{AdoptionSchedule, AdoptionYears, Law};
use serde::{Deserialize, Serialize};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BuildOptions {
    #[serde(default)]
    pub style: IndicatorStyle,
    /// Start year of the jurisdiction-level series. When this panel starts
    /// later, adoption years equal to it are moved to this panel's own
    /// start year so year-one adopters keep their treatment.
    #[serde(default)]
    pub reference_start: Option<i32>,
    /// Cap for the event-time columns; `None` leaves them empty
    #[serde(default)]
    pub event_window: Option<u32>,
}

/// Enrich `panel` with law indicators for `schedule`
pub fn build_law_panel<'a>(
    panel: &'a Panel,
    schedule: &AdoptionSchedule,
    options: &BuildOptions,
) -> LawPanel<'a> {
    let own_start = panel.start_year();
    let syg = remap_start(&schedule.syg, options.reference_start, own_start);
    let rtc = remap_start(&schedule.rtc, options.reference_start, own_start);

    let mut indicators = vec![LawIndicators::default(); panel.len()];
    for (unit, indices) in panel.groups() {
        let syg_year = syg.get(&unit.jurisdiction);
        let rtc_year = rtc.get(&unit.jurisdiction);
        trace!(%unit, ?syg_year, ?rtc_year, "building law indicators");

        let mut syg_count = 0u32;
        let mut rtc_count = 0u32;
        for idx in indices {
            let year = panel.rows()[idx].year;
            if syg_year == Some(year) {
                syg_count += 1;
            }
            if rtc_year == Some(year) {
                rtc_count += 1;
            }

            let ind = &mut indicators[idx];
            ind.syg = encode(syg_count, options.style);
            ind.rtc = encode(rtc_count, options.style);
            ind.syg_x_rtc = ind.syg * ind.rtc;
            ind.syg_law = if syg_year.is_some() { 1.0 } else { 0.0 };
            ind.rtc_law = if rtc_year.is_some() { 1.0 } else { 0.0 };
            ind.syg_event = event_time(year, syg_year, options.event_window);
            ind.rtc_event = event_time(year, rtc_year, options.event_window);
        }
    }

    LawPanel::new(panel, indicators)
}

/// Move adoption years that fall on the reference series' first year to
/// this series' first year. Only applies when this series starts later.
pub fn remap_start(years: &AdoptionYears, reference_start: Option<i32>, own_start: i32) -> AdoptionYears {
    match reference_start {
        Some(reference) if own_start > reference => years
            .iter()
            .map(|(jurisdiction, year)| {
                let year = if year == reference { own_start } else { year };
                (jurisdiction.to_string(), year)
            })
            .collect(),
        _ => years.clone(),
    }
}

fn encode(count: u32, style: IndicatorStyle) -> f64 {
    match style {
        IndicatorStyle::Cumulative => f64::from(count),
        IndicatorStyle::Boolean => {
            if count > 0 {
                1.0
            } else {
                0.0
            }
        }
    }
}

fn event_time(year: i32, adoption: Option<i32>, window: Option<u32>) -> Option<i32> {
    let window = i32::try_from(window?).unwrap_or(i32::MAX);
    adoption.map(|adopted| (year - adopted).clamp(-window, window))
}

/// Convenience for callers that need a single law's per-row column
pub fn active_column(panel: &LawPanel<'_>, law: Law) -> Vec<f64> {
    panel.iter().map(|(_, ind)| ind.active(law)).collect()
}
