// SPDX-License-Identifier: PMPL-1.0-or-later

//! Reduce fitted models to the law coefficients used for inference.

use crate::fit::TableFit;
use crate::types::{CoefficientRecord, RTC, SYG, SYG_LAW, SYG_X_RTC};

/// Coefficients kept from every model; everything else is dropped
pub const LAW_COEFFICIENTS: [&str; 4] = [SYG, RTC, SYG_X_RTC, SYG_LAW];

pub fn is_law_coefficient(name: &str) -> bool {
    LAW_COEFFICIENTS.contains(&name)
}

/// Flatten fits into records tagged with `iteration`.
///
/// Order is table, then model, then the engine's coefficient order.
pub fn extract_law_coefficients(iteration: u32, fits: &[TableFit]) -> Vec<CoefficientRecord> {
    let mut records = Vec::new();
    for table in fits {
        for fit in &table.models {
            records.extend(
                fit.fitted
                    .coefficients
                    .iter()
                    .filter(|c| is_law_coefficient(&c.name))
                    .map(|c| CoefficientRecord {
                        iteration,
                        table: table.table,
                        model: fit.spec.model,
                        coefficient: c.name.clone(),
                        estimate: c.estimate,
                        std_error: c.std_error,
                        p_value: c.p_value,
                    }),
            );
        }
    }
    records
}
