// SPDX-License-Identifier: PMPL-1.0-or-later

//! Console output

use super::PlaceboReport;
use crate::inference::{InferenceRow, Significance};
use crate::spec::Battery;
use crate::types::CoefficientRecord;
use colored::*;

#[derive(Debug, Default)]
pub struct ReportFormatter;

impl ReportFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn print(&self, report: &PlaceboReport) {
        println!("\n{}", "=== SYG/RTC PLACEBO REPORT ===".bold().cyan());
        println!();
        self.print_run(report);
        println!();
        if report.inference.is_empty() {
            self.print_observed(&report.observed);
        } else {
            self.print_inference(&report.inference);
        }
        println!();
    }

    fn print_run(&self, report: &PlaceboReport) {
        println!("{}", "RUN".bold().yellow());
        println!("  Created: {}", report.created_at);
        match report.seed {
            Some(seed) => println!("  Seed: {}", seed),
            None => println!("  Seed: {}", "(observed pass only)".dimmed()),
        }
        println!("  Policy: {:?}", report.policy);
        println!(
            "  Iterations: {} of {} requested",
            report.effective_n, report.requested
        );
        if report.cancelled {
            println!("  {}", "Run was cancelled before completion".yellow());
        }
        println!("  Observed digest: {}", report.observed_digest);

        let failures = report.failures();
        if !failures.is_empty() {
            println!("  Dropped iterations: {}", failures.len().to_string().red().bold());
            for failure in failures.iter().take(10) {
                let location = match (&failure.table, failure.model, &failure.outcome) {
                    (Some(table), Some(model), Some(outcome)) => {
                        format!("{} model {} ({})", table, model, outcome)
                    }
                    _ => "-".to_string(),
                };
                println!(
                    "    #{} {}: {}",
                    failure.iteration, location, failure.message
                );
            }
            if failures.len() > 10 {
                println!("    ... {} more", failures.len() - 10);
            }
        }
    }

    pub fn print_observed(&self, records: &[CoefficientRecord]) {
        println!("{}", "OBSERVED COEFFICIENTS".bold().yellow());
        println!(
            "  {:<13} {:>5}  {:<8} {:>10} {:>10} {:>8}",
            "table", "model", "term", "estimate", "std.err", "p"
        );
        for record in records {
            let p = format!("{:>8.4}", record.p_value);
            let p = if record.p_value < crate::inference::ALPHA {
                p.green()
            } else {
                p.normal()
            };
            println!(
                "  {:<13} {:>5}  {:<8} {:>10.4} {:>10.4} {}",
                record.table.name(),
                record.model,
                record.coefficient,
                record.estimate,
                record.std_error,
                p
            );
        }
    }

    fn print_inference(&self, rows: &[InferenceRow]) {
        println!("{}", "EMPIRICAL INFERENCE".bold().yellow());
        println!(
            "  {:<13} {:>5}  {:<8} {:>10} {:>8} {:>6} {:>6} {:>6} {:>9}",
            "table", "model", "term", "observed", "p(model)", "below", "above", "draws", "p(perm)"
        );
        for row in rows {
            let perm = format!("{:>9.4} {}", row.empirical_p_value, row.significance.stars());
            let perm = match row.significance {
                Significance::P01 | Significance::P05 => perm.green().bold(),
                Significance::P10 => perm.yellow(),
                Significance::NotSignificant => perm.normal(),
            };
            println!(
                "  {:<13} {:>5}  {:<8} {:>10.4} {:>8.4} {:>6} {:>6} {:>6} {}",
                row.table.name(),
                row.model,
                row.coefficient,
                row.observed_estimate,
                row.observed_p_value,
                row.below,
                row.above,
                row.draws,
                perm
            );
        }

        let robust = rows
            .iter()
            .filter(|r| r.observed_significant && r.significance != Significance::NotSignificant)
            .count();
        let nominal = rows.iter().filter(|r| r.observed_significant).count();
        println!();
        println!(
            "  {} of {} nominally significant estimates survive the placebo test",
            robust, nominal
        );
    }

    pub fn print_battery(&self, battery: &Battery) {
        println!("{}", "SPECIFICATIONS".bold().yellow());
        for table in &battery.tables {
            println!("  {}", table.table.name().bold());
            for spec in &table.specs {
                println!(
                    "    {:>2}. [{}] {}  cluster {}",
                    spec.model,
                    spec.level,
                    spec.formula(),
                    spec.cluster_formula()
                );
            }
        }
    }
}
