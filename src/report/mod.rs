// SPDX-License-Identifier: PMPL-1.0-or-later

//! Run reports: observed table, simulation table and inference rows plus
//! the metadata needed to reproduce the run.

pub mod formatter;
pub mod output;

use crate::inference::InferenceRow;
use crate::placebo::{read_checkpoint, FailurePolicy, IterationFailure, SimulationTable};
use crate::types::CoefficientRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use formatter::ReportFormatter;
pub use output::ReportOutputFormat;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceboReport {
    pub created_at: String,
    /// Absent for observe-only reports and checkpoint reanalysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub requested: u32,
    pub effective_n: usize,
    pub policy: FailurePolicy,
    #[serde(default)]
    pub cancelled: bool,
    /// blake3 of the serialized observed table
    pub observed_digest: String,
    pub observed: Vec<CoefficientRecord>,
    #[serde(default)]
    pub simulation: SimulationTable,
    #[serde(default)]
    pub inference: Vec<InferenceRow>,
}

impl PlaceboReport {
    pub fn new(
        observed: Vec<CoefficientRecord>,
        simulation: SimulationTable,
        inference: Vec<InferenceRow>,
        seed: Option<u64>,
        policy: FailurePolicy,
    ) -> Result<Self> {
        Ok(Self {
            created_at: chrono::Utc::now().to_rfc3339(),
            seed,
            requested: simulation.requested,
            effective_n: simulation.effective_n(),
            policy,
            cancelled: simulation.cancelled,
            observed_digest: observed_digest(&observed)?,
            observed,
            simulation,
            inference,
        })
    }

    pub fn observed_only(observed: Vec<CoefficientRecord>) -> Result<Self> {
        Ok(Self {
            created_at: chrono::Utc::now().to_rfc3339(),
            seed: None,
            requested: 0,
            effective_n: 0,
            policy: FailurePolicy::default(),
            cancelled: false,
            observed_digest: observed_digest(&observed)?,
            observed,
            simulation: SimulationTable::default(),
            inference: Vec::new(),
        })
    }

    pub fn failures(&self) -> &[IterationFailure] {
        &self.simulation.failures
    }
}

/// Hex blake3 digest of the observed table's canonical JSON form
pub fn observed_digest(observed: &[CoefficientRecord]) -> Result<String> {
    let bytes = serde_json::to_vec(observed).context("serializing observed table")?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Write a report; the format follows the file extension (JSON otherwise)
pub fn write_report(report: &PlaceboReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("creating report parent directory {}", parent.display())
            })?;
        }
    }
    let format = ReportOutputFormat::from_path(path).unwrap_or(ReportOutputFormat::Json);
    let content = format.serialize(report)?;
    fs::write(path, content).with_context(|| format!("writing report {}", path.display()))?;
    Ok(())
}

pub fn load_report(path: &Path) -> Result<PlaceboReport> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading report {}", path.display()))?;
    let format = ReportOutputFormat::from_path(path).unwrap_or(ReportOutputFormat::Json);
    format
        .deserialize(&content)
        .with_context(|| format!("parsing report {}", path.display()))
}

/// Simulation table from either a saved report or a `.jsonl` checkpoint
pub fn load_simulation(path: &Path) -> Result<SimulationTable> {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("jsonl") => read_checkpoint(path),
        _ => Ok(load_report(path)?.simulation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TableId;
    use tempfile::TempDir;

    fn observed() -> Vec<CoefficientRecord> {
        vec![CoefficientRecord {
            iteration: 0,
            table: TableId::MainEffects,
            model: 1,
            coefficient: "syg".to_string(),
            estimate: 0.25,
            std_error: 0.05,
            p_value: 0.001,
        }]
    }

    #[test]
    fn digest_tracks_observed_values() {
        let a = observed_digest(&observed()).expect("digest");
        assert_eq!(a, observed_digest(&observed()).expect("digest"));
        assert_eq!(a.len(), 64);

        let mut changed = observed();
        changed[0].estimate = 0.26;
        assert_ne!(a, observed_digest(&changed).expect("digest"));
    }

    #[test]
    fn writes_and_loads_yaml_and_json() {
        let dir = TempDir::new().expect("tempdir should create");
        let report = PlaceboReport::observed_only(observed()).expect("report");

        for name in ["out/report.json", "out/report.yaml"] {
            let path = dir.path().join(name);
            write_report(&report, &path).expect("report should write");
            let loaded = load_report(&path).expect("report should load");
            assert_eq!(loaded.observed_digest, report.observed_digest);
            assert_eq!(loaded.observed, report.observed);
            assert!(loaded.seed.is_none());
        }
    }

    #[test]
    fn json_report_is_pretty_printed() {
        let dir = TempDir::new().expect("tempdir should create");
        let path = dir.path().join("report.json");
        let report = PlaceboReport::observed_only(observed()).expect("report");
        write_report(&report, &path).expect("report should write");
        let text = fs::read_to_string(&path).expect("read");
        assert!(text.contains("\n  \"observed_digest\""));
    }
}
