// SPDX-License-Identifier: PMPL-1.0-or-later

//! Append-only JSON-lines checkpoint of completed iterations.

use super::SimulationTable;
use crate::types::CoefficientRecord;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CheckpointLine {
    iteration: u32,
    records: Vec<CoefficientRecord>,
}

/// Shared by all workers; one line per finished iteration.
pub struct CheckpointWriter {
    file: Mutex<File>,
}

impl CheckpointWriter {
    /// Create (truncating) the checkpoint file
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    pub fn append(&self, iteration: u32, records: &[CoefficientRecord]) -> io::Result<()> {
        let mut line = serde_json::to_string(&CheckpointLine {
            iteration,
            records: records.to_vec(),
        })
        .map_err(io::Error::other)?;
        line.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("checkpoint lock poisoned"))?;
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

/// Rebuild a simulation table from a checkpoint.
///
/// Lines are sorted by iteration, so the table matches what an
/// uninterrupted run would have produced for the same iterations. A
/// truncated final line (a run killed mid-write) is skipped.
pub fn read_checkpoint(path: &Path) -> Result<SimulationTable> {
    let file =
        File::open(path).with_context(|| format!("opening checkpoint {}", path.display()))?;
    let mut lines = Vec::new();
    let raw: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<io::Result<_>>()
        .with_context(|| format!("reading checkpoint {}", path.display()))?;
    let last = raw.len().saturating_sub(1);
    for (idx, text) in raw.iter().enumerate() {
        if text.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<CheckpointLine>(text) {
            Ok(line) => lines.push(line),
            Err(e) if idx == last => {
                tracing::warn!(error = %e, "ignoring truncated final checkpoint line");
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("parsing checkpoint {} line {}", path.display(), idx + 1)
                })
            }
        }
    }
    lines.sort_by_key(|l| l.iteration);
    lines.dedup_by_key(|l| l.iteration);

    let completed: Vec<u32> = lines.iter().map(|l| l.iteration).collect();
    let records = lines.into_iter().flat_map(|l| l.records).collect();
    Ok(SimulationTable {
        requested: completed.len() as u32,
        completed,
        records,
        failures: Vec::new(),
        cancelled: false,
    })
}
