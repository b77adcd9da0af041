// SPDX-License-Identifier: PMPL-1.0-or-later

//! Loading panels and adoption-year mappings from disk.

use super::Panel;
use crate::types::{AdoptionYears, DatasetLevel, PanelRow};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Read a panel stored as a JSON array of rows
pub fn load_panel(path: &Path, level: DatasetLevel) -> Result<Panel> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading panel {}", path.display()))?;
    let rows: Vec<PanelRow> = serde_json::from_str(&content)
        .with_context(|| format!("parsing panel {}", path.display()))?;
    let panel = Panel::new(level, rows)
        .with_context(|| format!("validating {} panel {}", level, path.display()))?;
    tracing::debug!(
        path = %path.display(),
        rows = panel.len(),
        start = panel.start_year(),
        "loaded panel"
    );
    Ok(panel)
}

/// Read a `{jurisdiction: year}` mapping from JSON or YAML.
///
/// `null` marks a jurisdiction that never adopts and is dropped.
pub fn load_adoption_years(path: &Path) -> Result<AdoptionYears> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading adoption years {}", path.display()))?;
    let raw: BTreeMap<String, Option<i32>> = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("parsing json adoption years {}", path.display()))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("parsing yaml adoption years {}", path.display()))?,
        _ => {
            return Err(anyhow!(
                "unsupported adoption-year file extension for {}",
                path.display()
            ))
        }
    };

    Ok(raw
        .into_iter()
        .filter_map(|(jurisdiction, year)| year.map(|y| (jurisdiction, y)))
        .collect())
}
