// SPDX-License-Identifier: PMPL-1.0-or-later

//! Run configuration.
//!
//! A run is described by one JSON or YAML file. Relative paths inside it
//! are resolved against the file's own directory.
//!
//! ```yaml
//! panels:
//!   jurisdiction: data/states.json
//!   sub_jurisdiction: data/cities.json
//! adoption:
//!   syg: data/syg_years.yaml
//!   rtc: data/rtc_years.yaml
//! formula: "{outcome} ~ poverty + unemployment + (income + pop_density)"
//! iterations: 1000
//! policy: strict
//! engine:
//!   program: Rscript
//!   args: [solver/fenegbin.R]
//! ```

use crate::engine::CommandEngine;
use crate::panel::{load_adoption_years, load_panel, IndicatorStyle};
use crate::placebo::{FailurePolicy, PlaceboConfig, PlaceboInputs};
use crate::spec::{default_outcomes, generate, BaseFormula, Battery, OutcomeSpec};
use crate::types::{AdoptionSchedule, DatasetLevel};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelPaths {
    pub jurisdiction: PathBuf,
    pub sub_jurisdiction: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdoptionPaths {
    pub syg: PathBuf,
    pub rtc: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndicatorStyles {
    #[serde(default = "default_jurisdiction_style")]
    pub jurisdiction: IndicatorStyle,
    #[serde(default)]
    pub sub_jurisdiction: IndicatorStyle,
}

impl Default for IndicatorStyles {
    fn default() -> Self {
        Self {
            jurisdiction: default_jurisdiction_style(),
            sub_jurisdiction: IndicatorStyle::Boolean,
        }
    }
}

fn default_jurisdiction_style() -> IndicatorStyle {
    IndicatorStyle::Cumulative
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub panels: PanelPaths,
    pub adoption: AdoptionPaths,
    #[serde(default = "default_formula")]
    pub formula: String,
    #[serde(default = "default_outcomes")]
    pub outcomes: Vec<OutcomeSpec>,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Fixed seed; drawn from the OS when absent
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub policy: FailurePolicy,
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub indicators: IndicatorStyles,
    #[serde(default)]
    pub event_window: Option<u32>,
    #[serde(default)]
    pub checkpoint: Option<PathBuf>,
    pub engine: CommandEngine,
}

fn default_formula() -> String {
    "{outcome} ~ poverty + unemployment + income + pop_density".to_string()
}

fn default_iterations() -> u32 {
    1000
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading run config {}", path.display()))?;
        let mut config: RunConfig = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("parsing json run config {}", path.display()))?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("parsing yaml run config {}", path.display()))?,
            _ => {
                return Err(anyhow!(
                    "unsupported run config extension for {}",
                    path.display()
                ))
            }
        };

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_paths(base);
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.panels.jurisdiction);
        resolve(&mut self.panels.sub_jurisdiction);
        resolve(&mut self.adoption.syg);
        resolve(&mut self.adoption.rtc);
        if let Some(checkpoint) = self.checkpoint.as_mut() {
            resolve(checkpoint);
        }
    }

    pub fn battery(&self) -> Result<Battery> {
        let base = BaseFormula::parse(&self.formula)
            .with_context(|| format!("parsing base formula '{}'", self.formula))?;
        Ok(generate(&base, &self.outcomes)?)
    }

    /// Load panels and mappings and assemble the shared iteration inputs
    pub fn build_inputs(&self) -> Result<PlaceboInputs> {
        let jurisdiction = load_panel(&self.panels.jurisdiction, DatasetLevel::Jurisdiction)?;
        let sub_jurisdiction =
            load_panel(&self.panels.sub_jurisdiction, DatasetLevel::SubJurisdiction)?;
        let schedule = AdoptionSchedule::new(
            load_adoption_years(&self.adoption.syg)?,
            load_adoption_years(&self.adoption.rtc)?,
        );
        if schedule.syg.is_empty() && schedule.rtc.is_empty() {
            tracing::warn!("no jurisdiction adopts either law; placebo draws will be identical");
        }

        let mut inputs =
            PlaceboInputs::new(jurisdiction, sub_jurisdiction, schedule, self.battery()?)
                .with_event_window(self.event_window);
        inputs.jurisdiction_options.style = self.indicators.jurisdiction;
        inputs.sub_jurisdiction_options.style = self.indicators.sub_jurisdiction;
        Ok(inputs)
    }

    pub fn placebo_config(&self, seed: u64) -> PlaceboConfig {
        PlaceboConfig {
            iterations: self.iterations,
            seed,
            policy: self.policy,
            threads: self.threads,
            checkpoint: self.checkpoint.clone(),
        }
    }
}

/// Use the configured seed, or draw one from the OS so it can be recorded
pub fn resolve_seed(seed: Option<u64>) -> Result<u64> {
    match seed {
        Some(seed) => Ok(seed),
        None => {
            let mut buf = [0u8; 8];
            getrandom::getrandom(&mut buf).map_err(|e| anyhow!("drawing seed: {}", e))?;
            Ok(u64::from_le_bytes(buf))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn yaml_config_fills_defaults_and_resolves_paths() {
        let dir = TempDir::new().expect("tempdir should create");
        let path = dir.path().join("run.yaml");
        fs::write(
            &path,
            r#"
panels:
  jurisdiction: data/states.json
  sub_jurisdiction: /abs/cities.json
adoption:
  syg: syg.yaml
  rtc: rtc.yaml
engine:
  program: Rscript
  args: [fit.R]
"#,
        )
        .expect("write config");

        let config = RunConfig::load(&path).expect("config should load");
        assert_eq!(config.iterations, 1000);
        assert_eq!(config.policy, FailurePolicy::Strict);
        assert_eq!(config.outcomes.len(), 5);
        assert_eq!(config.panels.jurisdiction, dir.path().join("data/states.json"));
        assert_eq!(config.panels.sub_jurisdiction, PathBuf::from("/abs/cities.json"));
        assert_eq!(config.indicators.jurisdiction, IndicatorStyle::Cumulative);
        assert_eq!(config.battery().expect("battery").len(), 10);
    }

    #[test]
    fn rejects_unknown_extension() {
        let dir = TempDir::new().expect("tempdir should create");
        let path = dir.path().join("run.toml");
        fs::write(&path, "iterations = 3").expect("write config");
        assert!(RunConfig::load(&path).is_err());
    }

    #[test]
    fn explicit_seed_wins() {
        assert_eq!(resolve_seed(Some(11)).expect("seed"), 11);
        assert!(resolve_seed(None).is_ok());
    }
}
