// SPDX-License-Identifier: PMPL-1.0-or-later

//! Serialization helpers for exported reports

use super::PlaceboReport;
use anyhow::Result;
use clap::ValueEnum;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportOutputFormat {
    Json,
    Yaml,
}

impl ReportOutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(ReportOutputFormat::Json),
            "yaml" | "yml" => Some(ReportOutputFormat::Yaml),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::parse)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportOutputFormat::Json => "json",
            ReportOutputFormat::Yaml => "yaml",
        }
    }

    pub fn serialize(&self, report: &PlaceboReport) -> Result<String> {
        match self {
            ReportOutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            ReportOutputFormat::Yaml => Ok(serde_yaml::to_string(report)?),
        }
    }

    pub fn deserialize(&self, content: &str) -> Result<PlaceboReport> {
        match self {
            ReportOutputFormat::Json => Ok(serde_json::from_str(content)?),
            ReportOutputFormat::Yaml => Ok(serde_yaml::from_str(content)?),
        }
    }
}
