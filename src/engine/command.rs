// SPDX-License-Identifier: PMPL-1.0-or-later

//! Out-of-process regression engine.
//!
//! Each fit spawns the configured solver (an R or Python script wrapping a
//! fixed-effects negative-binomial routine, typically), writes one JSON
//! request to its stdin and reads one JSON response from its stdout.
//!
//! Response shape:
//! `{"status": "ok", "coefficients": [{"name", "estimate", "std_error", "p_value"}]}`,
//! or `{"status": "non_convergence" | "malformed_formula", "message": "..."}`.

use super::{CoefficientEstimate, FittedModel, RegressionEngine};
use crate::error::FitError;
use crate::panel::LawPanel;
use crate::spec::ModelSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEngine {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
struct FitRequest<'a> {
    formula: String,
    cluster_formula: String,
    outcome: &'a str,
    terms: Vec<&'a str>,
    fixed_effects: &'a [String],
    clusters: &'a [String],
    rows: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum FitResponse {
    Ok {
        coefficients: Vec<CoefficientEstimate>,
    },
    NonConvergence {
        #[serde(default)]
        message: String,
    },
    MalformedFormula {
        #[serde(default)]
        message: String,
    },
}

impl CommandEngine {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn request<'a>(&self, spec: &'a ModelSpec, panel: &LawPanel<'_>) -> FitRequest<'a> {
        FitRequest {
            formula: spec.formula(),
            cluster_formula: spec.cluster_formula(),
            outcome: &spec.outcome,
            terms: spec.terms().collect(),
            fixed_effects: &spec.fixed_effects,
            clusters: &spec.clusters,
            rows: encode_rows(panel),
        }
    }

    fn spawn_error(&self, message: impl ToString) -> FitError {
        FitError::Spawn {
            program: self.program.clone(),
            message: message.to_string(),
        }
    }
}

impl RegressionEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn fit(&self, spec: &ModelSpec, panel: &LawPanel<'_>) -> Result<FittedModel, FitError> {
        let payload = serde_json::to_vec(&self.request(spec, panel))
            .map_err(|e| FitError::Protocol(format!("encoding request: {}", e)))?;

        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // stdin is fed from its own thread; the solver may fill stdout first
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.spawn_error("stdin unavailable"))?;
        let writer = std::thread::spawn(move || stdin.write_all(&payload));

        let output = child
            .wait_with_output()
            .map_err(|e| self.spawn_error(e))?;
        match writer.join() {
            Ok(Ok(())) => {}
            // solver exited before draining stdin; its response decides
            Ok(Err(e)) => debug!(error = %e, "solver closed stdin early"),
            Err(_) => return Err(self.spawn_error("stdin writer panicked")),
        }

        debug!(
            program = %self.program,
            outcome = %spec.outcome,
            table = %spec.table,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "solver finished"
        );

        if !output.status.success() {
            return Err(self.spawn_error(format!(
                "exit status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        parse_response(&output.stdout, spec)
    }
}

fn parse_response(stdout: &[u8], spec: &ModelSpec) -> Result<FittedModel, FitError> {
    let response: FitResponse = serde_json::from_slice(stdout)
        .map_err(|e| FitError::Protocol(format!("decoding response: {}", e)))?;
    match response {
        FitResponse::Ok { coefficients } => Ok(FittedModel::new(coefficients)),
        FitResponse::NonConvergence { message } => Err(FitError::NonConvergence { message }),
        FitResponse::MalformedFormula { message } => Err(FitError::MalformedFormula {
            formula: spec.formula(),
            message,
        }),
    }
}

fn encode_rows(panel: &LawPanel<'_>) -> Vec<Map<String, Value>> {
    panel
        .iter()
        .map(|(row, ind)| {
            let mut obj = Map::new();
            obj.insert("jurisdiction".into(), Value::from(row.jurisdiction.clone()));
            if let Some(sub) = &row.sub_jurisdiction {
                obj.insert("sub_jurisdiction".into(), Value::from(sub.clone()));
            }
            obj.insert("year".into(), Value::from(row.year));
            for (name, value) in &row.values {
                obj.insert(name.clone(), Value::from(*value));
            }
            if let Value::Object(law) = serde_json::to_value(ind).unwrap_or(Value::Null) {
                obj.extend(law);
            }
            // engines address the interaction by its term name
            if let Some(v) = obj.remove("syg_x_rtc") {
                obj.insert(crate::types::SYG_X_RTC.to_string(), v);
            }
            obj
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::{build_law_panel, BuildOptions, Panel};
    use crate::spec::{generate, default_outcomes, BaseFormula};
    use crate::types::{AdoptionSchedule, AdoptionYears, DatasetLevel, PanelRow};
    use std::collections::BTreeMap;

    fn fixture() -> (Panel, ModelSpec) {
        let rows = (2000..2004)
            .map(|year| PanelRow {
                jurisdiction: "FL".into(),
                sub_jurisdiction: None,
                year,
                values: BTreeMap::from([("jh_total".to_string(), 3.0)]),
            })
            .collect();
        let panel = Panel::new(DatasetLevel::Jurisdiction, rows).expect("valid panel");
        let battery = generate(&BaseFormula::new(vec!["poverty".into()]), &default_outcomes())
            .expect("battery");
        (panel, battery.tables[1].specs[0].clone())
    }

    #[test]
    fn rows_carry_law_columns() {
        let (panel, _) = fixture();
        let mut syg = AdoptionYears::new();
        syg.insert("FL", 2002);
        let schedule = AdoptionSchedule::new(syg, AdoptionYears::new());
        let lp = build_law_panel(&panel, &schedule, &BuildOptions::default());
        let rows = encode_rows(&lp);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[2]["syg"], Value::from(1.0));
        assert_eq!(rows[2]["syg:rtc"], Value::from(0.0));
        assert_eq!(rows[0]["jh_total"], Value::from(3.0));
        assert!(!rows[0].contains_key("syg_x_rtc"));
    }

    #[test]
    fn response_statuses_map_to_fit_errors() {
        let (_, spec) = fixture();
        let ok = br#"{"status":"ok","coefficients":[{"name":"syg","estimate":0.2,"std_error":0.1,"p_value":0.04}]}"#;
        let model = parse_response(ok, &spec).expect("ok response");
        assert_eq!(model.get("syg").map(|c| c.estimate), Some(0.2));

        let nc = br#"{"status":"non_convergence","message":"theta diverged"}"#;
        assert!(matches!(
            parse_response(nc, &spec),
            Err(FitError::NonConvergence { .. })
        ));

        let bad = br#"{"status":"malformed_formula","message":"unknown variable"}"#;
        match parse_response(bad, &spec) {
            Err(FitError::MalformedFormula { formula, .. }) => {
                assert!(formula.starts_with("jh_total ~ syg + rtc + syg:rtc"))
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            parse_response(b"not json", &spec),
            Err(FitError::Protocol(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn runs_external_solver() {
        let (panel, spec) = fixture();
        let lp = build_law_panel(&panel, &AdoptionSchedule::default(), &BuildOptions::default());
        let engine = CommandEngine::new(
            "sh",
            vec![
                "-c".into(),
                r#"cat > /dev/null; echo '{"status":"ok","coefficients":[{"name":"rtc","estimate":-0.1,"std_error":0.05,"p_value":0.2}]}'"#.into(),
            ],
        );
        let model = engine.fit(&spec, &lp).expect("solver should answer");
        assert_eq!(model.coefficients.len(), 1);
        assert_eq!(model.coefficients[0].name, "rtc");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_a_spawn_error() {
        let (panel, spec) = fixture();
        let lp = build_law_panel(&panel, &AdoptionSchedule::default(), &BuildOptions::default());
        let engine = CommandEngine::new("sh", vec!["-c".into(), "cat > /dev/null; exit 3".into()]);
        assert!(matches!(engine.fit(&spec, &lp), Err(FitError::Spawn { .. })));
    }
}
