// SPDX-License-Identifier: PMPL-1.0-or-later

//! Regression engine contract.
//!
//! The fixed-effects count-regression solver lives outside this crate.
//! Anything that can fit a [`ModelSpec`] against a [`LawPanel`] and report
//! per-coefficient estimates implements [`RegressionEngine`].

pub mod command;

use crate::error::FitError;
use crate::panel::LawPanel;
use crate::spec::ModelSpec;
use serde::{Deserialize, Serialize};

pub use command::CommandEngine;

/// Estimate, standard error and p-value for one named coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientEstimate {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub p_value: f64,
}

/// A fitted model, coefficients in the order the engine reported them
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub coefficients: Vec<CoefficientEstimate>,
}

impl FittedModel {
    pub fn new(coefficients: Vec<CoefficientEstimate>) -> Self {
        Self { coefficients }
    }

    pub fn get(&self, name: &str) -> Option<&CoefficientEstimate> {
        self.coefficients.iter().find(|c| c.name == name)
    }
}

/// Fits one model. Called concurrently from worker threads, one call per
/// model per iteration; implementations must not keep per-call state.
pub trait RegressionEngine: Send + Sync {
    fn name(&self) -> &str;

    fn fit(&self, spec: &ModelSpec, panel: &LawPanel<'_>) -> Result<FittedModel, FitError>;
}

impl<E: RegressionEngine + ?Sized> RegressionEngine for &E {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fit(&self, spec: &ModelSpec, panel: &LawPanel<'_>) -> Result<FittedModel, FitError> {
        (**self).fit(spec, panel)
    }
}

impl<E: RegressionEngine + ?Sized> RegressionEngine for Box<E> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fit(&self, spec: &ModelSpec, panel: &LawPanel<'_>) -> Result<FittedModel, FitError> {
        (**self).fit(spec, panel)
    }
}
