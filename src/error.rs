// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error taxonomy for the placebo pipeline

use crate::types::{CoefficientKey, DatasetLevel, TableId};
use thiserror::Error;

/// Caller or data errors detected before any model is fit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("formula is empty")]
    EmptyFormula,

    #[error("formula has no '~' separating outcome and controls: {0}")]
    MissingTilde(String),

    #[error("unbalanced parentheses in formula: {0}")]
    UnbalancedParens(String),

    #[error("specification battery needs at least one outcome variable")]
    NoOutcomes,

    #[error("{level} panel has no rows")]
    EmptyPanel { level: DatasetLevel },

    #[error("row {row} of the sub-jurisdiction panel has no sub_jurisdiction")]
    MissingSubJurisdiction { row: usize },

    #[error("duplicate panel row for {unit} in {year}")]
    DuplicateRow { unit: String, year: i32 },

    #[error("iteration count must be at least 1")]
    ZeroIterations,
}

/// Failures reported by a regression engine for a single fit
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("model did not converge: {message}")]
    NonConvergence { message: String },

    #[error("engine rejected formula '{formula}': {message}")]
    MalformedFormula { formula: String, message: String },

    #[error("failed to run engine '{program}': {message}")]
    Spawn { program: String, message: String },

    #[error("engine protocol error: {0}")]
    Protocol(String),
}

/// A fit failure tagged with the specification that produced it
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{table} model {model} ({outcome}) failed: {source}")]
pub struct SpecFailure {
    pub table: TableId,
    pub model: usize,
    pub outcome: String,
    #[source]
    pub source: FitError,
}

#[derive(Error, Debug)]
pub enum PlaceboError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error("iteration {iteration}: {failure}")]
    Iteration {
        iteration: u32,
        #[source]
        failure: SpecFailure,
    },

    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] std::io::Error),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InferenceError {
    #[error("observed table is empty")]
    EmptyObserved,

    #[error("no simulated draws for {0}; empirical p-value is undefined")]
    NoDraws(CoefficientKey),
}
