// SPDX-License-Identifier: PMPL-1.0-or-later

//! syg-rtc-placebo: placebo permutation tests for the effect of
//! Stand-Your-Ground and Right-to-Carry laws on justifiable homicide.
//!
//! The observed panels are fit once with the true adoption years. Then,
//! for each placebo iteration, adoption years are shuffled across
//! jurisdictions, the law indicators are rebuilt, and the same battery of
//! fixed-effects models is refit. The spread of placebo estimates is the
//! null distribution the observed estimates are ranked against.
//!
//! Pipeline:
//! 1. **permute**: draw placebo adoption years.
//! 2. **panel**: derive law indicators for both dataset levels.
//! 3. **spec**: the two tables of model specifications.
//! 4. **fit** / **engine**: run every specification through a regression engine.
//! 5. **extract**: keep the law coefficients.
//! 6. **placebo**: repeat the above N times in parallel.
//! 7. **inference**: empirical two-tailed p-values.

pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod fit;
pub mod inference;
pub mod panel;
pub mod permute;
pub mod placebo;
pub mod report;
pub mod spec;
pub mod types;
