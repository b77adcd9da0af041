// SPDX-License-Identifier: PMPL-1.0-or-later

//! Adoption-year permutation engine.
//!
//! A placebo draw keeps the set of adopting jurisdictions fixed and
//! shuffles which of them gets which adoption year. SYG and RTC are
//! shuffled independently, so any correlation between the two laws'
//! timing in the real data is destroyed under the null.

use crate::types::{AdoptionSchedule, AdoptionYears};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermuteMode {
    /// Uniformly shuffle the adoption years across adopting jurisdictions
    Permute,
    /// Return the mapping unchanged (observed run)
    Identity,
}

/// Reassign adoption years for one law.
///
/// The key set is preserved and the output values are a permutation of
/// the input values. Jurisdictions are visited in sorted order so a given
/// RNG state always yields the same assignment.
pub fn permute_years<R: Rng + ?Sized>(
    years: &AdoptionYears,
    mode: PermuteMode,
    rng: &mut R,
) -> AdoptionYears {
    match mode {
        PermuteMode::Identity => years.clone(),
        PermuteMode::Permute => {
            let mut values: Vec<i32> = years.years().collect();
            // Fisher-Yates; a no-op for zero or one adopter.
            values.shuffle(rng);
            years
                .jurisdictions()
                .map(str::to_string)
                .zip(values)
                .collect()
        }
    }
}

impl AdoptionSchedule {
    /// Draw an independent assignment for each law. SYG is drawn first,
    /// then RTC, from the same generator.
    pub fn draw<R: Rng + ?Sized>(&self, mode: PermuteMode, rng: &mut R) -> AdoptionSchedule {
        let syg = permute_years(&self.syg, mode, rng);
        let rtc = permute_years(&self.rtc, mode, rng);
        AdoptionSchedule { syg, rtc }
    }
}

/// Generator for one iteration, derived from the run seed.
///
/// Every iteration owns its generator, so results do not depend on the
/// order in which worker threads pick iterations up.
pub fn iteration_rng(seed: u64, iteration: u32) -> StdRng {
    StdRng::seed_from_u64(splitmix64(seed ^ ((u64::from(iteration) << 32) | u64::from(iteration))))
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}
