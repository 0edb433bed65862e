// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Reproducible transient-failure injection.
//!
//! Rolls come from a seeded generator, so a given seed and rate always
//! produce the same failure sequence. Because activity outcomes are journaled,
//! a replayed process never rolls again for an attempt that already ran.

use std::sync::{Mutex, PoisonError};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub struct SeededFaults {
    rate: f64,
    seed: u64,
    rng: Mutex<StdRng>,
}

impl SeededFaults {
    /// Fail with probability `rate`; values outside `0.0..=1.0` are clamped.
    pub fn new(seed: u64, rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            rate,
            seed,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next roll; `true` means the call should fail.
    pub fn roll(&self) -> bool {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_bool(self.rate)
    }
}

impl std::fmt::Debug for SeededFaults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededFaults")
            .field("rate", &self.rate)
            .field("seed", &self.seed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let a = SeededFaults::new(42, 0.5);
        let b = SeededFaults::new(42, 0.5);
        let first: Vec<bool> = (0..64).map(|_| a.roll()).collect();
        let second: Vec<bool> = (0..64).map(|_| b.roll()).collect();
        assert_eq!(first, second);
        assert!(first.contains(&true) && first.contains(&false));
    }

    #[test]
    fn test_rate_bounds() {
        let never = SeededFaults::new(1, 0.0);
        assert!((0..100).all(|_| !never.roll()));

        let always = SeededFaults::new(1, 7.5);
        assert_eq!(always.rate(), 1.0);
        assert!((0..100).all(|_| always.roll()));

        assert_eq!(SeededFaults::new(1, f64::NAN).rate(), 0.0);
    }
}
