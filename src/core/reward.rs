//! Mining reward scaling by content uniqueness
//!
//! An optional external scorer rates the payloads sealed in a block between
//! 0 and 100. The score maps to a multiplier `0.1 + (score / 50) * 0.9`, so a
//! score of 50 pays the base reward and 100 pays 1.9 times the base.

use crate::core::{Address, Amount};
use crate::error::Result;
use num_bigint::BigUint;

/// Fixed-point scale for multipliers (parts per million)
const MULTIPLIER_SCALE: u64 = 1_000_000;

/// External uniqueness scoring service
pub trait ContentScorer: Send + Sync {
    /// Score `payload` submitted by `submitter`, in `[0, 100]`
    fn score(&self, payload: &[u8], submitter: &Address) -> Result<f64>;
}

/// Scorer that always answers the same score
#[derive(Debug, Clone, Copy)]
pub struct FixedScorer(pub f64);

impl ContentScorer for FixedScorer {
    fn score(&self, _payload: &[u8], _submitter: &Address) -> Result<f64> {
        Ok(self.0)
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 100.0)
}

pub fn reward_multiplier(score: f64) -> f64 {
    0.1 + (clamp_score(score) / 50.0) * 0.9
}

/// `base * reward_multiplier(score)` in exact integer arithmetic
pub fn scaled_reward(base: &Amount, score: f64) -> Amount {
    // 0.1 + 0.018 * score, expressed in parts per million
    let ppm = 100_000 + (clamp_score(score) * 18_000.0).round() as u64;
    base * BigUint::from(ppm) / BigUint::from(MULTIPLIER_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::monetary::coins;

    #[test]
    fn test_reward_multiplier_anchors() {
        assert!((reward_multiplier(0.0) - 0.1).abs() < 1e-12);
        assert!((reward_multiplier(50.0) - 1.0).abs() < 1e-12);
        assert!((reward_multiplier(100.0) - 1.9).abs() < 1e-12);
    }

    #[test]
    fn test_reward_multiplier_clamps() {
        assert_eq!(reward_multiplier(-20.0), reward_multiplier(0.0));
        assert_eq!(reward_multiplier(250.0), reward_multiplier(100.0));
        assert_eq!(reward_multiplier(f64::NAN), reward_multiplier(0.0));
    }

    #[test]
    fn test_scaled_reward_is_exact() {
        let base = coins(100);
        assert_eq!(scaled_reward(&base, 50.0), coins(100));
        assert_eq!(scaled_reward(&base, 0.0), coins(10));
        assert_eq!(scaled_reward(&base, 100.0), coins(190));
        assert_eq!(scaled_reward(&base, 75.0), coins(145));
    }

    #[test]
    fn test_fixed_scorer() {
        let scorer = FixedScorer(42.0);
        let submitter = Address::parse("0xminer").unwrap();
        assert_eq!(scorer.score(b"data", &submitter).unwrap(), 42.0);
    }
}
