// crates/scout-core/src/rounding.rs
// ============================================================================
// Module: Deterministic Rounding
// Description: The one rounding rule every deterministic score in Collaboration
//              Scout shares: round to 1e-6 before it is persisted or compared.
// Purpose: Keep keyword-aggregation weights, overlap scores, and brief scores
//          replay-stable (spec.md §8: "final_score replay-idempotence").
// Dependencies: none
// ============================================================================

//! ## Overview
//! Floating-point formulas computed from LLM scores and weighted sums drift in
//! the last bit across otherwise-identical runs. Every place `spec.md` calls
//! for a score to be "rounded to 1e-6" uses [`round6`] so that two runs over
//! the same inputs produce byte-identical stored values.

/// Rounds `value` to six decimal places.
///
/// Used wherever `spec.md` requires a deterministic score to be "rounded to
/// 1e-6": keyword-aggregation weights (§4.F), overlap and functional-overlap
/// scores, and brief scores (§4.G).
#[must_use]
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "Test assertions use unwrap/expect for clarity.")]
    use super::*;

    #[test]
    fn rounds_to_six_decimal_places() {
        assert!((round6(0.123_456_78) - 0.123_457).abs() < 1e-12);
    }

    #[test]
    fn rounds_half_away_from_zero() {
        assert!((round6(1.000_000_5) - 1.000_001).abs() < 1e-12);
    }

    #[test]
    fn is_stable_under_repeated_application() {
        let once = round6(0.333_333_333_3);
        assert_eq!(once, round6(once));
    }

    #[test]
    fn preserves_values_already_at_precision() {
        assert_eq!(round6(0.74), 0.74);
    }
}
