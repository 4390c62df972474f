//! The recall ranking formula (§4.5). Pure functions over plain numbers so
//! the composite score can be unit-tested against the literal scenario in
//! §8 without a database.

use chrono::{DateTime, Utc};

/// Decay rate; λ = 0.01 gives an ≈69-day half-life.
pub const DECAY_LAMBDA: f64 = 0.01;

/// Floor on the vote factor: a lesson with catastrophic downvotes stays
/// discoverable rather than dropping to zero (§9, "Vote-factor floor").
pub const VOTE_FACTOR_FLOOR: f64 = 0.1;

/// Age in fractional days between `updated_at` and `now`. Negative if
/// `updated_at` is in the future, which the decay term then amplifies
/// rather than discounts — callers are expected to only pass rows where
/// `updated_at <= now`.
pub fn age_days(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - updated_at).num_milliseconds() as f64 / 86_400_000.0
}

/// `max(1.0 + 0.1 * (upvotes - downvotes), 0.1)`.
pub fn vote_factor(upvotes: i64, downvotes: i64) -> f64 {
    let raw = 1.0 + 0.1 * (upvotes - downvotes) as f64;
    raw.max(VOTE_FACTOR_FLOOR)
}

/// `score = (1 - cosine_distance) * confidence * exp(-λ * age_days) * vote_factor`,
/// rounded to 6 decimals and clamped to `>= 0`.
pub fn recall_score(
    cosine_distance: f64,
    confidence: f64,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
    upvotes: i64,
    downvotes: i64,
) -> f64 {
    let similarity = 1.0 - cosine_distance;
    let decay = (-DECAY_LAMBDA * age_days(updated_at, now)).exp();
    let raw = similarity * confidence * decay * vote_factor(upvotes, downvotes);
    round6(raw.max(0.0))
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn newer_lesson_outranks_older_heavily_upvoted_one() {
        // §8 scenario 3, literal values: identical embeddings and
        // confidence, one lesson 60 days old with +5 net upvotes, the
        // other 1 day old with no votes.
        let now = Utc::now();
        let older_updated = now - Duration::days(60);
        let newer_updated = now - Duration::days(1);

        let older = recall_score(0.0, 0.9, older_updated, now, 5, 0);
        let newer = recall_score(0.0, 0.9, newer_updated, now, 0, 0);

        assert!(newer > older, "newer={newer} older={older}");
    }

    #[test]
    fn vote_factor_floors_at_one_tenth_not_zero() {
        assert_eq!(vote_factor(0, 1000), VOTE_FACTOR_FLOOR);
        assert!(vote_factor(0, 1000) > 0.0);
    }

    #[test]
    fn vote_factor_is_one_with_no_votes() {
        assert_eq!(vote_factor(0, 0), 1.0);
    }

    #[test]
    fn score_is_never_negative() {
        let now = Utc::now();
        let ancient = now - Duration::days(100_000);
        let score = recall_score(0.99, 0.01, ancient, now, 0, 500);
        assert!(score >= 0.0);
    }

    #[test]
    fn score_rounds_to_six_decimals() {
        let now = Utc::now();
        let score = recall_score(0.123_456_789, 0.987_654_321, now, now, 1, 0);
        let scaled = score * 1_000_000.0;
        assert!((scaled - scaled.round()).abs() < 1e-9);
    }

    #[test]
    fn perfect_similarity_and_no_decay_yields_confidence_times_vote_factor() {
        let now = Utc::now();
        assert_eq!(recall_score(0.0, 0.5, now, now, 2, 0), 0.6);
    }
}
