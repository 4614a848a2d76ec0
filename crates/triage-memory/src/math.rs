//! Similarity and time-decay primitives

use chrono::{DateTime, Utc};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Cosine similarity between two embeddings.
///
/// Returns 0.0 for empty vectors, mismatched dimensions, or zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0_f64;
    let mut mag_a = 0.0_f64;
    let mut mag_b = 0.0_f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let denom = mag_a.sqrt() * mag_b.sqrt();
    if denom < f64::EPSILON || !denom.is_finite() {
        return 0.0;
    }

    dot / denom
}

/// Fractional days from `from` to `now`. Future timestamps count as zero.
pub fn days_since(from: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let seconds = now.signed_duration_since(from).num_milliseconds() as f64 / 1000.0;
    (seconds / SECONDS_PER_DAY).max(0.0)
}

/// Whole days from `from` to `now`, truncated. Future timestamps count as zero.
pub fn whole_days_since(from: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(from).num_days().max(0)
}

/// Half-life decay: `0.5^(days / half_life_days)`, in `[0.0, 1.0]`.
///
/// A memory that was never used has no recency signal at all and scores 0.0.
pub fn recency_score(
    last_used: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    half_life_days: f64,
) -> f64 {
    let Some(last_used) = last_used else {
        return 0.0;
    };
    if half_life_days <= 0.0 {
        return 0.0;
    }
    0.5_f64.powf(days_since(last_used, now) / half_life_days)
}

/// Map `score` from `[min, max]` onto `[0.0, 1.0]`, clamping outliers.
pub fn normalize_score(score: f64, min: f64, max: f64) -> f64 {
    if max <= min || score.is_nan() {
        return 0.0;
    }
    ((score - min) / (max - min)).clamp(0.0, 1.0)
}

/// Exponential moving average step: `alpha * observation + (1 - alpha) * previous`.
pub fn ema(previous: f64, observation: f64, alpha: f64) -> f64 {
    alpha * observation + (1.0 - alpha) * previous
}
