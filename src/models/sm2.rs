//! SM-2 (SuperMemo 2) spaced repetition algorithm implementation.
//!
//! The SM-2 algorithm calculates review intervals based on recall quality:
//! - Quality grades 0-2: reset interval and repetitions (card needs relearning)
//! - Quality grades 3-5: grow the interval (1 day → 6 days → previous interval × EF)
//! - EF only moves on a successful recall and never falls below 1.3
//!
//! The multiplied interval is truncated, not rounded, so stored schedules stay
//! reproducible across implementations.

use super::{CardMemoryState, MIN_EASE_FACTOR, Quality};
use chrono::{DateTime, Duration, Utc};

/// Returns the memory state that follows a review graded `quality` at `now`.
pub fn apply(state: CardMemoryState, quality: Quality, now: DateTime<Utc>) -> CardMemoryState {
    let mut next = state;

    if quality.is_recalled() {
        next.interval_days = match state.repetitions {
            0 => 1,
            1 => 6,
            // Uses the ease factor carried into this review.
            _ => (f64::from(state.interval_days) * state.ease_factor).floor() as u32,
        };
        next.repetitions = state.repetitions + 1;

        let miss = f64::from(Quality::MAX - quality.score());
        let delta = 0.1 - miss * (0.08 + miss * 0.02);
        next.ease_factor = (state.ease_factor + delta).max(MIN_EASE_FACTOR);
    } else {
        next.repetitions = 0;
        next.interval_days = 0;
    }

    next.next_review = now + Duration::days(i64::from(next.interval_days));
    next
}
