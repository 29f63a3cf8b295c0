//! Per-card memory strength tracked by the SM-2 scheduler.
use super::CardId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ease factor every new card starts with.
pub const DEFAULT_EASE_FACTOR: f64 = 2.5;

/// Lowest ease factor the scheduler will ever produce.
pub const MIN_EASE_FACTOR: f64 = 1.3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardMemoryState {
    pub card_id: CardId,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub repetitions: u32,
    pub next_review: DateTime<Utc>,
}

impl CardMemoryState {
    /// State of a card that has never been reviewed; it is due at `created_at`.
    pub fn new(card_id: CardId, created_at: DateTime<Utc>) -> Self {
        Self {
            card_id,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: 0,
            repetitions: 0,
            next_review: created_at,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review <= now
    }
}
