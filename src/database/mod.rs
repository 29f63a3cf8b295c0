//! Card store: everything the review engine needs from persistence.
//!
//! The engine only talks to [`CardStore`], so scheduling behaves the same over
//! SQLite ([`db::SqliteCardStore`]) or a plain map ([`memory::InMemoryCardStore`]).

pub mod db;
pub mod memory;

use crate::models::{Card, CardId, CardMemoryState, DeckId, Outcome, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use db::SqliteCardStore;
pub use memory::InMemoryCardStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("card {0} does not exist")]
    MissingCard(CardId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// One statistics row: how a user answered a card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub user_id: UserId,
    pub deck_id: DeckId,
    pub card_id: CardId,
    pub outcome: Outcome,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregated outcomes for one user over a period.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsReport {
    pub total: usize,
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
    pub skipped: usize,
    pub timed_out: usize,
}

impl StatisticsReport {
    pub fn add(&mut self, outcome: Outcome, count: usize) {
        self.total += count;
        match outcome {
            Outcome::Easy => self.easy += count,
            Outcome::Medium => self.medium += count,
            Outcome::Hard => self.hard += count,
            Outcome::Skipped => self.skipped += count,
            Outcome::TimedOut => self.timed_out += count,
        }
    }

    /// Cards that will come back soon because recall was shaky.
    pub fn need_review(&self) -> usize {
        self.medium + self.hard
    }

    /// Share of easy answers, in percent. `None` when nothing was answered.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total > 0).then(|| self.easy as f64 / self.total as f64 * 100.0)
    }
}

#[async_trait]
pub trait CardStore: Send + Sync {
    /// Cards of `deck_id` with `next_review <= now`, oldest first, ties by card id.
    async fn fetch_due_cards(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<Vec<Card>>;

    async fn fetch_card(&self, card_id: CardId) -> Result<Option<Card>>;

    async fn persist_schedule(&self, state: &CardMemoryState) -> Result<()>;

    async fn record_outcome(&self, record: &StatRecord) -> Result<()>;

    /// Outcomes recorded for `user_id` at or after `since`.
    async fn statistics(&self, user_id: UserId, since: DateTime<Utc>) -> Result<StatisticsReport>;
}
