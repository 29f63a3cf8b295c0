//! Map-backed card store, handy for tests and throwaway sessions.
use super::{CardStore, Result, StatRecord, StatisticsReport, StoreError};
use crate::models::{Card, CardId, CardMemoryState, DeckId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    cards: BTreeMap<CardId, Card>,
    stats: Vec<StatRecord>,
    next_id: CardId,
}

#[derive(Default)]
pub struct InMemoryCardStore {
    inner: Mutex<Inner>,
}

impl InMemoryCardStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".to_string()))
    }

    /// Adds a card due at `created_at` and returns its id.
    pub fn add_card(
        &self,
        deck_id: DeckId,
        question: &str,
        answer: &str,
        variants: &[&str],
        correct_variant: Option<u8>,
        created_at: DateTime<Utc>,
    ) -> Result<CardId> {
        let mut inner = self.lock()?;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.cards.insert(
            id,
            Card {
                id,
                deck_id,
                question: question.to_string(),
                answer: answer.to_string(),
                variants: variants.iter().map(|v| v.to_string()).collect(),
                correct_variant,
                memory: CardMemoryState::new(id, created_at),
            },
        );
        Ok(id)
    }

    pub fn remove_card(&self, card_id: CardId) -> Result<Option<Card>> {
        Ok(self.lock()?.cards.remove(&card_id))
    }

    pub fn card(&self, card_id: CardId) -> Result<Option<Card>> {
        Ok(self.lock()?.cards.get(&card_id).cloned())
    }

    pub fn records(&self) -> Result<Vec<StatRecord>> {
        Ok(self.lock()?.stats.clone())
    }
}

#[async_trait]
impl CardStore for InMemoryCardStore {
    async fn fetch_due_cards(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<Vec<Card>> {
        let inner = self.lock()?;
        // BTreeMap iterates by id, and sort_by_key is stable, so ties stay id-ordered.
        let mut due: Vec<Card> = inner
            .cards
            .values()
            .filter(|card| card.deck_id == deck_id && card.memory.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|card| card.memory.next_review);
        Ok(due)
    }

    async fn fetch_card(&self, card_id: CardId) -> Result<Option<Card>> {
        self.card(card_id)
    }

    async fn persist_schedule(&self, state: &CardMemoryState) -> Result<()> {
        let mut inner = self.lock()?;
        let card = inner
            .cards
            .get_mut(&state.card_id)
            .ok_or(StoreError::MissingCard(state.card_id))?;
        card.memory = *state;
        Ok(())
    }

    async fn record_outcome(&self, record: &StatRecord) -> Result<()> {
        self.lock()?.stats.push(record.clone());
        Ok(())
    }

    async fn statistics(&self, user_id: UserId, since: DateTime<Utc>) -> Result<StatisticsReport> {
        let inner = self.lock()?;
        let mut report = StatisticsReport::default();
        for record in inner
            .stats
            .iter()
            .filter(|r| r.user_id == user_id && r.recorded_at >= since)
        {
            report.add(record.outcome, 1);
        }
        Ok(report)
    }
}
