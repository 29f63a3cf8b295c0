//! Review session orchestration.
//!
//! Glues the session state machine, the SM-2 scheduler, the card store and
//! the answer timer together. Every transition for a user runs while holding
//! that user's [`SessionSlot`], and is checked against a freshness token
//! before it touches the session, so a timer firing and an answer racing for
//! the same question tally exactly one outcome.

use super::{MessageRef, Notifier, SessionSlot, SessionStore, TimeoutSupervisor};
use super::sessions::ActiveSession;
use crate::clock::Clock;
use crate::config::ReviewConfig;
use crate::database::{CardStore, StatRecord, StatisticsReport, StoreError};
use crate::error::{ReviewError, Result};
use crate::models::{
    AnswerView, Card, CardId, DeckId, Freshness, NextCardView, Notification, Outcome, Progress,
    SessionState, SessionSummary, UserId, sm2,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// A user's verdict on the card in front of them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rating {
    Easy,
    Medium,
    Hard,
    /// 1-based variant picked on a variants card.
    Variant(u8),
}

/// What the chat layer should show after a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReviewStep {
    Next(NextCardView),
    /// The session moved on to a card that could not be loaded. It can
    /// still be skipped, and its deadline runs like any other.
    Unavailable {
        card_id: CardId,
        position: usize,
        total: usize,
    },
    Finished(SessionSummary),
}

impl ReviewStep {
    pub fn notification(&self) -> Notification {
        match self {
            ReviewStep::Next(view) => Notification::question(view),
            ReviewStep::Unavailable {
                card_id,
                position,
                total,
            } => Notification::unavailable(*card_id, *position, *total),
            ReviewStep::Finished(summary) => Notification::summary(summary),
        }
    }

    /// The card the user is expected to answer next.
    pub fn card_id(&self) -> Option<CardId> {
        match self {
            ReviewStep::Next(view) => Some(view.card_id),
            ReviewStep::Unavailable { card_id, .. } => Some(*card_id),
            ReviewStep::Finished(_) => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub card_id: CardId,
    pub outcome: Outcome,
    /// Set for variant picks: whether the pick was right.
    pub correct: Option<bool>,
    /// The expected answer, given back after a wrong variant pick.
    pub correct_answer: Option<String>,
    pub step: ReviewStep,
}

/// A completed transition plus the first store write that failed on the way.
///
/// The session has advanced either way; `store_error` only means the on-disk
/// schedule or statistics for that one card may be stale.
struct Transition {
    result: AnswerOutcome,
    store_error: Option<StoreError>,
}

/// Where a transition came from, and what it expects the session to look like.
#[derive(Clone, Copy, Debug)]
enum Event {
    Rated { card_id: CardId, rating: Rating },
    Skipped { card_id: CardId },
    TimedOut { token: Freshness },
}

impl Event {
    fn is_timeout(self) -> bool {
        matches!(self, Event::TimedOut { .. })
    }

    fn is_fresh(self, state: &SessionState) -> bool {
        match self {
            Event::Rated { card_id, .. } | Event::Skipped { card_id } => {
                state.current() == Ok(card_id)
            }
            Event::TimedOut { token } => state.is_fresh(token),
        }
    }
}

pub struct ReviewOrchestrator {
    store: Arc<dyn CardStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    sessions: SessionStore,
    timers: Arc<TimeoutSupervisor>,
    answer_timeout: Duration,
    this: Weak<Self>,
}

impl ReviewOrchestrator {
    pub fn new(
        store: Arc<dyn CardStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: &ReviewConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            store,
            notifier,
            clock,
            sessions: SessionStore::new(),
            timers: TimeoutSupervisor::new(),
            answer_timeout: config.answer_timeout,
            this: this.clone(),
        })
    }

    pub fn answer_timeout(&self) -> Duration {
        self.answer_timeout
    }

    /// Starts reviewing `deck_id`'s due cards and returns the first card.
    ///
    /// A session the user already had is replaced. Nothing changes when no
    /// card is due.
    pub async fn start_session(
        &self,
        user_id: UserId,
        deck_id: DeckId,
        target: MessageRef,
        now: DateTime<Utc>,
    ) -> Result<NextCardView> {
        let mut slot = self.sessions.lock(user_id).await;

        let cards = self.store.fetch_due_cards(deck_id, now).await?;
        let Some(first) = cards.first() else {
            info!(user_id, deck_id, "no cards due");
            return Err(ReviewError::NoCardsDue);
        };

        let mut state = SessionState::new(user_id, deck_id);
        state.start(cards.iter().map(|card| card.id).collect())?;
        let view = NextCardView::new(first, state.position(), state.total());

        if self.timers.cancel(user_id) || slot.load().is_some() {
            info!(user_id, "replacing running review session");
        }
        if let Some(token) = state.freshness() {
            self.arm_timer(user_id, token);
        }
        info!(user_id, deck_id, total = state.total(), "review session started");
        slot.save(ActiveSession { state, target });

        Ok(view)
    }

    /// Applies the user's rating to `card_id`, which must be the current card.
    pub async fn answer(&self, user_id: UserId, card_id: CardId, rating: Rating) -> Result<AnswerOutcome> {
        self.handle(user_id, Event::Rated { card_id, rating }).await
    }

    /// Moves past `card_id` without touching its schedule.
    pub async fn skip(&self, user_id: UserId, card_id: CardId) -> Result<AnswerOutcome> {
        self.handle(user_id, Event::Skipped { card_id }).await
    }

    /// Timer callback. Returns whether the timeout was applied; a stale
    /// token (the user answered first) is silently dropped.
    pub async fn on_timeout(&self, user_id: UserId, token: Freshness) -> bool {
        let mut slot = self.sessions.lock(user_id).await;
        let Some(target) = slot.load().map(|active| active.target) else {
            debug!(user_id, "timeout for a session that no longer exists");
            return false;
        };

        match self.transition(&mut slot, Event::TimedOut { token }).await {
            Ok(Transition { result, store_error }) => {
                if let Some(err) = store_error {
                    warn!(user_id, error = %err, "timeout applied but not fully persisted");
                }
                let note = result.step.notification().after_timeout();
                // Notification failures never undo or block the transition.
                if let Err(err) = self.notifier.notify(&target, note).await {
                    warn!(user_id, error = %err, "failed to notify about timeout");
                }
                true
            }
            Err(err) if err.is_ignorable() => {
                debug!(user_id, "stale timeout ignored");
                false
            }
            Err(err) => {
                warn!(user_id, error = %err, "timeout transition failed");
                false
            }
        }
    }

    /// Shows the answer of the current card. Leaves the session and timer as they are.
    pub async fn reveal(&self, user_id: UserId) -> Result<AnswerView> {
        let slot = self.sessions.lock(user_id).await;
        let card_id = match slot.load() {
            Some(active) => active.state.current()?,
            None => return Err(no_session()),
        };
        drop(slot);
        let card = self.load_card(card_id).await?;
        Ok(AnswerView {
            card_id,
            question: card.question,
            answer: card.answer,
        })
    }

    /// Abandons the user's session. Returns whether there was one.
    pub async fn cancel_session(&self, user_id: UserId) -> bool {
        let mut slot = self.sessions.lock(user_id).await;
        self.timers.cancel(user_id);

        match slot.clear() {
            Some(mut active) => {
                active.state.cancel();
                info!(user_id, deck_id = active.state.deck_id, "review session cancelled");
                true
            }
            None => false,
        }
    }

    /// The card the user is currently looking at, if a session is running.
    pub async fn current_card(&self, user_id: UserId) -> Option<CardId> {
        self.sessions
            .lock(user_id)
            .await
            .load()
            .and_then(|active| active.state.current().ok())
    }

    pub async fn is_in_session(&self, user_id: UserId) -> bool {
        self.sessions
            .lock(user_id)
            .await
            .load()
            .is_some_and(|active| active.state.is_active())
    }

    /// The user's answer statistics over the last `days` days.
    pub async fn statistics(&self, user_id: UserId, days: u32, now: DateTime<Utc>) -> Result<StatisticsReport> {
        let since = now - ChronoDuration::days(i64::from(days));
        Ok(self.store.statistics(user_id, since).await?)
    }

    /// Disarms every pending answer timer.
    pub fn shutdown(&self) {
        self.timers.shutdown();
    }

    async fn handle(&self, user_id: UserId, event: Event) -> Result<AnswerOutcome> {
        let mut slot = self.sessions.lock(user_id).await;
        let Transition { result, store_error } = self.transition(&mut slot, event).await?;
        match store_error {
            Some(err) => Err(err.into()),
            None => Ok(result),
        }
    }

    fn arm_timer(&self, user_id: UserId, token: Freshness) {
        let this = self.this.clone();
        self.timers.arm(user_id, self.answer_timeout, async move {
            if let Some(orchestrator) = this.upgrade() {
                orchestrator.on_timeout(user_id, token).await;
            }
        });
    }

    async fn load_card(&self, card_id: CardId) -> Result<Card> {
        self.store
            .fetch_card(card_id)
            .await?
            .ok_or(ReviewError::CardNotFound(card_id))
    }

    /// Runs one answer through the session. Caller holds the user's slot.
    async fn transition(&self, slot: &mut SessionSlot, event: Event) -> Result<Transition> {
        let user_id = slot.user_id();
        let Some(active) = slot.load_mut() else {
            return Err(no_session());
        };
        if !event.is_fresh(&active.state) {
            return Err(ReviewError::InvalidState(
                "answer does not match the current question".to_string(),
            ));
        }

        let deck_id = active.state.deck_id;
        let card_id = active.state.current()?;
        let token = active.state.freshness();

        // The counterpart of this event can no longer apply once we get here.
        self.timers.cancel(user_id);

        let card = match event {
            Event::Skipped { .. } => None,
            _ => match self.load_card(card_id).await {
                Ok(card) => Some(card),
                // Nothing is left to schedule, but the question still ran out of time.
                Err(ReviewError::CardNotFound(_)) if event.is_timeout() => {
                    warn!(user_id, card_id, "timed out on a card that no longer exists");
                    None
                }
                Err(err) => {
                    warn!(user_id, card_id, error = %err, "aborting transition");
                    if let Some(token) = token {
                        self.arm_timer(user_id, token);
                    }
                    return Err(err);
                }
            },
        };

        let (outcome, correct) = match (event, &card) {
            (Event::Rated { rating: Rating::Easy, .. }, _) => (Outcome::Easy, None),
            (Event::Rated { rating: Rating::Medium, .. }, _) => (Outcome::Medium, None),
            (Event::Rated { rating: Rating::Hard, .. }, _) => (Outcome::Hard, None),
            (Event::Rated { rating: Rating::Variant(pick), .. }, Some(card)) if card.has_variants() => {
                let correct = card.is_correct_variant(pick);
                let outcome = if correct { Outcome::Easy } else { Outcome::Hard };
                (outcome, Some(correct))
            }
            (Event::Rated { rating: Rating::Variant(_), .. }, _) => {
                if let Some(token) = token {
                    self.arm_timer(user_id, token);
                }
                return Err(ReviewError::InvalidState(format!(
                    "card {card_id} has no answer variants"
                )));
            }
            (Event::Skipped { .. }, _) => (Outcome::Skipped, None),
            (Event::TimedOut { .. }, _) => (Outcome::TimedOut, None),
        };

        let progress = active.state.submit_answer(outcome)?;
        let position = active.state.position();
        let total = active.state.total();
        let next_token = active.state.freshness();
        let now = self.clock.now();
        debug!(user_id, deck_id, card_id, %outcome, "answer recorded");

        // From here on the session has advanced; store failures are handed
        // back once the rest of the bookkeeping is done.
        let mut store_error = None;

        if let (true, Some(card)) = (outcome.updates_schedule(), &card) {
            let next = sm2::apply(card.memory, outcome.quality(), now);
            if let Err(err) = self.store.persist_schedule(&next).await {
                error!(user_id, card_id, error = %err, "failed to persist schedule");
                store_error.get_or_insert(err);
            }
        }

        let record = StatRecord {
            user_id,
            deck_id,
            card_id,
            outcome,
            recorded_at: now,
        };
        if let Err(err) = self.store.record_outcome(&record).await {
            error!(user_id, card_id, error = %err, "failed to record statistics");
            store_error.get_or_insert(err);
        }

        let step = match progress {
            Progress::Completed(summary) => {
                slot.clear();
                self.timers.cancel(user_id);
                info!(
                    user_id,
                    deck_id,
                    total = summary.total,
                    easy = summary.easy_count,
                    medium = summary.medium_count,
                    hard = summary.hard_count,
                    skipped = summary.skipped_count,
                    timed_out = summary.timed_out_count,
                    "review session completed"
                );
                ReviewStep::Finished(summary)
            }
            Progress::Next(next_id) => {
                if let Some(token) = next_token {
                    self.arm_timer(user_id, token);
                }
                // The answer is already committed, so a card that fails to
                // load only changes what is shown next.
                match self.store.fetch_card(next_id).await {
                    Ok(Some(next)) => ReviewStep::Next(NextCardView::new(&next, position, total)),
                    Ok(None) => {
                        warn!(user_id, card_id = next_id, "next card no longer exists");
                        ReviewStep::Unavailable {
                            card_id: next_id,
                            position,
                            total,
                        }
                    }
                    Err(err) => {
                        error!(user_id, card_id = next_id, error = %err, "failed to load next card");
                        store_error.get_or_insert(err);
                        ReviewStep::Unavailable {
                            card_id: next_id,
                            position,
                            total,
                        }
                    }
                }
            }
        };

        let correct_answer = match (correct, &card) {
            (Some(false), Some(card)) => Some(
                card.correct_variant_text()
                    .unwrap_or(card.answer.as_str())
                    .to_string(),
            ),
            _ => None,
        };
        Ok(Transition {
            result: AnswerOutcome {
                card_id,
                outcome,
                correct,
                correct_answer,
                step,
            },
            store_error,
        })
    }
}

impl Drop for ReviewOrchestrator {
    fn drop(&mut self) {
        self.timers.shutdown();
    }
}

fn no_session() -> ReviewError {
    ReviewError::InvalidState("no active review session".to_string())
}
