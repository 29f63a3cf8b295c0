//! Review session state machine.
//!
//! A session walks a snapshot of due card ids taken when it starts. Answers
//! never re-order or re-filter the snapshot, even when they push a card's
//! next review far into the future.

use super::{CardId, DeckId, Outcome, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    NotStarted,
    InSession,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("cannot start a session without due cards")]
    EmptySnapshot,
    #[error("operation not allowed while session is {0:?}")]
    InvalidState(SessionPhase),
}

/// Identifies one specific question of one specific session run.
///
/// A transition carrying a token that no longer matches is stale: the
/// session already moved on and the transition must be dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Freshness {
    pub session_id: Uuid,
    pub cursor: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub total: usize,
    pub easy_count: usize,
    pub medium_count: usize,
    pub hard_count: usize,
    pub skipped_count: usize,
    pub timed_out_count: usize,
}

impl SessionSummary {
    fn from_tally(total: usize, tally: &BTreeMap<Outcome, usize>) -> Self {
        let count = |outcome: Outcome| tally.get(&outcome).copied().unwrap_or(0);
        Self {
            total,
            easy_count: count(Outcome::Easy),
            medium_count: count(Outcome::Medium),
            hard_count: count(Outcome::Hard),
            skipped_count: count(Outcome::Skipped),
            timed_out_count: count(Outcome::TimedOut),
        }
    }

    pub fn answered(&self) -> usize {
        self.easy_count
            + self.medium_count
            + self.hard_count
            + self.skipped_count
            + self.timed_out_count
    }
}

/// Result of recording one answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    Next(CardId),
    Completed(SessionSummary),
}

#[derive(Clone, Debug)]
pub struct SessionState {
    pub user_id: UserId,
    pub deck_id: DeckId,
    id: Uuid,
    phase: SessionPhase,
    snapshot: Vec<CardId>,
    cursor: usize,
    tally: BTreeMap<Outcome, usize>,
}

impl SessionState {
    pub fn new(user_id: UserId, deck_id: DeckId) -> Self {
        Self {
            user_id,
            deck_id,
            id: Uuid::new_v4(),
            phase: SessionPhase::NotStarted,
            snapshot: Vec::new(),
            cursor: 0,
            tally: BTreeMap::new(),
        }
    }

    /// Fixes the snapshot and moves to the first card.
    pub fn start(&mut self, snapshot: Vec<CardId>) -> Result<CardId, SessionError> {
        if self.phase != SessionPhase::NotStarted {
            return Err(SessionError::InvalidState(self.phase));
        }
        let Some(&first) = snapshot.first() else {
            return Err(SessionError::EmptySnapshot);
        };

        self.id = Uuid::new_v4();
        self.snapshot = snapshot;
        self.cursor = 0;
        self.tally.clear();
        self.phase = SessionPhase::InSession;
        Ok(first)
    }

    pub fn current(&self) -> Result<CardId, SessionError> {
        if self.phase != SessionPhase::InSession {
            return Err(SessionError::InvalidState(self.phase));
        }
        Ok(self.snapshot[self.cursor])
    }

    /// Records `outcome` for the current card and advances the cursor.
    pub fn submit_answer(&mut self, outcome: Outcome) -> Result<Progress, SessionError> {
        if self.phase != SessionPhase::InSession {
            return Err(SessionError::InvalidState(self.phase));
        }

        *self.tally.entry(outcome).or_insert(0) += 1;
        self.cursor += 1;

        if self.cursor == self.snapshot.len() {
            self.phase = SessionPhase::Completed;
            return Ok(Progress::Completed(self.summary()));
        }
        Ok(Progress::Next(self.snapshot[self.cursor]))
    }

    /// Abandons the session from any phase, discarding the tally.
    pub fn cancel(&mut self) {
        self.phase = SessionPhase::NotStarted;
        self.snapshot.clear();
        self.cursor = 0;
        self.tally.clear();
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == SessionPhase::InSession
    }

    /// Token for the question currently on screen; `None` outside a session.
    pub fn freshness(&self) -> Option<Freshness> {
        self.is_active().then_some(Freshness {
            session_id: self.id,
            cursor: self.cursor,
        })
    }

    pub fn is_fresh(&self, token: Freshness) -> bool {
        self.freshness() == Some(token)
    }

    /// 1-based position of the current card.
    pub fn position(&self) -> usize {
        self.cursor + 1
    }

    pub fn total(&self) -> usize {
        self.snapshot.len()
    }

    pub fn snapshot(&self) -> &[CardId] {
        &self.snapshot
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::from_tally(self.snapshot.len(), &self.tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(cards: &[CardId]) -> SessionState {
        let mut session = SessionState::new(42, 1);
        session.start(cards.to_vec()).unwrap();
        session
    }

    #[test]
    fn test_start_requires_cards() {
        let mut session = SessionState::new(42, 1);
        assert_eq!(session.start(Vec::new()), Err(SessionError::EmptySnapshot));
        assert_eq!(session.phase(), SessionPhase::NotStarted);
        assert_eq!(
            session.current(),
            Err(SessionError::InvalidState(SessionPhase::NotStarted))
        );
    }

    #[test]
    fn test_cannot_start_twice() {
        let mut session = started(&[1]);
        assert_eq!(
            session.start(vec![2]),
            Err(SessionError::InvalidState(SessionPhase::InSession))
        );
    }

    #[test]
    fn test_walks_snapshot_in_order() {
        let mut session = started(&[10, 20, 30]);
        assert_eq!(session.current(), Ok(10));
        assert_eq!(session.position(), 1);

        assert_eq!(session.submit_answer(Outcome::Easy), Ok(Progress::Next(20)));
        assert_eq!(session.submit_answer(Outcome::Hard), Ok(Progress::Next(30)));
        assert_eq!(session.position(), 3);

        let Ok(Progress::Completed(summary)) = session.submit_answer(Outcome::TimedOut) else {
            panic!("session should complete after the last card");
        };
        assert_eq!(summary.total, 3);
        assert_eq!(summary.easy_count, 1);
        assert_eq!(summary.hard_count, 1);
        assert_eq!(summary.timed_out_count, 1);
        assert_eq!(summary.answered(), 3);
        assert_eq!(session.phase(), SessionPhase::Completed);
    }

    #[test]
    fn test_completed_session_rejects_answers() {
        let mut session = started(&[5]);
        session.submit_answer(Outcome::Skipped).unwrap();

        assert_eq!(
            session.submit_answer(Outcome::Easy),
            Err(SessionError::InvalidState(SessionPhase::Completed))
        );
        assert_eq!(session.summary().answered(), 1);
    }

    #[test]
    fn test_n_answers_complete_n_cards() {
        let cards: Vec<CardId> = (1..=7).collect();
        let mut session = started(&cards);
        let mut completed = None;
        for (i, outcome) in Outcome::ALL.into_iter().cycle().take(7).enumerate() {
            match session.submit_answer(outcome).unwrap() {
                Progress::Next(_) => assert!(i < 6),
                Progress::Completed(summary) => completed = Some(summary),
            }
        }
        let summary = completed.unwrap();
        assert_eq!(summary.total, 7);
        assert_eq!(summary.answered(), 7);
    }

    #[test]
    fn test_cancel_discards_tally() {
        let mut session = started(&[1, 2]);
        session.submit_answer(Outcome::Medium).unwrap();
        session.cancel();

        assert_eq!(session.phase(), SessionPhase::NotStarted);
        assert_eq!(session.summary(), SessionSummary::default());
        assert!(session.freshness().is_none());
    }

    #[test]
    fn test_freshness_changes_every_answer_and_every_run() {
        let mut session = started(&[1, 2]);
        let first = session.freshness().unwrap();
        session.submit_answer(Outcome::Easy).unwrap();
        assert!(!session.is_fresh(first));

        session.cancel();
        session.start(vec![1, 2]).unwrap();
        let restarted = session.freshness().unwrap();
        assert_eq!(restarted.cursor, first.cursor);
        assert_ne!(restarted.session_id, first.session_id);
        assert!(!session.is_fresh(first));
    }
}
