//! SQLite-backed card store
//!
//! Handles database initialization, the deck/card rows needed to seed a
//! database, SM-2 review data, and per-user answer statistics.

use super::{CardStore, Result, StatRecord, StatisticsReport, StoreError};
use crate::models::{Card, CardId, CardMemoryState, DeckId, Outcome, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Creates the tables the store needs if they are missing.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS decks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS cards (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            deck_id INTEGER NOT NULL,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            variants TEXT NOT NULL DEFAULT '[]',
            correct_variant INTEGER,
            FOREIGN KEY (deck_id) REFERENCES decks(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS review_data (
            card_id INTEGER PRIMARY KEY,
            easiness_factor REAL NOT NULL DEFAULT 2.5,
            interval_days INTEGER NOT NULL DEFAULT 0,
            repetitions INTEGER NOT NULL DEFAULT 0,
            next_review_date INTEGER NOT NULL,
            FOREIGN KEY (card_id) REFERENCES cards(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_review_data_next ON review_data(next_review_date);

        CREATE TABLE IF NOT EXISTS statistics (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            deck_id INTEGER NOT NULL,
            card_id INTEGER NOT NULL,
            outcome TEXT NOT NULL,
            recorded_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_statistics_user ON statistics(user_id, recorded_at);",
    )
}

/// Creates a deck and returns its id. An existing deck with the same name is reused.
pub fn new_deck(name: &str, conn: &Connection) -> rusqlite::Result<DeckId> {
    conn.execute(
        "INSERT OR IGNORE INTO decks (name) VALUES (?1)",
        params![name],
    )?;
    conn.query_row(
        "SELECT id FROM decks WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
}

pub fn find_deck(name: &str, conn: &Connection) -> rusqlite::Result<Option<DeckId>> {
    conn.query_row(
        "SELECT id FROM decks WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
}

/// Retrieves all decks as (id, name) pairs
pub fn get_all_decks(conn: &Connection) -> rusqlite::Result<Vec<(DeckId, String)>> {
    let mut stmt = conn.prepare("SELECT id, name FROM decks ORDER BY id")?;
    let decks = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(decks)
}

/// Adds a card to a deck and initializes its SM-2 review data.
///
/// The card is due right away (`next_review_date = created_at`).
pub fn add_card(
    deck_id: DeckId,
    question: &str,
    answer: &str,
    variants: &[String],
    correct_variant: Option<u8>,
    created_at: DateTime<Utc>,
    conn: &Connection,
) -> rusqlite::Result<CardId> {
    let variants = serde_json::to_string(variants)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    conn.execute(
        "INSERT INTO cards (deck_id, question, answer, variants, correct_variant)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![deck_id, question, answer, variants, correct_variant],
    )?;
    let card_id = conn.last_insert_rowid();

    let state = CardMemoryState::new(card_id, created_at);
    conn.execute(
        "INSERT INTO review_data (card_id, easiness_factor, interval_days, repetitions, next_review_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            card_id,
            state.ease_factor,
            state.interval_days,
            state.repetitions,
            state.next_review.timestamp()
        ],
    )?;

    Ok(card_id)
}

const CARD_COLUMNS: &str = "c.id, c.deck_id, c.question, c.answer, c.variants, c.correct_variant,
     r.easiness_factor, r.interval_days, r.repetitions, r.next_review_date";

fn card_from_row(row: &Row<'_>) -> rusqlite::Result<Card> {
    let id: CardId = row.get(0)?;
    let variants: String = row.get(4)?;
    let variants: Vec<String> = serde_json::from_str(&variants)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;
    let next_review: i64 = row.get(9)?;
    let next_review = DateTime::from_timestamp(next_review, 0)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(9, next_review))?;

    Ok(Card {
        id,
        deck_id: row.get(1)?,
        question: row.get(2)?,
        answer: row.get(3)?,
        variants,
        correct_variant: row.get(5)?,
        memory: CardMemoryState {
            card_id: id,
            ease_factor: row.get(6)?,
            interval_days: row.get(7)?,
            repetitions: row.get(8)?,
            next_review,
        },
    })
}

/// Retrieves cards due for review in a deck
///
/// Returns cards where next_review_date <= now, ordered by
/// next_review_date (oldest first) and then by card id.
pub fn get_cards_due_for_review(
    deck_id: DeckId,
    now: DateTime<Utc>,
    conn: &Connection,
) -> rusqlite::Result<Vec<Card>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CARD_COLUMNS}
         FROM cards c
         JOIN review_data r ON c.id = r.card_id
         WHERE c.deck_id = ?1 AND r.next_review_date <= ?2
         ORDER BY r.next_review_date ASC, c.id ASC"
    ))?;

    let cards = stmt
        .query_map(params![deck_id, now.timestamp()], card_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cards)
}

pub fn get_card(card_id: CardId, conn: &Connection) -> rusqlite::Result<Option<Card>> {
    conn.query_row(
        &format!(
            "SELECT {CARD_COLUMNS}
             FROM cards c
             JOIN review_data r ON c.id = r.card_id
             WHERE c.id = ?1"
        ),
        params![card_id],
        card_from_row,
    )
    .optional()
}

/// Updates SM-2 review data for a card. Returns false if the card has no review row.
pub fn update_review_data(state: &CardMemoryState, conn: &Connection) -> rusqlite::Result<bool> {
    let updated = conn.execute(
        "UPDATE review_data
         SET easiness_factor = ?1, interval_days = ?2, repetitions = ?3, next_review_date = ?4
         WHERE card_id = ?5",
        params![
            state.ease_factor,
            state.interval_days,
            state.repetitions,
            state.next_review.timestamp(),
            state.card_id
        ],
    )?;
    Ok(updated > 0)
}

pub fn add_statistics(record: &StatRecord, conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO statistics (user_id, deck_id, card_id, outcome, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            record.user_id,
            record.deck_id,
            record.card_id,
            record.outcome.label(),
            record.recorded_at.timestamp()
        ],
    )?;
    Ok(())
}

pub fn get_user_statistics(
    user_id: UserId,
    since: DateTime<Utc>,
    conn: &Connection,
) -> rusqlite::Result<StatisticsReport> {
    let mut stmt = conn.prepare(
        "SELECT outcome, COUNT(*) FROM statistics
         WHERE user_id = ?1 AND recorded_at >= ?2
         GROUP BY outcome",
    )?;
    let rows = stmt
        .query_map(params![user_id, since.timestamp()], |row| {
            let label: String = row.get(0)?;
            let outcome = label
                .parse::<Outcome>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
            Ok((outcome, row.get::<_, i64>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut report = StatisticsReport::default();
    for (outcome, count) in rows {
        report.add(outcome, usize::try_from(count).unwrap_or(0));
    }
    Ok(report)
}

/// [`CardStore`] over a single SQLite connection.
///
/// Timestamps are stored as whole unix seconds.
pub struct SqliteCardStore {
    conn: Mutex<Connection>,
}

impl SqliteCardStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened card database");
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Locks the connection for direct use of the free functions in this module.
    pub fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl CardStore for SqliteCardStore {
    async fn fetch_due_cards(&self, deck_id: DeckId, now: DateTime<Utc>) -> Result<Vec<Card>> {
        Ok(get_cards_due_for_review(deck_id, now, &*self.conn()?)?)
    }

    async fn fetch_card(&self, card_id: CardId) -> Result<Option<Card>> {
        Ok(get_card(card_id, &*self.conn()?)?)
    }

    async fn persist_schedule(&self, state: &CardMemoryState) -> Result<()> {
        if !update_review_data(state, &*self.conn()?)? {
            return Err(StoreError::MissingCard(state.card_id));
        }
        Ok(())
    }

    async fn record_outcome(&self, record: &StatRecord) -> Result<()> {
        Ok(add_statistics(record, &*self.conn()?)?)
    }

    async fn statistics(&self, user_id: UserId, since: DateTime<Utc>) -> Result<StatisticsReport> {
        Ok(get_user_statistics(user_id, since, &*self.conn()?)?)
    }
}
