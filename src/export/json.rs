//! JSON import/export of deck fixtures.
//! A fixture is a deck name plus its cards' content; review state is not part of it.

use crate::database::db;
use crate::models::{DeckId, MAX_VARIANTS};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::info;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardFixture {
    pub question: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_variant: Option<u8>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeckFixture {
    pub name: String,
    pub cards: Vec<CardFixture>,
}

#[derive(Debug, thiserror::Error)]
pub enum FixtureError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("card '{question}': {reason}")]
    InvalidCard { question: String, reason: String },
}

impl CardFixture {
    fn validate(&self) -> Result<(), FixtureError> {
        let invalid = |reason: &str| FixtureError::InvalidCard {
            question: self.question.clone(),
            reason: reason.to_string(),
        };

        if self.variants.len() > MAX_VARIANTS {
            return Err(invalid("more than 4 variants"));
        }
        match (self.variants.is_empty(), self.correct_variant) {
            (true, None) => Ok(()),
            (true, Some(_)) => Err(invalid("correct_variant set without variants")),
            (false, None) => Err(invalid("variants given without correct_variant")),
            (false, Some(n)) if n == 0 || usize::from(n) > self.variants.len() => {
                Err(invalid("correct_variant out of range"))
            }
            (false, Some(_)) => Ok(()),
        }
    }
}

/// Exports a deck fixture to a JSON file at the specified path.
pub fn export_json_to_path(deck: &DeckFixture, path: impl AsRef<Path>) -> Result<(), FixtureError> {
    let json_string = serde_json::to_string_pretty(deck)?;
    let mut file = File::create(path)?;
    file.write_all(json_string.as_bytes())?;
    Ok(())
}

/// Imports a deck fixture from a JSON file.
/// Returns an error if the file doesn't exist, contains invalid JSON, or a card is malformed.
pub fn import_json(path: impl AsRef<Path>) -> Result<DeckFixture, FixtureError> {
    let mut file = File::open(path.as_ref())?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;

    let deck: DeckFixture = serde_json::from_str(&contents)?;
    for card in &deck.cards {
        card.validate()?;
    }

    info!(deck = %deck.name, path = %path.as_ref().display(), cards = deck.cards.len(), "imported deck fixture");
    Ok(deck)
}

/// Writes the fixture's deck and cards; every card is due at `now`.
/// A deck that already exists is left as it is.
pub fn seed_database(deck: &DeckFixture, now: DateTime<Utc>, conn: &Connection) -> Result<DeckId, FixtureError> {
    if let Some(deck_id) = db::find_deck(&deck.name, conn)? {
        info!(deck = %deck.name, deck_id, "deck already present, fixture not seeded");
        return Ok(deck_id);
    }
    let deck_id = db::new_deck(&deck.name, conn)?;
    for card in &deck.cards {
        card.validate()?;
        db::add_card(
            deck_id,
            &card.question,
            &card.answer,
            &card.variants,
            card.correct_variant,
            now,
            conn,
        )?;
    }
    Ok(deck_id)
}

/// Built-in deck used when the database starts out empty.
pub fn sample_deck() -> DeckFixture {
    let plain = |question: &str, answer: &str| CardFixture {
        question: question.to_string(),
        answer: answer.to_string(),
        variants: Vec::new(),
        correct_variant: None,
    };

    DeckFixture {
        name: "Polish Vocabulary".to_string(),
        cards: vec![
            plain("cześć", "hello"),
            plain("dziękuję", "thank you"),
            CardFixture {
                question: "proszę".to_string(),
                answer: "please".to_string(),
                variants: vec![
                    "sorry".to_string(),
                    "please".to_string(),
                    "goodbye".to_string(),
                ],
                correct_variant: Some(2),
            },
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::SqliteCardStore;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_deck() -> DeckFixture {
        sample_deck()
    }

    #[test]
    fn test_export_json_to_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.json");

        let result = export_json_to_path(&create_test_deck(), &path);
        assert!(result.is_ok());
        assert!(fs::metadata(&path).is_ok(), "File should exist");
    }

    #[test]
    fn test_import_json() {
        let json_content = r#"{
  "name": "Import Test Deck",
  "cards": [
    { "question": "test question", "answer": "test answer" },
    { "question": "pick", "answer": "b", "variants": ["a", "b"], "correct_variant": 2 }
  ]
}"#;
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("import.json");
        fs::write(&path, json_content).unwrap();

        let deck = import_json(&path).unwrap();
        assert_eq!(deck.name, "Import Test Deck");
        assert_eq!(deck.cards.len(), 2);
        assert!(deck.cards[0].variants.is_empty());
        assert_eq!(deck.cards[1].correct_variant, Some(2));
    }

    #[test]
    fn test_export_and_import_keep_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deck.json");
        let original = create_test_deck();

        export_json_to_path(&original, &path).unwrap();
        assert_eq!(import_json(&path).unwrap(), original);
    }

    #[test]
    fn test_import_nonexistent_file() {
        assert!(matches!(
            import_json("nonexistent_file_xyz123.json"),
            Err(FixtureError::Io(_))
        ));
    }

    #[test]
    fn test_import_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("invalid.json");
        fs::write(&path, "{ this is not valid json }").unwrap();

        assert!(matches!(import_json(&path), Err(FixtureError::Json(_))));
    }

    #[test]
    fn test_import_rejects_bad_variants() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(
            &path,
            r#"{"name": "Bad", "cards": [{"question": "q", "answer": "a", "variants": ["x"], "correct_variant": 3}]}"#,
        )
        .unwrap();

        assert!(matches!(
            import_json(&path),
            Err(FixtureError::InvalidCard { .. })
        ));
    }

    #[test]
    fn test_seed_database() {
        let store = SqliteCardStore::open_in_memory().unwrap();
        let conn = store.conn().unwrap();
        let now = Utc::now();

        let deck_id = seed_database(&create_test_deck(), now, &conn).unwrap();
        let due = db::get_cards_due_for_review(deck_id, now, &conn).unwrap();
        assert_eq!(due.len(), 3);
        assert_eq!(due[2].correct_variant_text(), Some("please"));
    }

    #[test]
    fn test_seed_database_twice_adds_nothing() {
        let store = SqliteCardStore::open_in_memory().unwrap();
        let conn = store.conn().unwrap();
        let now = Utc::now();

        let first = seed_database(&create_test_deck(), now, &conn).unwrap();
        let second = seed_database(&create_test_deck(), now, &conn).unwrap();
        assert_eq!(first, second);
        assert_eq!(db::get_cards_due_for_review(first, now, &conn).unwrap().len(), 3);
    }
}
