//! Card is a question with either a free-text answer or up to four variants.
use super::{CardId, CardMemoryState, DeckId};
use serde::{Deserialize, Serialize};

/// Upper bound on answer variants a card may carry.
pub const MAX_VARIANTS: usize = 4;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub deck_id: DeckId,
    pub question: String,
    pub answer: String,
    /// Empty for plain cards.
    pub variants: Vec<String>,
    /// 1-based index into `variants`.
    pub correct_variant: Option<u8>,
    pub memory: CardMemoryState,
}

impl Card {
    pub fn has_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    /// Whether `selected` (1-based) is this card's correct variant.
    pub fn is_correct_variant(&self, selected: u8) -> bool {
        self.correct_variant == Some(selected)
    }

    pub fn correct_variant_text(&self) -> Option<&str> {
        let index = usize::from(self.correct_variant?).checked_sub(1)?;
        self.variants.get(index).map(String::as_str)
    }
}
