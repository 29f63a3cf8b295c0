//! Payloads handed back to the chat layer, plus plain-text rendering of them.
use super::{Card, CardId, MAX_VARIANTS, SessionSummary};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextCardView {
    pub card_id: CardId,
    pub question: String,
    pub variants: Vec<String>,
    /// 1-based.
    pub position: usize,
    pub total: usize,
}

impl NextCardView {
    pub fn new(card: &Card, position: usize, total: usize) -> Self {
        Self {
            card_id: card.id,
            question: card.question.clone(),
            variants: card.variants.iter().take(MAX_VARIANTS).cloned().collect(),
            position,
            total,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerView {
    pub card_id: CardId,
    pub question: String,
    pub answer: String,
}

/// Button shown under a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Control {
    ShowAnswer,
    RateEasy,
    RateMedium,
    RateHard,
    Variant(u8),
    Skip,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub controls: Vec<Control>,
    /// The card the controls answer, echoed back with the user's choice.
    pub card_id: Option<CardId>,
}

impl Notification {
    pub fn question(view: &NextCardView) -> Self {
        let mut text = format!(
            "Question {}/{}\n\n{}",
            view.position, view.total, view.question
        );
        let mut controls = Vec::new();

        if view.variants.is_empty() {
            controls.push(Control::ShowAnswer);
        } else {
            text.push_str("\n\n");
            for (n, variant) in (1u8..).zip(&view.variants) {
                text.push_str(&format!("{n}. {variant}\n"));
                controls.push(Control::Variant(n));
            }
        }
        controls.push(Control::Skip);

        Self {
            text,
            controls,
            card_id: Some(view.card_id),
        }
    }

    /// A question whose card disappeared mid-session; only skipping is offered.
    pub fn unavailable(card_id: CardId, position: usize, total: usize) -> Self {
        Self {
            text: format!("Question {position}/{total}\n\nThis card is no longer available."),
            controls: vec![Control::Skip],
            card_id: Some(card_id),
        }
    }

    pub fn answer(view: &AnswerView) -> Self {
        Self {
            text: format!("{}\n\nAnswer: {}", view.question, view.answer),
            controls: vec![
                Control::RateEasy,
                Control::RateMedium,
                Control::RateHard,
                Control::Skip,
            ],
            card_id: Some(view.card_id),
        }
    }

    pub fn summary(summary: &SessionSummary) -> Self {
        Self {
            text: format!(
                "Session complete!\n\nCards: {}\nEasy: {}\nMedium: {}\nHard: {}\nSkipped: {}\nTimed out: {}",
                summary.total,
                summary.easy_count,
                summary.medium_count,
                summary.hard_count,
                summary.skipped_count,
                summary.timed_out_count
            ),
            controls: Vec::new(),
            card_id: None,
        }
    }

    /// Prefixes the text with a note that the previous question ran out of time.
    pub fn after_timeout(mut self) -> Self {
        self.text = format!("Time is up!\n\n{}", self.text);
        self
    }
}
