pub mod card;
pub mod memory_state;
pub mod outcome;
pub mod review_session;
pub mod sm2;
pub mod view;

pub type UserId = i64;
pub type DeckId = i64;
pub type CardId = i64;

pub use card::{Card, MAX_VARIANTS};
pub use memory_state::{CardMemoryState, DEFAULT_EASE_FACTOR, MIN_EASE_FACTOR};
pub use outcome::{InvalidQuality, Outcome, Quality, UnknownOutcome};
pub use review_session::{Freshness, Progress, SessionError, SessionPhase, SessionState, SessionSummary};
pub use view::{AnswerView, Control, NextCardView, Notification};
