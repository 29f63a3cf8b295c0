//! Review sessions: per-user state, answer deadlines, and the orchestrator
//! that ties them to the card store.

pub mod notify;
pub mod orchestrator;
pub mod sessions;
pub mod timeout;

pub use notify::{ChatId, LogNotifier, MessageId, MessageRef, NotifyError, Notifier};
pub use orchestrator::{AnswerOutcome, Rating, ReviewOrchestrator, ReviewStep};
pub use sessions::{ActiveSession, SessionSlot, SessionStore};
pub use timeout::TimeoutSupervisor;
