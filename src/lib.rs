pub mod clock;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod logging;
pub mod models;
pub mod review;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ReviewConfig;
pub use database::{CardStore, InMemoryCardStore, SqliteCardStore, StoreError};
pub use error::ReviewError;
pub use models::{Card, CardMemoryState, NextCardView, Outcome, Quality, SessionState, SessionSummary};
pub use review::{AnswerOutcome, Rating, ReviewOrchestrator, ReviewStep};
