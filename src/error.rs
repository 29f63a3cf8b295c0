use crate::database::StoreError;
use crate::models::{CardId, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("no cards are due for review")]
    NoCardsDue,
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("card {0} could not be loaded")]
    CardNotFound(CardId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReviewError {
    /// Errors the user should see as a short alert.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, ReviewError::NoCardsDue | ReviewError::CardNotFound(_))
    }

    /// Stale or out-of-order events; drop them without telling the user.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, ReviewError::InvalidState(_))
    }
}

impl From<SessionError> for ReviewError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::EmptySnapshot => ReviewError::NoCardsDue,
            SessionError::InvalidState(_) => ReviewError::InvalidState(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReviewError>;
