use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ANSWER_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_DB_PATH: &str = "db.sqlite3";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("answer timeout must be greater than zero")]
    InvalidTimeout,
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewConfig {
    /// Deadline for answering a single question; the same for every card.
    pub answer_timeout: Duration,
    pub database_path: PathBuf,
    pub log_level: String,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            answer_timeout: Duration::from_secs(DEFAULT_ANSWER_TIMEOUT_SECS),
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            log_level: "info".to_string(),
        }
    }
}

impl ReviewConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let answer_timeout = match lookup("REVIEW_ANSWER_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "REVIEW_ANSWER_TIMEOUT_SECS",
                        value: value.clone(),
                    })?;
                Duration::from_secs(secs)
            }
            None => defaults.answer_timeout,
        };

        let database_path = lookup("REVIEW_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.database_path);

        let log_level = lookup("RUST_LOG").unwrap_or(defaults.log_level);

        Self {
            answer_timeout,
            database_path,
            log_level,
        }
        .validated()
    }

    pub fn with_answer_timeout(mut self, timeout: Duration) -> Result<Self, ConfigError> {
        self.answer_timeout = timeout;
        self.validated()
    }

    fn validated(self) -> Result<Self, ConfigError> {
        if self.answer_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(self)
    }
}
