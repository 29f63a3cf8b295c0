//! Closed set of review outcomes and the quality scores that drive SM-2.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Recall quality on the SM-2 scale, 0 (blackout) to 5 (perfect).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Quality(u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("quality score {0} is outside 0..=5")]
pub struct InvalidQuality(pub u8);

impl Quality {
    pub const MAX: u8 = 5;

    pub fn new(score: u8) -> Result<Self, InvalidQuality> {
        if score > Self::MAX {
            return Err(InvalidQuality(score));
        }
        Ok(Self(score))
    }

    pub fn score(self) -> u8 {
        self.0
    }

    /// Scores of 3 and above count as a successful recall.
    pub fn is_recalled(self) -> bool {
        self.0 >= 3
    }
}

impl TryFrom<u8> for Quality {
    type Error = InvalidQuality;

    fn try_from(score: u8) -> Result<Self, Self::Error> {
        Self::new(score)
    }
}

impl From<Quality> for u8 {
    fn from(quality: Quality) -> Self {
        quality.0
    }
}

/// How a single question in a review session ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Easy,
    Medium,
    Hard,
    Skipped,
    TimedOut,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::Easy,
        Outcome::Medium,
        Outcome::Hard,
        Outcome::Skipped,
        Outcome::TimedOut,
    ];

    pub fn quality(self) -> Quality {
        let score = match self {
            Outcome::Easy => 5,
            Outcome::Medium => 3,
            Outcome::Hard => 2,
            Outcome::Skipped | Outcome::TimedOut => 0,
        };
        Quality(score)
    }

    /// Skipped cards keep their schedule; every other outcome goes through SM-2.
    pub fn updates_schedule(self) -> bool {
        !matches!(self, Outcome::Skipped)
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Easy => "easy",
            Outcome::Medium => "medium",
            Outcome::Hard => "hard",
            Outcome::Skipped => "skipped",
            Outcome::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown outcome label '{0}'")]
pub struct UnknownOutcome(pub String);

impl FromStr for Outcome {
    type Err = UnknownOutcome;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Outcome::ALL
            .into_iter()
            .find(|outcome| outcome.label() == s)
            .ok_or_else(|| UnknownOutcome(s.to_string()))
    }
}
