#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Timestamp layout stored in the `mistakes.timestamp` column
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Mistake {
    pub id: i64,
    pub topic: String,
    pub question: String,
    pub timestamp: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMistake {
    pub topic: String,
    pub question: String,
}

/// A topic together with how many quiz answers on it were wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WeakTopic {
    pub topic: String,
    pub mistake_count: i64,
}

impl std::fmt::Display for WeakTopic {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let noun = if self.mistake_count == 1 {
            "mistake"
        } else {
            "mistakes"
        };
        write!(f, "{} ({} {})", self.topic, self.mistake_count, noun)
    }
}
