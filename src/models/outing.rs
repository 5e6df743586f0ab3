use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::timestamp::Timestamp;

/// An outing row as storage holds it. Timestamps stay raw text until the
/// tracker normalizes them.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct OutingRecord {
    pub id: i64,
    pub student_id: String,
    pub reason: String,
    pub time_out: String,
    pub time_in: Option<String>,
}

impl OutingRecord {
    pub fn is_open(&self) -> bool {
        self.time_in.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outing {
    pub id: i64,
    pub student_id: String,
    pub reason: String,
    pub time_out: Timestamp,
    pub time_in: Option<Timestamp>,
    /// Formatted elapsed time; absent while the outing is open.
    pub duration: Option<String>,
}

impl Outing {
    pub fn is_open(&self) -> bool {
        self.time_in.is_none()
    }
}

/// Result of closing an outing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutingReturn {
    pub time_in: Timestamp,
    pub duration: String,
    pub outing: Outing,
}
