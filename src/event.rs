// Event record: one immutable logged action

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Navigation between pages of the host application
pub const CATEGORY_NAV: &str = "NAV";
/// Execution of a network command
pub const CATEGORY_CMD: &str = "CMD";
/// Completion of a speed test
pub const CATEGORY_SPEEDTEST: &str = "SPEEDTEST";

/// Column names of the tabular rendering, in record field order.
pub const COLUMNS: [&str; 4] = ["id", "category", "detail", "timestamp"];

/// Timestamp layout used by every export format.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A stored action. Built only by the event store, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: u64,
    pub category: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl EventRecord {
    pub(crate) fn new(id: u64, category: String, detail: String, timestamp: DateTime<Utc>) -> Self {
        Self {
            id,
            category,
            detail,
            timestamp,
        }
    }

    /// Timestamp as written into exported files
    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Field values in `COLUMNS` order
    pub fn cells(&self) -> [String; 4] {
        [
            self.id.to_string(),
            self.category.clone(),
            self.detail.clone(),
            self.timestamp_text(),
        ]
    }
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] {} @ {}",
            self.id,
            self.category,
            self.detail,
            self.timestamp_text()
        )
    }
}
