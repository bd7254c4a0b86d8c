//! # Status Presentation
//!
//! Maps table statuses to a label and a color tone. Presentation layers pick
//! concrete colors; this module only fixes which tone a status gets.
//!
//! ```text
//! free              → "Free"              green
//! occupied          → "Occupied"          red
//! awaiting_payment  → "Awaiting Payment"  yellow
//! cleaning          → "Cleaning"          blue
//! <anything else>   → <raw value>         gray
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::TableStatus;

/// Color family for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StatusTone {
    Green,
    Red,
    Yellow,
    Blue,
    Gray,
}

/// Label plus tone for one status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusBadge {
    pub label: String,
    pub tone: StatusTone,
}

/// Badge for a known table status.
pub fn badge(status: TableStatus) -> StatusBadge {
    let (label, tone) = match status {
        TableStatus::Free => ("Free", StatusTone::Green),
        TableStatus::Occupied => ("Occupied", StatusTone::Red),
        TableStatus::AwaitingPayment => ("Awaiting Payment", StatusTone::Yellow),
        TableStatus::Cleaning => ("Cleaning", StatusTone::Blue),
    };

    StatusBadge {
        label: label.to_string(),
        tone,
    }
}

/// Badge for a raw status string; unknown values pass through as their own
/// label with a gray tone.
pub fn badge_for_raw(raw: &str) -> StatusBadge {
    match raw.parse::<TableStatus>() {
        Ok(status) => badge(status),
        Err(_) => StatusBadge {
            label: raw.to_string(),
            tone: StatusTone::Gray,
        },
    }
}
