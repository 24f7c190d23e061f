use serde::{Deserialize, Serialize};

use super::UserId;

/// Timestamp format stored alongside every phrase
pub const CREATED_AT_FORMAT: &str = "%d.%m.%Y %H:%M";

/// A stored submission. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Phrase {
    pub id: i64,
    pub submitter_id: UserId,
    pub display_name: String,
    pub text: String,
    pub created_at: String,
}

/// One row of the grouped submitter ranking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopSubmitter {
    pub submitter_id: UserId,
    pub display_name: String,
    pub count: u64,
}

impl TopSubmitter {
    pub fn new(submitter_id: UserId, display_name: impl Into<String>, count: u64) -> Self {
        Self {
            submitter_id,
            display_name: display_name.into(),
            count,
        }
    }
}

/// Text is acceptable when something other than whitespace remains
pub fn is_valid_phrase(text: &str) -> bool {
    !text.trim().is_empty()
}
