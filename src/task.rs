//! Task record and id generation.
//!
//! A `Task` is one entry in the to-do list. Its id and text are fixed at
//! creation; only the completion flag changes afterwards.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single to-do entry.
///
/// Serialised as `{"id": ..., "text": ..., "completed": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Create a new open task from raw user input.
    ///
    /// Returns `None` when the input is empty after trimming.
    pub fn new(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Task {
            id: new_id(),
            text: text.to_string(),
            completed: false,
        })
    }

    /// First eight characters of the id, enough to tell tasks apart in a table.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(8) {
            Some((idx, _)) => &self.id[..idx],
            None => &self.id,
        }
    }
}

/// Generate a fresh task id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}
