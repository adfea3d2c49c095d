//! Filter selector and derived counts.

use clap::ValueEnum;

use crate::task::Task;

/// Which subset of tasks to show.
#[derive(Debug, Clone, Copy, Default, ValueEnum, PartialEq, Eq)]
pub enum Filter {
    #[default]
    All,
    Active,
    Completed,
}

impl Filter {
    /// All selectors in display order.
    pub const SELECTORS: [Filter; 3] = [Filter::All, Filter::Active, Filter::Completed];

    /// Whether a task belongs to this subset.
    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Active => !task.completed,
            Filter::Completed => task.completed,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Active => "Active",
            Filter::Completed => "Completed",
        }
    }

    /// Message shown when the filtered list is empty.
    pub fn empty_message(self) -> &'static str {
        match self {
            Filter::All => "No tasks yet. Add one above!",
            Filter::Active => "No active tasks.",
            Filter::Completed => "No completed tasks.",
        }
    }

    /// Next selector, wrapping around.
    pub fn next(self) -> Self {
        match self {
            Filter::All => Filter::Active,
            Filter::Active => Filter::Completed,
            Filter::Completed => Filter::All,
        }
    }

    /// Previous selector, wrapping around.
    pub fn prev(self) -> Self {
        match self {
            Filter::All => Filter::Completed,
            Filter::Active => Filter::All,
            Filter::Completed => Filter::Active,
        }
    }

    /// Count for this selector out of a set of counts.
    pub fn count(self, counts: &Counts) -> usize {
        match self {
            Filter::All => counts.total,
            Filter::Active => counts.active,
            Filter::Completed => counts.completed,
        }
    }
}

/// Derived task counts. Never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub total: usize,
    pub active: usize,
    pub completed: usize,
}
