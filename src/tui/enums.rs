//! Enumerations for TUI state management.

/// Which screen or overlay has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    TaskList,
    Input,
    Help,
    Confirm,
}
