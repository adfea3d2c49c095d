//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::Filter;

// Each filter has its own accent so the active view is obvious at a glance.
// Native Color::Blue is used for All.

/// Used for Active
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for Completed
pub const DARK_GREEN: Color = Color::Rgb(0, 80, 0);
/// Confirmation dialogs
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);

/// Accent color for a filter selector.
pub fn filter_color(filter: Filter) -> Color {
    match filter {
        Filter::All => Color::Blue,
        Filter::Active => GOLD,
        Filter::Completed => DARK_GREEN,
    }
}

/// Readable foreground on top of `bg`.
pub fn text_on(bg: Color) -> Color {
    match bg {
        GOLD => Color::Rgb(20, 20, 20),
        _ => Color::White,
    }
}
