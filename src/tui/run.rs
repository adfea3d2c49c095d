//! TUI entry point and terminal setup.

use std::io::{self, Stdout, Write};
use std::path::Path;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::CrosstermBackend, Terminal};
use tracing::{info, warn};

use crate::db::FileStorage;
use crate::store::Store;
use crate::tui::app::App;

/// Initialise and run the terminal user interface over the task file in `data_dir`.
pub fn run_tui(data_dir: &Path) -> io::Result<()> {
    let storage = FileStorage::open(data_dir).map_err(io::Error::other)?;
    let store = Store::initialize(storage);
    let mut app = App::new(store);

    enable_raw_mode()?;
    let mut terminal = match enter_terminal() {
        Ok(terminal) => terminal,
        Err(err) => {
            if let Err(restore_err) = restore_terminal(&mut io::stdout()) {
                warn!(error = %restore_err, "could not restore terminal");
            }
            return Err(err);
        }
    };

    info!("ui started");
    let result = app.run(&mut terminal);

    restore_terminal(terminal.backend_mut())?;
    terminal.show_cursor()?;
    info!("ui stopped");

    result
}

fn enter_terminal() -> io::Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Terminal::new(CrosstermBackend::new(stdout))
}

/// Leave raw mode and the alternate screen. Both steps are attempted even if
/// the first fails; the first error is returned.
fn restore_terminal<W: Write>(out: &mut W) -> io::Result<()> {
    let raw = disable_raw_mode();
    let screen = execute!(out, LeaveAlternateScreen);
    raw.and(screen)
}
