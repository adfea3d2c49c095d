//! Command implementations for the CLI interface.
//!
//! Each handler works on an already-initialised [`Store`], so the same code
//! runs against file storage in the binary and memory storage in tests.

use std::path::Path;

use anyhow::anyhow;
use clap::Subcommand;
use clap_complete::{generate, Shell};

use crate::db::{create_backup, FileStorage, Storage, TASKS_KEY};
use crate::fields::{Counts, Filter};
use crate::store::{apply_filter, compute_counts, Store};
use crate::task::Task;
use crate::tui::run::run_tui;

#[derive(Subcommand)]
pub enum Commands {
    /// Launch the interactive UI (default).
    Ui,

    /// Add a new task.
    Add {
        /// Task text. Multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// List tasks.
    List {
        /// Which tasks to show: all | active | completed.
        #[arg(long, short, value_enum, default_value_t = Filter::All)]
        filter: Filter,
    },

    /// Toggle a task between open and done.
    Toggle {
        /// Task id, unique id prefix, or position in the list.
        id: String,
    },

    /// Delete a task.
    Delete {
        /// Task id, unique id prefix, or position in the list.
        id: String,
    },

    /// Print task counts.
    Counts,

    /// Copy the task file into a timestamped backup.
    Backup,

    /// Generate shell completion scripts.
    Completions {
        /// Shell to generate completions for.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// What a toggle or delete did, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Changed(Task),
    NotFound,
}

/// Launch the terminal user interface.
pub fn cmd_ui(data_dir: &Path) -> anyhow::Result<()> {
    run_tui(data_dir).map_err(|e| anyhow!("UI error: {e}"))
}

/// Add a task. Blank text is reported and otherwise ignored.
pub fn cmd_add<S: Storage>(store: &mut Store<S>, text: &[String]) -> anyhow::Result<Option<Task>> {
    let joined = text.join(" ");
    let added = store.add(&joined)?.cloned();
    match &added {
        Some(task) => println!("Added {} {}", task.short_id(), task.text),
        None => println!("Nothing added: task text is empty."),
    }
    Ok(added)
}

/// Print the filtered list followed by the counts line.
pub fn cmd_list<S: Storage>(store: &Store<S>, filter: Filter) {
    print!("{}", render_list(store.tasks(), filter));
    println!("{}", format_counts(&compute_counts(store.tasks())));
}

/// Flip completion on the task named by `ident`.
pub fn cmd_toggle<S: Storage>(store: &mut Store<S>, ident: &str) -> anyhow::Result<Outcome> {
    let Some(id) = store.resolve(ident)?.map(|t| t.id.clone()) else {
        println!("No task matches '{}'.", ident);
        return Ok(Outcome::NotFound);
    };
    store.toggle_complete(&id)?;
    let Some(task) = store.get(&id).cloned() else {
        return Ok(Outcome::NotFound);
    };
    if task.completed {
        println!("Marked done: {}", task.text);
    } else {
        println!("Reopened: {}", task.text);
    }
    Ok(Outcome::Changed(task))
}

/// Delete the task named by `ident`.
pub fn cmd_delete<S: Storage>(store: &mut Store<S>, ident: &str) -> anyhow::Result<Outcome> {
    let Some(task) = store.resolve(ident)?.cloned() else {
        println!("No task matches '{}'.", ident);
        return Ok(Outcome::NotFound);
    };
    store.delete(&task.id)?;
    println!("Deleted: {}", task.text);
    Ok(Outcome::Changed(task))
}

/// Print the counts line.
pub fn cmd_counts<S: Storage>(store: &Store<S>) {
    println!("{}", format_counts(&compute_counts(store.tasks())));
}

/// Create a timestamped backup of the task file.
pub fn cmd_backup(storage: &FileStorage) -> anyhow::Result<()> {
    let backup_path = create_backup(&storage.path_for(TASKS_KEY))?;
    println!("Backup created: {}", backup_path.display());
    Ok(())
}

/// Generate shell completion scripts.
pub fn cmd_completions(shell: Shell) {
    use clap::CommandFactory;
    use crate::cli::Cli;

    let mut app = Cli::command();
    let app_name = app.get_name().to_string();
    generate(shell, &mut app, app_name, &mut std::io::stdout());
}

/// `All (n)  Active (n)  Completed (n)`
pub fn format_counts(counts: &Counts) -> String {
    Filter::SELECTORS
        .iter()
        .map(|f| format!("{} ({})", f.label(), f.count(counts)))
        .collect::<Vec<_>>()
        .join("  ")
}

/// Table of the filtered tasks, or the filter's empty-state message.
///
/// The `#` column is the position in the full list, which `toggle` and
/// `delete` accept.
pub fn render_list(tasks: &[Task], filter: Filter) -> String {
    let visible = apply_filter(tasks, filter);
    if visible.is_empty() {
        return format!("{}\n", filter.empty_message());
    }

    let mut out = format!("{:<4} {:<8} {:<4} {}\n", "#", "ID", "Done", "Text");
    for task in visible {
        let position = tasks
            .iter()
            .position(|t| t.id == task.id)
            .map(|i| i + 1)
            .unwrap_or(0);
        let mark = if task.completed { "[x]" } else { "[ ]" };
        out.push_str(&format!(
            "{:<4} {:<8} {:<4} {}\n",
            position,
            task.short_id(),
            mark,
            task.text
        ));
    }
    out
}
