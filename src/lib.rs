//! # todo - a small file-backed to-do list
//!
//! Add, complete, delete and filter short text tasks from the terminal,
//! either through an interactive TUI or through scriptable subcommands.
//!
//! ## Quick Start
//!
//! ```bash
//! # Launch the interactive UI
//! todo
//!
//! # Add a task via CLI
//! todo add Buy milk
//!
//! # Show what is left
//! todo list --filter active
//!
//! # Mark the second task done, then delete it
//! todo toggle 2
//! todo delete 2
//! ```
//!
//! ## Storage
//!
//! The whole list is kept as one JSON array in `~/.todo/todos.json`
//! (override with `--data-dir` or `TODO_DATA_DIR`). Every change rewrites
//! the file in full. A file that cannot be read or parsed is moved aside and the
//! list starts empty.
//!
//! ## Embedding
//!
//! [`store::Store`] is independent of any front end. It works over any
//! [`db::Storage`], notifies subscribers after each change, and exposes
//! [`store::apply_filter`] and [`store::compute_counts`] as pure functions.
//!
//! ```
//! use todo_list::db::MemoryStorage;
//! use todo_list::fields::Filter;
//! use todo_list::store::{apply_filter, Store};
//!
//! let mut store = Store::initialize(MemoryStorage::new());
//! let id = store.add(" Buy milk ").unwrap().unwrap().id.clone();
//! store.toggle_complete(&id).unwrap();
//! assert_eq!(apply_filter(store.tasks(), Filter::Completed)[0].text, "Buy milk");
//! ```

pub mod cli;
pub mod cmd;
pub mod db;
pub mod fields;
pub mod store;
pub mod task;
pub mod tui {
    pub mod app;
    pub mod colors;
    pub mod enums;
    pub mod input;
    pub mod run;
    pub mod utils;
}
