//! Persisted storage for the task list.
//!
//! Storage is a small key-value abstraction: each key holds one serialised
//! value and every write replaces the whole value. The task list lives
//! under a single fixed key, [`TASKS_KEY`]. `FileStorage` keeps one JSON
//! file per key in a data directory; `MemoryStorage` keeps values in a map.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use chrono::Local;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::task::Task;

/// Key under which the full task list is stored.
pub const TASKS_KEY: &str = "todos";

/// Durable key-value slot store.
pub trait Storage {
    /// Read the value stored under `key`, or `None` if nothing was ever written.
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Replace the value stored under `key`.
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;

    /// Move an unreadable value out of the way so the next `set` does not
    /// destroy it. Returns where it was kept, if anywhere.
    fn preserve_unreadable(&mut self, _key: &str) -> anyhow::Result<Option<PathBuf>> {
        Ok(None)
    }
}

/// One `<key>.json` file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open storage rooted at `dir`, creating the directory if needed.
    pub fn open(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        debug!(dir = %dir.display(), "opened file storage");
        Ok(FileStorage {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Some(value))
    }

    /// Atomic write via temp file + rename in the same directory.
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        debug!(file = %path.display(), bytes = value.len(), "writing value");

        let mut temp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    fn preserve_unreadable(&mut self, key: &str) -> anyhow::Result<Option<PathBuf>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S%.3f");
        let mut kept = self.dir.join(format!("{key}.json.corrupt-{timestamp}"));
        let mut n = 1;
        while kept.exists() {
            kept = self.dir.join(format!("{key}.json.corrupt-{timestamp}-{n}"));
            n += 1;
        }
        fs::rename(&path, &kept)
            .with_context(|| format!("failed to move {} aside", path.display()))?;
        info!(from = %path.display(), to = %kept.display(), "preserved unreadable data");
        Ok(Some(kept))
    }
}

/// In-process storage. Values vanish with the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    values: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a raw value, as if an earlier session wrote it.
    pub fn with_value(key: &str, value: &str) -> Self {
        let mut values = HashMap::new();
        values.insert(key.to_string(), value.to_string());
        MemoryStorage { values }
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Storage whose writes always fail, as on a full or read-only disk.
#[cfg(test)]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct FailingStorage;

#[cfg(test)]
impl Storage for FailingStorage {
    fn get(&self, _key: &str) -> anyhow::Result<Option<String>> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> anyhow::Result<()> {
        Err(anyhow!("disk full"))
    }
}

/// Serialise the full task list.
pub fn encode_tasks(tasks: &[Task]) -> anyhow::Result<String> {
    serde_json::to_string_pretty(tasks).context("failed to encode tasks")
}

/// Parse a stored task list.
pub fn decode_tasks(raw: &str) -> anyhow::Result<Vec<Task>> {
    serde_json::from_str(raw).context("failed to decode tasks")
}

/// Copy a storage file into a `backup/` directory next to it, prefixed with
/// the current local time. Returns the backup path.
pub fn create_backup(path: &Path) -> anyhow::Result<PathBuf> {
    if !path.exists() {
        return Err(anyhow!("{} does not exist", path.display()));
    }

    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let backup_dir = parent_dir.join("backup");
    fs::create_dir_all(&backup_dir)
        .with_context(|| format!("failed to create {}", backup_dir.display()))?;

    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("todos.json");
    let backup_path = backup_dir.join(format!("{timestamp}_{file_name}"));

    fs::copy(path, &backup_path)
        .with_context(|| format!("failed to copy to {}", backup_path.display()))?;
    info!(backup = %backup_path.display(), "backup created");
    Ok(backup_path)
}
