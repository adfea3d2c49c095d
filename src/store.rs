//! The task store: sole owner of the task list.
//!
//! Every change goes through [`Store::add`], [`Store::toggle_complete`] or
//! [`Store::delete`]. A change writes the full list back to storage and then
//! notifies subscribers. Operations that change nothing (blank text, unknown
//! id) neither write nor notify.
//!
//! Filtering and counting are free functions over a slice so views can
//! derive what they need from a snapshot without caching anything.

use std::collections::HashSet;

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::db::{decode_tasks, encode_tasks, Storage, TASKS_KEY};
use crate::fields::{Counts, Filter};
use crate::task::{new_id, Task};

/// Callback run after each change with the current list.
pub type Observer = Box<dyn FnMut(&[Task])>;

/// Handle returned by [`Store::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

pub struct Store<S: Storage> {
    tasks: Vec<Task>,
    storage: S,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl<S: Storage> Store<S> {
    /// Load the task list from storage.
    ///
    /// Missing data gives an empty list. Unreadable or malformed data also
    /// gives an empty list; the bad value is moved aside when the storage
    /// supports it so it is not overwritten by the next change.
    pub fn initialize(mut storage: S) -> Self {
        let mut tasks = match storage.get(TASKS_KEY) {
            Ok(None) => Vec::new(),
            Ok(Some(raw)) => match decode_tasks(&raw) {
                Ok(tasks) => tasks,
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "stored tasks are malformed, starting empty");
                    keep_unreadable(&mut storage);
                    Vec::new()
                }
            },
            Err(err) => {
                warn!(error = %format!("{err:#}"), "could not read stored tasks, starting empty");
                keep_unreadable(&mut storage);
                Vec::new()
            }
        };

        let reassigned = reassign_duplicate_ids(&mut tasks);
        info!(count = tasks.len(), "task store initialised");

        let mut store = Store {
            tasks,
            storage,
            observers: Vec::new(),
            next_subscription: 0,
        };

        // Write the fresh ids back so the next process sees the same ones.
        if reassigned > 0 {
            warn!(reassigned, "duplicate task ids found in stored data");
            if let Err(err) = store.persist() {
                warn!(error = %format!("{err:#}"), "could not store reassigned ids");
            }
        }
        store
    }

    /// Current list in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Append a new open task. Blank text is ignored and returns `Ok(None)`.
    pub fn add(&mut self, text: &str) -> anyhow::Result<Option<&Task>> {
        let Some(mut task) = Task::new(text) else {
            debug!("ignoring blank task text");
            return Ok(None);
        };
        while self.get(&task.id).is_some() {
            task.id = new_id();
        }
        debug!(id = %task.id, "adding task");
        self.tasks.push(task);
        self.commit()?;
        Ok(self.tasks.last())
    }

    /// Flip the completion flag of the task with `id`.
    ///
    /// Returns `Ok(false)` when no such task exists.
    pub fn toggle_complete(&mut self, id: &str) -> anyhow::Result<bool> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "toggle of unknown task ignored");
            return Ok(false);
        };
        task.completed = !task.completed;
        debug!(id, completed = task.completed, "toggled task");
        self.commit()?;
        Ok(true)
    }

    /// Remove the task with `id`, keeping the order of the rest.
    ///
    /// Returns `Ok(false)` when no such task exists.
    pub fn delete(&mut self, id: &str) -> anyhow::Result<bool> {
        let Some(idx) = self.tasks.iter().position(|t| t.id == id) else {
            debug!(id, "delete of unknown task ignored");
            return Ok(false);
        };
        self.tasks.remove(idx);
        debug!(id, "deleted task");
        self.commit()?;
        Ok(true)
    }

    /// Register a callback run after every change.
    pub fn subscribe(&mut self, observer: Observer) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, observer));
        id
    }

    /// Drop a callback. Returns false if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    /// Resolve a user-supplied identifier to a task.
    ///
    /// Accepts, in order: a full id, a 1-based position in the list, or a
    /// unique id prefix. An ambiguous prefix is an error; no match is `None`.
    pub fn resolve(&self, ident: &str) -> anyhow::Result<Option<&Task>> {
        let ident = ident.trim();
        if ident.is_empty() {
            return Ok(None);
        }
        if let Some(task) = self.get(ident) {
            return Ok(Some(task));
        }
        if let Ok(pos) = ident.parse::<usize>() {
            if pos >= 1 && pos <= self.tasks.len() {
                return Ok(self.tasks.get(pos - 1));
            }
        }

        let matches: Vec<&Task> = self.tasks.iter().filter(|t| t.id.starts_with(ident)).collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0])),
            n => Err(anyhow!(
                "'{}' matches {} tasks; use a longer id prefix",
                ident,
                n
            )),
        }
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        let result = self.persist();
        if let Err(err) = &result {
            warn!(error = %format!("{err:#}"), "failed to persist tasks");
        }
        for (_, observer) in self.observers.iter_mut() {
            observer(&self.tasks);
        }
        result
    }

    /// Write the full list, replacing the previous snapshot.
    fn persist(&mut self) -> anyhow::Result<()> {
        let raw = encode_tasks(&self.tasks)?;
        self.storage.set(TASKS_KEY, &raw)
    }
}

/// Tasks matching `filter`, in list order.
pub fn apply_filter(tasks: &[Task], filter: Filter) -> Vec<&Task> {
    tasks.iter().filter(|t| filter.matches(t)).collect()
}

pub fn compute_counts(tasks: &[Task]) -> Counts {
    let completed = tasks.iter().filter(|t| t.completed).count();
    Counts {
        total: tasks.len(),
        active: tasks.len() - completed,
        completed,
    }
}

fn keep_unreadable<S: Storage>(storage: &mut S) {
    match storage.preserve_unreadable(TASKS_KEY) {
        Ok(Some(kept)) => warn!(kept = %kept.display(), "unreadable data kept"),
        Ok(None) => {}
        Err(err) => warn!(error = %format!("{err:#}"), "could not keep unreadable data"),
    }
}

/// Give every repeated id after its first occurrence a fresh one.
fn reassign_duplicate_ids(tasks: &mut [Task]) -> usize {
    let mut seen: HashSet<String> = HashSet::new();
    let mut reassigned = 0;
    for task in tasks.iter_mut() {
        if !seen.insert(task.id.clone()) {
            let mut id = new_id();
            while seen.contains(&id) {
                id = new_id();
            }
            task.id = id.clone();
            seen.insert(id);
            reassigned += 1;
        }
    }
    reassigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FailingStorage, FileStorage, MemoryStorage};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn empty_store() -> Store<MemoryStorage> {
        Store::initialize(MemoryStorage::new())
    }

    fn stored(store: &Store<MemoryStorage>) -> Vec<Task> {
        let raw = store.storage().get(TASKS_KEY).unwrap().unwrap();
        decode_tasks(&raw).unwrap()
    }

    fn add(store: &mut Store<MemoryStorage>, text: &str) -> String {
        store.add(text).unwrap().unwrap().id.clone()
    }

    #[test]
    fn test_initialize_without_data_is_empty() {
        let store = empty_store();
        assert!(store.is_empty());
    }

    #[test]
    fn test_initialize_with_malformed_data_is_empty() {
        let store = Store::initialize(MemoryStorage::with_value(TASKS_KEY, "{not json"));
        assert!(store.is_empty());
        let store = Store::initialize(MemoryStorage::with_value(TASKS_KEY, r#"[{"id":1}]"#));
        assert!(store.is_empty());
    }

    #[test]
    fn test_initialize_hydrates_in_order() {
        let raw = r#"[
            {"id":"1","text":"first","completed":false},
            {"id":"2","text":"second","completed":true}
        ]"#;
        let store = Store::initialize(MemoryStorage::with_value(TASKS_KEY, raw));
        let texts: Vec<&str> = store.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
        assert!(store.tasks()[1].completed);
    }

    #[test]
    fn test_initialize_reassigns_duplicate_ids() {
        let raw = r#"[
            {"id":"1700000000000","text":"a","completed":false},
            {"id":"1700000000000","text":"b","completed":false}
        ]"#;
        let store = Store::initialize(MemoryStorage::with_value(TASKS_KEY, raw));
        assert_eq!(store.len(), 2);
        assert_eq!(store.tasks()[0].id, "1700000000000");
        assert_ne!(store.tasks()[1].id, "1700000000000");
        assert_eq!(store.tasks()[1].text, "b");
        assert_eq!(stored(&store), store.tasks().to_vec());
    }

    #[test]
    fn test_reassigned_ids_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let raw = r#"[
            {"id":"17","text":"a","completed":false},
            {"id":"17","text":"b","completed":false}
        ]"#;
        std::fs::write(dir.path().join("todos.json"), raw).unwrap();

        let first = Store::initialize(FileStorage::open(dir.path()).unwrap());
        let mut second = Store::initialize(FileStorage::open(dir.path()).unwrap());
        assert_eq!(first.tasks(), second.tasks());

        let shown = first.tasks()[1].id.clone();
        assert!(second.toggle_complete(&shown).unwrap());
    }

    #[test]
    fn test_add_blank_is_noop() {
        let mut store = empty_store();
        add(&mut store, "keep");
        let before = store.tasks().to_vec();

        assert!(store.add("").unwrap().is_none());
        assert!(store.add("   ").unwrap().is_none());
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn test_add_blank_does_not_write() {
        let mut store = empty_store();
        store.add("  ").unwrap();
        assert_eq!(store.storage().get(TASKS_KEY).unwrap(), None);
    }

    #[test]
    fn test_add_trims_and_starts_open() {
        let mut store = empty_store();
        let task = store.add(" Buy milk ").unwrap().unwrap().clone();
        assert_eq!(task.text, "Buy milk");
        assert!(!task.completed);
        assert_eq!(stored(&store), vec![task]);
    }

    #[test]
    fn test_toggle_twice_restores_flag() {
        let mut store = empty_store();
        let id = add(&mut store, "a");
        assert!(store.toggle_complete(&id).unwrap());
        assert!(store.get(&id).unwrap().completed);
        assert!(store.toggle_complete(&id).unwrap());
        assert!(!store.get(&id).unwrap().completed);
    }

    #[test]
    fn test_toggle_leaves_others_alone() {
        let mut store = empty_store();
        let a = add(&mut store, "a");
        add(&mut store, "b");
        let before = store.tasks()[1].clone();
        store.toggle_complete(&a).unwrap();
        assert_eq!(store.tasks()[1], before);
        assert_eq!(store.tasks()[0].text, "a");
    }

    #[test]
    fn test_toggle_unknown_is_noop() {
        let mut store = empty_store();
        add(&mut store, "a");
        let before = store.tasks().to_vec();
        assert!(!store.toggle_complete("missing").unwrap());
        assert_eq!(store.tasks(), before.as_slice());
    }

    #[test]
    fn test_delete_removes_exactly_one_and_keeps_order() {
        let mut store = empty_store();
        let a = add(&mut store, "a");
        let b = add(&mut store, "b");
        let c = add(&mut store, "c");

        assert!(store.delete(&b).unwrap());
        let ids: Vec<&str> = store.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, [a.as_str(), c.as_str()]);
        assert_eq!(stored(&store), store.tasks().to_vec());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let mut store = empty_store();
        add(&mut store, "a");
        assert!(!store.delete("missing").unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_ids_stay_unique_through_mixed_operations() {
        let mut store = empty_store();
        let mut ids = Vec::new();
        for i in 0..50 {
            ids.push(add(&mut store, &format!("task {i}")));
            if i % 3 == 0 {
                store.toggle_complete(&ids[i / 2]).unwrap();
            }
            if i % 7 == 0 {
                let victim = ids[i / 3].clone();
                store.delete(&victim).unwrap();
            }
        }
        let unique: HashSet<&str> = store.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(unique.len(), store.len());
    }

    #[test]
    fn test_every_change_is_persisted() {
        let mut store = empty_store();
        let id = add(&mut store, "a");
        assert_eq!(stored(&store), store.tasks().to_vec());
        store.toggle_complete(&id).unwrap();
        assert!(stored(&store)[0].completed);
        store.delete(&id).unwrap();
        assert!(stored(&store).is_empty());
    }

    #[test]
    fn test_observers_see_changes_but_not_noops() {
        let mut store = empty_store();
        let seen: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let sub = store.subscribe(Box::new(move |tasks: &[Task]| sink.borrow_mut().push(tasks.len())));

        let id = add(&mut store, "a");
        store.add(" ").unwrap();
        store.toggle_complete(&id).unwrap();
        store.toggle_complete("missing").unwrap();
        add(&mut store, "b");
        assert_eq!(*seen.borrow(), vec![1, 1, 2]);

        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.delete(&id).unwrap();
        assert_eq!(seen.borrow().len(), 3);
    }

    #[test]
    fn test_apply_filter_partitions_list() {
        let mut store = empty_store();
        let a = add(&mut store, "a");
        add(&mut store, "b");
        let c = add(&mut store, "c");
        store.toggle_complete(&a).unwrap();
        store.toggle_complete(&c).unwrap();

        let tasks = store.tasks();
        let active = apply_filter(tasks, Filter::Active);
        let completed = apply_filter(tasks, Filter::Completed);
        assert!(active.iter().all(|t| !t.completed));
        assert!(completed.iter().all(|t| t.completed));
        assert_eq!(active.len() + completed.len(), tasks.len());

        let mut recombined: Vec<&str> = active
            .iter()
            .chain(completed.iter())
            .map(|t| t.id.as_str())
            .collect();
        let mut all: Vec<&str> = apply_filter(tasks, Filter::All)
            .iter()
            .map(|t| t.id.as_str())
            .collect();
        recombined.sort_unstable();
        all.sort_unstable();
        assert_eq!(recombined, all);

        let completed_texts: Vec<&str> = completed.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(completed_texts, ["a", "c"]);
    }

    #[test]
    fn test_compute_counts() {
        let mut store = empty_store();
        assert_eq!(compute_counts(store.tasks()), Counts::default());
        let a = add(&mut store, "a");
        add(&mut store, "b");
        store.toggle_complete(&a).unwrap();
        assert_eq!(
            compute_counts(store.tasks()),
            Counts { total: 2, active: 1, completed: 1 }
        );
    }

    #[test]
    fn test_scenario_filters_after_toggle() {
        let mut store = empty_store();
        let a = add(&mut store, "Task A");
        add(&mut store, "Task B");
        store.toggle_complete(&a).unwrap();

        let texts = |filter| -> Vec<String> {
            apply_filter(store.tasks(), filter)
                .iter()
                .map(|t| t.text.clone())
                .collect()
        };
        assert_eq!(texts(Filter::Active), ["Task B"]);
        assert_eq!(texts(Filter::Completed), ["Task A"]);
        assert_eq!(texts(Filter::All), ["Task A", "Task B"]);
        assert!(apply_filter(store.tasks(), Filter::Completed)[0].completed);
    }

    #[test]
    fn test_scenario_delete_then_reload_stays_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::initialize(FileStorage::open(dir.path()).unwrap());
        let id = store.add("X").unwrap().unwrap().id.clone();
        store.delete(&id).unwrap();
        assert!(store.is_empty());

        let reloaded = Store::initialize(FileStorage::open(dir.path()).unwrap());
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_reload_restores_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::initialize(FileStorage::open(dir.path()).unwrap());
        let a = store.add("a").unwrap().unwrap().id.clone();
        store.add("b").unwrap();
        store.toggle_complete(&a).unwrap();

        let reloaded = Store::initialize(FileStorage::open(dir.path()).unwrap());
        assert_eq!(reloaded.tasks(), store.tasks());
    }

    #[test]
    fn test_malformed_file_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("todos.json"), "[{oops").unwrap();

        let mut store = Store::initialize(FileStorage::open(dir.path()).unwrap());
        assert!(store.is_empty());
        store.add("fresh").unwrap();

        let kept: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("todos.json.corrupt-"))
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(std::fs::read_to_string(kept[0].path()).unwrap(), "[{oops");
    }

    #[test]
    fn test_unreadable_file_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        let bytes: &[u8] = b"[{\"id\":\"1\",\"text\":\"caf\xe9\",\"completed\":false}]";
        std::fs::write(dir.path().join("todos.json"), bytes).unwrap();

        let mut store = Store::initialize(FileStorage::open(dir.path()).unwrap());
        assert!(store.is_empty());
        store.add("fresh").unwrap();

        let kept: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("todos.json.corrupt-"))
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(std::fs::read(kept[0].path()).unwrap(), bytes);
    }

    #[test]
    fn test_failed_write_keeps_change_and_notifies() {
        let mut store = Store::initialize(FailingStorage);
        let calls = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&calls);
        store.subscribe(Box::new(move |_: &[Task]| *sink.borrow_mut() += 1));

        let err = store.add("a").unwrap_err();
        assert!(format!("{err:#}").contains("disk full"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.tasks()[0].text, "a");
        assert_eq!(*calls.borrow(), 1);

        let id = store.tasks()[0].id.clone();
        assert!(store.toggle_complete(&id).is_err());
        assert!(store.get(&id).unwrap().completed);
        assert!(store.delete(&id).is_err());
        assert!(store.is_empty());
        assert_eq!(*calls.borrow(), 3);
    }

    #[test]
    fn test_resolve() {
        let raw = r#"[
            {"id":"abc123","text":"a","completed":false},
            {"id":"abd456","text":"b","completed":false},
            {"id":"xyz789","text":"c","completed":false}
        ]"#;
        let store = Store::initialize(MemoryStorage::with_value(TASKS_KEY, raw));

        assert_eq!(store.resolve("abd456").unwrap().unwrap().text, "b");
        assert_eq!(store.resolve("3").unwrap().unwrap().text, "c");
        assert_eq!(store.resolve("xy").unwrap().unwrap().text, "c");
        assert_eq!(store.resolve("abc").unwrap().unwrap().text, "a");
        assert!(store.resolve("ab").is_err());
        assert!(store.resolve("nope").unwrap().is_none());
        assert!(store.resolve("9").unwrap().is_none());
        assert!(store.resolve("  ").unwrap().is_none());
    }
}
