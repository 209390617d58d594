//! Persisted extension state.
//!
//! The service reads and writes a small amount of durable state: the chosen
//! mode, the ignore rule list, the last committed result per tab and an
//! install identifier. [`JsonStore`] keeps all of it in one JSON document
//! that is rewritten atomically after every change.
//!
//! # Example
//!
//! ```
//! use phishscan::store::{JsonStore, Store};
//! use phishscan::model::Mode;
//!
//! let store = JsonStore::in_memory();
//! store.set_mode(Mode::Local).unwrap();
//! assert_eq!(store.mode().unwrap(), Some(Mode::Local));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::StoreError;
use crate::ignore::IgnoreRule;
use crate::model::{Mode, StoredDetection, TabId};

/// Durable state consumed by the coordinator.
pub trait Store: Send + Sync {
    fn mode(&self) -> Result<Option<Mode>, StoreError>;

    fn set_mode(&self, mode: Mode) -> Result<(), StoreError>;

    fn ignore_rules(&self) -> Result<Vec<IgnoreRule>, StoreError>;

    fn set_ignore_rules(&self, rules: &[IgnoreRule]) -> Result<(), StoreError>;

    fn tab_result(&self, tab_id: TabId) -> Result<Option<StoredDetection>, StoreError>;

    fn set_tab_result(&self, tab_id: TabId, detection: &StoredDetection) -> Result<(), StoreError>;

    fn remove_tab_result(&self, tab_id: TabId) -> Result<(), StoreError>;

    /// Drops every stored tab result. Tab ids are only meaningful within one
    /// browser session.
    fn clear_tab_results(&self) -> Result<(), StoreError>;

    /// Returns the install identifier, generating and persisting one on first use.
    fn install_id(&self) -> Result<String, StoreError>;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct State {
    mode: Option<Mode>,
    ignore_rules: Vec<IgnoreRule>,
    tab_results: HashMap<TabId, StoredDetection>,
    install_id: Option<String>,
}

/// JSON-document store. `in_memory` stores never touch the filesystem.
pub struct JsonStore {
    path: Option<PathBuf>,
    state: Mutex<State>,
    /// Serialises writers so snapshots reach the disk in order.
    writer: Mutex<()>,
}

impl JsonStore {
    /// Opens the store at `path`, starting empty if the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let state = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            State::default()
        };

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
            writer: Mutex::new(()),
        })
    }

    /// Opens the store at the platform default location.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(crate::platform::state_file())
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(State::default()),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Applies `f` to a copy of the state, writes the copy and only then
    /// makes it visible. A failed write leaves the state untouched.
    fn update<R>(&self, f: impl FnOnce(&mut State) -> R) -> Result<R, StoreError> {
        let _writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut next = self.lock().clone();
        let value = f(&mut next);
        if let Some(path) = &self.path {
            write_atomic(path, &next)?;
        }

        *self.lock() = next;
        Ok(value)
    }
}

fn write_atomic(path: &Path, state: &State) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let content = serde_json::to_string_pretty(state)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn generate_install_id() -> String {
    Uuid::new_v4().simple().to_string()
}

impl Store for JsonStore {
    fn mode(&self) -> Result<Option<Mode>, StoreError> {
        Ok(self.lock().mode)
    }

    fn set_mode(&self, mode: Mode) -> Result<(), StoreError> {
        self.update(|state| state.mode = Some(mode))
    }

    fn ignore_rules(&self) -> Result<Vec<IgnoreRule>, StoreError> {
        Ok(self.lock().ignore_rules.clone())
    }

    fn set_ignore_rules(&self, rules: &[IgnoreRule]) -> Result<(), StoreError> {
        self.update(|state| state.ignore_rules = rules.to_vec())
    }

    fn tab_result(&self, tab_id: TabId) -> Result<Option<StoredDetection>, StoreError> {
        Ok(self.lock().tab_results.get(&tab_id).cloned())
    }

    fn set_tab_result(&self, tab_id: TabId, detection: &StoredDetection) -> Result<(), StoreError> {
        self.update(|state| {
            state.tab_results.insert(tab_id, detection.clone());
        })
    }

    fn remove_tab_result(&self, tab_id: TabId) -> Result<(), StoreError> {
        if !self.lock().tab_results.contains_key(&tab_id) {
            return Ok(());
        }
        self.update(|state| {
            state.tab_results.remove(&tab_id);
        })
    }

    fn clear_tab_results(&self) -> Result<(), StoreError> {
        if self.lock().tab_results.is_empty() {
            return Ok(());
        }
        self.update(|state| state.tab_results.clear())
    }

    fn install_id(&self) -> Result<String, StoreError> {
        if let Some(id) = self.lock().install_id.clone() {
            return Ok(id);
        }
        self.update(|state| {
            state
                .install_id
                .get_or_insert_with(generate_install_id)
                .clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::RuleType;
    use crate::model::AnalysisResult;

    #[test]
    fn test_in_memory_defaults() {
        let store = JsonStore::in_memory();
        assert_eq!(store.mode().unwrap(), None);
        assert!(store.ignore_rules().unwrap().is_empty());
        assert!(store.tab_result(1).unwrap().is_none());
        assert!(store.path().is_none());
    }

    #[test]
    fn test_tab_results() {
        let store = JsonStore::in_memory();
        let detection = StoredDetection::new(AnalysisResult::skipped(Mode::Cloud, 3), "https://a.test");

        store.set_tab_result(4, &detection).unwrap();
        assert_eq!(store.tab_result(4).unwrap(), Some(detection));

        store.remove_tab_result(4).unwrap();
        assert!(store.tab_result(4).unwrap().is_none());
        // Removing again is a no-op
        store.remove_tab_result(4).unwrap();
    }

    #[test]
    fn test_install_id_is_stable() {
        let store = JsonStore::in_memory();
        let first = store.install_id().unwrap();
        assert_eq!(first.len(), 32);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(store.install_id().unwrap(), first);
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("state.json");

        let id = {
            let store = JsonStore::open(&path).unwrap();
            store.set_mode(Mode::Local).unwrap();
            store
                .set_ignore_rules(&[IgnoreRule::new("a.test", RuleType::Domain)])
                .unwrap();
            store
                .set_tab_result(9, &StoredDetection::new(AnalysisResult::ignored(Mode::Local, 0), "u"))
                .unwrap();
            store.install_id().unwrap()
        };

        let reopened = JsonStore::open(&path).unwrap();
        assert_eq!(reopened.mode().unwrap(), Some(Mode::Local));
        assert_eq!(reopened.ignore_rules().unwrap()[0].pattern, "a.test");
        assert!(reopened.tab_result(9).unwrap().is_some());
        assert_eq!(reopened.install_id().unwrap(), id);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_clear_tab_results_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        {
            let store = JsonStore::open(&path).unwrap();
            store.set_mode(Mode::Local).unwrap();
            for tab in [1, 2] {
                store
                    .set_tab_result(tab, &StoredDetection::new(AnalysisResult::skipped(Mode::Local, 0), "u"))
                    .unwrap();
            }
            store.clear_tab_results().unwrap();
        }

        let reopened = JsonStore::open(&path).unwrap();
        assert!(reopened.tab_result(1).unwrap().is_none());
        assert!(reopened.tab_result(2).unwrap().is_none());
        assert_eq!(reopened.mode().unwrap(), Some(Mode::Local));
    }

    #[test]
    fn test_failed_write_leaves_state_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let store = JsonStore::open(blocker.join("state.json")).unwrap();
        assert!(matches!(store.set_mode(Mode::Local), Err(StoreError::Io(_))));
        assert_eq!(store.mode().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(JsonStore::open(&path), Err(StoreError::Json(_))));
    }
}
