//! Tab metadata lookups.
//!
//! The coordinator asks the host for a tab's current URL right before it
//! commits a result. [`TabTable`] is the host's view of open tabs, fed by
//! scan requests and navigation signals.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::model::TabId;

#[async_trait]
pub trait TabDirectory: Send + Sync {
    /// Current URL of the tab, or `None` when the tab is closed or unknown.
    async fn current_url(&self, tab_id: TabId) -> Option<String>;
}

#[derive(Default)]
pub struct TabTable {
    urls: Mutex<HashMap<TabId, String>>,
}

impl TabTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TabId, String>> {
        self.urls.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_url(&self, tab_id: TabId, url: impl Into<String>) {
        self.lock().insert(tab_id, url.into());
    }

    pub fn remove(&self, tab_id: TabId) {
        self.lock().remove(&tab_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl TabDirectory for TabTable {
    async fn current_url(&self, tab_id: TabId) -> Option<String> {
        self.lock().get(&tab_id).cloned()
    }
}
