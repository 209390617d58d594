//! In-memory cache of analysis results.
//!
//! Entries are keyed by a [`Fingerprint`] built from the tab, the URL, the
//! first 500 characters of page text and the active mode. Two pages whose
//! text only differs after that prefix share an entry.
//!
//! There is no per-entry TTL. Staleness is handled by invalidation instead:
//! mode switches clear everything, closing a tab removes that tab's entries,
//! and once the cache is full it is cleared wholesale before the next insert.
//!
//! # Example
//!
//! ```
//! use phishscan::cache::{Fingerprint, ResultCache};
//! use phishscan::model::{AnalysisResult, Mode};
//!
//! let cache = ResultCache::new();
//! let key = Fingerprint::new(1, "https://a.test", "page text", Mode::Cloud);
//!
//! cache.put(key.clone(), AnalysisResult::skipped(Mode::Cloud, 9));
//! assert!(cache.get(&key).is_some());
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::model::{AnalysisRequest, AnalysisResult, Mode, TabId};

/// Default number of entries kept before the cache is cleared.
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Number of content characters that participate in the key.
pub const CONTENT_PREFIX_CHARS: usize = 500;

const SEPARATOR: char = '\u{1f}';

/// Composite cache key for one (tab, url, content prefix, mode) tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(tab_id: TabId, url: &str, content: &str, mode: Mode) -> Self {
        let prefix: String = content.chars().take(CONTENT_PREFIX_CHARS).collect();
        Self(format!(
            "{}{sep}{}{sep}{}{sep}{}",
            tab_id,
            url,
            prefix,
            mode.as_str(),
            sep = SEPARATOR
        ))
    }

    pub fn for_request(request: &AnalysisRequest) -> Self {
        Self::new(request.tab_id, &request.url, &request.content, request.mode)
    }

    fn belongs_to(&self, tab_id: TabId) -> bool {
        self.0
            .split_once(SEPARATOR)
            .map(|(tab, _)| tab == tab_id.to_string())
            .unwrap_or(false)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result cache shared by the coordinator.
pub struct ResultCache {
    entries: Mutex<HashMap<Fingerprint, AnalysisResult>>,
    max_entries: usize,
}

impl ResultCache {
    /// Creates a cache with the default capacity of 100 entries.
    pub fn new() -> Self {
        Self::with_max_entries(DEFAULT_MAX_ENTRIES)
    }

    /// Creates a cache that is cleared once it holds `max_entries` entries.
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Fingerprint, AnalysisResult>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &Fingerprint) -> Option<AnalysisResult> {
        self.lock().get(key).cloned()
    }

    /// Stores a result. A full cache is emptied first.
    pub fn put(&self, key: Fingerprint, result: AnalysisResult) {
        let mut entries = self.lock();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            debug!(entries = entries.len(), "Result cache full, clearing");
            entries.clear();
        }
        entries.insert(key, result);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Removes every entry for a tab and returns how many were dropped.
    pub fn remove_by_tab(&self, tab_id: TabId) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.belongs_to(tab_id));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(mode: Mode) -> AnalysisResult {
        AnalysisResult::skipped(mode, 0)
    }

    #[test]
    fn test_fingerprint_separates_modes() {
        let cloud = Fingerprint::new(1, "https://a.test", "text", Mode::Cloud);
        let local = Fingerprint::new(1, "https://a.test", "text", Mode::Local);
        assert_ne!(cloud, local);
    }

    #[test]
    fn test_fingerprint_separates_tabs() {
        let one = Fingerprint::new(1, "https://a.test", "text", Mode::Cloud);
        let two = Fingerprint::new(2, "https://a.test", "text", Mode::Cloud);
        assert_ne!(one, two);
    }

    #[test]
    fn test_fingerprint_uses_content_prefix_only() {
        let base = "a".repeat(CONTENT_PREFIX_CHARS);
        let first = Fingerprint::new(1, "https://a.test", &format!("{}tail one", base), Mode::Cloud);
        let second = Fingerprint::new(1, "https://a.test", &format!("{}tail two", base), Mode::Cloud);
        assert_eq!(first, second);

        let shorter = Fingerprint::new(1, "https://a.test", &base[..499], Mode::Cloud);
        assert_ne!(first, shorter);
    }

    #[test]
    fn test_fingerprint_prefix_counts_characters() {
        let wide = "é".repeat(CONTENT_PREFIX_CHARS + 10);
        let key = Fingerprint::new(1, "u", &wide, Mode::Local);
        assert_eq!(key.as_str().matches('é').count(), CONTENT_PREFIX_CHARS);
    }

    #[test]
    fn test_put_get_and_clear() {
        let cache = ResultCache::new();
        let key = Fingerprint::new(1, "https://a.test", "text", Mode::Cloud);
        assert!(cache.get(&key).is_none());

        cache.put(key.clone(), result(Mode::Cloud));
        assert_eq!(cache.get(&key), Some(result(Mode::Cloud)));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overflow_clears_whole_cache() {
        let cache = ResultCache::with_max_entries(3);
        for i in 0..3 {
            cache.put(Fingerprint::new(i, "u", "c", Mode::Cloud), result(Mode::Cloud));
        }
        assert_eq!(cache.len(), 3);

        // Overwriting an existing key does not trigger eviction
        cache.put(Fingerprint::new(0, "u", "c", Mode::Cloud), result(Mode::Cloud));
        assert_eq!(cache.len(), 3);

        let newest = Fingerprint::new(99, "u", "c", Mode::Cloud);
        cache.put(newest.clone(), result(Mode::Cloud));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&newest).is_some());
    }

    #[test]
    fn test_remove_by_tab() {
        let cache = ResultCache::new();
        cache.put(Fingerprint::new(1, "https://a.test", "x", Mode::Cloud), result(Mode::Cloud));
        cache.put(Fingerprint::new(1, "https://b.test", "y", Mode::Local), result(Mode::Local));
        cache.put(Fingerprint::new(11, "https://a.test", "x", Mode::Cloud), result(Mode::Cloud));

        assert_eq!(cache.remove_by_tab(1), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.remove_by_tab(1), 0);
    }
}
