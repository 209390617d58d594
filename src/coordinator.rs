//! Entry point for scan requests and tab lifecycle signals.
//!
//! A scan goes through, in order:
//!
//! 1. The caller's own skip signal (`SKIPPED`)
//! 2. Ignore rules (`IGNORED`)
//! 3. The result cache
//! 4. A tracked, watchdog-guarded backend call
//!
//! When the backend call settles, its result is committed (cache, stored tab
//! result, badge) only if the tracker is still the live one for the tab, the
//! tab still shows the requested URL and no mode switch happened meanwhile,
//! not even one that switched back.
//! Otherwise the result goes back to the caller and nothing else sees it.
//!
//! Every path resolves with an [`AnalysisResult`]; nothing here returns an
//! error to the caller.

use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::cache::{Fingerprint, ResultCache};
use crate::config::Config;
use crate::ignore::{IgnoreRule, IgnoreRules, RuleType};
use crate::mode::ModeController;
use crate::model::{
    AnalysisRequest, AnalysisResult, Availability, Mode, ScanRequest, StoredDetection, TabId,
    TabStatus,
};
use crate::notify::Notifier;
use crate::store::Store;
use crate::tabs::TabDirectory;
use crate::tracker::{Settlement, TrackerRegistry};

pub struct Coordinator {
    cache: ResultCache,
    trackers: TrackerRegistry,
    modes: ModeController,
    ignore: RwLock<IgnoreRules>,
    store: Arc<dyn Store>,
    tabs: Arc<dyn TabDirectory>,
    notifier: Arc<dyn Notifier>,
    max_content_chars: usize,
}

fn truncate_chars(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

impl Coordinator {
    /// Builds a coordinator for a new browser session. Tab results stored by
    /// an earlier session are dropped, since tab ids are reused.
    pub fn new(
        config: &Config,
        modes: ModeController,
        store: Arc<dyn Store>,
        tabs: Arc<dyn TabDirectory>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let rules = store.ignore_rules().unwrap_or_else(|e| {
            warn!("Could not load ignore rules: {}", e);
            Vec::new()
        });
        if let Err(e) = store.clear_tab_results() {
            warn!("Could not drop tab results of the previous session: {}", e);
        }

        Self {
            cache: ResultCache::with_max_entries(config.cache_max_entries),
            trackers: TrackerRegistry::new(),
            modes,
            ignore: RwLock::new(IgnoreRules::new(config.extension_origin.clone(), rules)),
            store,
            tabs,
            notifier,
            max_content_chars: config.max_content_chars.max(1),
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn trackers(&self) -> &TrackerRegistry {
        &self.trackers
    }

    pub fn mode(&self) -> Mode {
        self.modes.mode()
    }

    /// Analyses a page, resolving with a result on every path.
    pub async fn handle_scan_request(&self, request: ScanRequest) -> AnalysisResult {
        let (mode, epoch) = self.modes.session_epoch();
        let content_length = request.content.chars().count();

        if request.skipped {
            debug!(tab_id = request.tab_id, "Scan skipped by caller");
            let result = AnalysisResult::skipped(mode, content_length);
            self.short_circuit(request.tab_id, &request.url, &result);
            return result;
        }

        if self.should_ignore(&request.url) {
            debug!(tab_id = request.tab_id, url = %request.url, "Page matches an ignore rule");
            let result = AnalysisResult::ignored(mode, content_length);
            self.short_circuit(request.tab_id, &request.url, &result);
            return result;
        }

        let request = AnalysisRequest::from_scan(request, mode);
        let key = Fingerprint::for_request(&request);

        if let Some(cached) = self.cache.get(&key) {
            debug!(tab_id = request.tab_id, url = %request.url, "Cache hit");
            self.short_circuit(request.tab_id, &request.url, &cached);
            return cached;
        }

        self.analyze(request, key, epoch).await
    }

    async fn analyze(
        &self,
        request: AnalysisRequest,
        key: Fingerprint,
        epoch: u64,
    ) -> AnalysisResult {
        let content_length = request.content_length();
        let tracker = self.trackers.start_tracking(request.tab_id);
        info!(tab_id = request.tab_id, url = %request.url, mode = %request.mode, "Starting analysis");

        let content = truncate_chars(&request.content, self.max_content_chars);
        let result = match tracker
            .watch(self.modes.analyze(content, &request.url, content_length))
            .await
        {
            Settlement::Completed(result) => result,
            Settlement::TimedOut => {
                warn!(tab_id = request.tab_id, url = %request.url, "Analysis timed out");
                AnalysisResult::timeout(request.mode, content_length)
            }
        };

        if !self.trackers.settle(&tracker) {
            debug!(tab_id = request.tab_id, "Discarding result of superseded analysis");
            return result;
        }

        if self.modes.session_epoch() != (request.mode, epoch) {
            debug!(tab_id = request.tab_id, "Discarding result from previous mode session");
            return result;
        }

        let current_url = self.tabs.current_url(request.tab_id).await;
        if current_url.as_deref() != Some(request.url.as_str()) {
            debug!(
                tab_id = request.tab_id,
                requested = %request.url,
                current = ?current_url,
                "Tab navigated away, discarding result"
            );
            return result;
        }

        if result.judgment.is_verdict() {
            self.cache.put(key, result.clone());
        }
        self.record(request.tab_id, &request.url, &result);
        info!(tab_id = request.tab_id, judgment = %result.judgment, "Analysis committed");

        result
    }

    /// Answers without a backend call, cancelling any analysis still running
    /// for the tab.
    fn short_circuit(&self, tab_id: TabId, url: &str, result: &AnalysisResult) {
        self.trackers.cancel(tab_id);
        self.record(tab_id, url, result);
    }

    /// Stores a tab's latest result and tells the UI about it.
    fn record(&self, tab_id: TabId, url: &str, result: &AnalysisResult) {
        if let Err(e) = self
            .store
            .set_tab_result(tab_id, &StoredDetection::new(result.clone(), url))
        {
            warn!(tab_id, "Could not store tab result: {}", e);
        }
        self.notifier.result_committed(tab_id, result);
    }

    fn should_ignore(&self, url: &str) -> bool {
        self.ignore
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .should_ignore(url)
    }

    /// Switches mode and returns the mode now active.
    ///
    /// Analyses still running belong to the old session and are cancelled;
    /// the cache is emptied once the new session is active.
    pub async fn set_mode(&self, mode: Mode) -> Mode {
        self.modes.switch_mode(mode).await;
        let cancelled = self.trackers.cancel_all();
        self.cache.clear();
        debug!(mode = %mode, cancelled, "Mode switched, cache cleared");
        self.modes.mode()
    }

    pub fn get_status(&self, tab_id: TabId) -> TabStatus {
        match self.store.tab_result(tab_id) {
            Ok(stored) => TabStatus::from(stored),
            Err(e) => {
                warn!(tab_id, "Could not read tab result: {}", e);
                TabStatus::empty()
            }
        }
    }

    /// Drops a tab's cached results so the next scan re-analyses the page.
    pub fn clear_tab_cache(&self, tab_id: TabId) -> usize {
        let removed = self.cache.remove_by_tab(tab_id);
        debug!(tab_id, removed, "Cleared tab cache");
        removed
    }

    /// Reports backend readiness, re-probing a backend that was not ready.
    pub async fn check_availability(&self) -> Availability {
        let availability = self.modes.availability();
        if availability.available {
            availability
        } else {
            self.modes.refresh().await
        }
    }

    pub fn tab_closed(&self, tab_id: TabId) {
        self.trackers.cancel(tab_id);
        let removed = self.cache.remove_by_tab(tab_id);
        if let Err(e) = self.store.remove_tab_result(tab_id) {
            warn!(tab_id, "Could not remove tab result: {}", e);
        }
        debug!(tab_id, removed, "Tab closed");
    }

    /// A tab started loading a new page. Cached results survive so that
    /// going back to a page can reuse them.
    pub fn navigation_started(&self, tab_id: TabId) {
        self.trackers.cancel(tab_id);
        if let Err(e) = self.store.remove_tab_result(tab_id) {
            warn!(tab_id, "Could not remove tab result: {}", e);
        }
        self.notifier.tab_cleared(tab_id);
    }

    pub fn ignore_rules(&self) -> Vec<IgnoreRule> {
        self.ignore
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .rules()
            .to_vec()
    }

    /// Adds an ignore rule and persists the list. Returns false if the rule
    /// was empty or already present.
    pub fn add_ignore_rule(&self, pattern: &str, rule_type: RuleType) -> bool {
        let mut ignore = self.ignore.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !ignore.add(pattern, rule_type) {
            return false;
        }
        self.persist_rules(ignore.rules());
        true
    }

    pub fn remove_ignore_rule(&self, index: usize) -> Option<IgnoreRule> {
        let mut ignore = self.ignore.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let removed = ignore.remove(index)?;
        self.persist_rules(ignore.rules());
        Some(removed)
    }

    fn persist_rules(&self, rules: &[IgnoreRule]) {
        if let Err(e) = self.store.set_ignore_rules(rules) {
            warn!("Could not persist ignore rules: {}", e);
        }
    }
}
