//! Registry of in-flight analyses, at most one per tab.
//!
//! Per tab the lifecycle is `idle -> running -> {completed, cancelled,
//! timed-out}`. Registering a new analysis for a tab cancels the previous
//! one first. Cancellation is cooperative: the backend call keeps running,
//! but [`TrackerRegistry::settle`] reports it as stale so its result is
//! never committed.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::model::TabId;

/// Watchdog applied to every analysis, regardless of backend.
pub const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(60);

/// Handle to one tracked analysis.
#[derive(Debug, Clone)]
pub struct Tracker {
    tab_id: TabId,
    generation: u64,
    token: CancellationToken,
    started_at: DateTime<Utc>,
}

/// How a watched analysis ended.
#[derive(Debug, PartialEq, Eq)]
pub enum Settlement<T> {
    Completed(T),
    TimedOut,
}

impl Tracker {
    pub fn tab_id(&self) -> TabId {
        self.tab_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Runs `analysis` against the watchdog. Whichever finishes first wins;
    /// the loser is dropped.
    pub async fn watch<F, T>(&self, analysis: F) -> Settlement<T>
    where
        F: Future<Output = T>,
    {
        match tokio::time::timeout(ANALYSIS_TIMEOUT, analysis).await {
            Ok(value) => Settlement::Completed(value),
            Err(_) => {
                debug!(tab_id = self.tab_id, "Analysis watchdog fired");
                Settlement::TimedOut
            }
        }
    }
}

pub struct TrackerRegistry {
    trackers: Mutex<HashMap<TabId, Tracker>>,
    next_generation: AtomicU64,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self {
            trackers: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TabId, Tracker>> {
        self.trackers.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a new analysis for `tab_id`, cancelling any running one.
    pub fn start_tracking(&self, tab_id: TabId) -> Tracker {
        let tracker = Tracker {
            tab_id,
            generation: self.next_generation.fetch_add(1, Ordering::Relaxed),
            token: CancellationToken::new(),
            started_at: Utc::now(),
        };

        let previous = self.lock().insert(tab_id, tracker.clone());
        if let Some(previous) = previous {
            debug!(tab_id, "Superseding running analysis");
            previous.token.cancel();
        }

        tracker
    }

    /// Cancels the running analysis for a tab. Safe to call repeatedly.
    pub fn cancel(&self, tab_id: TabId) -> bool {
        match self.lock().remove(&tab_id) {
            Some(tracker) => {
                debug!(tab_id, "Cancelled running analysis");
                tracker.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Tracker> = self.lock().drain().map(|(_, t)| t).collect();
        for tracker in &drained {
            tracker.token.cancel();
        }
        drained.len()
    }

    pub fn is_tracked(&self, tab_id: TabId) -> bool {
        self.lock().contains_key(&tab_id)
    }

    /// True while `tracker` is the live, uncancelled analysis for its tab.
    pub fn is_running(&self, tracker: &Tracker) -> bool {
        !tracker.is_cancelled()
            && self
                .lock()
                .get(&tracker.tab_id)
                .map(|live| live.generation == tracker.generation)
                .unwrap_or(false)
    }

    /// Retires a tracker once its analysis has settled.
    ///
    /// Returns true when the tracker was still running, i.e. its result may
    /// be committed. A superseded tracker leaves its successor untouched.
    pub fn settle(&self, tracker: &Tracker) -> bool {
        let mut trackers = self.lock();
        let live = trackers
            .get(&tracker.tab_id)
            .map(|live| live.generation == tracker.generation)
            .unwrap_or(false);

        if live {
            trackers.remove(&tracker.tab_id);
        }

        live && !tracker.is_cancelled()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Default for TrackerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
