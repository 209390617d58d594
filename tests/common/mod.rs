#![allow(dead_code)]

use async_trait::async_trait;
use phishscan::config::Config;
use phishscan::detector::{Detector, DetectorFactory};
use phishscan::error::DetectorError;
use phishscan::model::{AnalysisResult, AvailabilityStatus, Detection, Judgment, Mode, TabId};
use phishscan::notify::Notifier;
use phishscan::store::JsonStore;
use phishscan::tabs::TabTable;
use phishscan::{Coordinator, ModeController};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Behaviour of one scripted backend, shared by every session the factory
/// creates for that mode.
pub struct Probe {
    pub calls: AtomicUsize,
    pub malicious: AtomicBool,
    pub hang: AtomicBool,
    status: Mutex<AvailabilityStatus>,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Probe {
    fn new(status: AvailabilityStatus) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            malicious: AtomicBool::new(false),
            hang: AtomicBool::new(false),
            status: Mutex::new(status),
            gate: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_status(&self, status: AvailabilityStatus) {
        *self.status.lock().unwrap() = status;
    }

    fn status(&self) -> AvailabilityStatus {
        *self.status.lock().unwrap()
    }

    /// Holds every analysis until a permit is added to the returned semaphore.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Waits until the backend has received `n` calls.
    pub async fn wait_for_calls(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.calls() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("backend was not called in time");
    }
}

struct ScriptedDetector {
    mode: Mode,
    probe: Arc<Probe>,
}

#[async_trait]
impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    async fn initialize(&self) -> AvailabilityStatus {
        self.probe.status()
    }

    async fn analyze(&self, _content: &str, url: &str) -> Result<Detection, DetectorError> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);

        if self.probe.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let gate = self.probe.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| DetectorError::Unavailable(e.to_string()))?
                .forget();
        }

        if self.probe.status() == AvailabilityStatus::ConfigureRequired {
            return Err(DetectorError::NotConfigured);
        }

        let is_malicious = self.probe.malicious.load(Ordering::SeqCst);
        Ok(Detection {
            is_malicious,
            analysis: format!("scripted verdict for {}", url),
            method: format!("{}:scripted", self.mode),
        })
    }
}

pub struct ScriptedFactory {
    pub local: Arc<Probe>,
    pub cloud: Arc<Probe>,
}

impl ScriptedFactory {
    pub fn new(local: AvailabilityStatus, cloud: AvailabilityStatus) -> Self {
        Self {
            local: Arc::new(Probe::new(local)),
            cloud: Arc::new(Probe::new(cloud)),
        }
    }

    pub fn ready() -> Self {
        Self::new(AvailabilityStatus::Readily, AvailabilityStatus::Readily)
    }
}

impl DetectorFactory for ScriptedFactory {
    fn create(&self, mode: Mode) -> Arc<dyn Detector> {
        let probe = match mode {
            Mode::Local => self.local.clone(),
            Mode::Cloud => self.cloud.clone(),
        };
        Arc::new(ScriptedDetector { mode, probe })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Committed(TabId, Judgment),
    Cleared(TabId),
}

#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn result_committed(&self, tab_id: TabId, result: &AnalysisResult) {
        self.events
            .lock()
            .unwrap()
            .push(Event::Committed(tab_id, result.judgment));
    }

    fn tab_cleared(&self, tab_id: TabId) {
        self.events.lock().unwrap().push(Event::Cleared(tab_id));
    }
}

pub struct Harness {
    pub coordinator: Arc<Coordinator>,
    pub factory: Arc<ScriptedFactory>,
    pub store: Arc<JsonStore>,
    pub tabs: Arc<TabTable>,
    pub notifier: Arc<RecordingNotifier>,
}

pub async fn coordinator(
    factory: Arc<ScriptedFactory>,
    store: Arc<JsonStore>,
    tabs: Arc<TabTable>,
    notifier: Arc<dyn Notifier>,
) -> Arc<Coordinator> {
    let config = Config::default();
    let modes = ModeController::initialize(factory, store.clone(), config.default_mode).await;
    Arc::new(Coordinator::new(&config, modes, store, tabs, notifier))
}

pub async fn harness_with(factory: ScriptedFactory) -> Harness {
    let factory = Arc::new(factory);
    let store = Arc::new(JsonStore::in_memory());
    let tabs = Arc::new(TabTable::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let coordinator = coordinator(
        factory.clone(),
        store.clone(),
        tabs.clone(),
        notifier.clone(),
    )
    .await;

    Harness {
        coordinator,
        factory,
        store,
        tabs,
        notifier,
    }
}

pub async fn harness() -> Harness {
    harness_with(ScriptedFactory::ready()).await
}
