//! Active-mode ownership and backend dispatch.
//!
//! The [`ModeController`] holds the one backend session that may run
//! analyses. Switching modes throws the old session away, persists the
//! choice and initializes a new session. Initialization problems become an
//! [`AvailabilityStatus`]; they are never returned as errors.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

use crate::detector::{Detector, DetectorFactory};
use crate::model::{AnalysisResult, Availability, AvailabilityStatus, Mode};
use crate::store::Store;

struct ModeState {
    active_mode: Mode,
    /// Bumped on every switch, so a round trip back to the same mode still
    /// counts as a new session.
    epoch: u64,
    session: Option<Arc<dyn Detector>>,
    status: AvailabilityStatus,
}

impl ModeState {
    fn availability(&self) -> Availability {
        Availability {
            available: self.status.is_available(),
            status: self.status,
            mode: self.active_mode,
        }
    }
}

pub struct ModeController {
    factory: Arc<dyn DetectorFactory>,
    store: Arc<dyn Store>,
    state: Mutex<ModeState>,
    switching: tokio::sync::Mutex<()>,
}

impl ModeController {
    /// Restores the persisted mode (or `default_mode`) and initializes its backend.
    pub async fn initialize(
        factory: Arc<dyn DetectorFactory>,
        store: Arc<dyn Store>,
        default_mode: Mode,
    ) -> Self {
        let mode = match store.mode() {
            Ok(Some(mode)) => mode,
            Ok(None) => default_mode,
            Err(e) => {
                warn!("Could not read persisted mode, using {}: {}", default_mode, e);
                default_mode
            }
        };

        let controller = Self {
            factory,
            store,
            state: Mutex::new(ModeState {
                active_mode: mode,
                epoch: 0,
                session: None,
                status: AvailabilityStatus::Initializing,
            }),
            switching: tokio::sync::Mutex::new(()),
        };
        controller.start_session(mode).await;
        controller
    }

    fn lock(&self) -> MutexGuard<'_, ModeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn mode(&self) -> Mode {
        self.lock().active_mode
    }

    pub fn availability(&self) -> Availability {
        self.lock().availability()
    }

    /// Active mode together with the switch epoch it belongs to.
    pub fn session_epoch(&self) -> (Mode, u64) {
        let state = self.lock();
        (state.active_mode, state.epoch)
    }

    async fn start_session(&self, mode: Mode) {
        let session = self.factory.create(mode);
        let status = session.initialize().await;
        info!(mode = %mode, backend = session.name(), status = %status, "Backend initialized");

        let mut state = self.lock();
        state.active_mode = mode;
        state.session = Some(session);
        state.status = status;
    }

    /// Replaces the active backend with a fresh one for `mode`.
    ///
    /// Always completes; a backend that fails to initialize is recorded as
    /// unavailable.
    pub async fn switch_mode(&self, mode: Mode) {
        let _switching = self.switching.lock().await;

        {
            let mut state = self.lock();
            info!(from = %state.active_mode, to = %mode, "Switching mode");
            state.active_mode = mode;
            state.epoch += 1;
            state.session = None;
            state.status = AvailabilityStatus::Initializing;
        }

        if let Err(e) = self.store.set_mode(mode) {
            warn!("Could not persist mode {}: {}", mode, e);
        }

        self.start_session(mode).await;
    }

    /// Re-probes the current backend, e.g. after a model download finished.
    pub async fn refresh(&self) -> Availability {
        let _switching = self.switching.lock().await;

        let (epoch, session) = {
            let state = self.lock();
            (state.epoch, state.session.clone())
        };

        let Some(session) = session else {
            return self.availability();
        };

        let status = session.initialize().await;
        let mut state = self.lock();
        if state.epoch == epoch {
            state.status = status;
        }
        state.availability()
    }

    /// Runs one analysis on the active backend.
    ///
    /// An unavailable backend fails fast with an `ERROR` result unless it is
    /// waiting for configuration, in which case the backend itself reports
    /// the configuration problem.
    pub async fn analyze(&self, content: &str, url: &str, content_length: usize) -> AnalysisResult {
        let (mode, session, status) = {
            let state = self.lock();
            (state.active_mode, state.session.clone(), state.status)
        };

        let session = match session {
            Some(session)
                if status.is_available() || status == AvailabilityStatus::ConfigureRequired =>
            {
                session
            }
            _ => {
                return AnalysisResult::error(
                    mode,
                    content_length,
                    format!("{} backend is not available ({})", mode, status),
                )
            }
        };

        match session.analyze(content, url).await {
            Ok(detection) => AnalysisResult::from_detection(detection, mode, content_length),
            Err(e) => {
                warn!(mode = %mode, url, "Analysis failed: {}", e);
                e.into_result(mode, content_length)
            }
        }
    }
}
