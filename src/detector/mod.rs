//! Phishing classifiers.
//!
//! A [`Detector`] is the analyzer backend for one [`Mode`]. The service treats
//! it as an opaque `analyze(content, url)` capability plus an availability
//! probe; everything about prompting and transport stays in here.
//!
//! | Detector | Mode | Transport |
//! |----------|------|-----------|
//! | [`CloudDetector`] | cloud | HTTPS API with bearer key |
//! | [`LocalDetector`] | local | On-device inference server |

mod cloud;
mod local;
pub mod prompt;

pub use cloud::CloudDetector;
pub use local::LocalDetector;

use crate::config::Config;
use crate::error::DetectorError;
use crate::model::{AvailabilityStatus, Detection, Mode};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Detector: Send + Sync {
    /// Returns the human-readable name of this backend.
    fn name(&self) -> &'static str;

    fn mode(&self) -> Mode;

    /// Prepares the backend and reports whether it can serve requests.
    ///
    /// Never fails: problems are reported through the returned status.
    async fn initialize(&self) -> AvailabilityStatus;

    /// Classifies page text.
    ///
    /// # Errors
    ///
    /// Returns an error when the backend is misconfigured, rate limited,
    /// unreachable, or answers with something that is not a verdict.
    async fn analyze(&self, content: &str, url: &str) -> Result<Detection, DetectorError>;
}

/// Builds a fresh backend session for a mode.
pub trait DetectorFactory: Send + Sync {
    fn create(&self, mode: Mode) -> Arc<dyn Detector>;
}

/// Factory for the HTTP-backed detectors described by [`Config`].
pub struct HttpDetectorFactory {
    config: Config,
    install_id: Option<String>,
}

impl HttpDetectorFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            install_id: None,
        }
    }

    /// Sends the install identifier with cloud requests for per-install quotas.
    pub fn with_install_id(mut self, install_id: impl Into<String>) -> Self {
        self.install_id = Some(install_id.into());
        self
    }
}

impl DetectorFactory for HttpDetectorFactory {
    fn create(&self, mode: Mode) -> Arc<dyn Detector> {
        match mode {
            Mode::Cloud => Arc::new(CloudDetector::new(
                self.config.cloud.clone(),
                self.install_id.clone(),
            )),
            Mode::Local => Arc::new(LocalDetector::new(self.config.local.clone())),
        }
    }
}

/// Pulls the first JSON object out of model output that may be wrapped in
/// prose or code fences.
pub(crate) fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_backend_for_mode() {
        let factory = HttpDetectorFactory::new(Config::default()).with_install_id("abc");
        assert_eq!(factory.create(Mode::Cloud).mode(), Mode::Cloud);
        assert_eq!(factory.create(Mode::Local).mode(), Mode::Local);
        assert_eq!(factory.create(Mode::Local).name(), "Local model");
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("```json\n{\"a\": 1}\n```"),
            Some("{\"a\": 1}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
