//! Error types for detector backends, persisted state and the native host.

use crate::model::{AnalysisResult, Judgment, Mode};
use thiserror::Error;

/// Errors raised by a detector backend.
#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("Cloud API key is not configured")]
    NotConfigured,

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Rate limit exceeded")]
    QuotaExceeded,

    #[error("Model unavailable: {0}")]
    Unavailable(String),

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl DetectorError {
    /// The judgment this failure is reported as.
    pub fn judgment(&self) -> Judgment {
        match self {
            DetectorError::NotConfigured | DetectorError::InvalidApiKey => {
                Judgment::ConfigurationError
            }
            DetectorError::QuotaExceeded => Judgment::QuotaExceeded,
            DetectorError::Unavailable(_)
            | DetectorError::Request(_)
            | DetectorError::Parse(_) => Judgment::Error,
        }
    }

    /// Folds the failure into a well-formed result.
    pub fn into_result(self, mode: Mode, content_length: usize) -> AnalysisResult {
        match self.judgment() {
            Judgment::ConfigurationError => {
                AnalysisResult::configuration_error(mode, content_length, &self)
            }
            Judgment::QuotaExceeded => AnalysisResult::quota_exceeded(mode, content_length),
            _ => AnalysisResult::error(mode, content_length, &self),
        }
    }
}

/// Errors reading or writing persisted state.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("State file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("State file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors on the native messaging channel.
#[derive(Error, Debug)]
pub enum HostError {
    #[error("Native messaging I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed message: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Message of {0} bytes exceeds the size limit")]
    MessageTooLarge(usize),
}
