//! Core data types shared by every part of the service.
//!
//! - [`Mode`] - Which analyzer backend is active (local or cloud)
//! - [`ScanRequest`] / [`AnalysisRequest`] - An inbound page scan
//! - [`AnalysisResult`] / [`Judgment`] - The outcome of a scan
//! - [`Detection`] - A raw verdict returned by a backend
//! - [`AvailabilityStatus`] - Backend readiness surfaced to the UI
//! - [`StoredDetection`] / [`TabStatus`] - Per-tab last result
//!
//! # Example
//!
//! ```
//! use phishscan::model::{AnalysisResult, Judgment, Mode};
//!
//! let result = AnalysisResult::timeout(Mode::Cloud, 1200);
//! assert_eq!(result.judgment, Judgment::Timeout);
//! assert!(!result.is_malicious);
//! ```

mod request;
mod result;

pub use request::*;
pub use result::*;

use serde::{Deserialize, Serialize};

/// Browser tab identifier.
pub type TabId = i64;

/// Analyzer backend selection. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// On-device model
    Local,
    /// Remote API
    #[default]
    Cloud,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Cloud => "cloud",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Local => "Local (on-device)",
            Mode::Cloud => "Cloud",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "on-device" => Ok(Mode::Local),
            "cloud" | "remote" => Ok(Mode::Cloud),
            _ => Err(format!("Unknown mode: {}. Use 'local' or 'cloud'", s)),
        }
    }
}

/// Readiness of the active backend, as reported to the popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvailabilityStatus {
    /// The inference runtime cannot be reached at all
    ApiNotAvailable,
    /// The runtime refuses to serve this model
    No,
    /// The model must be downloaded before use
    AfterDownload,
    Readily,
    Error,
    /// Cloud mode without credentials
    ConfigureRequired,
    Initializing,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::ApiNotAvailable => "api-not-available",
            AvailabilityStatus::No => "no",
            AvailabilityStatus::AfterDownload => "after-download",
            AvailabilityStatus::Readily => "readily",
            AvailabilityStatus::Error => "error",
            AvailabilityStatus::ConfigureRequired => "configure-required",
            AvailabilityStatus::Initializing => "initializing",
        }
    }

    /// Only a ready backend accepts analysis requests.
    pub fn is_available(&self) -> bool {
        matches!(self, AvailabilityStatus::Readily)
    }
}

impl std::fmt::Display for AvailabilityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Answer to an availability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub status: AvailabilityStatus,
    pub mode: Mode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("local".parse::<Mode>(), Ok(Mode::Local));
        assert_eq!("CLOUD".parse::<Mode>(), Ok(Mode::Cloud));
        assert!("hybrid".parse::<Mode>().is_err());
    }

    #[test]
    fn test_availability_status_wire_names() {
        let json = serde_json::to_string(&AvailabilityStatus::ConfigureRequired).unwrap();
        assert_eq!(json, "\"configure-required\"");
        let parsed: AvailabilityStatus = serde_json::from_str("\"after-download\"").unwrap();
        assert_eq!(parsed, AvailabilityStatus::AfterDownload);
    }

    #[test]
    fn test_only_readily_is_available() {
        assert!(AvailabilityStatus::Readily.is_available());
        assert!(!AvailabilityStatus::AfterDownload.is_available());
        assert!(!AvailabilityStatus::ConfigureRequired.is_available());
    }
}
