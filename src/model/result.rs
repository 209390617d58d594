use super::Mode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of an [`AnalysisResult`].
///
/// `Threat` and `Safe` are real verdicts from a backend. Everything else is
/// produced by the service itself: failures (`Error`, `Timeout`,
/// `ConfigurationError`, `QuotaExceeded`) and policy short-circuits
/// (`Skipped`, `Ignored`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Judgment {
    Threat,
    Safe,
    Error,
    Timeout,
    Skipped,
    Ignored,
    ConfigurationError,
    QuotaExceeded,
}

impl Judgment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Judgment::Threat => "THREAT",
            Judgment::Safe => "SAFE",
            Judgment::Error => "ERROR",
            Judgment::Timeout => "TIMEOUT",
            Judgment::Skipped => "SKIPPED",
            Judgment::Ignored => "IGNORED",
            Judgment::ConfigurationError => "CONFIGURATION_ERROR",
            Judgment::QuotaExceeded => "QUOTA_EXCEEDED",
        }
    }

    /// True for results that came from a backend verdict.
    pub fn is_verdict(&self) -> bool {
        matches!(self, Judgment::Threat | Judgment::Safe)
    }

    /// True for results where no verdict could be reached.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Judgment::Error
                | Judgment::Timeout
                | Judgment::ConfigurationError
                | Judgment::QuotaExceeded
        )
    }
}

impl std::fmt::Display for Judgment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw verdict from a detector backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    pub is_malicious: bool,
    pub analysis: String,
    /// Backend and model that produced the verdict, e.g. `cloud:gpt-4o-mini`.
    pub method: String,
}

/// Outcome of a scan. Every path through the coordinator produces one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub is_malicious: bool,
    pub analysis: String,
    pub judgment: Judgment,
    pub method: String,
    pub mode: Mode,
    pub content_length: usize,
}

const CAUTION: &str = "Proceed with caution.";

impl AnalysisResult {
    pub fn from_detection(detection: Detection, mode: Mode, content_length: usize) -> Self {
        let judgment = if detection.is_malicious {
            Judgment::Threat
        } else {
            Judgment::Safe
        };
        Self {
            is_malicious: detection.is_malicious,
            analysis: detection.analysis,
            judgment,
            method: detection.method,
            mode,
            content_length,
        }
    }

    fn synthetic(
        judgment: Judgment,
        analysis: String,
        method: &str,
        mode: Mode,
        content_length: usize,
    ) -> Self {
        Self {
            is_malicious: false,
            analysis,
            judgment,
            method: method.to_string(),
            mode,
            content_length,
        }
    }

    pub fn error(mode: Mode, content_length: usize, reason: impl std::fmt::Display) -> Self {
        Self::synthetic(
            Judgment::Error,
            format!("Analysis failed: {}. {}", reason, CAUTION),
            "error",
            mode,
            content_length,
        )
    }

    pub fn timeout(mode: Mode, content_length: usize) -> Self {
        Self::synthetic(
            Judgment::Timeout,
            format!("Analysis did not finish in time. {}", CAUTION),
            "timeout",
            mode,
            content_length,
        )
    }

    pub fn configuration_error(mode: Mode, content_length: usize, reason: impl std::fmt::Display) -> Self {
        Self::synthetic(
            Judgment::ConfigurationError,
            format!("{}. Configure the cloud API key in settings.", reason),
            "configuration",
            mode,
            content_length,
        )
    }

    pub fn quota_exceeded(mode: Mode, content_length: usize) -> Self {
        Self::synthetic(
            Judgment::QuotaExceeded,
            format!("The analysis service rate limit was reached. {}", CAUTION),
            "quota",
            mode,
            content_length,
        )
    }

    pub fn skipped(mode: Mode, content_length: usize) -> Self {
        Self::synthetic(
            Judgment::Skipped,
            "This page type is not scanned.".to_string(),
            "skip",
            mode,
            content_length,
        )
    }

    pub fn ignored(mode: Mode, content_length: usize) -> Self {
        Self::synthetic(
            Judgment::Ignored,
            "This page matches an ignore rule.".to_string(),
            "ignore-rule",
            mode,
            content_length,
        )
    }
}

/// Last committed result for a tab, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDetection {
    pub result: AnalysisResult,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

impl StoredDetection {
    pub fn new(result: AnalysisResult, url: impl Into<String>) -> Self {
        Self {
            result,
            url: url.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Answer to a status query: the stored detection, or an empty placeholder
/// when the tab has not been scanned since its last navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabStatus {
    pub scanned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl TabStatus {
    pub fn empty() -> Self {
        Self {
            scanned: false,
            result: None,
            url: None,
            timestamp: None,
        }
    }
}

impl From<Option<StoredDetection>> for TabStatus {
    fn from(stored: Option<StoredDetection>) -> Self {
        match stored {
            Some(stored) => Self {
                scanned: true,
                result: Some(stored.result),
                url: Some(stored.url),
                timestamp: Some(stored.timestamp),
            },
            None => Self::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_detection_sets_judgment() {
        let threat = AnalysisResult::from_detection(
            Detection {
                is_malicious: true,
                analysis: "Credential harvesting form".to_string(),
                method: "cloud:test".to_string(),
            },
            Mode::Cloud,
            42,
        );
        assert_eq!(threat.judgment, Judgment::Threat);
        assert_eq!(threat.content_length, 42);

        let safe = AnalysisResult::from_detection(
            Detection {
                is_malicious: false,
                analysis: "Ordinary article".to_string(),
                method: "local:test".to_string(),
            },
            Mode::Local,
            7,
        );
        assert_eq!(safe.judgment, Judgment::Safe);
        assert_eq!(safe.mode, Mode::Local);
    }

    #[test]
    fn test_failures_advise_caution() {
        assert!(AnalysisResult::timeout(Mode::Cloud, 0).analysis.contains("caution"));
        assert!(AnalysisResult::error(Mode::Local, 0, "boom").analysis.contains("caution"));
        assert!(!AnalysisResult::error(Mode::Local, 0, "boom").is_malicious);
    }

    #[test]
    fn test_result_wire_shape() {
        let result = AnalysisResult::quota_exceeded(Mode::Cloud, 10);
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["judgment"], "QUOTA_EXCEEDED");
        assert_eq!(value["isMalicious"], false);
        assert_eq!(value["contentLength"], 10);
        assert_eq!(value["mode"], "cloud");
    }

    #[test]
    fn test_tab_status_placeholder() {
        let status = TabStatus::from(None);
        assert!(!status.scanned);
        assert!(status.result.is_none());

        let stored = StoredDetection::new(AnalysisResult::skipped(Mode::Cloud, 0), "https://a.test");
        let status = TabStatus::from(Some(stored));
        assert!(status.scanned);
        assert_eq!(status.url.as_deref(), Some("https://a.test"));
    }
}
