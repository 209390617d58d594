use crate::config::CloudConfig;
use crate::error::DetectorError;
use crate::model::{AvailabilityStatus, Detection, Mode};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub struct CloudDetector {
    client: reqwest::Client,
    config: CloudConfig,
    api_key: Option<String>,
    install_id: Option<String>,
}

impl CloudDetector {
    pub fn new(config: CloudConfig, install_id: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs.max(1)))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            api_key: config.resolved_api_key(),
            config,
            install_id,
        }
    }

    fn method(&self) -> String {
        format!("cloud:{}", self.config.model)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CloudRequest<'a> {
    url: &'a str,
    content: &'a str,
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    install_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct CloudVerdict {
    #[serde(alias = "isMalicious")]
    is_malicious: bool,
    #[serde(default)]
    analysis: Option<String>,
}

/// Maps a non-success HTTP status to the matching failure.
fn status_error(status: StatusCode) -> DetectorError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => DetectorError::QuotaExceeded,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => DetectorError::InvalidApiKey,
        other => DetectorError::Unavailable(format!("cloud API returned HTTP {}", other)),
    }
}

#[async_trait]
impl super::Detector for CloudDetector {
    fn name(&self) -> &'static str {
        "Cloud API"
    }

    fn mode(&self) -> Mode {
        Mode::Cloud
    }

    async fn initialize(&self) -> AvailabilityStatus {
        if self.api_key.is_some() {
            AvailabilityStatus::Readily
        } else {
            AvailabilityStatus::ConfigureRequired
        }
    }

    async fn analyze(&self, content: &str, url: &str) -> Result<Detection, DetectorError> {
        let api_key = self.api_key.as_deref().ok_or(DetectorError::NotConfigured)?;

        let body = CloudRequest {
            url,
            content,
            model: &self.config.model,
            install_id: self.install_id.as_deref(),
        };

        debug!(url, chars = content.chars().count(), "Sending page to cloud classifier");

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        let verdict: CloudVerdict = response
            .json()
            .await
            .map_err(|e| DetectorError::Parse(e.to_string()))?;

        Ok(Detection {
            is_malicious: verdict.is_malicious,
            analysis: verdict
                .analysis
                .unwrap_or_else(|| "No explanation provided".to_string()),
            method: self.method(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::Detector;

    fn config_with_key(key: Option<&str>) -> CloudConfig {
        CloudConfig {
            api_key: key.map(str::to_string),
            ..CloudConfig::default()
        }
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS),
            DetectorError::QuotaExceeded
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED),
            DetectorError::InvalidApiKey
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY),
            DetectorError::Unavailable(_)
        ));
    }

    #[test]
    fn test_verdict_accepts_both_field_spellings() {
        let snake: CloudVerdict =
            serde_json::from_str(r#"{"is_malicious": true, "analysis": "fake bank"}"#).unwrap();
        assert!(snake.is_malicious);

        let camel: CloudVerdict = serde_json::from_str(r#"{"isMalicious": false}"#).unwrap();
        assert!(!camel.is_malicious);
        assert!(camel.analysis.is_none());
    }

    #[tokio::test]
    async fn test_initialize_reports_configuration() {
        let configured = CloudDetector::new(config_with_key(Some("sk-test")), None);
        assert_eq!(configured.initialize().await, AvailabilityStatus::Readily);
        assert_eq!(configured.method(), "cloud:phishscan-cloud-1");
    }

    #[tokio::test]
    async fn test_analyze_without_key_is_not_configured() {
        let detector = CloudDetector {
            client: reqwest::Client::new(),
            config: CloudConfig::default(),
            api_key: None,
            install_id: None,
        };

        assert_eq!(detector.initialize().await, AvailabilityStatus::ConfigureRequired);
        let err = detector.analyze("text", "https://a.test").await.unwrap_err();
        assert!(matches!(err, DetectorError::NotConfigured));
    }
}
