use super::extract_json_object;
use super::prompt::format_page_prompt;
use crate::config::LocalConfig;
use crate::error::DetectorError;
use crate::model::{AvailabilityStatus, Detection, Mode};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Classifier served by an on-device inference runtime (Ollama-compatible API).
pub struct LocalDetector {
    client: reqwest::Client,
    config: LocalConfig,
}

impl LocalDetector {
    pub fn new(config: LocalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.endpoint.trim_end_matches('/'), path)
    }

    fn method(&self) -> String {
        format!("local:{}", self.config.model)
    }
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    format: &'a str,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct LocalVerdict {
    #[serde(alias = "isMalicious")]
    is_malicious: bool,
    #[serde(default)]
    analysis: Option<String>,
}

/// True when `name` refers to the configured model, with or without a tag.
fn model_matches(name: &str, model: &str) -> bool {
    name == model
        || (!model.contains(':') && name.split(':').next() == Some(model))
}

fn parse_verdict(text: &str) -> Result<LocalVerdict, DetectorError> {
    let json = extract_json_object(text)
        .ok_or_else(|| DetectorError::Parse("model output contained no JSON object".to_string()))?;
    serde_json::from_str(json).map_err(|e| DetectorError::Parse(e.to_string()))
}

#[async_trait]
impl super::Detector for LocalDetector {
    fn name(&self) -> &'static str {
        "Local model"
    }

    fn mode(&self) -> Mode {
        Mode::Local
    }

    async fn initialize(&self) -> AvailabilityStatus {
        let response = match self.client.get(self.url("/api/tags")).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!("Local inference runtime unreachable: {}", e);
                return AvailabilityStatus::ApiNotAvailable;
            }
        };

        if !response.status().is_success() {
            return AvailabilityStatus::No;
        }

        match response.json::<TagsResponse>().await {
            Ok(tags) => {
                if tags
                    .models
                    .iter()
                    .any(|tag| model_matches(&tag.name, &self.config.model))
                {
                    AvailabilityStatus::Readily
                } else {
                    AvailabilityStatus::AfterDownload
                }
            }
            Err(e) => {
                warn!("Unexpected model listing from local runtime: {}", e);
                AvailabilityStatus::Error
            }
        }
    }

    async fn analyze(&self, content: &str, url: &str) -> Result<Detection, DetectorError> {
        let request = GenerateRequest {
            model: &self.config.model,
            prompt: format_page_prompt(url, content),
            stream: false,
            format: "json",
            options: GenerateOptions { temperature: 0.0 },
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::NOT_FOUND => {
                return Err(DetectorError::Unavailable(format!(
                    "model {} is not downloaded",
                    self.config.model
                )))
            }
            status => {
                return Err(DetectorError::Unavailable(format!(
                    "local runtime returned HTTP {}",
                    status
                )))
            }
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| DetectorError::Parse(e.to_string()))?;
        let verdict = parse_verdict(&generated.response)?;

        Ok(Detection {
            is_malicious: verdict.is_malicious,
            analysis: verdict
                .analysis
                .unwrap_or_else(|| "No explanation provided".to_string()),
            method: self.method(),
        })
    }
}
