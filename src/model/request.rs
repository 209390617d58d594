use super::{Mode, TabId};
use serde::{Deserialize, Serialize};

/// A scan trigger as sent by the content script.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub tab_id: TabId,
    pub url: String,
    pub content: String,
    /// Set when the content script already decided the page should not be
    /// scanned (e.g. a webmail inbox list view).
    #[serde(default)]
    pub skipped: bool,
}

impl ScanRequest {
    pub fn new(tab_id: TabId, url: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tab_id,
            url: url.into(),
            content: content.into(),
            skipped: false,
        }
    }

    pub fn skipped(mut self) -> Self {
        self.skipped = true;
        self
    }
}

/// A scan bound to the mode that was active when it was accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    pub tab_id: TabId,
    pub url: String,
    pub content: String,
    pub mode: Mode,
}

impl AnalysisRequest {
    pub fn from_scan(request: ScanRequest, mode: Mode) -> Self {
        Self {
            tab_id: request.tab_id,
            url: request.url,
            content: request.content,
            mode,
        }
    }

    /// Length of the page text in characters.
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }
}
