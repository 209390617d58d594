//! Messages exchanged with the browser extension.
//!
//! Every message is a JSON object with a `type` field. Requests may carry a
//! numeric `id`, which is echoed on the matching response.
//!
//! ```json
//! {"id": 7, "type": "scan", "tabId": 12, "url": "https://a.test/", "content": "..."}
//! {"id": 7, "type": "result", "result": {"isMalicious": false, "judgment": "SAFE", ...}}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::HostError;
use crate::ignore::{IgnoreRule, RuleType};
use crate::model::{AnalysisResult, Availability, Mode, ScanRequest, TabId, TabStatus};
use crate::notify::Badge;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Scan(ScanRequest),
    SetMode {
        mode: Mode,
    },
    GetStatus {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
    ClearTabCache {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
    CheckAvailability,
    TabClosed {
        #[serde(rename = "tabId")]
        tab_id: TabId,
    },
    NavigationStarted {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    IgnoreAdd {
        pattern: String,
        #[serde(rename = "ruleType")]
        rule_type: RuleType,
    },
    IgnoreRemove {
        index: usize,
    },
    IgnoreList,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    Result {
        result: AnalysisResult,
    },
    Mode {
        mode: Mode,
    },
    Status {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        status: TabStatus,
    },
    CacheCleared {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        removed: usize,
    },
    Availability(Availability),
    IgnoreRules {
        rules: Vec<IgnoreRule>,
    },
    IgnoreAdded {
        added: bool,
    },
    IgnoreRemoved {
        #[serde(skip_serializing_if = "Option::is_none")]
        removed: Option<IgnoreRule>,
    },
    Ack,
    Badge {
        #[serde(rename = "tabId")]
        tab_id: TabId,
        badge: Badge,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(flatten)]
    pub body: Outbound,
}

/// A frame that could not be turned into an [`Inbound`] message.
#[derive(Debug)]
pub struct DecodeError {
    pub id: Option<u64>,
    pub error: HostError,
}

/// Decodes one frame, keeping the request id even when the body is invalid
/// so the error can be routed back to the caller.
pub fn decode(frame: &[u8]) -> Result<(Option<u64>, Inbound), DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(frame).map_err(|e| DecodeError {
        id: None,
        error: e.into(),
    })?;
    let id = value.get("id").and_then(serde_json::Value::as_u64);
    let message = serde_json::from_value(value).map_err(|e| DecodeError {
        id,
        error: e.into(),
    })?;
    Ok((id, message))
}
