//! Notifications to the presentation layer.
//!
//! The coordinator reports committed results and cleared tabs through a
//! [`Notifier`]; the native host forwards them to the extension, which paints
//! the toolbar badge described by [`Badge`].

use serde::{Deserialize, Serialize};

use crate::model::{AnalysisResult, Judgment, TabId};

pub trait Notifier: Send + Sync {
    /// A result was committed for a tab.
    fn result_committed(&self, tab_id: TabId, result: &AnalysisResult);

    /// A tab's stored result was dropped (navigation started).
    fn tab_cleared(&self, tab_id: TabId);
}

/// Notifier for contexts without a UI, such as one-shot CLI scans.
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn result_committed(&self, _tab_id: TabId, _result: &AnalysisResult) {}

    fn tab_cleared(&self, _tab_id: TabId) {}
}

/// Toolbar badge for a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    pub color: String,
}

const RED: &str = "#d93025";
const GREEN: &str = "#188038";
const AMBER: &str = "#f29900";
const GREY: &str = "#80868b";

impl Badge {
    fn new(text: &str, color: &str) -> Self {
        Self {
            text: text.to_string(),
            color: color.to_string(),
        }
    }

    pub fn for_result(result: &AnalysisResult) -> Self {
        match result.judgment {
            Judgment::Threat => Self::new("!", RED),
            Judgment::Safe => Self::new("✓", GREEN),
            Judgment::Error
            | Judgment::Timeout
            | Judgment::ConfigurationError
            | Judgment::QuotaExceeded => Self::new("?", AMBER),
            Judgment::Skipped | Judgment::Ignored => Self::cleared(),
        }
    }

    pub fn cleared() -> Self {
        Self::new("", GREY)
    }
}
