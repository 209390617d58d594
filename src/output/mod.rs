mod cli;
mod json;

pub use cli::{print_availability, print_cli_table, print_ignore_rules};
pub use json::print_json;

use crate::model::{AnalysisResult, Judgment};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Output format for scan reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON format for programmatic use
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

/// One analysed page in a CLI scan.
#[derive(Debug, Clone, Serialize)]
pub struct PageReport {
    /// URL or file path the text came from
    pub source: String,
    pub result: AnalysisResult,
}

/// Results of a CLI scan over one or more pages.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub scan_time: DateTime<Utc>,
    pub pages: Vec<PageReport>,
}

impl ScanReport {
    pub fn new(pages: Vec<PageReport>) -> Self {
        Self {
            scan_time: Utc::now(),
            pages,
        }
    }

    pub fn count(&self, judgment: Judgment) -> usize {
        self.pages
            .iter()
            .filter(|p| p.result.judgment == judgment)
            .count()
    }

    pub fn threats(&self) -> usize {
        self.count(Judgment::Threat)
    }

    pub fn failures(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.result.judgment.is_failure())
            .count()
    }
}

pub fn print_report(report: &ScanReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => print_cli_table(report),
        OutputFormat::Json => print_json(report),
    }
}
