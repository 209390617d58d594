use super::ScanReport;
use crate::ignore::IgnoreRule;
use crate::model::{Availability, Judgment};
use anyhow::Result;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct PageRow {
    #[tabled(rename = "Verdict")]
    verdict: String,
    #[tabled(rename = "Page")]
    page: String,
    #[tabled(rename = "Method")]
    method: String,
    #[tabled(rename = "Analysis")]
    analysis: String,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Type")]
    rule_type: String,
    #[tabled(rename = "Pattern")]
    pattern: String,
    #[tabled(rename = "Added")]
    added: String,
}

pub fn print_cli_table(report: &ScanReport) -> Result<()> {
    println!();
    println!(
        "Scan completed at: {}",
        report.scan_time.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!();

    if report.pages.is_empty() {
        println!("No pages scanned.");
        return Ok(());
    }

    let mut pages: Vec<_> = report.pages.iter().collect();
    pages.sort_by_key(|p| verdict_rank(p.result.judgment));

    let rows: Vec<PageRow> = pages
        .iter()
        .map(|p| PageRow {
            verdict: format_judgment(p.result.judgment),
            page: truncate(&p.source, 50),
            method: p.result.method.clone(),
            analysis: truncate(&p.result.analysis, 60),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);

    println!();
    print_summary(report);

    Ok(())
}

pub fn print_ignore_rules(rules: &[IgnoreRule]) {
    if rules.is_empty() {
        println!("No ignore rules.");
        return;
    }

    let rows: Vec<RuleRow> = rules
        .iter()
        .enumerate()
        .map(|(index, rule)| RuleRow {
            index,
            rule_type: rule.rule_type.as_str().to_string(),
            pattern: truncate(&rule.pattern, 60),
            added: rule.added_at.format("%Y-%m-%d %H:%M").to_string(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn print_availability(availability: &Availability) {
    let indicator = if availability.available { "ready" } else { "not ready" };
    println!("Mode:         {}", availability.mode.display_name());
    println!("Status:       {} ({})", availability.status, indicator);

    match availability.status.as_str() {
        "configure-required" => {
            println!();
            println!("Set cloud.api_key in the config file or export PHISHSCAN_API_KEY.");
        }
        "after-download" => {
            println!();
            println!("The local model has not been downloaded yet.");
        }
        "api-not-available" => {
            println!();
            println!("No local inference runtime is listening on the configured endpoint.");
        }
        _ => {}
    }
}

fn verdict_rank(judgment: Judgment) -> u8 {
    match judgment {
        Judgment::Threat => 0,
        Judgment::Error
        | Judgment::Timeout
        | Judgment::ConfigurationError
        | Judgment::QuotaExceeded => 1,
        Judgment::Safe => 2,
        Judgment::Skipped | Judgment::Ignored => 3,
    }
}

fn format_judgment(judgment: Judgment) -> String {
    match judgment {
        Judgment::Threat => "THREAT".to_string(),
        Judgment::Safe => "safe".to_string(),
        Judgment::Skipped | Judgment::Ignored => judgment.as_str().to_lowercase(),
        other => format!("{} (caution)", other.as_str().to_lowercase()),
    }
}

fn print_summary(report: &ScanReport) {
    let threats = report.threats();
    let failures = report.failures();
    let safe = report.count(Judgment::Safe);

    println!(
        "Summary: {} pages, {} threats, {} safe, {} could not be analysed",
        report.pages.len(),
        threats,
        safe,
        failures
    );

    if threats > 0 {
        println!("Do not enter credentials or payment details on pages flagged as THREAT.");
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    let flat = s.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let kept: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ééééééééééé", 6), "ééé...");
        assert_eq!(truncate("line\nbreak", 20), "line break");
    }

    #[test]
    fn test_threats_sort_first() {
        assert!(verdict_rank(Judgment::Threat) < verdict_rank(Judgment::Timeout));
        assert!(verdict_rank(Judgment::Timeout) < verdict_rank(Judgment::Safe));
    }

    #[test]
    fn test_failures_are_marked_for_caution() {
        assert_eq!(format_judgment(Judgment::Timeout), "timeout (caution)");
        assert_eq!(format_judgment(Judgment::Ignored), "ignored");
    }
}
