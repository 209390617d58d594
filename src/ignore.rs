//! User-managed ignore rules.
//!
//! A page is exempt from analysis when:
//!
//! 1. It is one of the extension's own pages (always, not configurable)
//! 2. Its URL equals a `url` rule exactly
//! 3. Its hostname equals a `domain` rule
//!
//! Rules are checked in insertion order and the first match wins. A URL that
//! cannot be parsed never matches a `domain` rule, so a malformed address is
//! still scanned rather than silently skipped.

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// What an [`IgnoreRule`] pattern is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Url,
    Domain,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Url => "url",
            RuleType::Domain => "domain",
        }
    }
}

impl std::str::FromStr for RuleType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "url" => Ok(RuleType::Url),
            "domain" | "host" => Ok(RuleType::Domain),
            _ => Err(format!("Unknown rule type: {}. Use 'url' or 'domain'", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IgnoreRule {
    pub pattern: String,
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub added_at: DateTime<Utc>,
}

impl IgnoreRule {
    pub fn new(pattern: impl Into<String>, rule_type: RuleType) -> Self {
        Self {
            pattern: pattern.into(),
            rule_type,
            added_at: Utc::now(),
        }
    }

    fn matches(&self, url: &str, host: Option<&str>) -> bool {
        match self.rule_type {
            RuleType::Url => self.pattern == url,
            RuleType::Domain => host.map(|h| h == self.pattern).unwrap_or(false),
        }
    }
}

/// Lowercase hostname of a URL, if it has one.
pub fn hostname(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(|h| h.to_lowercase()))
}

/// Normalises user input for a domain rule: a full URL is reduced to its host.
fn normalize_domain(pattern: &str) -> String {
    hostname(pattern).unwrap_or_else(|| pattern.trim_end_matches('/').to_lowercase())
}

/// Ordered ignore rule list plus the built-in exemption for extension pages.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    extension_origin: String,
    rules: Vec<IgnoreRule>,
}

impl IgnoreRules {
    pub fn new(extension_origin: impl Into<String>, rules: Vec<IgnoreRule>) -> Self {
        Self {
            extension_origin: extension_origin.into(),
            rules,
        }
    }

    /// True for the extension's own settings and popup pages.
    pub fn is_internal(&self, url: &str) -> bool {
        !self.extension_origin.is_empty() && url.starts_with(&self.extension_origin)
    }

    pub fn should_ignore(&self, url: &str) -> bool {
        if self.is_internal(url) {
            return true;
        }

        let host = hostname(url);
        self.rules
            .iter()
            .any(|rule| rule.matches(url, host.as_deref()))
    }

    /// Appends a rule. Returns false for empty or duplicate patterns.
    pub fn add(&mut self, pattern: &str, rule_type: RuleType) -> bool {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return false;
        }

        let pattern = match rule_type {
            RuleType::Url => pattern.to_string(),
            RuleType::Domain => normalize_domain(pattern),
        };

        if self
            .rules
            .iter()
            .any(|r| r.rule_type == rule_type && r.pattern == pattern)
        {
            return false;
        }

        self.rules.push(IgnoreRule::new(pattern, rule_type));
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<IgnoreRule> {
        if index < self.rules.len() {
            Some(self.rules.remove(index))
        } else {
            None
        }
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "chrome-extension://abcdef/";

    fn rules(list: Vec<IgnoreRule>) -> IgnoreRules {
        IgnoreRules::new(ORIGIN, list)
    }

    #[test]
    fn test_extension_pages_always_ignored() {
        let rules = rules(vec![]);
        assert!(rules.should_ignore("chrome-extension://abcdef/settings.html"));
        assert!(rules.should_ignore("chrome-extension://abcdef/popup.html"));
        assert!(!rules.should_ignore("chrome-extension://other/popup.html"));
    }

    #[test]
    fn test_exact_url_rule() {
        let rules = rules(vec![IgnoreRule::new("https://a.test/login", RuleType::Url)]);
        assert!(rules.should_ignore("https://a.test/login"));
        assert!(!rules.should_ignore("https://a.test/login?next=/"));
        assert!(!rules.should_ignore("https://a.test/"));
    }

    #[test]
    fn test_domain_rule_matches_hostname_only() {
        let rules = rules(vec![IgnoreRule::new("mail.example.com", RuleType::Domain)]);
        assert!(rules.should_ignore("https://mail.example.com/inbox"));
        assert!(rules.should_ignore("http://MAIL.example.com:8080/"));
        assert!(!rules.should_ignore("https://example.com/"));
        assert!(!rules.should_ignore("https://evil-mail.example.com.attacker.test/"));
    }

    #[test]
    fn test_malformed_url_fails_open() {
        let rules = rules(vec![IgnoreRule::new("example.com", RuleType::Domain)]);
        assert!(!rules.should_ignore("not a url"));
        assert!(!rules.should_ignore("example.com"));
    }

    #[test]
    fn test_url_rule_wins_alongside_unrelated_domain_rules() {
        let url = "https://bank.test/statement";
        let first = rules(vec![
            IgnoreRule::new("other.test", RuleType::Domain),
            IgnoreRule::new(url, RuleType::Url),
        ]);
        let second = rules(vec![
            IgnoreRule::new(url, RuleType::Url),
            IgnoreRule::new("other.test", RuleType::Domain),
        ]);
        assert!(first.should_ignore(url));
        assert!(second.should_ignore(url));
    }

    #[test]
    fn test_add_normalizes_domains_and_rejects_duplicates() {
        let mut rules = rules(vec![]);
        assert!(rules.add("https://Docs.Example.com/path", RuleType::Domain));
        assert_eq!(rules.rules()[0].pattern, "docs.example.com");
        assert!(!rules.add("docs.example.com", RuleType::Domain));
        assert!(!rules.add("   ", RuleType::Url));
        assert!(rules.add("https://docs.example.com/path", RuleType::Url));
        assert_eq!(rules.rules().len(), 2);
    }

    #[test]
    fn test_remove_by_index() {
        let mut rules = rules(vec![]);
        rules.add("a.test", RuleType::Domain);
        rules.add("b.test", RuleType::Domain);

        let removed = rules.remove(0).unwrap();
        assert_eq!(removed.pattern, "a.test");
        assert_eq!(rules.rules()[0].pattern, "b.test");
        assert!(rules.remove(5).is_none());
    }

    #[test]
    fn test_rule_serializes_type_field() {
        let rule = IgnoreRule::new("a.test", RuleType::Domain);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["type"], "domain");
        assert!(value.get("addedAt").is_some());
    }
}
