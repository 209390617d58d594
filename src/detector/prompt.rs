//! Prompts for the on-device classifier.

/// Page text beyond this is not included in a prompt; small local models
/// have short context windows.
const PROMPT_CONTENT_CHARS: usize = 6_000;

pub fn phishing_system_prompt() -> &'static str {
    r#"You are a security assistant that detects phishing and social-engineering web pages.

Judge whether the page tries to trick the reader into:
- Entering credentials, payment details or one-time codes on a look-alike site
- Installing software or browser extensions under false pretences
- Acting urgently because of fake account suspensions, prizes or invoices
- Contacting fake support numbers or paying with gift cards or crypto

Ordinary login pages of the real service, news, shops and documentation are safe.

Respond with valid JSON only, in this format:
{"is_malicious": true|false, "analysis": "One or two sentences explaining the verdict"}"#
}

/// Formats the user prompt for a page.
pub fn format_page_prompt(url: &str, content: &str) -> String {
    let excerpt: String = content.chars().take(PROMPT_CONTENT_CHARS).collect();
    format!(
        "{}\n\nURL: {}\n\nPage text:\n---\n{}\n---",
        phishing_system_prompt(),
        url,
        excerpt
    )
}
