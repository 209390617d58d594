//! Tracing setup.
//!
//! Logs go to stderr: when running as a native messaging host, stdout is the
//! message channel and any stray byte there corrupts the framing.

use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "PHISHSCAN_LOG";

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "phishscan=debug,info"
    } else {
        "info"
    }
}

/// Installs the global subscriber. Calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_does_not_panic() {
        init(false);
        init(true);
    }

    #[test]
    fn test_verbose_directive_parses() {
        assert!(default_directive(true).parse::<EnvFilter>().is_ok());
    }
}
