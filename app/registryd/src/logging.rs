//! Log output of the daemon.

use tracing_subscriber::EnvFilter;

/// Filter directive for the daemon: `debug` when `verbose`, else the
/// configured level.
#[must_use]
pub fn default_directive(configured: &str, verbose: bool) -> String {
    if verbose {
        return "debug".to_string();
    }
    let configured = configured.trim();
    if configured.is_empty() { "info".to_string() } else { configured.to_string() }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `directive`. Later calls are ignored.
pub fn init(directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"))
    });

    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(false).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_forces_debug() {
        assert_eq!(default_directive("warn", true), "debug");
    }

    #[test]
    fn test_configured_level_is_used() {
        assert_eq!(default_directive("warn", false), "warn");
        assert_eq!(default_directive("registryd_lib=trace", false), "registryd_lib=trace");
    }

    #[test]
    fn test_blank_level_falls_back_to_info() {
        assert_eq!(default_directive("  ", false), "info");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        init("info");
        init("debug");
    }
}
