//! Tracing subscriber setup.

use quill_config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Pick the filter: `RUST_LOG` wins, then `-v`, then the configured level.
fn filter(verbose: bool, config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(fallback_directive(verbose, config)))
}

fn fallback_directive(verbose: bool, config: &LoggingConfig) -> &str {
    if verbose {
        "debug"
    } else {
        config.level.as_deref().unwrap_or("warn")
    }
}

/// Install the global subscriber. Logs go to stderr so they never interleave
/// with streamed model output on stdout.
pub fn init(verbose: bool, config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter(verbose, config))
        .with_target(false)
        .with_writer(std::io::stderr);

    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_configured_level() {
        let config = LoggingConfig {
            json: false,
            level: Some("info".into()),
        };
        assert_eq!(fallback_directive(true, &config), "debug");
        assert_eq!(fallback_directive(false, &config), "info");
        assert_eq!(fallback_directive(false, &LoggingConfig::default()), "warn");
    }
}
