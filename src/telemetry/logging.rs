use tracing::Level;
use tracing_subscriber::{
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::config::TelemetryConfig;
use crate::error::Error;
use crate::types::Result;

/// Parse a configured log level, defaulting to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize the logging system
pub fn init_logging(config: &TelemetryConfig) -> Result<()> {
    let log_level = parse_level(&config.log_level);

    // RUST_LOG directives still apply on top of the configured level
    let filter = EnvFilter::from_default_env()
        .add_directive(LevelFilter::from_level(log_level).into());

    let registry = Registry::default().with(filter);
    let result = if config.structured_logging {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    };

    result.map_err(|e| Error::Internal(format!("Failed to set global default subscriber: {}", e)))
}

/// Create a test logging subscriber
#[cfg(test)]
pub fn init_test_logging() {
    let filter = EnvFilter::from_default_env().add_directive(LevelFilter::DEBUG.into());

    let fmt_layer = fmt::layer()
        .with_test_writer()
        .with_target(true)
        .with_ansi(false);

    // Several tests may race to install it
    let _ = Registry::default().with(filter).with(fmt_layer).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_second_init_reports_error() {
        init_test_logging();
        let err = init_logging(&TelemetryConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
