//! Logging utilities
//!
//! Provides logging configuration and helpers.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a log filter that overrides the CLI level
pub const LOG_ENV: &str = "KYC_APITEST_LOG";

/// Log level configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

/// Filter directive for the crate at `level`, unless `override_spec` supplies one
///
/// A bare level name in the override (e.g. `debug`) applies to this crate;
/// anything else is taken as a full filter directive.
fn filter_directive(level: LogLevel, override_spec: Option<&str>) -> String {
    match override_spec.map(str::trim).filter(|s| !s.is_empty()) {
        Some(spec) => match LogLevel::from_str(spec) {
            Some(level) => format!("kyc_apitest={}", level.to_tracing_level()),
            None => spec.to_string(),
        },
        None => format!("kyc_apitest={}", level.to_tracing_level()),
    }
}

/// Initialize the logger with specified level
pub fn init_logger(level: LogLevel) {
    let override_spec = std::env::var(LOG_ENV).ok();
    let filter = EnvFilter::try_new(filter_directive(level, override_spec.as_deref()))
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level, None)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        assert_eq!(LogLevel::from_str("info"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("unknown"), None);
    }

    #[test]
    fn test_filter_directive() {
        assert_eq!(
            filter_directive(LogLevel::from_verbose(false), None),
            "kyc_apitest=INFO"
        );
        assert_eq!(
            filter_directive(LogLevel::from_verbose(true), None),
            "kyc_apitest=DEBUG"
        );
        assert_eq!(
            filter_directive(LogLevel::Info, Some("warn")),
            "kyc_apitest=WARN"
        );
        assert_eq!(
            filter_directive(LogLevel::Info, Some("kyc_apitest=trace,reqwest=debug")),
            "kyc_apitest=trace,reqwest=debug"
        );
        assert_eq!(filter_directive(LogLevel::Warn, Some("  ")), "kyc_apitest=WARN");
    }
}
