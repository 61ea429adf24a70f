//! Logging setup utilities.
//!
//! focus-guard emits structured events through the `tracing` crate; this
//! module provides an optional one-call subscriber setup for applications
//! that do not configure their own.

use tracing::Level;

/// Configuration for the built-in logging setup.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level for the application as a whole
    pub level: Level,
    /// Log level for focus-guard components specifically
    pub guard_level: Level,
    /// Whether to emit JSON-formatted log lines
    pub json_format: bool,
    /// Environment filter override; when set, the levels above are ignored
    pub env_filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            guard_level: Level::DEBUG,
            json_format: false,
            env_filter: None,
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration for production use: warnings only, JSON out.
    pub fn production() -> Self {
        Self {
            level: Level::WARN,
            guard_level: Level::INFO,
            json_format: true,
            env_filter: None,
        }
    }

    /// Creates a verbose configuration for development.
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            guard_level: Level::DEBUG,
            json_format: false,
            env_filter: None,
        }
    }

    /// Sets the application log level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets whether to use JSON output format.
    pub fn with_json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }

    /// Sets a custom environment filter.
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Builds the environment filter string.
    pub fn env_filter(&self) -> String {
        if let Some(ref filter) = self.env_filter {
            filter.clone()
        } else {
            format!(
                "{},focus_guard={}",
                self.level.as_str().to_lowercase(),
                self.guard_level.as_str().to_lowercase()
            )
        }
    }
}

/// Initializes a global `tracing` subscriber from the given configuration.
///
/// Returns an error if a global subscriber is already installed.
///
/// # Examples
///
/// ```rust,no_run
/// use focus_guard::logging::{init_logging, LoggingConfig};
///
/// init_logging(LoggingConfig::development()).unwrap();
/// ```
pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

    let fmt_layer = if config.json_format {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_scopes_crate_level() {
        let config = LoggingConfig::default();
        assert_eq!(config.env_filter(), "info,focus_guard=debug");
    }

    #[test]
    fn test_custom_filter_wins() {
        let config = LoggingConfig::default().with_env_filter("warn");
        assert_eq!(config.env_filter(), "warn");
    }

    #[test]
    fn test_production_profile() {
        let config = LoggingConfig::production();
        assert_eq!(config.level, Level::WARN);
        assert!(config.json_format);
    }
}
