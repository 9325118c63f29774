//! Common command-line arguments for the simulator services
//!
//! Services parse their own `clap` argument struct and convert it into
//! [`ServiceArgs`] so the shared bootstrap code does not depend on `clap`.

use std::path::PathBuf;

/// Common service startup arguments
#[derive(Debug, Clone)]
pub struct ServiceArgs {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Configuration file path
    pub config_path: PathBuf,

    /// Disable colored output (useful for log files)
    pub no_color: bool,

    /// Only validate configuration without starting service
    pub validate: bool,
}

impl Default for ServiceArgs {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            config_path: PathBuf::from("config/device.yaml"),
            no_color: false,
            validate: false,
        }
    }
}

impl ServiceArgs {
    /// Parse log level string to tracing::Level
    pub fn parse_log_level(&self) -> tracing::Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => tracing::Level::TRACE,
            "debug" => tracing::Level::DEBUG,
            "warn" | "warning" => tracing::Level::WARN,
            "error" => tracing::Level::ERROR,
            _ => tracing::Level::INFO,
        }
    }
}
