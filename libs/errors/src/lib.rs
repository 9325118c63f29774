//! Unified error handling for the outstation simulator
//!
//! One error type shared by the point database, the command path, the update
//! scheduler and the protocol session. Only configuration and startup errors
//! are allowed to terminate the process; everything else is logged and
//! recovered where it happens.

use thiserror::Error;

// ============================================================================
// SimError - Main error type
// ============================================================================

/// Main error type for all simulator crates
#[derive(Debug, Error)]
pub enum SimError {
    // ======================================
    // Point Database Errors
    // ======================================
    #[error("Index out of range: {point_type}[{index}]")]
    IndexOutOfRange { point_type: String, index: u16 },

    #[error("Data type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    // ======================================
    // Command Errors
    // ======================================
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    // ======================================
    // Transport & Process Errors
    // ======================================
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Process adapter failure: {0}")]
    AdapterFailure(String),

    // ======================================
    // Configuration Errors
    // ======================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    // ======================================
    // File & I/O Errors
    // ======================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using SimError
pub type SimResult<T> = Result<T, SimError>;

impl SimError {
    pub fn index_out_of_range(point_type: impl ToString, index: u16) -> Self {
        Self::IndexOutOfRange {
            point_type: point_type.to_string(),
            index,
        }
    }

    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::TransportFailure(msg.into())
    }

    pub fn adapter(msg: impl Into<String>) -> Self {
        Self::AdapterFailure(msg.into())
    }

    /// Stable machine-readable code for logs and negative responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::IndexOutOfRange { .. } => "INDEX_OUT_OF_RANGE",
            Self::TypeMismatch { .. } => "TYPE_MISMATCH",
            Self::UnsupportedOperation(_) => "UNSUPPORTED_OPERATION",
            Self::TransportFailure(_) => "TRANSPORT_FAILURE",
            Self::AdapterFailure(_) => "ADAPTER_FAILURE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::InvalidConfig { .. } => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the engine keeps running after this error.
    ///
    /// Only configuration problems are fatal, and only at startup.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_) | Self::InvalidConfig { .. })
    }
}

// Conversion traits for common error types
impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<figment::Error> for SimError {
    fn from(err: figment::Error) -> Self {
        Self::Configuration(err.to_string())
    }
}

// Helper macros for creating errors
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::SimError::Configuration($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::SimError::Configuration(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::SimError::TransportFailure($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::SimError::TransportFailure(format!($fmt, $($arg)*))
    };
}
