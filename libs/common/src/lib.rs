//! Outstation simulator basic library
//!
//! Provides basic functions shared by the simulator crates, including:
//! - logging bootstrap
//! - configuration file loading
//! - shutdown signal handling
//! - command-line arguments and startup banner

pub mod bootstrap_args;
pub mod config_loader;
pub mod logging;
pub mod service_bootstrap;
pub mod shutdown;

pub use bootstrap_args::ServiceArgs;
pub use config_loader::load_config_from_file;
pub use service_bootstrap::ServiceInfo;

// Re-export common dependencies
pub use tokio;
pub use tokio_util::sync::CancellationToken;
