//! Service bootstrap
//!
//! Command-line arguments and logging setup for the `ostsrv` binary.

use std::path::PathBuf;

use clap::Parser;
use errors::{SimError, SimResult};

use crate::config::LoggingConfig;
use common::service_bootstrap::ServiceInfo;

pub use common::bootstrap_args::ServiceArgs;

/// Command-line arguments for ostsrv
#[derive(Parser, Debug, Clone)]
#[command(
    name = "ostsrv",
    version = env!("CARGO_PKG_VERSION"),
    about = "Outstation simulator",
    long_about = None
)]
pub struct Args {
    /// Device configuration file (yaml, toml or json)
    #[arg(short = 'c', long, default_value = "config/device.yaml")]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    pub log_level: String,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Validation mode - only validate configuration without starting service
    #[arg(long)]
    pub validate: bool,
}

impl From<Args> for ServiceArgs {
    fn from(args: Args) -> Self {
        ServiceArgs {
            log_level: args.log_level,
            config_path: args.config,
            no_color: args.no_color,
            validate: args.validate,
        }
    }
}

/// Initialize logging from arguments and the `logging` config section
///
/// Log root directory priority:
/// 1. OUTSIM_LOG_DIR environment variable
/// 2. `logging.dir` from the device configuration
/// 3. Default "logs"
pub fn initialize_logging(
    args: &ServiceArgs,
    service_info: &ServiceInfo,
    logging: &LoggingConfig,
) -> SimResult<()> {
    common::logging::init_log_root(logging.dir.as_deref());

    let mut args = args.clone();
    if let Some(level) = &logging.level {
        args.log_level = level.clone();
    }

    let log_config = common::logging::LogConfig {
        service_name: service_info.name.clone(),
        log_dir: common::logging::get_log_root().join(&service_info.name),
        console_level: args.parse_log_level(),
        ansi: !args.no_color,
        enable_file: logging.file,
        enable_json: logging.json,
    };

    common::logging::init_with_config(log_config)
        .map_err(|e| SimError::Configuration(format!("Failed to init logging: {}", e)))
}
