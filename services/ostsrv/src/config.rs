//! Outstation configuration
//!
//! Loaded once at startup from `config/device.yaml` (or `--config`), overlaid
//! with `OSTSRV_`-prefixed environment variables. Every field has a default
//! so a minimal file only names what differs.

use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use errors::{SimError, SimResult};
use outsim_model::{DatabaseSizes, TankParams};
use serde::{Deserialize, Serialize};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "OSTSRV_";

/// Actuator and read channels the tank binds to (fill/drain, level/temperature)
const TANK_BINDINGS: u16 = 2;

// ============================================================================
// Defaults
// ============================================================================

fn default_listen_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    20000
}
fn default_local_addr() -> u16 {
    10
}
fn default_remote_addr() -> u16 {
    1
}
fn default_response_timeout_ms() -> u64 {
    5000
}
fn default_event_buffer_size() -> usize {
    100
}
fn default_true() -> bool {
    true
}
fn default_select_timeout_ms() -> u64 {
    10_000
}
fn default_counter_modulus() -> u32 {
    1_000_000
}
fn default_outbound_queue() -> usize {
    256
}
fn default_dt_ms() -> u64 {
    200
}

// ============================================================================
// Sections
// ============================================================================

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OstsrvConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub database: DatabaseSizes,
    #[serde(default)]
    pub outstation: OutstationParams,
    #[serde(default)]
    pub process: ProcessConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen_ip")]
    pub listen_ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_ip: default_listen_ip(),
            port: default_port(),
        }
    }
}

/// Link layer addressing and timers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// This outstation's link address
    #[serde(default = "default_local_addr")]
    pub local_addr: u16,
    /// The master's link address
    #[serde(default = "default_remote_addr")]
    pub remote_addr: u16,
    /// Send a link status frame after this much inbound silence; unset disables
    #[serde(default)]
    pub keep_alive_timeout_ms: Option<u64>,
    #[serde(default = "default_response_timeout_ms")]
    pub response_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            local_addr: default_local_addr(),
            remote_addr: default_remote_addr(),
            keep_alive_timeout_ms: None,
            response_timeout_ms: default_response_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstationParams {
    #[serde(default = "default_event_buffer_size")]
    pub event_buffer_size: usize,
    #[serde(default = "default_true")]
    pub allow_unsolicited: bool,
    /// Operate only after a matching select
    #[serde(default = "default_true")]
    pub require_select: bool,
    #[serde(default = "default_select_timeout_ms")]
    pub select_timeout_ms: u64,
    #[serde(default = "default_counter_modulus")]
    pub counter_modulus: u32,
    /// Capacity of the engine -> session update queue
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for OutstationParams {
    fn default() -> Self {
        Self {
            event_buffer_size: default_event_buffer_size(),
            allow_unsolicited: true,
            require_select: true,
            select_timeout_ms: default_select_timeout_ms(),
            counter_modulus: default_counter_modulus(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Scheduler tick period
    #[serde(default = "default_dt_ms")]
    pub dt_ms: u64,
    #[serde(default)]
    pub tank: TankParams,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            dt_ms: default_dt_ms(),
            tank: TankParams::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Overrides `--log-level` when set
    #[serde(default)]
    pub level: Option<String>,
    /// Log root; `OUTSIM_LOG_DIR` still wins
    #[serde(default)]
    pub dir: Option<String>,
    #[serde(default)]
    pub json: bool,
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            dir: None,
            json: false,
            file: true,
        }
    }
}

// ============================================================================
// Loading & validation
// ============================================================================

impl OstsrvConfig {
    /// Load from file plus environment, then validate
    pub fn load<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let config: Self = common::load_config_from_file(path, ENV_PREFIX)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> SimResult<()> {
        self.listen_addr()?;

        let db = &self.database;
        if db.binary_outputs == 0 {
            return Err(SimError::invalid_config(
                "database.binary_outputs",
                "must be greater than 0",
            ));
        }
        if db.binary_outputs < TANK_BINDINGS {
            return Err(SimError::invalid_config(
                "database.binary_outputs",
                format!("must cover the {} tank valves", TANK_BINDINGS),
            ));
        }
        if db.counters == 0 {
            return Err(SimError::invalid_config(
                "database.counters",
                "must be greater than 0",
            ));
        }
        if db.analog_inputs < TANK_BINDINGS {
            return Err(SimError::invalid_config(
                "database.analog_inputs",
                format!("must cover the {} tank read channels", TANK_BINDINGS),
            ));
        }

        if self.link.local_addr == self.link.remote_addr {
            return Err(SimError::invalid_config(
                "link.remote_addr",
                "must differ from link.local_addr",
            ));
        }
        if self.link.response_timeout_ms == 0 {
            return Err(SimError::invalid_config(
                "link.response_timeout_ms",
                "must be greater than 0",
            ));
        }
        if self.link.keep_alive_timeout_ms == Some(0) {
            return Err(SimError::invalid_config(
                "link.keep_alive_timeout_ms",
                "must be greater than 0 (omit to disable)",
            ));
        }

        let os = &self.outstation;
        if os.counter_modulus == 0 {
            return Err(SimError::invalid_config(
                "outstation.counter_modulus",
                "must be greater than 0",
            ));
        }
        if os.outbound_queue == 0 {
            return Err(SimError::invalid_config(
                "outstation.outbound_queue",
                "must be greater than 0",
            ));
        }

        if self.process.dt_ms == 0 {
            return Err(SimError::invalid_config(
                "process.dt_ms",
                "must be greater than 0",
            ));
        }
        let tank = &self.process.tank;
        for (field, value) in [
            ("process.tank.fill_rate", tank.fill_rate),
            ("process.tank.drain_rate", tank.drain_rate),
            ("process.tank.leak_rate", tank.leak_rate),
            ("process.tank.noise", tank.noise),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SimError::invalid_config(
                    field,
                    format!("must be a non-negative number, got {}", value),
                ));
            }
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> SimResult<SocketAddr> {
        let ip: IpAddr = self.network.listen_ip.parse().map_err(|e| {
            SimError::invalid_config(
                "network.listen_ip",
                format!("'{}': {}", self.network.listen_ip, e),
            )
        })?;
        Ok(SocketAddr::new(ip, self.network.port))
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.process.dt_ms)
    }

    pub fn select_timeout(&self) -> Duration {
        Duration::from_millis(self.outstation.select_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.link.response_timeout_ms)
    }

    pub fn keep_alive(&self) -> Option<Duration> {
        self.link.keep_alive_timeout_ms.map(Duration::from_millis)
    }
}
