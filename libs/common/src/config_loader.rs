//! Configuration loading helper functions
//!
//! Configuration is read once at startup: a single file (format chosen by
//! extension) overlaid with prefixed environment variables.

use std::path::Path;

use errors::{SimError, SimResult};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::Deserialize;
use tracing::debug;

/// Build the figment for `path` plus `{env_prefix}` environment overrides
///
/// Nested keys in the environment are separated by `__`, e.g.
/// `OSTSRV_NETWORK__PORT=20001`.
pub fn build_figment<P: AsRef<Path>>(path: P, env_prefix: &str) -> SimResult<Figment> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SimError::Configuration(format!(
            "Config file not found: {}",
            path.display()
        )));
    }

    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| SimError::Configuration("Config file must have an extension".to_string()))?;

    let figment = match extension {
        "toml" => Figment::new().merge(Toml::file(path)),
        "yaml" | "yml" => Figment::new().merge(Yaml::file(path)),
        "json" => Figment::new().merge(Json::file(path)),
        _ => {
            return Err(SimError::Configuration(format!(
                "Unsupported config file format: {}",
                extension
            )))
        },
    };

    debug!("Config: {} (env prefix {})", path.display(), env_prefix);
    Ok(figment.merge(Env::prefixed(env_prefix).split("__")))
}

/// Load configuration from a specific file with environment overrides
pub fn load_config_from_file<T, P>(path: P, env_prefix: &str) -> SimResult<T>
where
    T: for<'de> Deserialize<'de>,
    P: AsRef<Path>,
{
    build_figment(path, env_prefix)?
        .extract()
        .map_err(|e| SimError::Configuration(format!("Failed to load configuration: {}", e)))
}
