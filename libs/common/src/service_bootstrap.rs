//! Service identity and startup banner

/// Basic service information printed at startup
#[derive(Debug, Clone)]
pub struct ServiceInfo {
    /// Service name (e.g., "ostsrv")
    pub name: String,
    /// Service version from Cargo.toml
    pub version: String,
    /// Service description
    pub description: String,
}

impl ServiceInfo {
    /// Create new service info
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            description: description.into(),
        }
    }
}

/// Print startup banner
pub fn print_startup_banner(service: &ServiceInfo) {
    let banner = r#"
  ___  ___ _____ ___ ___ _   __
 / _ \/ __|_   _/ __| _ \ \ / /
| (_) \__ \ | | \__ \   /\ V /
 \___/|___/ |_| |___/_|_\ \_/
"#;
    println!("{}", banner);
    println!("  {} v{}", service.name, service.version);
    println!("  {}", service.description);
    println!();
}
