//! Configuration parsing and management

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Portal page settings
    #[serde(default)]
    pub portal: PortalConfig,

    /// Audit stream settings
    #[serde(default)]
    pub audit: AuditConfig,

    /// MAC resolver settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Gateway-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewayConfig {
    /// Address to bind the gateway server
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Portal page configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PortalConfig {
    /// Path to a custom consent page served verbatim. When absent, the
    /// embedded default page is used.
    pub page_path: Option<String>,
}

/// Audit stream configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuditConfig {
    /// CSV file recording every client contact
    #[serde(default = "default_connections_log")]
    pub connections_log: String,

    /// CSV file recording consent acceptances
    #[serde(default = "default_acceptances_log")]
    pub acceptances_log: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            connections_log: default_connections_log(),
            acceptances_log: default_acceptances_log(),
        }
    }
}

fn default_connections_log() -> String {
    "clients.csv".to_string()
}

fn default_acceptances_log() -> String {
    "accepts.csv".to_string()
}

/// MAC resolver configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResolverConfig {
    /// Whether to query the neighbor table at all. When false, every
    /// audit row carries an empty MAC.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Upper bound on a single neighbor-table lookup, in milliseconds
    #[serde(default = "default_resolver_timeout_ms")]
    pub timeout_ms: u64,
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_ms: default_resolver_timeout_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_resolver_timeout_ms() -> u64 {
    1000
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| Error::config(format!("Invalid TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.resolver.timeout_ms == 0 {
            return Err(Error::config("resolver.timeout_ms must be greater than 0"));
        }
        if self.audit.connections_log == self.audit.acceptances_log {
            return Err(Error::config(
                "audit.connections_log and audit.acceptances_log must be distinct files",
            ));
        }
        Ok(())
    }

    /// Load the portal page markup: the configured file if set, the
    /// embedded default otherwise.
    pub fn load_portal_page(&self) -> Result<String> {
        match &self.portal.page_path {
            Some(path) => std::fs::read_to_string(path).map_err(|e| {
                Error::config(format!("Failed to read portal page '{}': {}", path, e))
            }),
            None => Ok(crate::gateway::DEFAULT_PORTAL_PAGE.to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            portal: PortalConfig::default(),
            audit: AuditConfig::default(),
            resolver: ResolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
