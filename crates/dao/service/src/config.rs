//! Configuration for the DAO service daemon

use dao_governance::GovernanceConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};

/// Environment variable naming the node reward payout address.
pub const PAY_ADDRESS_ENV: &str = "PAY_ADDRESS";

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaoServiceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity this node submits governance transactions under
    #[serde(default)]
    pub node: NodeConfig,

    /// Governance core configuration
    #[serde(default)]
    pub governance: GovernanceConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

/// Node identity configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address transactions are submitted from
    #[serde(default = "default_node_address")]
    pub address: String,

    /// Node id stamped on every governance transaction
    #[serde(default = "default_node_id")]
    pub node_id: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            address: default_node_address(),
            node_id: default_node_id(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8090))
}

fn default_node_address() -> String {
    "0".repeat(64)
}

fn default_node_id() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaoServiceConfig {
    /// Load configuration: defaults, then the optional file, then `DAO_`
    /// environment variables (`DAO_SERVER__LISTEN_ADDR`, ...).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DaoServiceConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DAO")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        if config.governance.pay_address.is_none() {
            config.governance.pay_address = std::env::var(PAY_ADDRESS_ENV)
                .ok()
                .filter(|address| !address.is_empty());
        }
        Ok(config)
    }
}
