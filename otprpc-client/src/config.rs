//! Client configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via OTPRPC_CONFIG or --config)
//! 3. Environment variables

use crate::connection::{ConnectionConfig, DEFAULT_READ_BUFFER_SIZE};
use otprpc_protocol::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target node.
    pub node: NodeConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("OTPRPC_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();

        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Loads configuration from environment variables only.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.node.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Builds the transport configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        let node = &self.node;
        let mut config = ConnectionConfig::new(node.addr)
            .with_connect_timeout(node.connect_timeout())
            .with_read_buffer_size(node.read_buffer_size);
        if let Some(timeout) = node.request_timeout() {
            config = config.with_request_timeout(timeout);
        }
        if let Some(name) = &node.node_name {
            config = config.with_node_name(name.clone());
        }
        if let Some(cookie) = &node.cookie {
            config = config.with_cookie(cookie.clone());
        }
        config
    }
}

/// Target node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Address of the node's RPC endpoint.
    #[serde(with = "socket_addr_serde")]
    pub addr: SocketAddr,
    /// Name this client announces.
    pub node_name: Option<String>,
    /// Shared secret presented during the handshake.
    pub cookie: Option<String>,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Per-request timeout in seconds (0 = wait forever).
    pub request_timeout_secs: u64,
    /// Socket read buffer size in bytes.
    pub read_buffer_size: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            node_name: None,
            cookie: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 0,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl NodeConfig {
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = lookup("OTPRPC_NODE") {
            if let Ok(parsed) = addr.parse() {
                self.addr = parsed;
            }
        }

        if let Some(name) = lookup("OTPRPC_NODE_NAME") {
            self.node_name = Some(name);
        }

        if let Some(cookie) = lookup("OTPRPC_COOKIE") {
            self.cookie = Some(cookie);
        }

        if let Some(timeout) = lookup("OTPRPC_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = secs;
            }
        }

        if let Some(timeout) = lookup("OTPRPC_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse() {
                self.request_timeout_secs = secs;
            }
        }
    }

    /// Returns connect timeout as Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns request timeout as Duration, if any.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    IoError(PathBuf, #[source] std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, String),
}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
