//! # otprpc-client
//!
//! Client library for otprpc.
//!
//! This crate provides:
//! - Reply interpretation (`{badrpc, _}` / `{error, _}` classification)
//! - Connection-scoped RPC execution with guaranteed release
//! - Blocking TCP transport to a node endpoint
//! - Broker administration on top of the executor

pub mod admin;
pub mod config;
pub mod connection;
pub mod converter;
pub mod error;
pub mod executor;
pub mod reply;

pub use admin::{Application, BrokerAdmin, BrokerStatus, Permission};
pub use config::{Config, ConfigError};
pub use connection::{
    Connection, ConnectionConfig, ConnectionProvider, TcpConnection, TcpConnectionFactory,
};
pub use converter::{SimpleConverter, TermConverter};
pub use error::{AdminError, ClientError, ConversionError, RpcError};
pub use executor::{ExecutorConfig, RpcExecutor};
pub use reply::{interpret, ErrorDetail, RpcOutcome};
