//! otprpc - RPC calls and broker administration on remote nodes
//!
//! Runs one command per invocation against the node endpoint.

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use otprpc_client::{BrokerAdmin, Config, ExecutorConfig, RpcExecutor, TcpConnectionFactory};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "otprpc")]
#[command(about = "RPC calls and broker administration on remote nodes")]
#[command(version)]
struct Cli {
    /// Node endpoint address (overrides config)
    #[arg(short, long)]
    node: Option<SocketAddr>,

    /// Name to announce to the node
    #[arg(long)]
    node_name: Option<String>,

    /// Shared secret expected by the node
    #[arg(short, long, env = "OTPRPC_COOKIE")]
    cookie: Option<String>,

    /// YAML config file (defaults to $OTPRPC_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log RPC traffic
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call module:function with JSON arguments
    Call {
        /// Module name
        module: String,

        /// Function name
        function: String,

        /// Arguments as JSON (or @file.json to read from file)
        args: Vec<String>,

        /// Print the reply converted to JSON
        #[arg(long)]
        json: bool,
    },

    /// Add a user
    AddUser {
        username: String,
        password: String,
    },

    /// Delete a user
    DeleteUser { username: String },

    /// Change a user's password
    ChangePassword {
        username: String,
        password: String,
    },

    /// List users
    ListUsers,

    /// Add a virtual host
    AddVhost { vhost: String },

    /// Delete a virtual host
    DeleteVhost { vhost: String },

    /// List virtual hosts
    ListVhosts,

    /// Set a user's permissions on a virtual host
    SetPermissions {
        username: String,

        /// Configure permission regex
        configure: String,

        /// Write permission regex
        write: String,

        /// Read permission regex
        read: String,

        /// Virtual host (default "/")
        #[arg(short = 'p', long)]
        vhost: Option<String>,
    },

    /// Clear a user's permissions on a virtual host
    ClearPermissions {
        username: String,

        /// Virtual host (default "/")
        #[arg(short = 'p', long)]
        vhost: Option<String>,
    },

    /// List permissions on a virtual host
    ListPermissions {
        /// Virtual host (default "/")
        #[arg(short = 'p', long)]
        vhost: Option<String>,
    },

    /// List a user's permissions across virtual hosts
    ListUserPermissions { username: String },

    /// Start the broker application
    StartApp,

    /// Stop the broker application
    StopApp,

    /// Stop the broker and halt its node
    StopNode,

    /// Reset the node (broker application must be stopped)
    Reset,

    /// Force-reset the node
    ForceReset,

    /// Show broker status
    Status,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    // File first (explicit or $OTPRPC_CONFIG), then env, then flags.
    let loaded = match &cli.config {
        Some(path) => Config::from_file(path).map(|mut c| {
            c.apply_env_overrides();
            c
        }),
        None => Config::load(),
    };
    let mut config = loaded.unwrap_or_else(|e| {
        eprintln!("{}: {}", "Config error".red(), e);
        std::process::exit(1);
    });

    if let Some(addr) = cli.node {
        config.node.addr = addr;
    }
    if let Some(name) = cli.node_name {
        config.node.node_name = Some(name);
    }
    if let Some(cookie) = cli.cookie {
        config.node.cookie = Some(cookie);
    }
    tracing::debug!("Using node {}", config.node.addr);

    let factory = TcpConnectionFactory::new(config.connection_config());
    let admin = BrokerAdmin::new(RpcExecutor::new(ExecutorConfig::new(factory)));

    match commands::execute(&admin, cli.command) {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
