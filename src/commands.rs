//! Command execution.

use crate::Commands;
use colored::Colorize;
use otprpc_client::{BrokerAdmin, BrokerStatus, ConnectionProvider, Permission};
use serde_json::Value;

/// Executes a command and returns the formatted output.
pub fn execute<P: ConnectionProvider>(
    admin: &BrokerAdmin<P>,
    cmd: Commands,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Call {
            module,
            function,
            args,
            json,
        } => {
            let args = args
                .iter()
                .map(|a| parse_json_arg(a))
                .collect::<Result<Vec<_>, _>>()?;
            let executor = admin.executor();
            if json {
                let reply = executor.execute_and_convert(&module, &function, &args)?;
                Ok(format_json(&reply))
            } else {
                Ok(executor.execute_rpc(&module, &function, &args)?.to_string())
            }
        }

        Commands::AddUser { username, password } => {
            admin.add_user(&username, &password)?;
            Ok(format!("{} user {}", "Added".green(), username.cyan()))
        }

        Commands::DeleteUser { username } => {
            admin.delete_user(&username)?;
            Ok(format!("{} user {}", "Deleted".green(), username.cyan()))
        }

        Commands::ChangePassword { username, password } => {
            admin.change_user_password(&username, &password)?;
            Ok(format!("{} password for {}", "Changed".green(), username.cyan()))
        }

        Commands::ListUsers => Ok(format_names(&admin.list_users()?, "No users")),

        Commands::AddVhost { vhost } => {
            admin.add_vhost(&vhost)?;
            Ok(format!("{} vhost {}", "Added".green(), vhost.cyan()))
        }

        Commands::DeleteVhost { vhost } => {
            admin.delete_vhost(&vhost)?;
            Ok(format!("{} vhost {}", "Deleted".green(), vhost.cyan()))
        }

        Commands::ListVhosts => Ok(format_names(&admin.list_vhosts()?, "No vhosts")),

        Commands::SetPermissions {
            username,
            configure,
            write,
            read,
            vhost,
        } => {
            admin.set_permissions(&username, &configure, &read, &write, vhost.as_deref())?;
            Ok(format!(
                "{} permissions for {} on {}",
                "Set".green(),
                username.cyan(),
                vhost.as_deref().unwrap_or("/")
            ))
        }

        Commands::ClearPermissions { username, vhost } => {
            admin.clear_permissions(&username, vhost.as_deref())?;
            Ok(format!(
                "{} permissions for {} on {}",
                "Cleared".green(),
                username.cyan(),
                vhost.as_deref().unwrap_or("/")
            ))
        }

        Commands::ListPermissions { vhost } => {
            let perms = admin.list_permissions(vhost.as_deref())?;
            Ok(format_permissions("user", &perms))
        }

        Commands::ListUserPermissions { username } => {
            let perms = admin.list_user_permissions(&username)?;
            Ok(format_permissions("vhost", &perms))
        }

        Commands::StartApp => {
            admin.start_broker_application()?;
            Ok(format!("{} broker application", "Started".green()))
        }

        Commands::StopApp => {
            admin.stop_broker_application()?;
            Ok(format!("{} broker application", "Stopped".green()))
        }

        Commands::StopNode => {
            admin.stop_node()?;
            Ok(format!("{} node", "Stopped".green()))
        }

        Commands::Reset => {
            admin.reset_node()?;
            Ok(format!("{} node", "Reset".green()))
        }

        Commands::ForceReset => {
            admin.force_reset_node()?;
            Ok(format!("{} node", "Force-reset".green()))
        }

        Commands::Status => Ok(format_status(&admin.status()?)),
    }
}

/// Parses a JSON argument (either inline JSON or @file.json).
fn parse_json_arg(arg: &str) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(path) = arg.strip_prefix('@') {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(arg)?)
    }
}

/// Formats JSON for display.
fn format_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn format_names(names: &[String], empty: &str) -> String {
    if names.is_empty() {
        return empty.yellow().to_string();
    }
    names
        .iter()
        .map(|n| format!("  {}", n.cyan()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_permissions(label: &str, perms: &[Permission]) -> String {
    if perms.is_empty() {
        return "No permissions".yellow().to_string();
    }
    let mut output = format!("{:<20} {:<16} {:<16} {:<16}", label, "configure", "write", "read")
        .bold()
        .to_string();
    for p in perms {
        output.push_str(&format!(
            "\n{:<20} {:<16} {:<16} {:<16}",
            p.name, p.configure, p.write, p.read
        ));
    }
    output
}

fn format_status(status: &BrokerStatus) -> String {
    let state = if status.is_running() {
        "running".green()
    } else {
        "stopped".red()
    };
    let mut output = format!("{} {}", "Broker".bold(), state);

    output.push_str(&format!("\n  Nodes: {}", status.nodes.join(", ")));
    output.push_str(&format!(
        "\n  Running nodes: {}",
        status.running_nodes.join(", ")
    ));
    if !status.running_applications.is_empty() {
        output.push_str("\n  Applications:");
        for app in &status.running_applications {
            output.push_str(&format!(
                "\n    {} {} ({})",
                app.name.cyan(),
                app.version,
                app.description
            ));
        }
    }
    output
}
