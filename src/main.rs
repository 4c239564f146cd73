//! lanchat-cli - Terminal client for a LAN-hosted group chat server
//!
//! Talks to the server's REST API for accounts, groups, and history, and
//! to its WebSocket for live messages, presence, and typing signals.

mod api;
mod config;
mod models;
mod store;
mod tui;
mod ws;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "lanchat-cli")]
#[command(about = "Terminal client for a LAN-hosted group chat server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in to a chat server
    Login {
        /// Server address as host:port (defaults to the saved one)
        #[arg(short, long)]
        server: Option<String>,

        /// Account username
        #[arg(short, long)]
        username: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account on a chat server
    Register {
        /// Server address as host:port (defaults to the saved one)
        #[arg(short, long)]
        server: Option<String>,

        /// Account username
        #[arg(short, long)]
        username: String,

        /// Name shown to other users (defaults to the username)
        #[arg(short, long)]
        display_name: Option<String>,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Change the account password
    Passwd,

    /// Log out and clear the saved session
    Logout,

    /// Show the saved session state
    Status,

    /// Show the logged-in user's profile
    Whoami,

    /// List registered users
    Users,

    /// List your groups, or show one group's members
    Groups {
        /// Group ID to show in detail
        group_id: Option<String>,
    },

    /// Create a group
    CreateGroup {
        /// Group name
        name: String,

        /// Description line
        #[arg(short, long)]
        description: Option<String>,

        /// User ID to add as a member (repeatable)
        #[arg(short, long = "member")]
        members: Vec<String>,
    },

    /// Add users to a group
    Invite {
        /// Group ID (from `groups` output)
        group_id: String,

        /// User IDs to add
        #[arg(required = true)]
        user_ids: Vec<String>,
    },

    /// Delete a group you created
    DeleteGroup {
        /// Group ID (from `groups` output)
        group_id: String,
    },

    /// Read message history from a group
    Read {
        /// Group ID (from `groups` output)
        group_id: String,

        /// Maximum number of messages to show
        #[arg(short, long, default_value = "50")]
        limit: usize,

        /// Only show messages older than this RFC 3339 time
        #[arg(short, long)]
        before: Option<String>,
    },

    /// Send a message to a group
    Send {
        /// Group ID (from `groups` output)
        group_id: String,

        /// Message content
        message: String,
    },

    /// Upload a file to a group
    Upload {
        /// Group ID (from `groups` output)
        group_id: String,

        /// Path of the file to send
        path: PathBuf,

        /// Caption to send with the file
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Stream live events to the terminal until Ctrl-C
    Watch {
        /// Only show events for this group (ID or name)
        group: Option<String>,
    },

    /// Launch the terminal user interface
    Tui,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into())
    };

    // The TUI owns the terminal, so its logs are captured into a ring
    // buffer and shown in the log overlay instead of going to stdout.
    if matches!(cli.command, Commands::Tui) {
        let logs = tui::LogBuffer::new(500);
        tracing_subscriber::registry()
            .with(env_filter())
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(logs.clone()),
            )
            .init();
        return tui::run(logs).await;
    }

    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Login {
            server,
            username,
            password,
        } => {
            let server = resolve_server(server)?;
            let password = match password {
                Some(p) => p,
                None => prompt("Password")?,
            };
            tracing::info!("Logging in to {}...", server);
            api::login(&server, &username, &password).await?;
        }
        Commands::Register {
            server,
            username,
            display_name,
            password,
        } => {
            let server = resolve_server(server)?;
            let display_name = display_name.unwrap_or_else(|| username.clone());
            let password = match password {
                Some(p) => p,
                None => prompt("Password")?,
            };
            api::register(&server, &username, &display_name, &password).await?;
        }
        Commands::Passwd => {
            let current = prompt("Current password")?;
            let new = prompt("New password")?;
            api::change_password(&current, &new).await?;
        }
        Commands::Logout => {
            api::logout().await?;
        }
        Commands::Status => {
            api::status().await?;
        }
        Commands::Whoami => {
            api::whoami().await?;
        }
        Commands::Users => {
            api::list_users().await?;
        }
        Commands::Groups { group_id } => match group_id {
            Some(id) => api::show_group(&id).await?,
            None => api::list_groups().await?,
        },
        Commands::CreateGroup {
            name,
            description,
            members,
        } => {
            api::create_group(&name, description, &members).await?;
        }
        Commands::Invite { group_id, user_ids } => {
            api::add_members(&group_id, &user_ids).await?;
        }
        Commands::DeleteGroup { group_id } => {
            api::delete_group(&group_id).await?;
        }
        Commands::Read {
            group_id,
            limit,
            before,
        } => {
            let before = before
                .map(|s| s.parse::<DateTime<Utc>>())
                .transpose()
                .context("Invalid --before time, expected RFC 3339")?;
            api::read_messages(&group_id, limit, before).await?;
        }
        Commands::Send { group_id, message } => {
            tracing::info!("Sending message...");
            ws::send_message(&group_id, &message).await?;
        }
        Commands::Upload {
            group_id,
            path,
            message,
        } => {
            tracing::info!("Uploading {}...", path.display());
            ws::send_file(&group_id, &path, message).await?;
        }
        Commands::Watch { group } => {
            ws::watch(group).await?;
        }
        // Dispatched before logging init.
        Commands::Tui => {}
    }

    Ok(())
}

/// Use the given server address, falling back to the saved one.
fn resolve_server(flag: Option<String>) -> Result<String> {
    if let Some(server) = flag {
        return Ok(server);
    }
    let config = Config::load()?;
    Ok(config.require_server()?.to_string())
}

/// Read one line from stdin with a label.
fn prompt(label: &str) -> Result<String> {
    use std::io::Write;

    print!("{}: ", label);
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
