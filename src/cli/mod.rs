pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ghnotify")]
#[command(about = "Polls GitHub notifications and alerts on new ones", long_about = None)]
pub struct Cli {
    /// Path to the config file (default: ~/.config/ghnotify/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start polling in the foreground
    Run {
        /// Read commands from stdin (r, m <id>, a, o <id>, l, q)
        #[arg(short, long)]
        interactive: bool,

        /// Log file path (default: stderr)
        #[arg(short, long)]
        log: Option<PathBuf>,

        /// Write alerts to the log instead of showing desktop notifications
        #[arg(long)]
        log_alerts: bool,
    },
    /// Stop the running instance
    Stop,
    /// Check whether an instance is running
    Status,
    /// Fetch and print unread notifications
    List,
    /// Mark one notification thread as read
    Read {
        /// Thread id as shown by `list`
        id: String,
    },
    /// Mark all notifications as read
    ReadAll,
    /// Open a notification in the browser
    Open {
        /// Thread id as shown by `list`
        id: String,

        /// Print the URL instead of launching a browser
        #[arg(long)]
        print: bool,
    },
    /// Show the config file path and effective settings
    Config,
}
