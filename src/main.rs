use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ghnotify::app::AppContext;
use ghnotify::cli::{commands, Cli, Commands};
use ghnotify::daemon::{self, Daemon, DaemonOptions};
use ghnotify::sink::{BrowserLauncher, PrintLauncher, UrlLauncher};

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(filter)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_writer(std::io::stderr))
                .with(filter)
                .init();
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_file = match &cli.command {
        Commands::Run { log, .. } => log.as_deref(),
        _ => None,
    };
    init_tracing(log_file)?;

    match cli.command {
        Commands::Stop => {
            daemon::stop_daemon()?;
            println!("ghnotify stopped");
            return Ok(());
        }
        Commands::Status => {
            println!("{}", daemon::daemon_status());
            return Ok(());
        }
        _ => {}
    }

    let ctx = AppContext::new(cli.config)?;

    match cli.command {
        Commands::Run {
            interactive,
            log_alerts,
            ..
        } => {
            let options = DaemonOptions {
                interactive,
                log_alerts,
            };
            let mut daemon = Daemon::new(ctx, options);
            daemon.run().await?;
        }
        Commands::List => {
            commands::list_notifications(&ctx).await?;
        }
        Commands::Read { id } => {
            commands::mark_read(&ctx, &id).await?;
        }
        Commands::ReadAll => {
            commands::mark_all_read(&ctx).await?;
        }
        Commands::Open { id, print } => {
            let launcher: Box<dyn UrlLauncher> = if print {
                Box::new(PrintLauncher)
            } else {
                Box::new(BrowserLauncher)
            };
            commands::open_notification(&ctx, &id, launcher.as_ref()).await?;
        }
        Commands::Config => {
            commands::show_config(&ctx);
        }
        Commands::Stop | Commands::Status => {}
    }

    Ok(())
}
