//! Foreground runner for the polling engine.
//!
//! Owns the process lifecycle around the engine: PID file, signals, config
//! reloads and the optional stdin command prompt.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::app::{AppContext, GhNotifyError, Result};
use crate::cli::commands::format_inbox;
use crate::poller::{spawn_engine, EngineHandle};
use crate::sink::{AlertSink, BrowserLauncher, DesktopAlertSink, LogAlertSink};

/// Daemon options
#[derive(Debug, Clone, Default)]
pub struct DaemonOptions {
    /// Read intents from stdin
    pub interactive: bool,
    /// Log alerts instead of showing desktop notifications
    pub log_alerts: bool,
}

/// A line typed at the interactive prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    Refresh,
    MarkRead(String),
    MarkAllRead,
    Open(String),
    List,
    Quit,
}

impl Intent {
    /// Parse `r`, `m <id>`, `a`, `o <id>`, `l` or `q`.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let mut parts = line.split_whitespace();
        let verb = parts.next().unwrap_or_default();
        let arg = parts.next();

        match (verb, arg) {
            ("r", None) => Ok(Intent::Refresh),
            ("a", None) => Ok(Intent::MarkAllRead),
            ("l", None) => Ok(Intent::List),
            ("q", None) => Ok(Intent::Quit),
            ("m", Some(id)) => Ok(Intent::MarkRead(id.to_string())),
            ("o", Some(id)) => Ok(Intent::Open(id.to_string())),
            ("m" | "o", None) => Err(format!("'{}' needs a notification id", verb)),
            _ => Err(format!(
                "Unknown command: {}. Use r, m <id>, a, o <id>, l or q",
                line.trim()
            )),
        }
    }
}

enum SignalEvent {
    Shutdown,
    Reload,
}

#[cfg(unix)]
struct Signals {
    term: tokio::signal::unix::Signal,
    int: tokio::signal::unix::Signal,
    hup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl Signals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            term: signal(SignalKind::terminate())?,
            int: signal(SignalKind::interrupt())?,
            hup: signal(SignalKind::hangup())?,
        })
    }

    async fn next(&mut self) -> SignalEvent {
        tokio::select! {
            _ = self.term.recv() => SignalEvent::Shutdown,
            _ = self.int.recv() => SignalEvent::Shutdown,
            _ = self.hup.recv() => SignalEvent::Reload,
        }
    }
}

#[cfg(not(unix))]
struct Signals;

#[cfg(not(unix))]
impl Signals {
    fn install() -> std::io::Result<Self> {
        Ok(Self)
    }

    async fn next(&mut self) -> SignalEvent {
        let _ = tokio::signal::ctrl_c().await;
        SignalEvent::Shutdown
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: AppContext,
    options: DaemonOptions,
}

impl Daemon {
    pub fn new(ctx: AppContext, options: DaemonOptions) -> Self {
        Self { ctx, options }
    }

    /// Get the PID file path
    pub fn pid_file_path() -> Option<PathBuf> {
        dirs::runtime_dir()
            .or_else(dirs::cache_dir)
            .map(|d| d.join("ghnotify").join("daemon.pid"))
    }

    /// Check if another instance is already running
    pub fn is_running() -> bool {
        Self::read_pid().is_some_and(Self::process_exists)
    }

    fn read_pid() -> Option<u32> {
        let pid_path = Self::pid_file_path()?;
        let pid_str = fs::read_to_string(pid_path).ok()?;
        pid_str.trim().parse::<u32>().ok()
    }

    #[cfg(unix)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[cfg(windows)]
    fn process_exists(pid: u32) -> bool {
        use std::process::Command;
        Command::new("tasklist")
            .args(["/FI", &format!("PID eq {}", pid)])
            .output()
            .map(|o| String::from_utf8_lossy(&o.stdout).contains(&pid.to_string()))
            .unwrap_or(false)
    }

    fn write_pid_file(&self) -> std::io::Result<()> {
        if let Some(pid_path) = Self::pid_file_path() {
            if let Some(parent) = pid_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&pid_path)?;
            writeln!(file, "{}", std::process::id())?;
        }
        Ok(())
    }

    fn remove_pid_file(&self) {
        if let Some(pid_path) = Self::pid_file_path() {
            let _ = fs::remove_file(pid_path);
        }
    }

    /// Run until a signal or `q` stops it.
    pub async fn run(&mut self) -> Result<()> {
        if Self::is_running() {
            return Err(GhNotifyError::Other(
                "Another ghnotify instance is already running".to_string(),
            ));
        }
        self.ctx.config.require_token()?;

        self.write_pid_file()
            .map_err(|e| GhNotifyError::Other(format!("Failed to write PID file: {}", e)))?;

        let result = self.run_engine().await;
        self.remove_pid_file();
        result
    }

    async fn run_engine(&mut self) -> Result<()> {
        let mut signals = Signals::install()?;

        let alerts: Box<dyn AlertSink + Send> = if self.options.log_alerts {
            Box::new(LogAlertSink)
        } else {
            Box::new(DesktopAlertSink::new())
        };
        let (handle, task) = spawn_engine(
            self.ctx.api.clone(),
            self.ctx.config.clone(),
            alerts,
            Box::new(BrowserLauncher),
        );
        handle.enable().await?;

        info!(
            pid = std::process::id(),
            domain = %self.ctx.config.domain,
            "ghnotify started"
        );

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = self.options.interactive;

        loop {
            tokio::select! {
                event = signals.next() => match event {
                    SignalEvent::Shutdown => break,
                    SignalEvent::Reload => self.reload(&handle).await?,
                },
                line = lines.next_line(), if stdin_open => match line {
                    Ok(Some(line)) if line.trim().is_empty() => {}
                    Ok(Some(line)) => match Intent::parse(&line) {
                        Ok(Intent::Quit) => break,
                        Ok(intent) => Self::dispatch(&handle, intent).await?,
                        Err(message) => eprintln!("{}", message),
                    },
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                },
            }
        }

        info!("ghnotify shutting down");
        handle.shutdown().await?;
        task.await
            .map_err(|e| GhNotifyError::Other(format!("Engine task failed: {}", e)))?;
        Ok(())
    }

    async fn dispatch(handle: &EngineHandle, intent: Intent) -> Result<()> {
        match intent {
            Intent::Refresh => handle.refresh().await,
            Intent::MarkRead(id) => handle.mark_read(id).await,
            Intent::MarkAllRead => handle.mark_all_read().await,
            Intent::Open(id) => handle.open(id).await,
            Intent::List => {
                print!("{}", format_inbox(&handle.view()));
                Ok(())
            }
            Intent::Quit => Ok(()),
        }
    }

    /// Re-read the config file and hand the new snapshot to the engine.
    /// A broken file keeps the current settings.
    async fn reload(&mut self, handle: &EngineHandle) -> Result<()> {
        match AppContext::load_snapshot(&self.ctx.config_path) {
            Ok(config) => {
                info!(path = %self.ctx.config_path.display(), "Reloading configuration");
                self.ctx.config = config.clone();
                handle.config_changed(config).await
            }
            Err(e) => {
                warn!("Keeping current configuration: {}", e);
                Ok(())
            }
        }
    }
}

/// Stop a running instance by reading the PID file and sending a signal
pub fn stop_daemon() -> Result<()> {
    let pid_path = Daemon::pid_file_path()
        .ok_or_else(|| GhNotifyError::Other("Could not determine PID file path".to_string()))?;

    if !pid_path.exists() {
        return Err(GhNotifyError::Other(
            "ghnotify is not running (PID file not found)".to_string(),
        ));
    }

    let pid: u32 = fs::read_to_string(&pid_path)?
        .trim()
        .parse()
        .map_err(|_| GhNotifyError::Other("Invalid PID in PID file".to_string()))?;

    #[cfg(unix)]
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()?;

    #[cfg(windows)]
    let status = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()?;

    if status.success() {
        let _ = fs::remove_file(&pid_path);
        Ok(())
    } else {
        Err(GhNotifyError::Other(format!("Failed to stop ghnotify (PID {})", pid)))
    }
}

/// Check daemon status
pub fn daemon_status() -> String {
    match Daemon::read_pid() {
        Some(pid) if Daemon::process_exists(pid) => format!("ghnotify is running (PID: {})", pid),
        Some(_) => "ghnotify is not running (stale PID file)".to_string(),
        None => "ghnotify is not running".to_string(),
    }
}
