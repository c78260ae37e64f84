//! Side-effect sinks: desktop alerts and browser launching.
//!
//! Sinks are fire-and-forget. Failures are logged and never reach the
//! engine.

use tracing::{error, info};

/// The unread count grew since the previous fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertEvent {
    pub count: usize,
}

impl AlertEvent {
    pub fn message(&self) -> String {
        if self.count == 1 {
            "You have 1 new notification".to_string()
        } else {
            format!("You have {} new notifications", self.count)
        }
    }
}

pub trait AlertSink {
    fn alert(&self, event: AlertEvent);
}

/// Shows alerts through `notify-send`.
pub struct DesktopAlertSink {
    program: String,
}

impl DesktopAlertSink {
    pub fn new() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }
}

impl Default for DesktopAlertSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for DesktopAlertSink {
    fn alert(&self, event: AlertEvent) {
        // The child is reaped by the runtime once dropped.
        let spawned = tokio::process::Command::new(&self.program)
            .args(["--app-name=ghnotify", "GitHub", &event.message()])
            .spawn();
        if let Err(e) = spawned {
            error!("Failed to run {}: {}", self.program, e);
        }
    }
}

/// Writes alerts to the log only.
#[derive(Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, event: AlertEvent) {
        info!(count = event.count, "{}", event.message());
    }
}

pub trait UrlLauncher {
    fn launch(&self, url: &str);
}

/// Opens URLs in the default browser without waiting for the opener to exit.
#[derive(Default)]
pub struct BrowserLauncher;

impl UrlLauncher for BrowserLauncher {
    fn launch(&self, url: &str) {
        if let Err(e) = open::that_detached(url) {
            error!("Failed to open {}: {}", url, e);
        }
    }
}

/// Prints URLs to stdout instead of launching them.
#[derive(Default)]
pub struct PrintLauncher;

impl UrlLauncher for PrintLauncher {
    fn launch(&self, url: &str) {
        println!("{}", url);
    }
}
