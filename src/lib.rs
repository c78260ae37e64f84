//! # ghnotify
//!
//! A GitHub notification poller that alerts when new unread threads show up.
//!
//! ## Architecture
//!
//! One tokio task owns all mutable state and reacts to intents, timers and
//! finished network calls:
//!
//! ```text
//! EngineHandle ─► Engine ─► PollScheduler ─► GitHubApi ─► HttpClient
//!                   │
//!                   ├─► NotificationStore ─► InboxView (watch)
//!                   └─► ActionDispatcher ─► AlertSink / UrlLauncher
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # Poll in the foreground, typing commands on stdin
//! GHNOTIFY_TOKEN=ghp_... ghnotify run --interactive
//!
//! # One-shot list
//! ghnotify list
//!
//! # Open a thread in the browser
//! ghnotify open 1234567
//! ```

/// Notifications REST API client.
///
/// - [`GitHubApi`](api::GitHubApi): list, mark-read, mark-all-read, release lookup
/// - [`browser_url`](api::browser_url()): API subject URL to browser URL
pub mod api;

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the loaded
/// configuration and the API client.
pub mod app;

/// Command-line interface using clap.
///
/// - `run [--interactive] [--log <file>]` - Poll in the foreground
/// - `stop` / `status` - Control the running instance
/// - `list`, `read <id>`, `read-all`, `open <id>` - One-shot actions
/// - `config` - Show effective settings
pub mod cli;

/// Configuration loaded from `~/.config/ghnotify/config.toml`.
pub mod config;

/// Foreground runner: PID file, signals, reloads and the stdin prompt.
pub mod daemon;

/// Core domain model: [`NotificationItem`](domain::NotificationItem).
pub mod domain;

/// Transport seam.
///
/// - [`HttpClient`](http::HttpClient): async trait for one request/response
/// - [`ReqwestClient`](http::ReqwestClient): reqwest-based implementation
pub mod http;

/// Poll scheduling, backoff, user actions and the engine task.
pub mod poller;

/// Desktop alerts and browser launching.
pub mod sink;

/// In-memory notification set and the view published to consumers.
pub mod store;
