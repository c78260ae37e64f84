//! Poll state machine.
//!
//! ```text
//!            enable                 timer fires / refresh
//!   Idle ───────────────► Fetching ◄───────────────────── Waiting
//!    ▲                      │  result (ok or err)            ▲
//!    │ disable              └────────── arm timer ───────────┘
//!    └──────────────── any state
//! ```
//!
//! The scheduler only decides; the engine performs the I/O and feeds results
//! back with the [`FetchTicket`] it was handed. A ticket that no longer
//! matches (teardown, reconfiguration) is stale and its result is ignored.

use std::time::Duration;

use tokio::time::Instant;

use crate::config::MIN_REFRESH_INTERVAL_SECS;
use crate::poller::backoff::{next_delay, DEFAULT_SERVER_INTERVAL_SECS};

/// Wait after a credentials change so that bursts of setting writes
/// collapse into one fetch.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Waiting,
    Fetching,
}

/// Liveness token of one list fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimer {
    pub deadline: Instant,
    pub delay: Duration,
}

#[derive(Debug)]
pub struct PollScheduler {
    phase: Phase,
    retry_count: u32,
    server_interval: u64,
    timer: Option<PollTimer>,
    in_flight: Option<FetchTicket>,
    generation: u64,
    session: u64,
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            retry_count: 0,
            server_interval: DEFAULT_SERVER_INTERVAL_SECS,
            timer: None,
            in_flight: None,
            generation: 0,
            session: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn server_interval(&self) -> u64 {
        self.server_interval
    }

    pub fn timer(&self) -> Option<PollTimer> {
        self.timer
    }

    /// Identifies the current enable/disable cycle.
    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn is_enabled(&self) -> bool {
        self.phase != Phase::Idle
    }

    /// Start polling: reset state and fetch right away.
    ///
    /// Returns `None` when already enabled.
    pub fn enable(&mut self) -> Option<FetchTicket> {
        if self.phase != Phase::Idle {
            return None;
        }
        self.session += 1;
        self.retry_count = 0;
        self.server_interval = DEFAULT_SERVER_INTERVAL_SECS;
        self.timer = None;
        Some(self.begin_fetch())
    }

    /// Tear down: cancel the timer and orphan any in-flight fetch.
    pub fn disable(&mut self) {
        if self.phase == Phase::Idle {
            return;
        }
        self.session += 1;
        self.invalidate();
        self.phase = Phase::Idle;
    }

    /// Fetch now unless a fetch is already running or polling is off.
    pub fn refresh_now(&mut self) -> Option<FetchTicket> {
        match self.phase {
            Phase::Waiting => {
                self.timer = None;
                Some(self.begin_fetch())
            }
            Phase::Fetching | Phase::Idle => None,
        }
    }

    /// Called when the armed deadline passes.
    pub fn on_timer(&mut self, now: Instant) -> Option<FetchTicket> {
        match self.timer {
            Some(timer) if self.phase == Phase::Waiting && timer.deadline <= now => {
                self.timer = None;
                Some(self.begin_fetch())
            }
            _ => None,
        }
    }

    /// Credentials or list filters changed: drop whatever is pending and
    /// fetch again after [`SETTLE_DELAY`].
    pub fn config_changed(&mut self, now: Instant) -> Option<PollTimer> {
        if self.phase == Phase::Idle {
            return None;
        }
        self.invalidate();
        Some(self.arm(SETTLE_DELAY, now))
    }

    /// Whether a result carrying `ticket` should still be applied.
    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.phase == Phase::Fetching && self.in_flight == Some(ticket)
    }

    /// Record a successful fetch and arm the next poll.
    ///
    /// Returns `None`, changing nothing, for a stale ticket.
    pub fn fetch_succeeded(
        &mut self,
        ticket: FetchTicket,
        poll_interval: Option<u64>,
        user_interval: u64,
        now: Instant,
    ) -> Option<PollTimer> {
        if !self.is_current(ticket) {
            return None;
        }
        self.in_flight = None;
        if let Some(hint) = poll_interval {
            self.server_interval = hint.max(MIN_REFRESH_INTERVAL_SECS);
        }
        self.retry_count = 0;
        let delay = next_delay(0, self.server_interval, user_interval);
        Some(self.arm(Duration::from_secs(delay), now))
    }

    /// Record a failed fetch and arm a backed-off retry.
    ///
    /// Returns `None`, changing nothing, for a stale ticket.
    pub fn fetch_failed(
        &mut self,
        ticket: FetchTicket,
        user_interval: u64,
        now: Instant,
    ) -> Option<PollTimer> {
        if !self.is_current(ticket) {
            return None;
        }
        self.in_flight = None;
        self.retry_count = self.retry_count.saturating_add(1);
        let delay = next_delay(self.retry_count, self.server_interval, user_interval);
        Some(self.arm(Duration::from_secs(delay), now))
    }

    fn begin_fetch(&mut self) -> FetchTicket {
        self.generation += 1;
        let ticket = FetchTicket(self.generation);
        self.in_flight = Some(ticket);
        self.phase = Phase::Fetching;
        ticket
    }

    fn invalidate(&mut self) {
        self.timer = None;
        self.in_flight = None;
        self.generation += 1;
    }

    fn arm(&mut self, delay: Duration, now: Instant) -> PollTimer {
        let timer = PollTimer {
            deadline: now + delay,
            delay,
        };
        self.timer = Some(timer);
        self.phase = Phase::Waiting;
        timer
    }
}
