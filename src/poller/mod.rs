//! Polling and reconciliation engine.

pub mod backoff;
pub mod dispatcher;
pub mod engine;
pub mod scheduler;

pub use dispatcher::{ActionDispatcher, DispatchEffect};
pub use engine::{spawn_engine, Command, Engine, EngineHandle};
pub use scheduler::{Phase, PollScheduler, PollTimer, SETTLE_DELAY};
