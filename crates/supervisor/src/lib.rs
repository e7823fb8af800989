//! Process supervision for hosted user scripts.
//!
//! [`ScriptSupervisor`] owns the table of running children. Each child is
//! launched in its own process group with its stdout and stderr appended
//! to a per-target log file, then handed to a waiter task that reaps it
//! and publishes the exit. Stop requests signal the whole group and
//! escalate from SIGTERM to SIGKILL when the group lingers.
//!
//! Children are never time-limited: once a start survives the grace
//! window, the process runs until it exits on its own or a stop or delete
//! takes it down.

pub mod config;
pub mod error;
pub mod events;
pub mod manager;

mod spawn;

pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use events::SupervisorEvent;
pub use manager::{ProcessInfo, ScriptSupervisor, StartOutcome, StopOutcome};
