//! Supervisor lifecycle events.
//!
//! Published on a broadcast channel; call
//! [`crate::ScriptSupervisor::subscribe`] to receive them. Delivery is
//! best effort -- a lagging subscriber misses events rather than slowing
//! the supervisor down.

use serde::Serialize;

use hostbot_core::target::TargetId;

/// One lifecycle transition of a supervised target.
///
/// A start that dies inside the grace window produces both an [`Exited`]
/// and an [`EarlyExit`] event: the waiter reports the reaped child, the
/// starter reports the failed launch.
///
/// [`Exited`]: SupervisorEvent::Exited
/// [`EarlyExit`]: SupervisorEvent::EarlyExit
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SupervisorEvent {
    /// Child spawned and registered in the running table.
    Started { target: TargetId, pid: u32 },
    /// Child died before the start grace window elapsed.
    EarlyExit {
        target: TargetId,
        exit_code: Option<i32>,
    },
    /// Child exited on its own and was reaped by its waiter.
    Exited {
        target: TargetId,
        exit_code: Option<i32>,
    },
    /// Child was taken down by an explicit stop.
    Stopped { target: TargetId },
    /// Target fully removed: process, ownership, and artifacts.
    Deleted { target: TargetId },
}
