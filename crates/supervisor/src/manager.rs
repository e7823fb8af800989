//! Running-process table and lifecycle operations.
//!
//! One [`ScriptSupervisor`] instance owns every hosted child. The table
//! maps target ids to live entries; all mutations go through one async
//! mutex, so concurrent starts of the same target resolve to exactly one
//! winner. Each launch gets a fresh `run_id` and a dedicated waiter task
//! that owns the [`tokio::process::Child`], reaps it, and publishes the
//! exit on a watch channel that stop and start observe.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, watch, Mutex};
use uuid::Uuid;

use hostbot_core::auth::AccessPolicy;
use hostbot_core::target::{TargetId, TargetKind};
use hostbot_core::types::UserId;
use hostbot_store::OwnershipStore;

use crate::config::SupervisorConfig;
use crate::error::SupervisorError;
use crate::events::SupervisorEvent;
use crate::spawn;

/// Broadcast channel capacity for lifecycle events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Exit information published by a waiter task. `code` is `None` when the
/// child was taken down by a signal.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ExitNotice {
    code: Option<i32>,
}

/// Table entry for one launched child.
struct RunningEntry {
    /// Distinguishes this launch from any later launch of the same
    /// target, so a slow waiter can never evict its successor's entry.
    run_id: Uuid,
    pid: u32,
    started_at: DateTime<Utc>,
    exit_rx: watch::Receiver<Option<ExitNotice>>,
}

/// Result of a start request that made it past the claim.
#[derive(Debug)]
pub enum StartOutcome {
    /// The child survived the grace window and is considered running.
    Running { pid: u32, status_url: String },
    /// The child exited inside the grace window; the launch is reported
    /// as failed together with the end of its log.
    ExitedEarly {
        exit_code: Option<i32>,
        log_tail: String,
    },
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    /// No live entry existed for the target.
    AlreadyStopped,
}

/// Snapshot of a live entry, for status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

/// Owns and supervises every hosted child process.
///
/// Created once at startup; the returned [`Arc`] is cloned into the chat
/// engine and the HTTP state.
pub struct ScriptSupervisor {
    config: SupervisorConfig,
    ownership: Arc<OwnershipStore>,
    table: Mutex<HashMap<TargetId, RunningEntry>>,
    event_tx: broadcast::Sender<SupervisorEvent>,
}

impl ScriptSupervisor {
    pub fn new(config: SupervisorConfig, ownership: Arc<OwnershipStore>) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(ScriptSupervisor {
            config,
            ownership,
            table: Mutex::new(HashMap::new()),
            event_tx,
        })
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.event_tx.subscribe()
    }

    /// Claim the target for `user` and launch it.
    ///
    /// The claim is checked first: an ownership conflict aborts before any
    /// process state exists. The table insert happens in the same critical
    /// section as the duplicate check, so of two concurrent starts exactly
    /// one spawns and the other sees [`SupervisorError::AlreadyRunning`].
    pub async fn start(
        self: &Arc<Self>,
        policy: &AccessPolicy,
        user: UserId,
        target: &TargetId,
    ) -> Result<StartOutcome, SupervisorError> {
        self.ownership.claim(policy, target, user).await?;

        let paths = target.resolve_paths(&self.config.scripts_dir);

        let (pid, run_id, exit_rx) = {
            let mut table = self.table.lock().await;
            if let Some(entry) = table.get(target) {
                if entry.exit_rx.borrow().is_none() {
                    return Err(SupervisorError::AlreadyRunning(target.clone()));
                }
                // Stale row from a reaped child whose eviction lost a race.
                table.remove(target);
            }

            let (child, pid) =
                spawn::spawn_child(&self.config, &paths).map_err(|e| SupervisorError::Spawn {
                    target: target.clone(),
                    source: e,
                })?;
            let (exit_tx, exit_rx) = watch::channel(None);
            let run_id = Uuid::new_v4();
            table.insert(
                target.clone(),
                RunningEntry {
                    run_id,
                    pid,
                    started_at: Utc::now(),
                    exit_rx: exit_rx.clone(),
                },
            );
            self.spawn_waiter(target.clone(), run_id, child, exit_tx);
            (pid, run_id, exit_rx)
        };

        tracing::info!(target = %target, pid, "Process started");
        let _ = self.event_tx.send(SupervisorEvent::Started {
            target: target.clone(),
            pid,
        });

        // Grace window: a child that dies this quickly is reported as a
        // failed launch instead of a running service.
        tokio::time::sleep(self.config.grace_wait).await;

        let early_exit = *exit_rx.borrow();
        if let Some(notice) = early_exit {
            self.evict_if_current(target, run_id).await;
            let log_tail = spawn::read_log_tail(&paths.log_file, self.config.crash_tail_bytes)
                .await
                .ok()
                .flatten()
                .unwrap_or_default();
            tracing::warn!(
                target = %target,
                exit_code = ?notice.code,
                "Process exited during the start grace window"
            );
            let _ = self.event_tx.send(SupervisorEvent::EarlyExit {
                target: target.clone(),
                exit_code: notice.code,
            });
            return Ok(StartOutcome::ExitedEarly {
                exit_code: notice.code,
                log_tail,
            });
        }

        Ok(StartOutcome::Running {
            pid,
            status_url: self.status_url(target),
        })
    }

    /// Stop the target's process group.
    ///
    /// The entry is taken out of the table first, then the group gets
    /// SIGTERM; if it has not exited within the stop timeout the signal
    /// escalates to SIGKILL. Stopping a target that is not running is a
    /// no-op, not an error.
    pub async fn stop(&self, target: &TargetId) -> Result<StopOutcome, SupervisorError> {
        let entry = {
            let mut table = self.table.lock().await;
            match table.remove(target) {
                Some(entry) => entry,
                None => return Ok(StopOutcome::AlreadyStopped),
            }
        };
        if entry.exit_rx.borrow().is_some() {
            // Already exited; removing the stale row was all there was to do.
            return Ok(StopOutcome::AlreadyStopped);
        }

        spawn::terminate_group(entry.pid);
        if !wait_for_exit(entry.exit_rx.clone(), self.config.stop_timeout).await {
            tracing::warn!(
                target = %target,
                pid = entry.pid,
                "Process group ignored SIGTERM, escalating to SIGKILL"
            );
            spawn::kill_group(entry.pid);
            // SIGKILL cannot be ignored; the wait stays bounded anyway.
            wait_for_exit(entry.exit_rx.clone(), self.config.stop_timeout).await;
        }

        tracing::info!(target = %target, pid = entry.pid, "Process stopped");
        let _ = self.event_tx.send(SupervisorEvent::Stopped {
            target: target.clone(),
        });
        Ok(StopOutcome::Stopped)
    }

    /// Whether the target currently has a live entry.
    pub async fn is_running(&self, target: &TargetId) -> bool {
        let table = self.table.lock().await;
        table
            .get(target)
            .map(|e| e.exit_rx.borrow().is_none())
            .unwrap_or(false)
    }

    /// Ids of all live targets, ordered.
    pub async fn running_targets(&self) -> Vec<TargetId> {
        let table = self.table.lock().await;
        let mut ids: Vec<TargetId> = table
            .iter()
            .filter(|(_, e)| e.exit_rx.borrow().is_none())
            .map(|(t, _)| t.clone())
            .collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    /// Pid and start time of a live target.
    pub async fn running_info(&self, target: &TargetId) -> Option<ProcessInfo> {
        let table = self.table.lock().await;
        table
            .get(target)
            .filter(|e| e.exit_rx.borrow().is_none())
            .map(|e| ProcessInfo {
                pid: e.pid,
                started_at: e.started_at,
            })
    }

    /// Read up to `max_bytes` from the end of the target's log.
    ///
    /// `None` means the target has never produced a log.
    pub async fn log_tail(
        &self,
        target: &TargetId,
        max_bytes: u64,
    ) -> Result<Option<String>, SupervisorError> {
        let path = target.resolve_paths(&self.config.scripts_dir).log_file;
        spawn::read_log_tail(&path, max_bytes)
            .await
            .map_err(|e| SupervisorError::Log {
                target: target.clone(),
                source: e,
            })
    }

    /// Public status link for a target.
    pub fn status_url(&self, target: &TargetId) -> String {
        format!(
            "{}/status?script={}",
            self.config.status_url_base.trim_end_matches('/'),
            target
        )
    }

    /// Remove a target completely: stop it, delete its log and artifacts,
    /// and release its ownership record.
    ///
    /// For repo entries the repository directory is only removed when no
    /// other claimed or running entry still points into it.
    pub async fn delete(&self, target: &TargetId) -> Result<(), SupervisorError> {
        self.stop(target).await?;

        let paths = target.resolve_paths(&self.config.scripts_dir);
        remove_if_exists(&paths.log_file, target).await?;
        self.ownership.release(target).await?;

        match target.kind() {
            TargetKind::File => {
                remove_if_exists(&paths.work_dir.join(&paths.script), target).await?;
                remove_if_exists(&paths.env_file, target).await?;
                remove_if_exists(&paths.manifest_file, target).await?;
                remove_if_exists(&paths.install_marker, target).await?;
            }
            TargetKind::RepoEntry => {
                if let Some((repo, _)) = target.split_composite() {
                    let claimed = self.ownership.repo_siblings(repo, target).await?;
                    let running = self.sibling_running(repo, target).await;
                    if claimed.is_empty() && !running {
                        match tokio::fs::remove_dir_all(&paths.work_dir).await {
                            Ok(()) => {}
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                            Err(e) => {
                                return Err(SupervisorError::Cleanup {
                                    target: target.clone(),
                                    source: e,
                                })
                            }
                        }
                    }
                }
            }
        }

        tracing::info!(target = %target, "Target deleted");
        let _ = self.event_tx.send(SupervisorEvent::Deleted {
            target: target.clone(),
        });
        Ok(())
    }

    /// Stop every running target. Called once during shutdown.
    pub async fn shutdown(&self) {
        let targets = self.running_targets().await;
        if targets.is_empty() {
            return;
        }
        tracing::info!(count = targets.len(), "Stopping all processes for shutdown");
        for target in targets {
            if let Err(e) = self.stop(&target).await {
                tracing::warn!(target = %target, error = %e, "Failed to stop process during shutdown");
            }
        }
    }

    fn spawn_waiter(
        self: &Arc<Self>,
        target: TargetId,
        run_id: Uuid,
        mut child: tokio::process::Child,
        exit_tx: watch::Sender<Option<ExitNotice>>,
    ) {
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            let code = match child.wait().await {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(target = %target, error = %e, "Failed to reap child");
                    None
                }
            };
            let _ = exit_tx.send(Some(ExitNotice { code }));
            // Only the launch that created the entry may evict it. A stop
            // or a restart racing ahead leaves nothing for us to do.
            if supervisor.evict_if_current(&target, run_id).await {
                tracing::info!(target = %target, exit_code = ?code, "Process exited");
                let _ = supervisor.event_tx.send(SupervisorEvent::Exited {
                    target,
                    exit_code: code,
                });
            }
        });
    }

    async fn evict_if_current(&self, target: &TargetId, run_id: Uuid) -> bool {
        let mut table = self.table.lock().await;
        match table.get(target) {
            Some(entry) if entry.run_id == run_id => {
                table.remove(target);
                true
            }
            _ => false,
        }
    }

    async fn sibling_running(&self, repo: &str, excluding: &TargetId) -> bool {
        self.running_targets()
            .await
            .into_iter()
            .any(|t| t != *excluding && matches!(t.split_composite(), Some((r, _)) if r == repo))
    }
}

/// Wait until the watch channel reports an exit, bounded by `timeout`.
async fn wait_for_exit(
    mut rx: watch::Receiver<Option<ExitNotice>>,
    timeout: Duration,
) -> bool {
    if rx.borrow().is_some() {
        return true;
    }
    tokio::time::timeout(timeout, async {
        loop {
            if rx.changed().await.is_err() {
                return;
            }
            if rx.borrow().is_some() {
                return;
            }
        }
    })
    .await
    .is_ok()
}

async fn remove_if_exists(path: &Path, target: &TargetId) -> Result<(), SupervisorError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SupervisorError::Cleanup {
            target: target.clone(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_url_substitutes_target() {
        let config = SupervisorConfig {
            status_url_base: "https://host.example/".to_string(),
            ..SupervisorConfig::default()
        };
        let ownership = Arc::new(OwnershipStore::new("unused.json"));
        let supervisor = ScriptSupervisor::new(config, ownership);
        assert_eq!(
            supervisor.status_url(&TargetId::file("bot.py")),
            "https://host.example/status?script=bot.py"
        );
    }
}
