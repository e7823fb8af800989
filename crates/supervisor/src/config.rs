//! Supervisor tunables.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for [`crate::ScriptSupervisor`].
///
/// The defaults match a single-host deployment with a system Python; tests
/// swap the interpreter for `/bin/sh` and shrink the timing knobs.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Root directory holding scripts, cloned repositories, and log files.
    pub scripts_dir: PathBuf,
    /// Interpreter launched for every target, invoked as
    /// `<interpreter> -u <script>`.
    pub interpreter: PathBuf,
    /// How long a freshly started child is observed before the start is
    /// reported as successful.
    pub grace_wait: Duration,
    /// How long a signalled process group may take to exit before the
    /// stop escalates to SIGKILL.
    pub stop_timeout: Duration,
    /// Log bytes included in an early-exit report.
    pub crash_tail_bytes: u64,
    /// Base URL substituted into per-target status links.
    pub status_url_base: String,
    /// Whether children inherit the control plane's own environment
    /// underneath their overlay file.
    pub inherit_host_env: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        SupervisorConfig {
            scripts_dir: PathBuf::from("scripts"),
            interpreter: PathBuf::from("python3"),
            grace_wait: Duration::from_millis(2000),
            stop_timeout: Duration::from_secs(5),
            crash_tail_bytes: 2000,
            status_url_base: "http://localhost:8080".to_string(),
            inherit_host_env: true,
        }
    }
}
