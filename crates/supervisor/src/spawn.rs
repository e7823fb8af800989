//! Child launch and signalling helpers.
//!
//! Everything here is the mechanical part of supervision: building the
//! child environment, opening the log sink, spawning the interpreter in
//! its own process group, and addressing that group with signals. Policy
//! (who may start what, when to escalate) lives in [`crate::manager`].

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::process::{Child, Command};

use hostbot_core::envfile;
use hostbot_core::target::ExecutionPaths;

use crate::config::SupervisorConfig;

/// Base environment plus the target's overlay file.
///
/// A missing overlay is the normal case. An unreadable one is skipped
/// with a log line rather than failing the launch.
pub(crate) fn build_child_env(
    config: &SupervisorConfig,
    env_file: &Path,
) -> HashMap<String, String> {
    let mut env: HashMap<String, String> = if config.inherit_host_env {
        std::env::vars().collect()
    } else {
        HashMap::new()
    };
    match std::fs::read_to_string(env_file) {
        Ok(content) => envfile::apply_overlay(&mut env, &content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::debug!(
                path = %env_file.display(),
                error = %e,
                "Skipping unreadable env overlay"
            );
        }
    }
    env
}

/// Open a fresh log sink for one launch.
///
/// Any previous log is discarded; the returned file is in append mode so
/// the stdout and stderr handles interleave instead of overwriting each
/// other.
pub(crate) fn open_log_sink(path: &Path) -> io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}

/// Spawn the interpreter for one target.
///
/// The child runs unbuffered (`-u`) in the target's work dir with both
/// output streams appended to the log sink, and leads its own process
/// group so a later stop can signal the whole tree.
pub(crate) fn spawn_child(
    config: &SupervisorConfig,
    paths: &ExecutionPaths,
) -> io::Result<(Child, u32)> {
    let env = build_child_env(config, &paths.env_file);
    let log = open_log_sink(&paths.log_file)?;
    let log_err = log.try_clone()?;

    let mut cmd = Command::new(&config.interpreter);
    cmd.arg("-u")
        .arg(&paths.script)
        .current_dir(&paths.work_dir)
        .env_clear()
        .envs(&env)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));

    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn()?;
    let pid = child
        .id()
        .ok_or_else(|| io::Error::other("spawned child has no pid"))?;
    Ok((child, pid))
}

/// Read up to `max_bytes` from the end of a log file.
///
/// Returns `None` when the target has never produced a log.
pub(crate) async fn read_log_tail(path: &Path, max_bytes: u64) -> io::Result<Option<String>> {
    use std::io::SeekFrom;

    let mut file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let len = file.metadata().await?.len();
    if len > max_bytes {
        file.seek(SeekFrom::Start(len - max_bytes)).await?;
    }
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).await?;
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

// ---- process-group signalling ----

#[cfg(unix)]
fn signal_group(pid: u32, signal: libc::c_int) {
    // A negative pid addresses the whole group. Delivery failure means
    // the group is already gone, which is fine.
    unsafe {
        libc::kill(-(pid as libc::pid_t), signal);
    }
}

#[cfg(unix)]
pub(crate) fn terminate_group(pid: u32) {
    signal_group(pid, libc::SIGTERM);
}

#[cfg(unix)]
pub(crate) fn kill_group(pid: u32) {
    signal_group(pid, libc::SIGKILL);
}

#[cfg(not(unix))]
pub(crate) fn terminate_group(_pid: u32) {}

#[cfg(not(unix))]
pub(crate) fn kill_group(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn config(dir: &TempDir, inherit: bool) -> SupervisorConfig {
        SupervisorConfig {
            scripts_dir: dir.path().to_path_buf(),
            interpreter: PathBuf::from("/bin/sh"),
            inherit_host_env: inherit,
            ..SupervisorConfig::default()
        }
    }

    #[test]
    fn overlay_applied_on_empty_base() {
        let dir = TempDir::new().unwrap();
        let env_file = dir.path().join("x.env");
        std::fs::write(&env_file, "A=1\nB=two\n").unwrap();

        let env = build_child_env(&config(&dir, false), &env_file);
        assert_eq!(env.len(), 2);
        assert_eq!(env["A"], "1");
        assert_eq!(env["B"], "two");
    }

    #[test]
    fn missing_overlay_leaves_base_untouched() {
        let dir = TempDir::new().unwrap();
        let env = build_child_env(&config(&dir, false), &dir.path().join("absent.env"));
        assert!(env.is_empty());
    }

    #[test]
    fn log_sink_discards_previous_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.log");
        std::fs::write(&path, "old run output").unwrap();

        let sink = open_log_sink(&path).unwrap();
        drop(sink);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[tokio::test]
    async fn tail_is_bounded_and_keeps_the_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("t.log");
        std::fs::write(&path, "x".repeat(100) + "THE-END").unwrap();

        let tail = read_log_tail(&path, 7).await.unwrap().unwrap();
        assert_eq!(tail, "THE-END");
    }

    #[tokio::test]
    async fn tail_of_missing_log_is_none() {
        let dir = TempDir::new().unwrap();
        let tail = read_log_tail(&dir.path().join("absent.log"), 100).await.unwrap();
        assert!(tail.is_none());
    }
}
