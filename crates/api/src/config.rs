use std::path::{Path, PathBuf};
use std::time::Duration;

use hostbot_core::types::UserId;
use hostbot_flows::EngineConfig;
use hostbot_supervisor::SupervisorConfig;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8080`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Directory scripts, cloned repositories, and log files live in.
    pub scripts_dir: PathBuf,
    /// Directory holding the durable JSON tables.
    pub state_dir: PathBuf,
    /// Administrator user id; `None` when not configured.
    pub admin_user_id: Option<UserId>,
    /// Base URL substituted into per-target status links.
    pub public_base_url: String,
    /// Interpreter launched for hosted scripts.
    pub python_bin: PathBuf,
    /// Package installer used for dependency manifests.
    pub pip_bin: PathBuf,
    /// Clone tool used for repository intake.
    pub git_bin: PathBuf,
    /// Post-spawn crash-detection window in milliseconds.
    pub grace_wait_ms: u64,
    /// Seconds a signalled process group may take to exit before SIGKILL.
    pub stop_timeout_secs: u64,
    /// Log bytes shown by log views and early-exit reports.
    pub log_tail_bytes: u64,
    /// Tool-output bytes shown on clone or install failure.
    pub install_tail_bytes: usize,
    /// Entry-point candidates offered after a clone.
    pub max_entry_choices: usize,
    /// Idle seconds before an intake session is expired.
    pub session_ttl_secs: u64,
    /// Whether hosted scripts inherit the host environment under their
    /// overlay file.
    pub inherit_host_env: bool,
}

impl AppConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8080`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `SCRIPTS_DIR`          | `scripts`                  |
    /// | `STATE_DIR`            | parent of `SCRIPTS_DIR`    |
    /// | `ADMIN_USER_ID`        | `0` (no administrator)     |
    /// | `PUBLIC_BASE_URL`      | `http://localhost:8080`    |
    /// | `PYTHON_BIN`           | `python3`                  |
    /// | `PIP_BIN`              | `pip`                      |
    /// | `GIT_BIN`              | `git`                      |
    /// | `GRACE_WAIT_MS`        | `2000`                     |
    /// | `STOP_TIMEOUT_SECS`    | `5`                        |
    /// | `LOG_TAIL_BYTES`       | `2000`                     |
    /// | `INSTALL_TAIL_BYTES`   | `900`                      |
    /// | `MAX_ENTRY_CHOICES`    | `12`                       |
    /// | `SESSION_TTL_SECS`     | `1800`                     |
    /// | `INHERIT_HOST_ENV`     | `true`                     |
    pub fn from_env() -> Self {
        let host = env_or("HOST", "0.0.0.0");
        let port: u16 = env_parse("PORT", "8080");

        let cors_origins: Vec<String> = env_or("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", "30");

        let scripts_dir = PathBuf::from(env_or("SCRIPTS_DIR", "scripts"));
        let state_dir = match std::env::var("STATE_DIR") {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => scripts_dir
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        };

        // 0 doubles as "no administrator configured"; chat-network ids
        // are always positive.
        let admin_user_id: UserId = env_parse("ADMIN_USER_ID", "0");
        let admin_user_id = (admin_user_id != 0).then_some(admin_user_id);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            scripts_dir,
            state_dir,
            admin_user_id,
            public_base_url: env_or("PUBLIC_BASE_URL", "http://localhost:8080"),
            python_bin: PathBuf::from(env_or("PYTHON_BIN", "python3")),
            pip_bin: PathBuf::from(env_or("PIP_BIN", "pip")),
            git_bin: PathBuf::from(env_or("GIT_BIN", "git")),
            grace_wait_ms: env_parse("GRACE_WAIT_MS", "2000"),
            stop_timeout_secs: env_parse("STOP_TIMEOUT_SECS", "5"),
            log_tail_bytes: env_parse("LOG_TAIL_BYTES", "2000"),
            install_tail_bytes: env_parse("INSTALL_TAIL_BYTES", "900"),
            max_entry_choices: env_parse("MAX_ENTRY_CHOICES", "12"),
            session_ttl_secs: env_parse("SESSION_TTL_SECS", "1800"),
            inherit_host_env: env_parse("INHERIT_HOST_ENV", "true"),
        }
    }

    /// Supervisor tunables derived from this configuration.
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig {
            scripts_dir: self.scripts_dir.clone(),
            interpreter: self.python_bin.clone(),
            grace_wait: Duration::from_millis(self.grace_wait_ms),
            stop_timeout: Duration::from_secs(self.stop_timeout_secs),
            crash_tail_bytes: self.log_tail_bytes,
            status_url_base: self.public_base_url.clone(),
            inherit_host_env: self.inherit_host_env,
        }
    }

    /// Chat-engine tunables derived from this configuration.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            scripts_dir: self.scripts_dir.clone(),
            admin_id: self.admin_user_id,
            git_bin: self.git_bin.clone(),
            pip_bin: self.pip_bin.clone(),
            max_entry_choices: self.max_entry_choices,
            log_tail_bytes: self.log_tail_bytes,
            install_tail_bytes: self.install_tail_bytes,
        }
    }

    /// Path of the durable ownership table.
    pub fn ownership_path(&self) -> PathBuf {
        self.state_dir.join("ownership.json")
    }

    /// Path of the durable allowed-users table.
    pub fn allowed_users_path(&self) -> PathBuf {
        self.state_dir.join("allowed_users.json")
    }

    /// Idle lifetime of an intake session.
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Read an environment variable and parse it, panicking at startup on an
/// unparseable value -- we want misconfiguration to fail fast.
fn env_parse<T>(name: &str, default: &str) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env_or(name, default);
    raw.parse()
        .unwrap_or_else(|e| panic!("{name} has an invalid value '{raw}': {e}"))
}
