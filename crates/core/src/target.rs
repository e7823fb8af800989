//! Target identifiers and on-disk naming conventions.
//!
//! A *target* is one hosted workload. Standalone uploads are identified by
//! their script file name (`bot.py`); entry points inside a cloned
//! repository use a composite id of the form `repo|relative/path.py`. The
//! composite separator never appears in a repository name, so splitting on
//! the first occurrence is unambiguous.
//!
//! All sidecar naming (log file, env overlay, dependency manifest) is
//! derived from the target id here so the rest of the workspace never
//! hand-builds a path.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Separator between repository name and entry path in a composite id.
pub const COMPOSITE_SEPARATOR: char = '|';

/// Required extension for runnable scripts.
pub const SCRIPT_EXTENSION: &str = ".py";

/// Required extension for uploaded dependency manifests.
pub const MANIFEST_EXTENSION: &str = ".txt";

/// Required extension for uploaded environment overlays.
pub const ENV_EXTENSION: &str = ".env";

/// Suffix appended to the manifest prefix to form the manifest file name.
const MANIFEST_SUFFIX: &str = "_req.txt";

/// Suffix appended to the manifest prefix to form the install marker name.
const MARKER_SUFFIX: &str = "_req.sha256";

/// Extension appended to the folded target id to form the log file name.
const LOG_SUFFIX: &str = ".log";

/// Which shape of workload a target id denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A single uploaded script living directly in the scripts directory.
    File,
    /// An entry-point script inside a cloned repository.
    RepoEntry,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::File => "file",
            TargetKind::RepoEntry => "repo_entry",
        }
    }
}

/// Identifier of a hosted workload.
///
/// Stored and transported as a plain string; the kind is recovered from the
/// shape of the id (presence of the composite separator).
///
/// # Examples
///
/// ```
/// use hostbot_core::target::{TargetId, TargetKind};
///
/// let file = TargetId::file("bot.py");
/// assert_eq!(file.kind(), TargetKind::File);
/// assert_eq!(file.as_str(), "bot.py");
///
/// let entry = TargetId::repo_entry("mytool", "src/main.py");
/// assert_eq!(entry.kind(), TargetKind::RepoEntry);
/// assert_eq!(entry.as_str(), "mytool|src/main.py");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(String);

impl TargetId {
    /// Target for a standalone uploaded script.
    pub fn file(name: impl Into<String>) -> Self {
        TargetId(name.into())
    }

    /// Target for an entry point inside a cloned repository.
    pub fn repo_entry(repo: &str, entry_path: &str) -> Self {
        TargetId(format!("{repo}{COMPOSITE_SEPARATOR}{entry_path}"))
    }

    /// Wrap a raw id string received over the wire or read from disk.
    pub fn parse(raw: impl Into<String>) -> Self {
        TargetId(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Kind recovered from the id shape.
    pub fn kind(&self) -> TargetKind {
        if self.0.contains(COMPOSITE_SEPARATOR) {
            TargetKind::RepoEntry
        } else {
            TargetKind::File
        }
    }

    /// Split a composite id into `(repo, entry_path)`.
    ///
    /// Splits on the first separator only, so entry paths containing the
    /// separator character survive a round trip. Returns `None` for
    /// file-kind ids.
    pub fn split_composite(&self) -> Option<(&str, &str)> {
        self.0.split_once(COMPOSITE_SEPARATOR)
    }

    /// Prefix used for the dependency manifest and install marker names.
    ///
    /// The whole file name for file targets, the repository name for repo
    /// entries (all entries of one repository share a manifest).
    pub fn manifest_prefix(&self) -> &str {
        match self.split_composite() {
            Some((repo, _)) => repo,
            None => &self.0,
        }
    }

    /// Log file name for this target.
    ///
    /// The id is folded into a flat name (composite separator and path
    /// separators become underscores) and the log extension is appended, so
    /// every log lives directly in the scripts directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostbot_core::target::TargetId;
    ///
    /// assert_eq!(TargetId::file("bot.py").log_file_name(), "bot.py.log");
    /// assert_eq!(
    ///     TargetId::repo_entry("tool", "src/main.py").log_file_name(),
    ///     "tool_src_main.py.log"
    /// );
    /// ```
    pub fn log_file_name(&self) -> String {
        let folded: String = self
            .0
            .chars()
            .map(|c| {
                if c == COMPOSITE_SEPARATOR || c == '/' || c == '\\' {
                    '_'
                } else {
                    c
                }
            })
            .collect();
        format!("{folded}{LOG_SUFFIX}")
    }

    /// Name of the environment overlay file, relative to the work dir.
    ///
    /// File targets keep a sidecar next to the script (`bot.py.env`); repo
    /// entries share the repository-level `.env`.
    pub fn env_file_name(&self) -> String {
        match self.kind() {
            TargetKind::File => format!("{}{ENV_EXTENSION}", self.0),
            TargetKind::RepoEntry => ENV_EXTENSION.to_string(),
        }
    }

    /// Name of the dependency manifest file, relative to the work dir.
    pub fn manifest_file_name(&self) -> String {
        format!("{}{MANIFEST_SUFFIX}", self.manifest_prefix())
    }

    /// Name of the install marker recording the last installed manifest
    /// digest, relative to the work dir.
    pub fn install_marker_file_name(&self) -> String {
        format!("{}{MARKER_SUFFIX}", self.manifest_prefix())
    }

    /// Resolve the full execution layout for this target under a scripts
    /// directory.
    pub fn resolve_paths(&self, scripts_dir: &Path) -> ExecutionPaths {
        let (work_dir, script) = match self.split_composite() {
            Some((repo, entry)) => (scripts_dir.join(repo), PathBuf::from(entry)),
            None => (scripts_dir.to_path_buf(), PathBuf::from(&self.0)),
        };
        ExecutionPaths {
            env_file: work_dir.join(self.env_file_name()),
            manifest_file: work_dir.join(self.manifest_file_name()),
            install_marker: work_dir.join(self.install_marker_file_name()),
            log_file: scripts_dir.join(self.log_file_name()),
            work_dir,
            script,
        }
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Concrete filesystem layout for executing one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPaths {
    /// Directory the child process runs in.
    pub work_dir: PathBuf,
    /// Script path relative to `work_dir`, passed to the interpreter.
    pub script: PathBuf,
    /// Environment overlay file (may not exist).
    pub env_file: PathBuf,
    /// Dependency manifest file (may not exist).
    pub manifest_file: PathBuf,
    /// Install marker holding the digest of the last installed manifest.
    pub install_marker: PathBuf,
    /// Combined stdout/stderr log sink, always under the scripts directory.
    pub log_file: PathBuf,
}

// ---- input validation ----

/// Validate an uploaded script file name.
///
/// The name must carry the script extension, have a non-empty stem, and
/// must not smuggle path components or the composite separator.
pub fn validate_script_name(name: &str) -> Result<(), CoreError> {
    if !name.ends_with(SCRIPT_EXTENSION) {
        return Err(CoreError::Validation(format!(
            "script name must end with {SCRIPT_EXTENSION}"
        )));
    }
    if name.len() == SCRIPT_EXTENSION.len() {
        return Err(CoreError::Validation(
            "script name must not be empty".to_string(),
        ));
    }
    if name.contains(['/', '\\', COMPOSITE_SEPARATOR]) || name.contains("..") {
        return Err(CoreError::Validation(format!(
            "script name '{name}' contains path separators or reserved characters"
        )));
    }
    Ok(())
}

/// Validate an uploaded sidecar file name against an expected extension.
pub fn validate_sidecar_name(name: &str, extension: &str) -> Result<(), CoreError> {
    if !name.ends_with(extension) {
        return Err(CoreError::Validation(format!(
            "expected a {extension} file, got '{name}'"
        )));
    }
    Ok(())
}

/// Validate a repository URL handed to the clone flow.
///
/// Only the scheme is checked here; everything else is left to the clone
/// tool, which produces far better diagnostics than we could.
pub fn validate_repo_url(url: &str) -> Result<(), CoreError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(CoreError::Validation(
            "repository URL must start with http:// or https://".to_string(),
        ))
    }
}

/// Derive the local directory name for a repository from its URL.
///
/// # Examples
///
/// ```
/// use hostbot_core::target::derive_repo_name;
///
/// assert_eq!(
///     derive_repo_name("https://example.com/acme/mytool.git").unwrap(),
///     "mytool"
/// );
/// assert_eq!(
///     derive_repo_name("https://example.com/acme/mytool/").unwrap(),
///     "mytool"
/// );
/// ```
pub fn derive_repo_name(url: &str) -> Result<String, CoreError> {
    let without_scheme = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let trimmed = without_scheme.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or("");
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        return Err(CoreError::Validation(format!(
            "cannot derive a repository name from '{url}'"
        )));
    }
    if name.contains([COMPOSITE_SEPARATOR, '\\']) || name.contains("..") {
        return Err(CoreError::Validation(format!(
            "repository name '{name}' contains reserved characters"
        )));
    }
    Ok(name.to_string())
}
