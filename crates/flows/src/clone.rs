//! Repository cloning and entry-point discovery.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use walkdir::WalkDir;

use crate::install::{combine_output, tail_str};

/// Result of a clone attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum CloneOutcome {
    Cloned,
    Failed { tail: String },
}

pub struct RepoCloner {
    git_bin: PathBuf,
    tail_bytes: usize,
}

impl RepoCloner {
    pub fn new(git_bin: impl Into<PathBuf>, tail_bytes: usize) -> Self {
        RepoCloner {
            git_bin: git_bin.into(),
            tail_bytes,
        }
    }

    /// Clone `url` into `dest`, discarding any previous checkout first.
    ///
    /// Re-cloning is the supported way to update a hosted repository, so a
    /// stale directory is never reused.
    pub async fn clone_fresh(&self, url: &str, dest: &Path) -> CloneOutcome {
        match tokio::fs::remove_dir_all(dest).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return CloneOutcome::Failed {
                    tail: format!("could not clear previous checkout: {e}"),
                }
            }
        }

        let output = Command::new(&self.git_bin)
            .arg("clone")
            .arg(url)
            .arg(dest)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(git = %self.git_bin.display(), error = %e, "Clone tool failed to launch");
                return CloneOutcome::Failed {
                    tail: format!("clone tool failed to launch: {e}"),
                };
            }
        };

        if !output.status.success() {
            let tail = tail_str(&combine_output(&output), self.tail_bytes);
            tracing::warn!(url, status = ?output.status.code(), "Clone failed");
            return CloneOutcome::Failed { tail };
        }

        tracing::info!(url, dest = %dest.display(), "Repository cloned");
        CloneOutcome::Cloned
    }
}

/// Candidate entry files in a checkout: every `.py` file outside `.git`,
/// as sorted repo-relative paths, capped at `max`.
pub fn collect_entry_files(repo_dir: &Path, max: usize) -> Vec<String> {
    let mut entries: Vec<String> = WalkDir::new(repo_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "py"))
        .filter_map(|e| {
            e.path()
                .strip_prefix(repo_dir)
                .ok()
                .map(|rel| rel.to_string_lossy().into_owned())
        })
        .collect();
    entries.truncate(max);
    entries
}
