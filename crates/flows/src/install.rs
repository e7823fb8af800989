//! Dependency installation with change detection.
//!
//! The uploaded manifest is normalized in place, hashed, and only handed
//! to the package installer when the digest differs from the marker left
//! by the last successful install. Install failures are reported with a
//! bounded tail of the installer's output; they never abort the flow,
//! because the script may well run without the broken dependency.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use hostbot_core::manifest::{manifest_digest, normalize_manifest};

/// Result of one install attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallReport {
    Installed,
    /// Manifest digest matched the marker; nothing was run.
    SkippedUnchanged,
    Failed {
        tail: String,
    },
}

pub struct DependencyInstaller {
    pip_bin: PathBuf,
    tail_bytes: usize,
}

impl DependencyInstaller {
    pub fn new(pip_bin: impl Into<PathBuf>, tail_bytes: usize) -> Self {
        DependencyInstaller {
            pip_bin: pip_bin.into(),
            tail_bytes,
        }
    }

    /// Normalize `manifest_file`, then install it unless the digest in
    /// `marker_file` already matches.
    pub async fn install(&self, manifest_file: &Path, marker_file: &Path) -> InstallReport {
        let raw = match tokio::fs::read_to_string(manifest_file).await {
            Ok(raw) => raw,
            Err(e) => {
                return InstallReport::Failed {
                    tail: format!("could not read manifest: {e}"),
                }
            }
        };

        let entries = normalize_manifest(&raw);
        let normalized = entries.join("\n") + "\n";
        if normalized != raw {
            if let Err(e) = tokio::fs::write(manifest_file, &normalized).await {
                return InstallReport::Failed {
                    tail: format!("could not rewrite manifest: {e}"),
                };
            }
        }

        let digest = manifest_digest(&entries);
        match tokio::fs::read_to_string(marker_file).await {
            Ok(previous) if previous.trim() == digest => {
                tracing::debug!(
                    manifest = %manifest_file.display(),
                    "Manifest unchanged, skipping install"
                );
                return InstallReport::SkippedUnchanged;
            }
            _ => {}
        }

        let output = Command::new(&self.pip_bin)
            .arg("install")
            .arg("-r")
            .arg(manifest_file)
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!(pip = %self.pip_bin.display(), error = %e, "Installer failed to launch");
                return InstallReport::Failed {
                    tail: format!("installer failed to launch: {e}"),
                };
            }
        };

        if !output.status.success() {
            let combined = combine_output(&output);
            let tail = tail_str(&combined, self.tail_bytes);
            tracing::warn!(
                manifest = %manifest_file.display(),
                status = ?output.status.code(),
                "Dependency install failed"
            );
            return InstallReport::Failed { tail };
        }

        if let Err(e) = tokio::fs::write(marker_file, &digest).await {
            // The install itself succeeded; a missing marker just means a
            // redundant reinstall next time.
            tracing::warn!(marker = %marker_file.display(), error = %e, "Could not write install marker");
        }
        tracing::info!(manifest = %manifest_file.display(), "Dependencies installed");
        InstallReport::Installed
    }
}

/// Stdout followed by stderr, lossily decoded.
pub(crate) fn combine_output(output: &std::process::Output) -> String {
    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

/// At most `max_bytes` from the end of `s`, respecting char boundaries.
pub(crate) fn tail_str(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut start = s.len() - max_bytes;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn paths(dir: &TempDir) -> (PathBuf, PathBuf) {
        (
            dir.path().join("app_req.txt"),
            dir.path().join("app_req.sha256"),
        )
    }

    fn write_fake_installer(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fake-pip");
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn successful_install_writes_marker_and_skips_next_time() {
        let dir = TempDir::new().unwrap();
        let (manifest, marker) = paths(&dir);
        std::fs::write(&manifest, "requests\n").unwrap();

        let installer = DependencyInstaller::new("/bin/true", 900);
        assert_eq!(
            installer.install(&manifest, &marker).await,
            InstallReport::Installed
        );
        assert!(marker.exists());

        // Unchanged manifest: the installer binary is not even invoked,
        // which a failing binary proves.
        let strict = DependencyInstaller::new("/bin/false", 900);
        assert_eq!(
            strict.install(&manifest, &marker).await,
            InstallReport::SkippedUnchanged
        );
    }

    #[tokio::test]
    async fn changed_manifest_reinstalls() {
        let dir = TempDir::new().unwrap();
        let (manifest, marker) = paths(&dir);
        std::fs::write(&manifest, "requests\n").unwrap();

        let installer = DependencyInstaller::new("/bin/true", 900);
        installer.install(&manifest, &marker).await;

        std::fs::write(&manifest, "requests\nflask\n").unwrap();
        assert_eq!(
            installer.install(&manifest, &marker).await,
            InstallReport::Installed
        );
    }

    #[tokio::test]
    async fn directive_lines_are_normalized_in_place() {
        let dir = TempDir::new().unwrap();
        let (manifest, marker) = paths(&dir);
        std::fs::write(&manifest, "pip install requests flask\n").unwrap();

        let installer = DependencyInstaller::new("/bin/true", 900);
        installer.install(&manifest, &marker).await;

        assert_eq!(
            std::fs::read_to_string(&manifest).unwrap(),
            "requests\nflask\n"
        );
    }

    #[tokio::test]
    async fn failure_reports_bounded_output_tail() {
        let dir = TempDir::new().unwrap();
        let (manifest, marker) = paths(&dir);
        std::fs::write(&manifest, "doesnotexist\n").unwrap();
        let fake = write_fake_installer(&dir, "echo resolving deps\necho broken-dep >&2\nexit 1\n");

        let installer = DependencyInstaller::new(&fake, 900);
        match installer.install(&manifest, &marker).await {
            InstallReport::Failed { tail } => {
                assert!(tail.contains("broken-dep"), "tail: {tail:?}");
                assert!(tail.len() <= 900);
            }
            other => panic!("expected a failure, got {other:?}"),
        }
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn missing_manifest_is_a_failure() {
        let dir = TempDir::new().unwrap();
        let (manifest, marker) = paths(&dir);
        let installer = DependencyInstaller::new("/bin/true", 900);
        assert_matches::assert_matches!(
            installer.install(&manifest, &marker).await,
            InstallReport::Failed { .. }
        );
    }

    #[test]
    fn tail_respects_char_boundaries() {
        let s = "aééz";
        // One é is two bytes; asking for 3 bytes must not split one.
        let tail = tail_str(s, 3);
        assert_eq!(tail, "éz");
        assert_eq!(tail_str("short", 100), "short");
    }
}
