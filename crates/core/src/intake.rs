//! Intake-flow state machine.
//!
//! Each chat user drives at most one intake flow at a time. The state is a
//! tagged enum rather than loose per-user flags, so every handler can match
//! on exactly the situation it expects and the compiler keeps the flows
//! honest.
//!
//! Flow shapes:
//!
//! ```text
//! upload:      AwaitScript -> Extras -> (run | cancel)
//! clone:       AwaitRepoUrl -> SelectEntry -> Extras -> (run | cancel)
//! deploy link: AwaitDeployUrl -> (done | cancel)
//! ```
//!
//! `Extras` is the shared tail of the upload and clone flows: the target is
//! claimed, and the user may attach a dependency manifest or an env overlay
//! before launching. `pending` records which sidecar upload was announced.

use crate::target::{TargetId, TargetKind, ENV_EXTENSION, MANIFEST_EXTENSION};

/// Which intake flow a state belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Upload,
    Clone,
    DeployLink,
}

impl FlowKind {
    pub fn label(&self) -> &'static str {
        match self {
            FlowKind::Upload => "upload",
            FlowKind::Clone => "clone",
            FlowKind::DeployLink => "deploy link",
        }
    }
}

/// Kind of optional sidecar file attached during the `Extras` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraKind {
    /// Dependency manifest (`.txt`), fed to the installer.
    DependencyFile,
    /// Environment overlay (`.env`), applied at launch.
    EnvFile,
}

impl ExtraKind {
    /// File extension the upload must carry.
    pub fn expected_extension(&self) -> &'static str {
        match self {
            ExtraKind::DependencyFile => MANIFEST_EXTENSION,
            ExtraKind::EnvFile => ENV_EXTENSION,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ExtraKind::DependencyFile => "dependency file",
            ExtraKind::EnvFile => "environment file",
        }
    }
}

/// Per-user conversation state while an intake flow is active.
///
/// Absence of a state (no session) means the user is idle.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    /// Upload flow: waiting for the script document.
    AwaitScript,
    /// Clone flow: waiting for the repository URL.
    AwaitRepoUrl,
    /// Clone flow: repository cloned, waiting for the entry-point choice.
    SelectEntry {
        repo: String,
        /// Candidate entry paths, relative to the repository root. Button
        /// payloads carry an index into this list.
        choices: Vec<String>,
    },
    /// Shared tail: target claimed, optional sidecars may be attached.
    Extras {
        target: TargetId,
        /// Which sidecar upload was announced, if any.
        pending: Option<ExtraKind>,
    },
    /// Deploy-link flow: waiting for the repository URL.
    AwaitDeployUrl,
}

impl FlowState {
    /// Which flow this state belongs to.
    ///
    /// `Extras` is shared; its flow is recovered from the target shape.
    pub fn flow_kind(&self) -> FlowKind {
        match self {
            FlowState::AwaitScript => FlowKind::Upload,
            FlowState::AwaitRepoUrl | FlowState::SelectEntry { .. } => FlowKind::Clone,
            FlowState::Extras { target, .. } => match target.kind() {
                TargetKind::File => FlowKind::Upload,
                TargetKind::RepoEntry => FlowKind::Clone,
            },
            FlowState::AwaitDeployUrl => FlowKind::DeployLink,
        }
    }

    /// Whether a document upload is meaningful in this state.
    pub fn expects_document(&self) -> bool {
        matches!(
            self,
            FlowState::AwaitScript
                | FlowState::Extras {
                    pending: Some(_),
                    ..
                }
        )
    }

    /// Short state name for logs.
    pub fn label(&self) -> &'static str {
        match self {
            FlowState::AwaitScript => "await_script",
            FlowState::AwaitRepoUrl => "await_repo_url",
            FlowState::SelectEntry { .. } => "select_entry",
            FlowState::Extras { pending: None, .. } => "extras",
            FlowState::Extras {
                pending: Some(_), ..
            } => "extras_pending_upload",
            FlowState::AwaitDeployUrl => "await_deploy_url",
        }
    }
}

/// Whether `from -> to` is a legal step within one flow.
///
/// Starting a flow (no state -> initial state) and ending one (any state ->
/// cleared) are session-manager operations, not transitions, so they do not
/// appear here.
pub fn transition_allowed(from: &FlowState, to: &FlowState) -> bool {
    use FlowState::*;
    match (from, to) {
        // Upload: script received, target claimed.
        (AwaitScript, Extras { pending: None, .. }) => true,
        // Clone: repository cloned and scanned.
        (AwaitRepoUrl, SelectEntry { .. }) => true,
        // Clone: entry picked; the claimed target must come from the same
        // repository that was scanned.
        (SelectEntry { repo, .. }, Extras { target, pending: None }) => {
            matches!(target.split_composite(), Some((r, _)) if r == repo)
        }
        // Extras: announce a sidecar upload, then receive it. Both steps
        // stay on the same target.
        (
            Extras {
                target: a,
                pending: None,
            },
            Extras {
                target: b,
                pending: Some(_),
            },
        ) => a == b,
        (
            Extras {
                target: a,
                pending: Some(_),
            },
            Extras {
                target: b,
                pending: None,
            },
        ) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extras(target: TargetId, pending: Option<ExtraKind>) -> FlowState {
        FlowState::Extras { target, pending }
    }

    fn select(repo: &str) -> FlowState {
        FlowState::SelectEntry {
            repo: repo.to_string(),
            choices: vec!["main.py".to_string()],
        }
    }

    #[test]
    fn upload_flow_steps() {
        let t = TargetId::file("bot.py");
        assert!(transition_allowed(
            &FlowState::AwaitScript,
            &extras(t.clone(), None)
        ));
        assert!(transition_allowed(
            &extras(t.clone(), None),
            &extras(t.clone(), Some(ExtraKind::DependencyFile))
        ));
        assert!(transition_allowed(
            &extras(t.clone(), Some(ExtraKind::DependencyFile)),
            &extras(t.clone(), None)
        ));
        assert!(transition_allowed(
            &extras(t.clone(), None),
            &extras(t, Some(ExtraKind::EnvFile))
        ));
    }

    #[test]
    fn clone_flow_steps() {
        let t = TargetId::repo_entry("tool", "src/main.py");
        assert!(transition_allowed(&FlowState::AwaitRepoUrl, &select("tool")));
        assert!(transition_allowed(&select("tool"), &extras(t, None)));
    }

    #[test]
    fn entry_must_come_from_scanned_repo() {
        let other = TargetId::repo_entry("other", "main.py");
        assert!(!transition_allowed(&select("tool"), &extras(other, None)));
    }

    #[test]
    fn extras_steps_must_keep_target() {
        let a = TargetId::file("a.py");
        let b = TargetId::file("b.py");
        assert!(!transition_allowed(
            &extras(a.clone(), None),
            &extras(b.clone(), Some(ExtraKind::EnvFile))
        ));
        assert!(!transition_allowed(
            &extras(a, Some(ExtraKind::EnvFile)),
            &extras(b, None)
        ));
    }

    #[test]
    fn cross_flow_jumps_rejected() {
        let t = TargetId::file("bot.py");
        assert!(!transition_allowed(&FlowState::AwaitScript, &select("tool")));
        assert!(!transition_allowed(
            &FlowState::AwaitRepoUrl,
            &extras(t.clone(), None)
        ));
        assert!(!transition_allowed(
            &FlowState::AwaitDeployUrl,
            &extras(t.clone(), None)
        ));
        assert!(!transition_allowed(&extras(t, None), &FlowState::AwaitScript));
    }

    #[test]
    fn flow_kind_per_state() {
        assert_eq!(FlowState::AwaitScript.flow_kind(), FlowKind::Upload);
        assert_eq!(FlowState::AwaitRepoUrl.flow_kind(), FlowKind::Clone);
        assert_eq!(select("r").flow_kind(), FlowKind::Clone);
        assert_eq!(FlowState::AwaitDeployUrl.flow_kind(), FlowKind::DeployLink);
        assert_eq!(
            extras(TargetId::file("a.py"), None).flow_kind(),
            FlowKind::Upload
        );
        assert_eq!(
            extras(TargetId::repo_entry("r", "a.py"), None).flow_kind(),
            FlowKind::Clone
        );
    }

    #[test]
    fn document_expectation() {
        let t = TargetId::file("a.py");
        assert!(FlowState::AwaitScript.expects_document());
        assert!(extras(t.clone(), Some(ExtraKind::EnvFile)).expects_document());
        assert!(!extras(t, None).expects_document());
        assert!(!FlowState::AwaitRepoUrl.expects_document());
        assert!(!FlowState::AwaitDeployUrl.expects_document());
    }
}
