//! Conversation engine.
//!
//! One [`ChatEngine`] instance serves every user. Each incoming
//! [`ChatEvent`] passes the access guard, then dispatches on its payload:
//! button callbacks drive menus and management actions, documents feed the
//! active intake flow, and text carries commands and URL answers. The
//! engine owns no process state itself; it drives the session manager,
//! the ownership registry, and the supervisor, and renders their results
//! as chat replies.

use std::path::PathBuf;
use std::sync::Arc;

use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};

use hostbot_core::auth::AccessPolicy;
use hostbot_core::error::CoreError;
use hostbot_core::intake::{ExtraKind, FlowKind, FlowState};
use hostbot_core::target::{
    derive_repo_name, validate_repo_url, validate_script_name, validate_sidecar_name, TargetId,
};
use hostbot_core::types::UserId;
use hostbot_store::{AllowedUsersStore, OwnershipStore, StoreError};
use hostbot_supervisor::{ScriptSupervisor, StartOutcome, StopOutcome, SupervisorError};

use crate::clone::{collect_entry_files, CloneOutcome, RepoCloner};
use crate::event::{Callback, ChatEvent, DocumentUpload};
use crate::install::{DependencyInstaller, InstallReport};
use crate::reply::{
    cancel_menu, entry_choice_menu, extras_menu, main_menu, manage_menu, Button, Menu, Reply,
};
use crate::session::SessionManager;
use crate::stats::{format_host_stats, host_stats};

/// Base URL for one-click deploy links.
const DEPLOY_LINK_BASE: &str = "https://render.com/deploy?repo=";

/// Engine tuning knobs. Defaults mirror the supervisor's.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory scripts and repositories are materialized into.
    pub scripts_dir: PathBuf,
    /// Administrator user id, if one is configured.
    pub admin_id: Option<UserId>,
    /// Clone tool binary.
    pub git_bin: PathBuf,
    /// Package installer binary.
    pub pip_bin: PathBuf,
    /// Entry-point candidates offered after a clone.
    pub max_entry_choices: usize,
    /// Bytes of log shown by the logs action.
    pub log_tail_bytes: u64,
    /// Bytes of installer/clone output shown on failure.
    pub install_tail_bytes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            scripts_dir: PathBuf::from("scripts"),
            admin_id: None,
            git_bin: PathBuf::from("git"),
            pip_bin: PathBuf::from("pip"),
            max_entry_choices: 12,
            log_tail_bytes: 2000,
            install_tail_bytes: 900,
        }
    }
}

/// Stateless-per-event conversation handler.
///
/// Created once at startup; the returned [`Arc`] is shared by every
/// transport that accepts chat events.
pub struct ChatEngine {
    config: EngineConfig,
    policy: AccessPolicy,
    supervisor: Arc<ScriptSupervisor>,
    ownership: Arc<OwnershipStore>,
    allowed: Arc<AllowedUsersStore>,
    sessions: Arc<SessionManager>,
    cloner: RepoCloner,
    installer: DependencyInstaller,
}

impl ChatEngine {
    pub fn new(
        config: EngineConfig,
        supervisor: Arc<ScriptSupervisor>,
        ownership: Arc<OwnershipStore>,
        allowed: Arc<AllowedUsersStore>,
        sessions: Arc<SessionManager>,
    ) -> Arc<Self> {
        let policy = AccessPolicy::new(config.admin_id);
        let cloner = RepoCloner::new(&config.git_bin, config.install_tail_bytes);
        let installer = DependencyInstaller::new(&config.pip_bin, config.install_tail_bytes);
        Arc::new(ChatEngine {
            config,
            policy,
            supervisor,
            ownership,
            allowed,
            sessions,
            cloner,
            installer,
        })
    }

    /// Handle one incoming event and produce the replies to send back.
    ///
    /// Unrecognized users are turned away before anything else happens;
    /// recognized users never get an error out of this method, only a
    /// reply describing what went wrong.
    pub async fn handle(&self, event: ChatEvent) -> Vec<Reply> {
        let user = event.user_id;

        let allowed = match self.allowed.is_allowed(user).await {
            Ok(allowed) => allowed,
            Err(e) => return vec![self.store_failure(&e)],
        };
        if let Err(denied) = self.policy.authorize_recognized(user, allowed) {
            tracing::info!(user, "Rejected unrecognized user");
            return vec![self.denial(&denied)];
        }
        self.sessions.touch(user).await;

        if let Some(payload) = &event.callback {
            return match Callback::parse(payload) {
                Some(callback) => self.on_callback(user, callback).await,
                None => {
                    tracing::warn!(user, payload, "Unparseable callback payload");
                    vec![Reply::text("That button is no longer valid.")]
                }
            };
        }
        if let Some(document) = &event.document {
            return self.on_document(user, document).await;
        }
        if let Some(text) = &event.text {
            return self.on_text(user, text).await;
        }
        vec![Reply::with_menu(
            "Send a command, a document, or use the menu.",
            main_menu(),
        )]
    }

    // ---- dispatch ----

    async fn on_callback(&self, user: UserId, callback: Callback) -> Vec<Reply> {
        match callback {
            Callback::StartFlow(kind) => self.begin_flow(user, kind).await,
            Callback::ShowApps => self.show_apps(user).await,
            Callback::ShowStats => self.show_stats().await,
            Callback::ShowHelp => vec![self.help(user)],
            Callback::Cancel => self.cancel(user).await,
            Callback::AddExtra(kind) => self.on_add_extra(user, kind).await,
            Callback::RunNow => self.run_pending(user).await,
            Callback::PickEntry(index) => self.on_pick(user, index).await,
            Callback::Manage(target) => self.show_manage(user, &target).await,
            Callback::StopTarget(target) => self.stop_target(user, &target).await,
            Callback::RerunTarget(target) => self.rerun_target(user, &target).await,
            Callback::ShowLogs(target) => self.show_logs(user, &target).await,
            Callback::ShowUrl(target) => self.show_url(user, &target).await,
            Callback::DeleteTarget(target) => self.delete_target(user, &target).await,
        }
    }

    async fn on_document(&self, user: UserId, document: &DocumentUpload) -> Vec<Reply> {
        match self.sessions.state_of(user).await {
            Some(FlowState::AwaitScript) => self.on_script_upload(user, document).await,
            Some(FlowState::Extras {
                target,
                pending: Some(kind),
            }) => self.on_extra_upload(user, &target, kind, document).await,
            _ => vec![Reply::with_menu(
                "I wasn't expecting a file. Start a flow first.",
                main_menu(),
            )],
        }
    }

    async fn on_text(&self, user: UserId, text: &str) -> Vec<Reply> {
        if let Some((command, args)) = parse_command(text) {
            return self.on_command(user, command, args).await;
        }
        match self.sessions.state_of(user).await {
            Some(FlowState::AwaitRepoUrl) => self.on_repo_url(user, text.trim()).await,
            Some(FlowState::AwaitDeployUrl) => self.on_deploy_url(user, text.trim()).await,
            Some(state) if state.expects_document() => vec![Reply::with_menu(
                "Send the file as a document, not as text.",
                cancel_menu(),
            )],
            Some(_) => vec![Reply::with_menu(
                "Use the buttons to continue.",
                cancel_menu(),
            )],
            None => vec![Reply::with_menu(
                "I didn't catch that. Use the menu, or /help for commands.",
                main_menu(),
            )],
        }
    }

    async fn on_command(&self, user: UserId, command: &str, args: &str) -> Vec<Reply> {
        match command {
            "/start" => vec![Reply::with_menu(
                "Welcome to the script host. What would you like to do?",
                main_menu(),
            )],
            "/help" => vec![self.help(user)],
            "/upload" => self.begin_flow(user, FlowKind::Upload).await,
            "/clone" => self.begin_flow(user, FlowKind::Clone).await,
            "/deploy" => self.begin_flow(user, FlowKind::DeployLink).await,
            "/apps" => self.show_apps(user).await,
            "/stats" => self.show_stats().await,
            "/cancel" => self.cancel(user).await,
            "/grant" => self.grant(user, args).await,
            "/revoke" => self.revoke(user, args).await,
            _ => vec![Reply::text("Unknown command. Try /help.")],
        }
    }

    // ---- flows ----

    async fn begin_flow(&self, user: UserId, kind: FlowKind) -> Vec<Reply> {
        let (state, prompt) = match kind {
            FlowKind::Upload => (
                FlowState::AwaitScript,
                "Send the Python script as a document.",
            ),
            FlowKind::Clone => (
                FlowState::AwaitRepoUrl,
                "Send the HTTPS URL of the Git repository to host.",
            ),
            FlowKind::DeployLink => (
                FlowState::AwaitDeployUrl,
                "Send the HTTPS URL of the repository to build a deploy link for.",
            ),
        };
        self.sessions.begin(user, state).await;
        vec![Reply::with_menu(prompt, cancel_menu())]
    }

    async fn cancel(&self, user: UserId) -> Vec<Reply> {
        let text = if self.sessions.clear(user).await {
            "Cancelled."
        } else {
            "Nothing to cancel."
        };
        vec![Reply::with_menu(text, main_menu())]
    }

    /// Upload flow: the script document arrived.
    async fn on_script_upload(&self, user: UserId, document: &DocumentUpload) -> Vec<Reply> {
        if let Err(e) = validate_script_name(&document.file_name) {
            return vec![self.denial(&e)];
        }
        let target = TargetId::file(&document.file_name);

        // On a conflict the flow keeps waiting; the user can send a script
        // under a different name without starting over.
        match self.ownership.claim(&self.policy, &target, user).await {
            Ok(_) => {}
            Err(e @ StoreError::OwnedByOther { .. }) => return vec![self.store_failure(&e)],
            Err(e) => {
                self.sessions.clear(user).await;
                return vec![self.store_failure(&e)];
            }
        }

        let paths = target.resolve_paths(&self.config.scripts_dir);
        let script_path = paths.work_dir.join(&paths.script);
        if let Err(e) = write_document(&paths.work_dir, &script_path, &document.content).await {
            // Undo the claim; the script never made it to disk.
            let _ = self.ownership.release(&target).await;
            self.sessions.clear(user).await;
            tracing::error!(target = %target, error = %e, "Could not store uploaded script");
            return vec![Reply::text(
                "Could not store the script on the host. Try again in a moment.",
            )];
        }

        if let Err(e) = self
            .sessions
            .advance(
                user,
                FlowState::Extras {
                    target: target.clone(),
                    pending: None,
                },
            )
            .await
        {
            return vec![self.denial(&e)];
        }
        tracing::info!(user, target = %target, "Script uploaded");
        vec![Reply::with_menu(
            format!("Saved {target}. Add extras, or run it now."),
            extras_menu(),
        )]
    }

    /// Extras stage: a sidecar button was pressed.
    async fn on_add_extra(&self, user: UserId, kind: ExtraKind) -> Vec<Reply> {
        let Some(FlowState::Extras { target, pending }) = self.sessions.state_of(user).await
        else {
            return vec![Reply::text("No script is being set up right now.")];
        };
        // Switching sidecar kinds steps back through the menu state.
        if pending.is_some() {
            if let Err(e) = self
                .sessions
                .advance(
                    user,
                    FlowState::Extras {
                        target: target.clone(),
                        pending: None,
                    },
                )
                .await
            {
                return vec![self.denial(&e)];
            }
        }
        if let Err(e) = self
            .sessions
            .advance(
                user,
                FlowState::Extras {
                    target,
                    pending: Some(kind),
                },
            )
            .await
        {
            return vec![self.denial(&e)];
        }
        vec![Reply::with_menu(
            format!("Send the {} as a document.", kind.label()),
            cancel_menu(),
        )]
    }

    /// Extras stage: the announced sidecar document arrived.
    async fn on_extra_upload(
        &self,
        user: UserId,
        target: &TargetId,
        kind: ExtraKind,
        document: &DocumentUpload,
    ) -> Vec<Reply> {
        if let Err(e) = validate_sidecar_name(&document.file_name, kind.expected_extension()) {
            return vec![self.denial(&e)];
        }

        let paths = target.resolve_paths(&self.config.scripts_dir);
        let dest = match kind {
            ExtraKind::DependencyFile => &paths.manifest_file,
            ExtraKind::EnvFile => &paths.env_file,
        };
        if let Err(e) = write_document(&paths.work_dir, dest, &document.content).await {
            tracing::error!(target = %target, error = %e, "Could not store sidecar");
            return vec![Reply::text(
                "Could not store the file on the host. Try again in a moment.",
            )];
        }

        let mut replies = Vec::new();
        match kind {
            ExtraKind::DependencyFile => {
                replies.push(self.report_install(target, &paths.manifest_file, &paths.install_marker).await);
            }
            ExtraKind::EnvFile => {
                replies.push(Reply::text(
                    "Environment file saved. It is applied on every start.",
                ));
            }
        }

        if let Err(e) = self
            .sessions
            .advance(
                user,
                FlowState::Extras {
                    target: target.clone(),
                    pending: None,
                },
            )
            .await
        {
            return vec![self.denial(&e)];
        }
        replies.push(Reply::with_menu("Anything else?", extras_menu()));
        replies
    }

    /// Clone flow: the repository URL arrived.
    async fn on_repo_url(&self, user: UserId, url: &str) -> Vec<Reply> {
        if let Err(e) = validate_repo_url(url) {
            return vec![self.denial(&e)];
        }
        let repo = match derive_repo_name(url) {
            Ok(repo) => repo,
            Err(e) => return vec![self.denial(&e)],
        };

        let dest = self.config.scripts_dir.join(&repo);
        match self.cloner.clone_fresh(url, &dest).await {
            CloneOutcome::Cloned => {}
            CloneOutcome::Failed { tail } => {
                self.sessions.clear(user).await;
                return vec![Reply::with_menu(
                    format!("Clone failed:\n\n{tail}"),
                    main_menu(),
                )];
            }
        }

        let choices = collect_entry_files(&dest, self.config.max_entry_choices);
        if choices.is_empty() {
            self.sessions.clear(user).await;
            return vec![Reply::with_menu(
                format!("Cloned {repo}, but it contains no Python files."),
                main_menu(),
            )];
        }

        let mut replies = Vec::new();

        // A requirements.txt shipped at the repository root is installed
        // right away, before any entry point is offered.
        let shipped_manifest = dest.join("requirements.txt");
        if shipped_manifest.exists() {
            let marker = TargetId::repo_entry(&repo, &choices[0])
                .resolve_paths(&self.config.scripts_dir)
                .install_marker;
            replies.push(
                self.report_install(&TargetId::parse(&repo), &shipped_manifest, &marker)
                    .await,
            );
        }

        if let Err(e) = self
            .sessions
            .advance(
                user,
                FlowState::SelectEntry {
                    repo: repo.clone(),
                    choices: choices.clone(),
                },
            )
            .await
        {
            return vec![self.denial(&e)];
        }
        replies.push(Reply::with_menu(
            format!("Cloned {repo}. Pick the entry point:"),
            entry_choice_menu(&choices),
        ));
        replies
    }

    /// Clone flow: an entry-point button was pressed.
    async fn on_pick(&self, user: UserId, index: usize) -> Vec<Reply> {
        let Some(FlowState::SelectEntry { repo, choices }) = self.sessions.state_of(user).await
        else {
            return vec![Reply::text("No entry-point choice is open right now.")];
        };
        let Some(entry) = choices.get(index) else {
            return vec![Reply::text("That choice is no longer valid.")];
        };
        let target = TargetId::repo_entry(&repo, entry);

        match self.ownership.claim(&self.policy, &target, user).await {
            Ok(_) => {}
            Err(e @ StoreError::OwnedByOther { .. }) => return vec![self.store_failure(&e)],
            Err(e) => {
                self.sessions.clear(user).await;
                return vec![self.store_failure(&e)];
            }
        }

        if let Err(e) = self
            .sessions
            .advance(
                user,
                FlowState::Extras {
                    target: target.clone(),
                    pending: None,
                },
            )
            .await
        {
            return vec![self.denial(&e)];
        }
        tracing::info!(user, target = %target, "Repository entry point selected");
        vec![Reply::with_menu(
            format!("Entry point set to {entry}. Add extras, or run it now."),
            extras_menu(),
        )]
    }

    /// Deploy-link flow: the repository URL arrived.
    async fn on_deploy_url(&self, user: UserId, url: &str) -> Vec<Reply> {
        if let Err(e) = validate_repo_url(url) {
            return vec![self.denial(&e)];
        }
        self.sessions.clear(user).await;
        vec![Reply::with_menu(
            format!("One-click deploy link:\n{}", deploy_link(url)),
            main_menu(),
        )]
    }

    /// Extras stage: the run button was pressed.
    async fn run_pending(&self, user: UserId) -> Vec<Reply> {
        let Some(FlowState::Extras { target, .. }) = self.sessions.state_of(user).await else {
            return vec![Reply::text("Nothing is ready to run. Start a flow first.")];
        };
        self.sessions.clear(user).await;
        self.launch(user, &target).await
    }

    // ---- management ----

    async fn show_apps(&self, user: UserId) -> Vec<Reply> {
        let records = match self.ownership.list_visible_to(&self.policy, user).await {
            Ok(records) => records,
            Err(e) => return vec![self.store_failure(&e)],
        };
        if records.is_empty() {
            return vec![Reply::with_menu("No hosted scripts yet.", main_menu())];
        }

        let admin = self.policy.is_admin(user);
        let mut rows = Vec::with_capacity(records.len());
        for (target, record) in records {
            let state = if self.supervisor.is_running(&target).await {
                "[up]"
            } else {
                "[down]"
            };
            let label = if admin && record.owner != user {
                format!("{state} {target} (user {})", record.owner)
            } else {
                format!("{state} {target}")
            };
            rows.push(vec![Button::new(label, &Callback::Manage(target))]);
        }
        vec![Reply::with_menu("Hosted scripts:", Menu { rows })]
    }

    async fn show_manage(&self, user: UserId, target: &TargetId) -> Vec<Reply> {
        let record = match self.guard_manage(user, target).await {
            Ok(record) => record,
            Err(reply) => return vec![reply],
        };
        let info = self.supervisor.running_info(target).await;
        let running = info.is_some();
        let state = match info {
            Some(info) => format!(
                "running (pid {}, since {})",
                info.pid,
                info.started_at.format("%Y-%m-%d %H:%M:%S UTC")
            ),
            None => "stopped".to_string(),
        };
        vec![Reply::with_menu(
            format!(
                "{target}\nOwner: user {}\nClaimed: {}\nState: {state}",
                record.owner,
                record.claimed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ),
            manage_menu(target, running),
        )]
    }

    async fn stop_target(&self, user: UserId, target: &TargetId) -> Vec<Reply> {
        if let Err(reply) = self.guard_manage(user, target).await {
            return vec![reply];
        }
        match self.supervisor.stop(target).await {
            Ok(StopOutcome::Stopped) => vec![Reply::with_menu(
                format!("Stopped {target}."),
                manage_menu(target, false),
            )],
            Ok(StopOutcome::AlreadyStopped) => vec![Reply::with_menu(
                format!("{target} was not running."),
                manage_menu(target, false),
            )],
            Err(e) => vec![self.supervisor_failure(&e)],
        }
    }

    async fn rerun_target(&self, user: UserId, target: &TargetId) -> Vec<Reply> {
        let record = match self.guard_manage(user, target).await {
            Ok(record) => record,
            Err(reply) => return vec![reply],
        };
        if let Err(e) = self.supervisor.stop(target).await {
            return vec![self.supervisor_failure(&e)];
        }
        // Launch on behalf of the recorded owner, so an administrator
        // rerun does not take the target over.
        self.launch(record.owner, target).await
    }

    async fn show_logs(&self, user: UserId, target: &TargetId) -> Vec<Reply> {
        if let Err(reply) = self.guard_manage(user, target).await {
            return vec![reply];
        }
        match self
            .supervisor
            .log_tail(target, self.config.log_tail_bytes)
            .await
        {
            Ok(Some(tail)) if !tail.trim().is_empty() => {
                vec![Reply::text(format!("Log tail of {target}:\n\n{tail}"))]
            }
            Ok(Some(_)) => vec![Reply::text(format!("The log of {target} is empty."))],
            Ok(None) => vec![Reply::text(format!("No log yet for {target}."))],
            Err(e) => vec![self.supervisor_failure(&e)],
        }
    }

    async fn show_url(&self, user: UserId, target: &TargetId) -> Vec<Reply> {
        if let Err(reply) = self.guard_manage(user, target).await {
            return vec![reply];
        }
        vec![Reply::text(format!(
            "Status link for {target}:\n{}",
            self.supervisor.status_url(target)
        ))]
    }

    async fn delete_target(&self, user: UserId, target: &TargetId) -> Vec<Reply> {
        if let Err(reply) = self.guard_manage(user, target).await {
            return vec![reply];
        }
        match self.supervisor.delete(target).await {
            Ok(()) => vec![Reply::with_menu(
                format!("Deleted {target} and released its claim."),
                main_menu(),
            )],
            Err(e) => vec![self.supervisor_failure(&e)],
        }
    }

    async fn show_stats(&self) -> Vec<Reply> {
        let hosted = match self.ownership.list().await {
            Ok(records) => records.len(),
            Err(e) => return vec![self.store_failure(&e)],
        };
        let running = self.supervisor.running_targets().await.len();
        let stats = host_stats(&self.config.scripts_dir, hosted, running);
        vec![Reply::with_menu(format_host_stats(&stats), main_menu())]
    }

    // ---- administration ----

    async fn grant(&self, user: UserId, args: &str) -> Vec<Reply> {
        let granted = match self.admin_user_arg(user, args) {
            Ok(id) => id,
            Err(reply) => return vec![reply],
        };
        match self.allowed.grant(granted).await {
            Ok(true) => {
                tracing::info!(admin = user, granted, "Access granted");
                vec![Reply::text(format!("User {granted} can now use this host."))]
            }
            Ok(false) => vec![Reply::text(format!("User {granted} already had access."))],
            Err(e) => vec![self.store_failure(&e)],
        }
    }

    async fn revoke(&self, user: UserId, args: &str) -> Vec<Reply> {
        let revoked = match self.admin_user_arg(user, args) {
            Ok(id) => id,
            Err(reply) => return vec![reply],
        };
        match self.allowed.revoke(revoked).await {
            Ok(true) => {
                tracing::info!(admin = user, revoked, "Access revoked");
                vec![Reply::text(format!("Access revoked for user {revoked}."))]
            }
            Ok(false) => vec![Reply::text(format!("User {revoked} had no access."))],
            Err(e) => vec![self.store_failure(&e)],
        }
    }

    /// Admin guard plus user-id argument parsing for /grant and /revoke.
    fn admin_user_arg(&self, user: UserId, args: &str) -> Result<UserId, Reply> {
        if let Err(denied) = self.policy.authorize_admin(user) {
            return Err(self.denial(&denied));
        }
        args.parse::<UserId>()
            .map_err(|_| Reply::text("Give a numeric user id, like: /grant 12345"))
    }

    // ---- helpers ----

    /// Start `target` on behalf of `user` and render the outcome.
    async fn launch(&self, user: UserId, target: &TargetId) -> Vec<Reply> {
        match self.supervisor.start(&self.policy, user, target).await {
            Ok(StartOutcome::Running { pid, status_url }) => vec![Reply::with_menu(
                format!("Started {target} (pid {pid}).\nStatus: {status_url}"),
                manage_menu(target, true),
            )],
            Ok(StartOutcome::ExitedEarly {
                exit_code,
                log_tail,
            }) => {
                let code = exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "killed by signal".to_string());
                let mut text = format!("{target} exited right after launch (exit: {code}).");
                if !log_tail.trim().is_empty() {
                    text.push_str("\n\n");
                    text.push_str(&log_tail);
                }
                vec![Reply::with_menu(text, main_menu())]
            }
            Err(e) => vec![self.supervisor_failure(&e)],
        }
    }

    /// Run the installer and render its report.
    async fn report_install(
        &self,
        target: &TargetId,
        manifest_file: &std::path::Path,
        marker_file: &std::path::Path,
    ) -> Reply {
        match self.installer.install(manifest_file, marker_file).await {
            InstallReport::Installed => Reply::text("Dependencies installed."),
            InstallReport::SkippedUnchanged => {
                Reply::text("Dependencies unchanged, nothing to install.")
            }
            InstallReport::Failed { tail } => {
                tracing::warn!(target = %target, "Dependency install failed");
                Reply::text(format!(
                    "Dependency install failed:\n\n{tail}\n\nThe script can still be run."
                ))
            }
        }
    }

    /// Ownership lookup plus the owner-or-admin guard.
    async fn guard_manage(
        &self,
        user: UserId,
        target: &TargetId,
    ) -> Result<hostbot_store::OwnershipRecord, Reply> {
        let record = match self.ownership.get(target).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(Reply::text(format!("{target} is not hosted here."))),
            Err(e) => return Err(self.store_failure(&e)),
        };
        if let Err(denied) = self.policy.authorize_manage(user, record.owner) {
            return Err(self.denial(&denied));
        }
        Ok(record)
    }

    fn help(&self, user: UserId) -> Reply {
        let mut text = String::from(
            "Commands:\n\
             /upload -- host a single Python script\n\
             /clone -- host a script from a Git repository\n\
             /deploy -- build a one-click deploy link\n\
             /apps -- manage your hosted scripts\n\
             /stats -- host capacity and running count\n\
             /cancel -- abandon the current flow",
        );
        if self.policy.is_admin(user) {
            text.push_str(
                "\n/grant <user id> -- allow a user\n\
                 /revoke <user id> -- revoke a user",
            );
        }
        Reply::with_menu(text, main_menu())
    }

    /// Render a policy or validation error as a chat reply.
    fn denial(&self, e: &CoreError) -> Reply {
        match e {
            CoreError::Unauthorized(_) => Reply::text(
                "You are not authorized to use this host. Ask the administrator for access.",
            ),
            CoreError::Forbidden(_) => Reply::text("You don't have permission to do that."),
            CoreError::Validation(msg) => Reply::text(msg.clone()),
            CoreError::NotFound { .. } => Reply::text("That script is not hosted here."),
            CoreError::Conflict(msg) => Reply::text(msg.clone()),
            CoreError::Internal(msg) => {
                tracing::error!(error = %msg, "Conversation engine fault");
                Reply::text("Something went wrong on the host. Try again in a moment.")
            }
        }
    }

    fn store_failure(&self, e: &StoreError) -> Reply {
        match e {
            StoreError::OwnedByOther { target, owner } => {
                tracing::info!(target, owner, "Claim rejected");
                Reply::text(format!("{target} is already hosted by another user."))
            }
            other => {
                tracing::error!(error = %other, "State store fault");
                Reply::text("Something went wrong on the host. Try again in a moment.")
            }
        }
    }

    fn supervisor_failure(&self, e: &SupervisorError) -> Reply {
        match e {
            SupervisorError::AlreadyRunning(target) => {
                Reply::with_menu(format!("{target} is already running."), manage_menu(target, true))
            }
            SupervisorError::Spawn { target, source } => {
                tracing::error!(target = %target, error = %source, "Spawn failed");
                Reply::text(format!("Could not launch {target}: {source}"))
            }
            SupervisorError::Store(store) => self.store_failure(store),
            other => {
                tracing::error!(error = %other, "Supervisor fault");
                Reply::text("Something went wrong on the host. Try again in a moment.")
            }
        }
    }
}

/// Split `/command args` text. Returns `None` for plain text.
fn parse_command(text: &str) -> Option<(&str, &str)> {
    let text = text.trim();
    if !text.starts_with('/') {
        return None;
    }
    match text.split_once(char::is_whitespace) {
        Some((command, args)) => Some((command, args.trim())),
        None => Some((text, "")),
    }
}

/// One-click deploy link for a repository URL.
///
/// The URL is embedded as a single query parameter, so everything
/// including its own scheme separator gets percent-encoded.
fn deploy_link(url: &str) -> String {
    let trimmed = url.trim();
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);
    format!(
        "{DEPLOY_LINK_BASE}{}",
        utf8_percent_encode(trimmed, NON_ALPHANUMERIC)
    )
}

/// Write an intake document, making sure its work directory exists first.
async fn write_document(
    work_dir: &std::path::Path,
    dest: &std::path::Path,
    content: &[u8],
) -> std::io::Result<()> {
    tokio::fs::create_dir_all(work_dir).await?;
    tokio::fs::write(dest, content).await
}
