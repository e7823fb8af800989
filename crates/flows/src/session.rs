//! Per-user conversation sessions.
//!
//! A session exists only while an intake flow is active. State changes go
//! through [`SessionManager::advance`], which enforces the flow transition
//! table; an illegal step is an engine bug and surfaces as an internal
//! error instead of silently corrupting the conversation. Idle sessions
//! are swept by a janitor task so an abandoned flow cannot pin a claim
//! prompt forever.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use hostbot_core::error::CoreError;
use hostbot_core::intake::{transition_allowed, FlowState};
use hostbot_core::types::UserId;

struct Session {
    state: FlowState,
    last_activity: Instant,
}

pub struct SessionManager {
    ttl: Duration,
    sessions: RwLock<HashMap<UserId, Session>>,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(SessionManager {
            ttl,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Current flow state for `user`, if a session is active.
    pub async fn state_of(&self, user: UserId) -> Option<FlowState> {
        let sessions = self.sessions.read().await;
        sessions.get(&user).map(|s| s.state.clone())
    }

    /// Start (or restart) a flow for `user`, replacing any active session.
    pub async fn begin(&self, user: UserId, state: FlowState) {
        tracing::debug!(user, state = state.label(), "Flow started");
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            user,
            Session {
                state,
                last_activity: Instant::now(),
            },
        );
    }

    /// Step the active flow to `next`, enforcing the transition table.
    pub async fn advance(&self, user: UserId, next: FlowState) -> Result<(), CoreError> {
        let mut sessions = self.sessions.write().await;
        let Some(session) = sessions.get_mut(&user) else {
            return Err(CoreError::Internal(format!(
                "no active session for user {user} to advance"
            )));
        };
        if !transition_allowed(&session.state, &next) {
            return Err(CoreError::Internal(format!(
                "illegal flow transition {} -> {}",
                session.state.label(),
                next.label()
            )));
        }
        tracing::debug!(
            user,
            from = session.state.label(),
            to = next.label(),
            "Flow advanced"
        );
        session.state = next;
        session.last_activity = Instant::now();
        Ok(())
    }

    /// End the session. Returns whether one was active.
    pub async fn clear(&self, user: UserId) -> bool {
        let mut sessions = self.sessions.write().await;
        let existed = sessions.remove(&user).is_some();
        if existed {
            tracing::debug!(user, "Flow ended");
        }
        existed
    }

    /// Refresh the idle timer on user activity.
    pub async fn touch(&self, user: UserId) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(&user) {
            session.last_activity = Instant::now();
        }
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle longer than the TTL. Returns how many went.
    pub async fn expire_idle(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|user, session| {
            let keep = session.last_activity.elapsed() < self.ttl;
            if !keep {
                tracing::info!(user, state = session.state.label(), "Expired idle flow");
            }
            keep
        });
        before - sessions.len()
    }

    /// Periodic sweep task; stops when `cancel` fires.
    pub fn spawn_janitor(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        manager.expire_idle().await;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use hostbot_core::target::TargetId;

    fn extras() -> FlowState {
        FlowState::Extras {
            target: TargetId::file("bot.py"),
            pending: None,
        }
    }

    #[tokio::test]
    async fn begin_and_clear() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        assert_eq!(sessions.state_of(1).await, None);

        sessions.begin(1, FlowState::AwaitScript).await;
        assert_eq!(sessions.state_of(1).await, Some(FlowState::AwaitScript));
        assert_eq!(sessions.active_count().await, 1);

        assert!(sessions.clear(1).await);
        assert!(!sessions.clear(1).await);
        assert_eq!(sessions.state_of(1).await, None);
    }

    #[tokio::test]
    async fn advance_follows_the_transition_table() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        sessions.begin(1, FlowState::AwaitScript).await;

        sessions.advance(1, extras()).await.unwrap();
        assert_eq!(sessions.state_of(1).await, Some(extras()));
    }

    #[tokio::test]
    async fn illegal_advance_is_an_internal_error() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        sessions.begin(1, FlowState::AwaitDeployUrl).await;

        let err = sessions.advance(1, extras()).await.unwrap_err();
        assert_matches!(err, CoreError::Internal(_));
        // State is untouched after the rejected step.
        assert_eq!(sessions.state_of(1).await, Some(FlowState::AwaitDeployUrl));
    }

    #[tokio::test]
    async fn advance_without_session_fails() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        assert_matches!(
            sessions.advance(1, extras()).await,
            Err(CoreError::Internal(_))
        );
    }

    #[tokio::test]
    async fn idle_sessions_expire_and_touch_refreshes() {
        let sessions = SessionManager::new(Duration::from_millis(80));
        sessions.begin(1, FlowState::AwaitScript).await;
        sessions.begin(2, FlowState::AwaitRepoUrl).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        sessions.touch(1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // User 2 went idle for the full 100ms, user 1 only for 50ms.
        assert_eq!(sessions.expire_idle().await, 1);
        assert_eq!(sessions.state_of(1).await, Some(FlowState::AwaitScript));
        assert_eq!(sessions.state_of(2).await, None);
    }

    #[tokio::test]
    async fn janitor_sweeps_in_the_background() {
        let sessions = SessionManager::new(Duration::from_millis(50));
        let cancel = CancellationToken::new();
        let handle = sessions.spawn_janitor(Duration::from_millis(25), cancel.clone());

        sessions.begin(1, FlowState::AwaitScript).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sessions.active_count().await, 0);

        cancel.cancel();
        handle.await.unwrap();
    }
}
