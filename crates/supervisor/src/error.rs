use hostbot_core::target::TargetId;
use hostbot_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("Target '{0}' is already running")]
    AlreadyRunning(TargetId),

    #[error("Failed to spawn '{target}': {source}")]
    Spawn {
        target: TargetId,
        source: std::io::Error,
    },

    #[error("Log access failed for '{target}': {source}")]
    Log {
        target: TargetId,
        source: std::io::Error,
    },

    #[error("Cleanup failed for '{target}': {source}")]
    Cleanup {
        target: TargetId,
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}
