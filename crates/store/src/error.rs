use std::path::PathBuf;

use hostbot_core::types::UserId;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Target '{target}' is already owned by user {owner}")]
    OwnedByOther { target: String, owner: UserId },

    #[error("Failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode state file {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },
}
