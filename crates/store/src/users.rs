//! Allowed-user list.
//!
//! A flat set of chat-user ids permitted to talk to the control plane.
//! The administrator is implicitly allowed and never needs to appear here.
//! Persisted as a sorted JSON array.

use std::collections::BTreeSet;
use std::path::PathBuf;

use tokio::sync::Mutex;

use hostbot_core::types::UserId;

use crate::error::StoreError;
use crate::table;

pub struct AllowedUsersStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AllowedUsersStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AllowedUsersStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub async fn is_allowed(&self, user: UserId) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let set: BTreeSet<UserId> = table::load_or_default(&self.path).await?;
        Ok(set.contains(&user))
    }

    /// Add `user` to the list. Returns whether the user was newly added.
    pub async fn grant(&self, user: UserId) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut set: BTreeSet<UserId> = table::load_or_default(&self.path).await?;
        let added = set.insert(user);
        if added {
            table::persist(&self.path, &set).await?;
            tracing::info!(user, "User granted access");
        }
        Ok(added)
    }

    /// Remove `user` from the list. Returns whether the user was present.
    pub async fn revoke(&self, user: UserId) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut set: BTreeSet<UserId> = table::load_or_default(&self.path).await?;
        let removed = set.remove(&user);
        if removed {
            table::persist(&self.path, &set).await?;
            tracing::info!(user, "User access revoked");
        }
        Ok(removed)
    }

    pub async fn list(&self) -> Result<Vec<UserId>, StoreError> {
        let _guard = self.lock.lock().await;
        let set: BTreeSet<UserId> = table::load_or_default(&self.path).await?;
        Ok(set.into_iter().collect())
    }
}
