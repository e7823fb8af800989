//! Ownership registry.
//!
//! Maps target ids to the user who claimed them. A claim happens exactly
//! once per target lifetime, at intake (upload accepted or repository
//! entry picked); every later management action is checked against the
//! recorded owner. Records survive restarts in a single JSON document.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use hostbot_core::auth::AccessPolicy;
use hostbot_core::target::{TargetId, TargetKind};
use hostbot_core::types::UserId;

use crate::error::StoreError;
use crate::table;

/// One row of the ownership registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnershipRecord {
    pub owner: UserId,
    pub kind: TargetKind,
    pub claimed_at: DateTime<Utc>,
}

/// Result of a successful claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// A new record was written (first claim, or administrator takeover).
    Claimed,
    /// The caller already owned the target; nothing changed.
    AlreadyOwner,
}

type Table = BTreeMap<String, OwnershipRecord>;

/// Durable target-to-owner table.
///
/// All operations serialize on one internal mutex: every mutation is a
/// full load, modify, atomic-rewrite cycle, so two concurrent claims for
/// the same target can never both win.
pub struct OwnershipStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OwnershipStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        OwnershipStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Claim `target` for `user`.
    ///
    /// Unowned targets are claimed outright. A repeat claim by the current
    /// owner is an idempotent no-op. The administrator may take over a
    /// target owned by someone else; anyone else gets a conflict and the
    /// table is left untouched.
    pub async fn claim(
        &self,
        policy: &AccessPolicy,
        target: &TargetId,
        user: UserId,
    ) -> Result<ClaimOutcome, StoreError> {
        let _guard = self.lock.lock().await;
        let mut table: Table = table::load_or_default(&self.path).await?;

        if let Some(record) = table.get(target.as_str()) {
            if record.owner == user {
                return Ok(ClaimOutcome::AlreadyOwner);
            }
            if !policy.is_admin(user) {
                return Err(StoreError::OwnedByOther {
                    target: target.as_str().to_string(),
                    owner: record.owner,
                });
            }
            tracing::warn!(
                target = %target,
                previous_owner = record.owner,
                user,
                "Administrator takeover of owned target"
            );
        }

        table.insert(
            target.as_str().to_string(),
            OwnershipRecord {
                owner: user,
                kind: target.kind(),
                claimed_at: Utc::now(),
            },
        );
        table::persist(&self.path, &table).await?;
        tracing::info!(target = %target, user, "Target claimed");
        Ok(ClaimOutcome::Claimed)
    }

    /// Remove the record for `target`. Returns whether one existed.
    pub async fn release(&self, target: &TargetId) -> Result<bool, StoreError> {
        let _guard = self.lock.lock().await;
        let mut table: Table = table::load_or_default(&self.path).await?;
        let existed = table.remove(target.as_str()).is_some();
        if existed {
            table::persist(&self.path, &table).await?;
            tracing::info!(target = %target, "Ownership released");
        }
        Ok(existed)
    }

    /// Full record for `target`, if claimed.
    pub async fn get(&self, target: &TargetId) -> Result<Option<OwnershipRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        let table: Table = table::load_or_default(&self.path).await?;
        Ok(table.get(target.as_str()).cloned())
    }

    /// Owner of `target`, if claimed.
    pub async fn owner_of(&self, target: &TargetId) -> Result<Option<UserId>, StoreError> {
        Ok(self.get(target).await?.map(|r| r.owner))
    }

    /// Every record, ordered by target id.
    pub async fn list(&self) -> Result<Vec<(TargetId, OwnershipRecord)>, StoreError> {
        let _guard = self.lock.lock().await;
        let table: Table = table::load_or_default(&self.path).await?;
        Ok(table
            .into_iter()
            .map(|(id, record)| (TargetId::parse(id), record))
            .collect())
    }

    /// Records visible to `user`: their own, or everything for the
    /// administrator.
    pub async fn list_visible_to(
        &self,
        policy: &AccessPolicy,
        user: UserId,
    ) -> Result<Vec<(TargetId, OwnershipRecord)>, StoreError> {
        let all = self.list().await?;
        if policy.is_admin(user) {
            return Ok(all);
        }
        Ok(all.into_iter().filter(|(_, r)| r.owner == user).collect())
    }

    /// Ids of other claimed entries belonging to the same repository.
    ///
    /// Used when deleting a repo entry to decide whether the repository
    /// directory itself is still needed.
    pub async fn repo_siblings(
        &self,
        repo: &str,
        excluding: &TargetId,
    ) -> Result<Vec<TargetId>, StoreError> {
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|(id, _)| {
                id != excluding && matches!(id.split_composite(), Some((r, _)) if r == repo)
            })
            .map(|(id, _)| id)
            .collect())
    }
}
