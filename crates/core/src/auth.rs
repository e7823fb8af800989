//! Access policy.
//!
//! Every entry point that mutates hosted state runs through one of these
//! guards before doing anything else. The policy itself is tiny: one
//! optional administrator id, plus the rule that a target may only be
//! managed by its owner or the administrator. Membership in the
//! allowed-user list lives in the store; callers pass the looked-up flag.

use crate::error::CoreError;
use crate::types::UserId;

#[derive(Debug, Clone, Copy)]
pub struct AccessPolicy {
    admin_id: Option<UserId>,
}

impl AccessPolicy {
    pub fn new(admin_id: Option<UserId>) -> Self {
        AccessPolicy { admin_id }
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admin_id == Some(user)
    }

    /// Whether `user` may manage a target owned by `owner`.
    pub fn can_manage(&self, user: UserId, owner: UserId) -> bool {
        user == owner || self.is_admin(user)
    }

    /// Guard: caller must be recognized (administrator or on the allowed
    /// list) before any conversation is served.
    pub fn authorize_recognized(&self, user: UserId, allowed: bool) -> Result<(), CoreError> {
        if allowed || self.is_admin(user) {
            Ok(())
        } else {
            Err(CoreError::Unauthorized(format!(
                "user {user} is not on the allowed list"
            )))
        }
    }

    /// Guard: caller must be the owner of the target or the administrator.
    pub fn authorize_manage(&self, user: UserId, owner: UserId) -> Result<(), CoreError> {
        if self.can_manage(user, owner) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "user {user} does not own this target"
            )))
        }
    }

    /// Guard: administrator-only operation.
    pub fn authorize_admin(&self, user: UserId) -> Result<(), CoreError> {
        if self.is_admin(user) {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!(
                "user {user} is not the administrator"
            )))
        }
    }
}
