//! Durable state tables.
//!
//! Two small JSON documents survive control-plane restarts: the ownership
//! registry (which user claimed which target) and the allowed-user list.
//! Each table is guarded by its own async mutex and rewritten atomically
//! (temp file + rename) on every mutation, so concurrent callers serialize
//! cleanly and a crash mid-write never leaves a torn file behind.
//!
//! Running-process state is deliberately *not* persisted here; children do
//! not survive a control-plane restart, so the supervisor rebuilds its
//! table from scratch.

pub mod error;
pub mod ownership;
pub mod users;

mod table;

pub use error::StoreError;
pub use ownership::{ClaimOutcome, OwnershipRecord, OwnershipStore};
pub use users::AllowedUsersStore;
