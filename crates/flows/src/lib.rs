//! Chat-driven intake and management flows.
//!
//! This crate turns transport-agnostic chat events into control-plane
//! actions. Three intake flows bring workloads onto the host (single-file
//! upload, repository clone, one-click deploy link), a session manager
//! tracks each user's place in their active flow, and the management
//! surface exposes stop, rerun, logs, status link, and delete for every
//! owned target. The [`ChatEngine`] ties all of it together.

pub mod clone;
pub mod engine;
pub mod event;
pub mod install;
pub mod reply;
pub mod session;
pub mod stats;

pub use engine::{ChatEngine, EngineConfig};
pub use event::{Callback, ChatEvent, DocumentUpload};
pub use reply::{Button, Menu, Reply};
pub use session::SessionManager;
