//! Domain types and pure logic for the hostbot control plane.
//!
//! Everything in this crate is IO-free: target identifiers and their
//! on-disk naming conventions, environment-overlay parsing, dependency
//! manifest normalization, the intake-flow state machine, and the access
//! policy. Crates that touch the filesystem, processes, or the network
//! build on top of these primitives.

pub mod auth;
pub mod envfile;
pub mod error;
pub mod intake;
pub mod manifest;
pub mod target;
pub mod types;

pub use error::CoreError;
