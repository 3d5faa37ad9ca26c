//! Lanfinitas activity console.
//!
//! Polls the backend for tasks, delegations and agents, derives the
//! activity timeline from each snapshot and renders it in a terminal UI
//! or as a one-shot dump.

pub mod auth;
pub mod client;
pub mod config;
pub mod console;
pub mod dump;
pub mod poller;
pub mod view;

pub use auth::Session;
pub use client::{ApiClient, ClientError};
pub use config::ConsoleConfig;
pub use poller::{Poller, ResourceKind, SharedSnapshot, SnapshotState};
