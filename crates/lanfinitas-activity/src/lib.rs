//! Activity timeline for the delegation console.
//!
//! Turns the current task, delegation and agent snapshots into a single
//! most-recent-first event stream with per-kind tallies. Derivation is
//! pure: no I/O, no shared state, same inputs give the same timeline.

pub mod deriver;
pub mod directory;
pub mod event;
pub mod feed;

pub use deriver::{derive_events, derive_timeline, ActivityCounts, Timeline};
pub use directory::{AgentDirectory, TaskDirectory};
pub use event::{ActivityEvent, ActivityKind, EventMetadata};
pub use feed::{ActivityFeed, ActivityFilter};
