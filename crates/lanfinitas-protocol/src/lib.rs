//! Lanfinitas Protocol - wire types shared by the console crates
//!
//! Models the task, delegation and agent collections returned by the
//! backend REST API, plus the response envelope those endpoints use.

pub mod constants;
pub mod envelope;
pub mod error;
pub mod timestamp;
pub mod types;

pub use constants::*;
pub use envelope::*;
pub use error::*;
pub use timestamp::parse_timestamp;
pub use types::*;
