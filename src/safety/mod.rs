//! Job directory lifecycle
//!
//! Creation with exact ownership and modes, one-filesystem removal, and
//! detection of directories left behind by failed epilogs.

pub mod provision;
pub mod reaper;
pub mod safe_cleanup;
pub mod sweep;

pub use provision::{provision, DirectoryLease, Owner};
pub use reaper::{cleanup, reap_job, reap_paths, CleanupReport};
