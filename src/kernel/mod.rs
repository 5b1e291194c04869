//! Thin wrappers around Linux kernel primitives.
//!
//! Ordering: namespace -> mount -> credentials

pub mod credentials;
pub mod mount;
pub mod namespace;
