//! Task setup sequencing
//!
//! - [`setup`]: type-state chain Unisolated -> Isolated -> Overlaid -> Finalized
//! - [`environment`]: TMPDIR export and kernel tunable reload

pub mod environment;
pub mod setup;

pub use setup::{Finalized, Isolated, Overlaid, TaskSetup, Unisolated};
