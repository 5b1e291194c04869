//! External scheduler and command integration
//!
//! Every subprocess goes through [`runner::CommandRunner`] so that scheduler
//! answers can be replaced with canned output in tests.

pub mod jobs;
pub mod license;
pub mod runner;

pub use license::LicenseChecker;
pub use runner::{CommandOutput, CommandRunner, SystemCommandRunner};
