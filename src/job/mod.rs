//! Job identity and per-job path derivation

pub mod context;
pub mod paths;

pub use context::{JobContext, LocalJobContext};
pub use paths::JobPaths;
