//! Configuration and shared types
//!
//! Node configuration loading and validation, error taxonomy.

pub mod settings;
pub mod types;
