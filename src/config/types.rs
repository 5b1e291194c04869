/// Core types shared across the private-tmpdir crate
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Opaque identifier of a job running on this node.
///
/// The identifier ends up as a path component (`slurm_{id}`), so parsing
/// rejects anything that could escape the base directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JobId(String);

impl JobId {
    /// Parse a job identifier supplied by the host framework or the CLI
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(TmpdirError::Job("job identifier is empty".to_string()));
        }
        if raw == "." || raw == ".." {
            return Err(TmpdirError::Job(format!(
                "job identifier {:?} is not a valid path component",
                raw
            )));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
        {
            return Err(TmpdirError::Job(format!(
                "job identifier {:?} contains forbidden character {:?}",
                raw, bad
            )));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u32> for JobId {
    fn from(id: u32) -> Self {
        Self(id.to_string())
    }
}

impl TryFrom<String> for JobId {
    type Error = TmpdirError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<JobId> for String {
    fn from(id: JobId) -> Self {
        id.0
    }
}

/// How a license name is matched against the scheduler's license listing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LicenseMatch {
    /// Plain substring search in the whitespace-normalized output line
    #[default]
    Substring,
    /// Equality against one of the listed license tokens
    ExactToken,
}

/// Error types for job scratch provisioning and teardown
#[derive(Error, Debug)]
pub enum TmpdirError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job context error: {0}")]
    Job(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Namespace isolation error: {0}")]
    Namespace(String),

    #[error("Bind mount error: {0}")]
    Mount(String),

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Privilege error: {0}")]
    Privilege(String),

    #[error("Command error: {0}")]
    Command(String),

    #[error("Cleanup error: {0}")]
    Cleanup(String),
}

pub type Result<T> = std::result::Result<T, TmpdirError>;
