/// Host job-context interface.
///
/// The host framework owns job identity; this crate only reads it and asks
/// the host to export environment variables into the job.
use crate::config::types::{JobId, Result, TmpdirError};
use std::collections::BTreeMap;

pub trait JobContext {
    fn job_id(&self) -> Result<JobId>;

    fn job_uid(&self) -> Result<u32>;

    /// `None` when the host cannot provide a GID at this point of the job
    /// lifecycle; ownership changes then leave the group untouched.
    fn job_gid(&self) -> Option<u32> {
        None
    }

    fn set_env(&mut self, name: &str, value: &str, overwrite: bool) -> Result<()>;
}

/// In-process job context used by the command line front end and tests
#[derive(Clone, Debug, Default)]
pub struct LocalJobContext {
    job_id: Option<JobId>,
    uid: Option<u32>,
    gid: Option<u32>,
    env: BTreeMap<String, String>,
}

impl LocalJobContext {
    pub fn new(job_id: JobId, uid: u32, gid: Option<u32>) -> Self {
        Self {
            job_id: Some(job_id),
            uid: Some(uid),
            gid,
            env: BTreeMap::new(),
        }
    }

    /// Context for the epilog, where only the job identifier is needed
    pub fn for_epilog(job_id: JobId) -> Self {
        Self {
            job_id: Some(job_id),
            ..Self::default()
        }
    }

    /// Environment variables exported through `set_env`
    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }
}

impl JobContext for LocalJobContext {
    fn job_id(&self) -> Result<JobId> {
        self.job_id
            .clone()
            .ok_or_else(|| TmpdirError::Job("job identifier not available".to_string()))
    }

    fn job_uid(&self) -> Result<u32> {
        self.uid
            .ok_or_else(|| TmpdirError::Job("job UID not available".to_string()))
    }

    fn job_gid(&self) -> Option<u32> {
        self.gid
    }

    fn set_env(&mut self, name: &str, value: &str, overwrite: bool) -> Result<()> {
        if name.is_empty() || name.contains('=') || name.contains('\0') || value.contains('\0') {
            return Err(TmpdirError::Environment(format!(
                "invalid environment assignment {:?}={:?}",
                name, value
            )));
        }
        if overwrite || !self.env.contains_key(name) {
            self.env.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }
}
