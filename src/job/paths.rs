/// Deterministic per-job path derivation.
///
/// Setup and cleanup run in different processes and never share state, so
/// both sides must recompute these paths from the same inputs.
use crate::config::settings::TmpdirConfig;
use crate::config::types::JobId;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Prefix of every per-job directory name
pub const JOB_DIR_PREFIX: &str = "slurm_";

/// `{base}/slurm_{job}`
pub fn derive(base: &Path, job: &JobId) -> PathBuf {
    base.join(format!("{}{}", JOB_DIR_PREFIX, job))
}

/// Extract the job identifier from a per-job directory name
pub fn job_id_from_dir_name(name: &str) -> Option<JobId> {
    name.strip_prefix(JOB_DIR_PREFIX)
        .and_then(|raw| JobId::parse(raw).ok())
}

/// Every path owned by one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct JobPaths {
    pub job_id: JobId,
    /// `{scratch_base}/slurm_{job}`
    pub scratch_root: PathBuf,
    /// `{scratch_root}/.tmp`
    pub tmp: PathBuf,
    /// `{scratch_root}/.var.tmp`
    pub var_tmp: PathBuf,
    /// `{scratch_root}/.{licensed_fs_name}`
    pub licensed_fs_shadow: PathBuf,
    /// `{shm_base}/slurm_{job}`
    pub shm: PathBuf,
}

impl JobPaths {
    pub fn derive(config: &TmpdirConfig, job: &JobId) -> Self {
        let scratch_root = derive(&config.scratch_base, job);
        Self {
            job_id: job.clone(),
            tmp: scratch_root.join(".tmp"),
            var_tmp: scratch_root.join(".var.tmp"),
            licensed_fs_shadow: scratch_root.join(format!(".{}", config.licensed_fs_name)),
            shm: derive(&config.shm_base, job),
            scratch_root,
        }
    }
}
