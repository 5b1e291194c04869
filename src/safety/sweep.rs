/// Orphan sweep: find per-job directories whose job is no longer running.
///
/// Left behind when an epilog failed or never ran. Deletion is fail-closed:
/// if the scheduler cannot list running jobs, nothing is classified.
use crate::config::settings::TmpdirConfig;
use crate::config::types::{JobId, Result, TmpdirError};
use crate::job::paths::job_id_from_dir_name;
use crate::safety::reaper::{reap_paths, CleanupReport};
use crate::scheduler::jobs::{node_name, running_jobs};
use crate::scheduler::runner::CommandRunner;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

#[derive(Clone, Debug)]
pub struct SweepOptions {
    /// Directories younger than this are never orphans
    pub min_age: Duration,
    pub remove: bool,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            min_age: Duration::from_secs(3600),
            remove: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Orphan {
    pub job_id: JobId,
    pub path: PathBuf,
    pub age_secs: u64,
}

#[derive(Debug, Default)]
pub struct SweepReport {
    pub running: BTreeSet<JobId>,
    pub orphans: Vec<Orphan>,
    /// Set only when removal was requested
    pub cleanup: Option<CleanupReport>,
}

/// List per-job directories under the scratch and shm bases that belong to
/// no running job and are at least `min_age` old.
pub fn find_orphans(
    config: &TmpdirConfig,
    running: &BTreeSet<JobId>,
    min_age: Duration,
    now: SystemTime,
) -> Result<Vec<Orphan>> {
    let mut orphans = Vec::new();
    for base in [&config.scratch_base, &config.shm_base] {
        scan_base(base, running, min_age, now, &mut orphans)?;
    }
    Ok(orphans)
}

fn scan_base(
    base: &Path,
    running: &BTreeSet<JobId>,
    min_age: Duration,
    now: SystemTime,
    orphans: &mut Vec<Orphan>,
) -> Result<()> {
    let entries = match fs::read_dir(base) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            log::debug!("Sweep base {} does not exist", base.display());
            return Ok(());
        }
        Err(e) => {
            return Err(TmpdirError::Filesystem(format!(
                "Failed to list {}: {}",
                base.display(),
                e
            )))
        }
    };

    for entry in entries {
        let entry = entry?;
        let Some(job_id) = entry.file_name().to_str().and_then(job_id_from_dir_name) else {
            continue;
        };
        if running.contains(&job_id) {
            continue;
        }

        let path = entry.path();
        let modified = match fs::symlink_metadata(&path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => {
                log::warn!("Cannot read age of {}: {}", path.display(), e);
                continue;
            }
        };
        // Clock skew makes a future mtime count as brand new
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        if age < min_age {
            log::debug!(
                "Skipping {}: job {} not running but only {}s old",
                path.display(),
                job_id,
                age.as_secs()
            );
            continue;
        }

        orphans.push(Orphan {
            job_id,
            path,
            age_secs: age.as_secs(),
        });
    }

    Ok(())
}

/// Query the scheduler, find orphans and optionally remove them
pub fn sweep(
    config: &TmpdirConfig,
    runner: &dyn CommandRunner,
    options: &SweepOptions,
) -> Result<SweepReport> {
    let node = node_name(config)?;
    let running = running_jobs(config, runner, &node)?;
    log::info!("{} jobs running on {}", running.len(), node);

    let orphans = find_orphans(config, &running, options.min_age, SystemTime::now())?;
    for orphan in &orphans {
        log::warn!(
            "Orphaned directory {} (job {}, {}s old)",
            orphan.path.display(),
            orphan.job_id,
            orphan.age_secs
        );
    }

    let cleanup = options
        .remove
        .then(|| reap_paths(orphans.iter().map(|orphan| orphan.path.as_path())));

    Ok(SweepReport {
        running,
        orphans,
        cleanup,
    })
}
