/// Epilog-time removal of a job's directories.
///
/// Best effort: every path is attempted even when an earlier one fails, and
/// the outcome is reported rather than raised so the epilog is never wedged.
use crate::job::paths::JobPaths;
use crate::safety::safe_cleanup::{remove_tree_one_fs, Removal};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Paths that did not exist (setup never got that far, or a retry)
    pub absent: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: CleanupReport) {
        self.removed.extend(other.removed);
        self.absent.extend(other.absent);
        self.failed.extend(other.failed);
    }
}

fn reap_one(path: &Path) -> CleanupReport {
    let mut report = CleanupReport::default();
    match remove_tree_one_fs(path) {
        Ok(Removal::Removed) => {
            log::info!("Removed {}", path.display());
            report.removed.push(path.to_path_buf());
        }
        Ok(Removal::Absent) => {
            log::debug!("{} already absent", path.display());
            report.absent.push(path.to_path_buf());
        }
        Err(e) => {
            log::error!("Failed to remove {}: {}", path.display(), e);
            report.failed.push((path.to_path_buf(), e.to_string()));
        }
    }
    report
}

/// Remove every path, continuing past failures
pub fn reap_paths<'p, I>(paths: I) -> CleanupReport
where
    I: IntoIterator<Item = &'p Path>,
{
    paths
        .into_iter()
        .fold(CleanupReport::default(), |mut report, path| {
            report.merge(reap_one(path));
            report
        })
}

/// Remove the scratch root and shared-memory directory of one job
pub fn cleanup(scratch_root: &Path, shm: &Path) -> CleanupReport {
    reap_paths([scratch_root, shm])
}

pub fn reap_job(paths: &JobPaths) -> CleanupReport {
    cleanup(&paths.scratch_root, &paths.shm)
}
