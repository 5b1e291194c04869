/// Per-job directory provisioning.
///
/// Layout and permission contract:
///
/// | path                         | owner   | mode            |
/// |------------------------------|---------|-----------------|
/// | `{scratch}/slurm_{job}`      | job uid | `rwx------`     |
/// | `.../.tmp`, `.../.var.tmp`   | job uid | `rwxrwxrwx`     |
/// | `.../.{licensed_fs}` (opt.)  | job uid | `rwxr-xr-x`     |
/// | `{shm}/slurm_{job}`          | job uid | `rwxr-xr-x`     |
///
/// `.tmp` and `.var.tmp` are world writable because the job may later run
/// under a different UID/GID and must still be able to use `$TMPDIR`. They
/// sit behind the owner-only scratch root. The shm directory sits directly
/// in the host's shared-memory base, where world write would let any local
/// user plant files in the job's `/dev/shm`, so it stays owner-writable.
use crate::config::types::{Result, TmpdirError};
use crate::job::paths::JobPaths;
use nix::unistd::{chown, Gid, Uid};
use std::fs::{self, DirBuilder, Permissions};
use std::io::ErrorKind;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;

pub const SCRATCH_ROOT_MODE: u32 = 0o700;
pub const TMP_MODE: u32 = 0o777;
pub const SHM_MODE: u32 = 0o755;
pub const SHADOW_MODE: u32 = 0o755;

/// Owner applied to the job's directories
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    /// `None` leaves the group unchanged
    pub gid: Option<u32>,
}

/// Directories created for one job, owned by that job until the epilog.
///
/// Only [`provision`] constructs a lease, so holding one proves the
/// directory tree exists with the right ownership and modes.
#[derive(Debug)]
pub struct DirectoryLease {
    paths: JobPaths,
    owner: Owner,
    licensed: bool,
}

impl DirectoryLease {
    pub fn paths(&self) -> &JobPaths {
        &self.paths
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    /// Whether the job may see the licensed filesystem
    pub fn licensed(&self) -> bool {
        self.licensed
    }

    /// Every directory in the lease, in creation order
    pub fn directories(&self) -> Vec<&Path> {
        let mut dirs = vec![
            self.paths.scratch_root.as_path(),
            self.paths.tmp.as_path(),
            self.paths.var_tmp.as_path(),
        ];
        if !self.licensed {
            dirs.push(self.paths.licensed_fs_shadow.as_path());
        }
        dirs.push(self.paths.shm.as_path());
        dirs
    }
}

/// Create, chown and chmod the job's directory tree.
///
/// Creation is exclusive: an existing per-job directory means a job ID
/// collision or leftovers from a crash, and is reported instead of reused.
/// Nothing is rolled back on failure; the epilog reaper removes partial state.
pub fn provision(paths: &JobPaths, owner: Owner, licensed: bool) -> Result<DirectoryLease> {
    // Owner-only from the start so nothing is briefly open before chmod
    create_dir_exclusive(&paths.scratch_root, SCRATCH_ROOT_MODE)?;
    create_dir_exclusive(&paths.tmp, SCRATCH_ROOT_MODE)?;
    create_dir_exclusive(&paths.var_tmp, SCRATCH_ROOT_MODE)?;
    if !licensed {
        create_dir_exclusive(&paths.licensed_fs_shadow, SCRATCH_ROOT_MODE)?;
    }
    create_dir_exclusive(&paths.shm, SCRATCH_ROOT_MODE)?;

    let lease = DirectoryLease {
        paths: paths.clone(),
        owner,
        licensed,
    };

    for dir in lease.directories() {
        change_owner(dir, owner)?;
    }

    // Explicit modes; the creating process's umask must not matter
    set_mode(&paths.scratch_root, SCRATCH_ROOT_MODE)?;
    set_mode(&paths.tmp, TMP_MODE)?;
    set_mode(&paths.var_tmp, TMP_MODE)?;
    if !licensed {
        set_mode(&paths.licensed_fs_shadow, SHADOW_MODE)?;
    }
    set_mode(&paths.shm, SHM_MODE)?;

    log::info!(
        "Provisioned scratch for job {} at {} and {} (uid={}, gid={:?}, licensed={})",
        paths.job_id,
        paths.scratch_root.display(),
        paths.shm.display(),
        owner.uid,
        owner.gid,
        licensed
    );

    Ok(lease)
}

fn create_dir_exclusive(path: &Path, mode: u32) -> Result<()> {
    DirBuilder::new().mode(mode).create(path).map_err(|e| {
        if e.kind() == ErrorKind::AlreadyExists {
            TmpdirError::Filesystem(format!(
                "{} already exists (job ID collision or stale directory from an earlier job)",
                path.display()
            ))
        } else {
            TmpdirError::Filesystem(format!("Failed to create {}: {}", path.display(), e))
        }
    })
}

fn change_owner(path: &Path, owner: Owner) -> Result<()> {
    chown(
        path,
        Some(Uid::from_raw(owner.uid)),
        owner.gid.map(Gid::from_raw),
    )
    .map_err(|e| {
        TmpdirError::Filesystem(format!(
            "Failed to chown {} to uid {}: {}",
            path.display(),
            owner.uid,
            e
        ))
    })
}

fn set_mode(path: &Path, mode: u32) -> Result<()> {
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(|e| {
        TmpdirError::Filesystem(format!(
            "Failed to chmod {} to {:o}: {}",
            path.display(),
            mode,
            e
        ))
    })
}
