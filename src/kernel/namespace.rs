/// Mount and IPC namespace isolation for the job task
use crate::config::types::{Result, TmpdirError};

use nix::mount::{mount, MsFlags};
use nix::sched::{unshare, CloneFlags};

/// Namespaces every job task is moved into
pub fn isolation_flags() -> CloneFlags {
    CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWIPC
}

/// Check if namespace isolation is supported on this system
pub fn is_supported() -> bool {
    std::path::Path::new("/proc/self/ns/mnt").exists()
        && std::path::Path::new("/proc/self/ns/ipc").exists()
}

/// Enter new mount and IPC namespaces, then stop mount propagation.
///
/// Both steps are fatal on failure: a job must not get bind mounts in a
/// namespace that still shares mount events with the host.
pub fn isolate() -> Result<()> {
    unshare(isolation_flags()).map_err(|e| {
        TmpdirError::Namespace(format!(
            "Failed to unshare mount and IPC namespaces: {}",
            e
        ))
    })?;
    log::debug!("Entered new mount and IPC namespaces");

    harden_mount_propagation()
}

/// mount(NULL, "/", NULL, MS_REC | MS_PRIVATE, NULL)
///
/// Must run after the mount namespace exists and before any bind mount.
pub fn harden_mount_propagation() -> Result<()> {
    mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    )
    .map_err(|e| {
        TmpdirError::Namespace(format!(
            "Failed to make / recursively private: {}. \
            Job bind mounts could propagate to the host namespace.",
            e
        ))
    })?;

    log::info!("Mount propagation hardened: / set to MS_PRIVATE|MS_REC");
    Ok(())
}
