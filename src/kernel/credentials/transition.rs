//! Drop from root to the job's UID/GID before exec.

use super::validation::validate_ids;
use crate::config::types::{Result, TmpdirError};
use nix::unistd::{getegid, geteuid, getgid, getuid, setgroups, setresgid, setresuid, Gid, Uid};

/// validate -> clear groups -> setresgid -> setresuid -> verify
pub fn transition_to_job_user(uid: u32, gid: u32) -> Result<()> {
    validate_ids(uid, gid)?;

    setgroups(&[]).map_err(|e| {
        TmpdirError::Privilege(format!("Failed to clear supplementary groups: {}", e))
    })?;

    // GID before UID
    let gid = Gid::from_raw(gid);
    setresgid(gid, gid, gid)
        .map_err(|e| TmpdirError::Privilege(format!("Failed to setresgid({}): {}", gid, e)))?;

    let uid = Uid::from_raw(uid);
    setresuid(uid, uid, uid)
        .map_err(|e| TmpdirError::Privilege(format!("Failed to setresuid({}): {}", uid, e)))?;

    if getuid() != uid || geteuid() != uid || getgid() != gid || getegid() != gid {
        return Err(TmpdirError::Privilege(format!(
            "Credential verification failed: expected {}:{}, got {}:{} (effective {}:{})",
            uid,
            gid,
            getuid(),
            getgid(),
            geteuid(),
            getegid()
        )));
    }

    log::info!("Transitioned to UID={}, GID={}", uid, gid);
    Ok(())
}
