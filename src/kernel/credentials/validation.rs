//! Credential validation logic.

use crate::config::types::{Result, TmpdirError};

/// Jobs never run as root.
pub fn validate_ids(uid: u32, gid: u32) -> Result<()> {
    if uid == 0 || gid == 0 {
        return Err(TmpdirError::Privilege(format!(
            "Refusing to run job as root (uid={}, gid={})",
            uid, gid
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_root_uid() {
        assert!(validate_ids(0, 1000).is_err());
    }

    #[test]
    fn rejects_root_gid() {
        assert!(validate_ids(1000, 0).is_err());
    }

    #[test]
    fn accepts_job_user() {
        assert!(validate_ids(5001, 5001).is_ok());
    }
}
