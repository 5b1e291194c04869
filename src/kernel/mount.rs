/// Bind-mount overlay of the job's directories onto well-known paths
use crate::config::settings::TmpdirConfig;
use crate::config::types::{Result, TmpdirError};
use crate::safety::provision::DirectoryLease;
use nix::mount::{mount, MsFlags};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// Ordered bind mounts for one job
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MountOverlay {
    bindings: Vec<Binding>,
}

impl MountOverlay {
    /// `.tmp -> /tmp`, `.var.tmp -> /var/tmp`, the licensed filesystem shadow
    /// when the job is unlicensed, then the scratch root and shm directory.
    pub fn plan(lease: &DirectoryLease, config: &TmpdirConfig) -> Self {
        let paths = lease.paths();
        let mut bindings = vec![
            Binding {
                source: paths.tmp.clone(),
                target: config.tmp_target.clone(),
            },
            Binding {
                source: paths.var_tmp.clone(),
                target: config.var_tmp_target.clone(),
            },
        ];
        if !lease.licensed() {
            bindings.push(Binding {
                source: paths.licensed_fs_shadow.clone(),
                target: config.licensed_fs_mount.clone(),
            });
        }
        bindings.push(Binding {
            source: paths.scratch_root.clone(),
            target: config.scratch_target.clone(),
        });
        bindings.push(Binding {
            source: paths.shm.clone(),
            target: config.shm_target.clone(),
        });

        Self { bindings }
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Apply every binding in order, stopping at the first failure.
    ///
    /// Callers must have isolated the mount namespace first; the setup
    /// chain in [`crate::exec::setup`] enforces that.
    pub(crate) fn apply(&self) -> Result<()> {
        for binding in &self.bindings {
            bind(binding)?;
        }
        log::info!("Applied {} job bind mounts", self.bindings.len());
        Ok(())
    }
}

fn bind(binding: &Binding) -> Result<()> {
    mount(
        Some(binding.source.as_path()),
        binding.target.as_path(),
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| {
        TmpdirError::Mount(format!(
            "Failed to bind {} onto {}: {}",
            binding.source.display(),
            binding.target.display(),
            e
        ))
    })?;

    log::debug!(
        "Bound {} onto {}",
        binding.source.display(),
        binding.target.display()
    );
    Ok(())
}
