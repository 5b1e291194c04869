/// Final job environment inside the new namespaces
use crate::config::settings::TmpdirConfig;
use crate::config::types::Result;
use crate::job::context::JobContext;
use crate::scheduler::runner::CommandRunner;

pub const TMPDIR_VAR: &str = "TMPDIR";

/// Export TMPDIR and reload kernel tunables.
///
/// A new IPC namespace starts with default shm/msg limits, so the node's
/// sysctl settings are re-applied. That reload is not fatal: the job still
/// runs correctly, only with smaller IPC limits.
pub fn finalize<C: JobContext + ?Sized>(
    config: &TmpdirConfig,
    ctx: &mut C,
    runner: &dyn CommandRunner,
) -> Result<()> {
    ctx.set_env(TMPDIR_VAR, &config.tmpdir_value, true)?;
    log::debug!("Exported {}={}", TMPDIR_VAR, config.tmpdir_value);

    reload_kernel_tunables(config, runner);
    Ok(())
}

/// Returns whether the reload succeeded; failures are only logged
pub fn reload_kernel_tunables(config: &TmpdirConfig, runner: &dyn CommandRunner) -> bool {
    match runner.run(&config.sysctl_reload) {
        Ok(output) if output.success() => {
            log::debug!("Reloaded kernel tunables in the job IPC namespace");
            true
        }
        Ok(output) => {
            log::warn!(
                "Kernel tunable reload {:?} exited with {:?}; job keeps default IPC limits",
                config.sysctl_reload,
                output.status
            );
            false
        }
        Err(e) => {
            log::warn!(
                "Kernel tunable reload failed: {}; job keeps default IPC limits",
                e
            );
            false
        }
    }
}
