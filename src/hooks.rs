//! Host lifecycle entry points.
//!
//! The host framework calls [`on_privileged_task_init`] once per task after
//! process creation and before the final privilege drop, and
//! [`on_job_epilog`] once per job when it ends. An `Err` from the init hook
//! must abort the job; the epilog hook only fails when the job cannot be
//! identified.

use crate::config::settings::TmpdirConfig;
use crate::config::types::Result;
use crate::exec::setup::{Finalized, TaskSetup};
use crate::job::context::JobContext;
use crate::job::paths::JobPaths;
use crate::safety::provision::{provision, Owner};
use crate::safety::reaper::{reap_job, CleanupReport};
use crate::scheduler::license::LicenseChecker;
use crate::scheduler::runner::CommandRunner;

/// Provision, isolate, overlay and finalize the job's private filesystem view
pub fn on_privileged_task_init<'a, C: JobContext + ?Sized>(
    config: &'a TmpdirConfig,
    ctx: &mut C,
    runner: &dyn CommandRunner,
) -> Result<TaskSetup<'a, Finalized>> {
    let result = init(config, ctx, runner);
    if let Err(e) = &result {
        log::error!("Private scratch setup failed, job must not start: {}", e);
    }
    result
}

fn init<'a, C: JobContext + ?Sized>(
    config: &'a TmpdirConfig,
    ctx: &mut C,
    runner: &dyn CommandRunner,
) -> Result<TaskSetup<'a, Finalized>> {
    let job = ctx.job_id()?;
    let owner = Owner {
        uid: ctx.job_uid()?,
        gid: ctx.job_gid(),
    };
    let paths = JobPaths::derive(config, &job);

    let licensed = LicenseChecker::new(config, runner).has_license(&job, &config.license_name);
    let lease = provision(&paths, owner, licensed)?;

    TaskSetup::new(config, lease)
        .isolate()?
        .overlay()?
        .finalize(ctx, runner)
}

/// Remove the job's directories. Removal failures are logged and reported,
/// never returned as errors.
pub fn on_job_epilog<C: JobContext + ?Sized>(
    config: &TmpdirConfig,
    ctx: &C,
) -> Result<CleanupReport> {
    let job = ctx.job_id()?;
    let report = reap_job(&JobPaths::derive(config, &job));

    if report.is_clean() {
        log::info!("Cleaned up private scratch for job {}", job);
    } else {
        log::error!(
            "Job {} left {} directories behind; the orphan sweep will report them",
            job,
            report.failed.len()
        );
    }
    Ok(report)
}
