/// Running-job listing for this node
use crate::config::settings::{render_argv, TmpdirConfig, NODE_PLACEHOLDER};
use crate::config::types::{JobId, Result, TmpdirError};
use crate::scheduler::runner::CommandRunner;
use std::collections::BTreeSet;

/// Scheduler node name: the configured one, else the hostname
pub fn node_name(config: &TmpdirConfig) -> Result<String> {
    if let Some(name) = &config.node_name {
        return Ok(name.clone());
    }
    let host = nix::unistd::gethostname()
        .map_err(|e| TmpdirError::Command(format!("Failed to read hostname: {}", e)))?;
    host.into_string()
        .map_err(|raw| TmpdirError::Command(format!("Hostname is not UTF-8: {:?}", raw)))
}

/// Ask the scheduler which jobs are running on `node`.
///
/// Unlike the license lookup this does not degrade: callers use the answer to
/// decide what may be deleted, so any doubt is an error.
pub fn running_jobs(
    config: &TmpdirConfig,
    runner: &dyn CommandRunner,
    node: &str,
) -> Result<BTreeSet<JobId>> {
    let argv = render_argv(&config.running_jobs_query, NODE_PLACEHOLDER, node);
    let output = runner.run(&argv)?;
    if !output.success() {
        return Err(TmpdirError::Command(format!(
            "Running job query {:?} exited with {:?}",
            argv, output.status
        )));
    }

    output
        .stdout
        .split_whitespace()
        .map(JobId::parse)
        .collect()
}
