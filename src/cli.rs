use crate::config::settings::TmpdirConfig;
use crate::config::types::JobId;
use crate::hooks::{on_job_epilog, on_privileged_task_init};
use crate::job::context::LocalJobContext;
use crate::job::paths::JobPaths;
use crate::kernel::credentials::transition_to_job_user;
use crate::kernel::namespace;
use crate::safety::sweep::{sweep, SweepOptions};
use crate::scheduler::license::LicenseChecker;
use crate::scheduler::runner::SystemCommandRunner;
use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::ffi::CString;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to /etc/private-tmpdir/config.json when present)
    #[arg(long, global = true, env = "PRIVATE_TMPDIR_CONFIG")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Set up the private scratch view and exec the job command inside it
    Run {
        #[arg(long, env = "SLURM_JOB_ID")]
        job_id: String,
        /// Owner of the job's directories
        #[arg(long, env = "SLURM_JOB_UID")]
        uid: u32,
        /// Group to run the command as (left unchanged on the directories)
        #[arg(long, env = "SLURM_JOB_GID")]
        gid: Option<u32>,
        /// Exec the command without dropping to the job's UID/GID
        #[arg(long)]
        keep_privileges: bool,
        /// Command and arguments to execute
        #[arg(required = true, trailing_var_arg = true)]
        command: Vec<String>,
    },
    /// Remove a finished job's directories
    Epilog {
        #[arg(long, env = "SLURM_JOB_ID")]
        job_id: String,
    },
    /// Print the directories derived for a job
    Paths {
        #[arg(long, env = "SLURM_JOB_ID")]
        job_id: String,
    },
    /// Ask the scheduler whether a job holds a license
    CheckLicense {
        #[arg(long, env = "SLURM_JOB_ID")]
        job_id: String,
        /// License to look for (defaults to the configured license)
        #[arg(long)]
        license: Option<String>,
    },
    /// Report per-job directories of jobs no longer running on this node
    Sweep {
        /// Delete the orphaned directories
        #[arg(long)]
        remove: bool,
        /// Ignore directories younger than this many seconds
        #[arg(long, default_value_t = 3600)]
        min_age_secs: u64,
    },
    /// Print the effective configuration
    ShowConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<TmpdirConfig> {
    let config = match path {
        Some(path) => TmpdirConfig::load_from_file(path)?,
        None => TmpdirConfig::load_default()?,
    };
    Ok(config)
}

fn parse_job(raw: &str) -> Result<JobId> {
    JobId::parse(raw).with_context(|| format!("invalid job id {:?}", raw))
}

pub fn run() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let runner = SystemCommandRunner;

    match cli.command {
        Commands::Run {
            job_id,
            uid,
            gid,
            keep_privileges,
            command,
        } => {
            let drop_to = match (keep_privileges, gid) {
                (true, _) => None,
                (false, Some(gid)) => Some((uid, gid)),
                (false, None) => bail!("--gid is required unless --keep-privileges is given"),
            };
            if !nix::unistd::geteuid().is_root() {
                bail!("run requires root: namespaces and bind mounts are privileged");
            }
            if !namespace::is_supported() {
                bail!("kernel does not expose mount/IPC namespaces");
            }

            let mut ctx = LocalJobContext::new(parse_job(&job_id)?, uid, gid);
            let lease = on_privileged_task_init(&config, &mut ctx, &runner)?.into_lease();
            log::info!(
                "Private scratch for job {} ready at {} (owner uid {})",
                lease.paths().job_id,
                lease.paths().scratch_root.display(),
                lease.owner().uid
            );

            // Single-threaded here; the exec'd command inherits the environment
            for (name, value) in ctx.env() {
                std::env::set_var(name, value);
            }
            if let Some((uid, gid)) = drop_to {
                transition_to_job_user(uid, gid)?;
            }
            exec_command(&command)
        }
        Commands::Epilog { job_id } => {
            let ctx = LocalJobContext::for_epilog(parse_job(&job_id)?);
            let report = on_job_epilog(&config, &ctx)?;
            for (path, error) in &report.failed {
                eprintln!("failed to remove {}: {}", path.display(), error);
            }
            // Best effort: a leftover directory never fails the epilog
            Ok(())
        }
        Commands::Paths { job_id } => {
            let paths = JobPaths::derive(&config, &parse_job(&job_id)?);
            println!("{}", serde_json::to_string_pretty(&paths)?);
            Ok(())
        }
        Commands::CheckLicense { job_id, license } => {
            let job = parse_job(&job_id)?;
            let license = license.unwrap_or_else(|| config.license_name.clone());
            let granted = LicenseChecker::new(&config, &runner).has_license(&job, &license);
            println!(
                "job {} {} license {}",
                job,
                if granted { "holds" } else { "does not hold" },
                license
            );
            if !granted {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Sweep {
            remove,
            min_age_secs,
        } => {
            let options = SweepOptions {
                min_age: Duration::from_secs(min_age_secs),
                remove,
            };
            let report = sweep(&config, &runner, &options)?;
            for orphan in &report.orphans {
                println!("{}", serde_json::to_string(orphan)?);
            }
            if let Some(cleanup) = &report.cleanup {
                if !cleanup.is_clean() {
                    eprintln!("{}", serde_json::to_string_pretty(cleanup)?);
                    bail!("{} orphaned directories could not be removed", cleanup.failed.len());
                }
            }
            Ok(())
        }
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn exec_command(command: &[String]) -> Result<()> {
    let mut cargv = Vec::with_capacity(command.len());
    for arg in command {
        cargv.push(CString::new(arg.as_str()).context("command contains NUL byte")?);
    }
    let program = cargv
        .first()
        .ok_or_else(|| anyhow!("empty command"))?
        .clone();

    log::info!("Executing job command: {:?}", command);
    let err = match nix::unistd::execvp(program.as_c_str(), &cargv) {
        Ok(never) => match never {},
        Err(e) => e,
    };
    Err(anyhow!("execvp {} failed: {}", command[0], err))
}
