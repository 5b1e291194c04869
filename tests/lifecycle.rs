//! Integration tests for the init/epilog hooks
//!
//! Namespace and mount steps need root. Most tests cover everything up to
//! isolation plus the epilog side, which run unprivileged; the root-only
//! test runs the full init in a spawned thread so only that thread's mount
//! namespace is changed.

use private_tmpdir::job::{JobContext, JobPaths, LocalJobContext};
use private_tmpdir::safety::{provision, Owner};
use private_tmpdir::scheduler::{CommandOutput, CommandRunner, LicenseChecker};
use private_tmpdir::{on_job_epilog, on_privileged_task_init, JobId, TmpdirConfig, TmpdirError};
use std::cell::RefCell;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

/// Answers every command with the same canned stdout
struct CannedRunner {
    stdout: Option<String>,
    calls: RefCell<Vec<Vec<String>>>,
}

impl CannedRunner {
    fn answering(stdout: &str) -> Self {
        Self {
            stdout: Some(stdout.to_string()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn broken() -> Self {
        Self {
            stdout: None,
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl CommandRunner for CannedRunner {
    fn run(&self, argv: &[String]) -> private_tmpdir::Result<CommandOutput> {
        self.calls.borrow_mut().push(argv.to_vec());
        match &self.stdout {
            Some(stdout) => Ok(CommandOutput {
                status: Some(0),
                stdout: stdout.clone(),
            }),
            None => Err(TmpdirError::Command("squeue: command not found".to_string())),
        }
    }
}

struct Node {
    root: PathBuf,
    config: TmpdirConfig,
}

impl Node {
    fn new(tag: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "private-tmpdir-it-{}-{}",
            std::process::id(),
            tag
        ));
        let _ = fs::remove_dir_all(&root);
        fs::create_dir_all(root.join("scratch")).unwrap();
        fs::create_dir_all(root.join("shm")).unwrap();
        let config = TmpdirConfig {
            scratch_base: root.join("scratch"),
            shm_base: root.join("shm"),
            ..TmpdirConfig::default()
        };
        Self { root, config }
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.root);
    }
}

fn my_uid() -> u32 {
    nix::unistd::geteuid().as_raw()
}

/// Mount points under `dir` as seen by the calling thread's mount namespace
fn mount_points_under(dir: &Path) -> Vec<PathBuf> {
    fs::read_to_string("/proc/thread-self/mountinfo")
        .unwrap()
        .lines()
        .filter_map(|line| line.split(' ').nth(4))
        .map(PathBuf::from)
        .filter(|mount_point| mount_point.starts_with(dir))
        .collect()
}

#[test]
fn example_job_layout() {
    let node = Node::new("layout");
    let job = JobId::parse("12345").unwrap();
    let paths = JobPaths::derive(&node.config, &job);

    let licensed = LicenseChecker::new(&node.config, &CannedRunner::answering("gpu"))
        .has_license(&job, "common");
    assert!(!licensed);

    let lease = provision(&paths, Owner { uid: my_uid(), gid: None }, licensed).unwrap();
    assert!(paths.scratch_root.ends_with("scratch/slurm_12345"));
    assert!(paths.shm.ends_with("shm/slurm_12345"));
    assert!(lease.paths().licensed_fs_shadow.is_dir());

    let mode = |p: &PathBuf| fs::metadata(p).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode(&paths.scratch_root), 0o700);
    assert_eq!(mode(&paths.tmp), 0o777);
    assert_eq!(mode(&paths.var_tmp), 0o777);
}

#[test]
fn license_query_failure_hides_licensed_filesystem() {
    let node = Node::new("fail-closed");
    let checker_runner = CannedRunner::broken();
    let checker = LicenseChecker::new(&node.config, &checker_runner);
    assert!(!checker.has_license(&JobId::from(1), "common"));
    assert_eq!(checker_runner.calls.borrow().len(), 1);
}

#[test]
fn init_without_uid_is_fatal() {
    let node = Node::new("no-uid");
    let mut ctx = LocalJobContext::for_epilog(JobId::from(8));
    let result = on_privileged_task_init(&node.config, &mut ctx, &CannedRunner::answering(""));
    assert!(matches!(result, Err(TmpdirError::Job(_))));
    assert!(!node.config.scratch_base.join("slurm_8").exists());
}

#[test]
fn init_with_missing_scratch_base_is_fatal() {
    let node = Node::new("missing-base");
    let config = TmpdirConfig {
        scratch_base: node.root.join("not-mounted"),
        ..node.config.clone()
    };
    let mut ctx = LocalJobContext::new(JobId::from(9), my_uid(), None);

    let result = on_privileged_task_init(&config, &mut ctx, &CannedRunner::answering("common"));
    assert!(matches!(result, Err(TmpdirError::Filesystem(_))));
    assert!(ctx.env().is_empty());
}

#[test]
fn init_refuses_stale_directory() {
    let node = Node::new("stale");
    fs::create_dir_all(node.config.scratch_base.join("slurm_10")).unwrap();
    let mut ctx = LocalJobContext::new(JobId::from(10), my_uid(), None);

    let result = on_privileged_task_init(&node.config, &mut ctx, &CannedRunner::answering(""));
    match result {
        Err(TmpdirError::Filesystem(msg)) => assert!(msg.contains("already exists")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("setup reused a stale directory"),
    }
}

#[test]
fn unprivileged_init_fails_at_isolation_and_epilog_reaps() {
    if nix::unistd::geteuid().is_root() {
        // As root this would really unshare and bind mount in the test process
        return;
    }
    let node = Node::new("partial");
    let mut ctx = LocalJobContext::new(JobId::from(11), my_uid(), None);

    let result = on_privileged_task_init(&node.config, &mut ctx, &CannedRunner::answering(""));
    assert!(result.is_err());
    assert!(node.config.scratch_base.join("slurm_11").is_dir());
    assert!(ctx.env().is_empty(), "TMPDIR exported for a failed setup");

    let report = on_job_epilog(&node.config, &ctx).unwrap();
    assert!(report.is_clean());
    assert!(!node.config.scratch_base.join("slurm_11").exists());
    assert!(!node.config.shm_base.join("slurm_11").exists());
}

#[test]
fn epilog_removes_only_its_own_job() {
    let node = Node::new("epilog");
    let owner = Owner { uid: my_uid(), gid: None };
    let job = JobPaths::derive(&node.config, &JobId::from(12345));
    let other = JobPaths::derive(&node.config, &JobId::from(12346));
    provision(&job, owner, false).unwrap();
    provision(&other, owner, true).unwrap();
    fs::write(job.tmp.join("checkpoint"), vec![0u8; 4096]).unwrap();

    let ctx = LocalJobContext::for_epilog(JobId::from(12345));
    let report = on_job_epilog(&node.config, &ctx).unwrap();

    assert!(report.is_clean());
    assert!(!job.scratch_root.exists());
    assert!(!job.shm.exists());
    assert!(other.scratch_root.is_dir());
    assert!(other.shm.is_dir());
}

#[test]
fn epilog_is_idempotent() {
    let node = Node::new("idempotent");
    let ctx = LocalJobContext::for_epilog(JobId::from(77));

    let first = on_job_epilog(&node.config, &ctx).unwrap();
    let second = on_job_epilog(&node.config, &ctx).unwrap();
    assert!(first.is_clean() && second.is_clean());
    assert_eq!(second.absent.len(), 2);
}

#[test]
fn setup_and_cleanup_agree_on_paths() {
    let node = Node::new("agree");
    let job = JobId::parse("4711").unwrap();
    let ctx = LocalJobContext::new(job.clone(), my_uid(), Some(100));
    assert_eq!(
        JobPaths::derive(&node.config, &ctx.job_id().unwrap()),
        JobPaths::derive(&node.config, &job)
    );
}

#[test]
fn privileged_init_overlays_only_inside_the_job_namespace() {
    if !nix::unistd::geteuid().is_root() {
        return;
    }
    let node = Node::new("privileged");
    let targets = node.root.join("targets");
    let config = TmpdirConfig {
        tmp_target: targets.join("tmp"),
        var_tmp_target: targets.join("var-tmp"),
        licensed_fs_mount: targets.join("common"),
        scratch_target: targets.join("scratch"),
        shm_target: targets.join("shm"),
        ..node.config.clone()
    };
    for dir in [
        &config.tmp_target,
        &config.var_tmp_target,
        &config.licensed_fs_mount,
        &config.scratch_target,
        &config.shm_target,
    ] {
        fs::create_dir_all(dir).unwrap();
    }

    let job_view = std::thread::scope(|scope| {
        scope
            .spawn(|| {
                let mut ctx = LocalJobContext::new(JobId::from(31), 5001, None);
                // No license line: the licensed filesystem gets shadowed too
                let runner = CannedRunner::answering("(null)\n");
                let setup = match on_privileged_task_init(&config, &mut ctx, &runner) {
                    Ok(setup) => setup,
                    // Root without CAP_SYS_ADMIN, e.g. an unprivileged container
                    Err(TmpdirError::Namespace(_)) => return None,
                    Err(other) => panic!("privileged setup failed: {}", other),
                };
                let lease = setup.into_lease();
                fs::write(config.tmp_target.join("inside"), b"job data").unwrap();
                let shadowed = fs::read_dir(&config.licensed_fs_mount).unwrap().count();

                Some((
                    lease.owner().uid,
                    lease.paths().clone(),
                    mount_points_under(&targets),
                    shadowed,
                    ctx.env().get("TMPDIR").cloned(),
                ))
            })
            .join()
            .unwrap()
    });
    let Some((uid, paths, job_mounts, shadowed, tmpdir)) = job_view else {
        return;
    };

    assert_eq!(uid, 5001);
    assert_eq!(tmpdir.as_deref(), Some("/tmp"));
    assert_eq!(job_mounts.len(), 5, "job namespace mounts: {:?}", job_mounts);
    assert_eq!(shadowed, 0);

    assert!(
        mount_points_under(&targets).is_empty(),
        "bind mounts leaked into the host namespace"
    );
    assert_eq!(fs::read(paths.tmp.join("inside")).unwrap(), b"job data");
    assert!(!config.tmp_target.join("inside").exists());
    for dir in [&paths.scratch_root, &paths.tmp, &paths.licensed_fs_shadow, &paths.shm] {
        assert_eq!(fs::metadata(dir).unwrap().uid(), 5001);
    }

    let report = on_job_epilog(&config, &LocalJobContext::for_epilog(JobId::from(31))).unwrap();
    assert!(report.is_clean());
    assert!(!paths.scratch_root.exists());
}
