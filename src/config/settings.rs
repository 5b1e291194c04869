/// Configuration loading from config.json
use crate::config::types::{LicenseMatch, Result, TmpdirError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default location of the node-wide configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/private-tmpdir/config.json";

/// Placeholder replaced by the job identifier in command templates
pub const JOB_ID_PLACEHOLDER: &str = "{job_id}";

/// Placeholder replaced by the node name in command templates
pub const NODE_PLACEHOLDER: &str = "{node}";

/// Immutable node configuration, passed by reference into every component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TmpdirConfig {
    /// Directory under which per-job scratch roots are created
    pub scratch_base: PathBuf,
    /// Directory under which per-job shared-memory directories are created
    pub shm_base: PathBuf,
    /// Name of the licensed filesystem; the hiding directory is `.{name}`
    pub licensed_fs_name: String,
    /// Mount point of the licensed filesystem on the host
    pub licensed_fs_mount: PathBuf,
    /// License token that grants access to the licensed filesystem
    pub license_name: String,
    pub license_match: LicenseMatch,
    pub tmp_target: PathBuf,
    pub var_tmp_target: PathBuf,
    pub scratch_target: PathBuf,
    pub shm_target: PathBuf,
    /// Value exported as TMPDIR to the job
    pub tmpdir_value: String,
    /// Scheduler query listing a job's licenses (`{job_id}` is substituted)
    pub license_query: Vec<String>,
    /// Scheduler query listing jobs running on this node (`{node}` is substituted)
    pub running_jobs_query: Vec<String>,
    /// Kernel tunable reload run inside the new IPC namespace
    pub sysctl_reload: Vec<String>,
    /// Scheduler node name; the hostname is used when unset
    pub node_name: Option<String>,
}

impl Default for TmpdirConfig {
    fn default() -> Self {
        Self {
            scratch_base: PathBuf::from("/scratch"),
            shm_base: PathBuf::from("/dev/shm"),
            licensed_fs_name: "common".to_string(),
            licensed_fs_mount: PathBuf::from("/common"),
            license_name: "common".to_string(),
            license_match: LicenseMatch::Substring,
            tmp_target: PathBuf::from("/tmp"),
            var_tmp_target: PathBuf::from("/var/tmp"),
            scratch_target: PathBuf::from("/scratch"),
            shm_target: PathBuf::from("/dev/shm"),
            tmpdir_value: "/tmp".to_string(),
            license_query: vec![
                "squeue".to_string(),
                "--noheader".to_string(),
                "--format=%W".to_string(),
                format!("--jobs={}", JOB_ID_PLACEHOLDER),
            ],
            running_jobs_query: vec![
                "squeue".to_string(),
                "--noheader".to_string(),
                "--format=%A".to_string(),
                format!("--nodelist={}", NODE_PLACEHOLDER),
            ],
            sysctl_reload: vec![
                "/sbin/sysctl".to_string(),
                "-q".to_string(),
                "--system".to_string(),
            ],
            node_name: None,
        }
    }
}

impl TmpdirConfig {
    /// Load and validate configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TmpdirError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: TmpdirConfig = serde_json::from_str(&content).map_err(|e| {
            TmpdirError::Config(format!(
                "Failed to parse config JSON {}: {}",
                path.display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load the node-wide file if it exists, otherwise the built-in defaults
    pub fn load_default() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_PATH);
        if path.exists() {
            log::debug!("Loading configuration from {}", path.display());
            Self::load_from_file(path)
        } else {
            log::debug!(
                "No configuration at {}, using built-in defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let absolute = [
            ("scratch_base", &self.scratch_base),
            ("shm_base", &self.shm_base),
            ("licensed_fs_mount", &self.licensed_fs_mount),
            ("tmp_target", &self.tmp_target),
            ("var_tmp_target", &self.var_tmp_target),
            ("scratch_target", &self.scratch_target),
            ("shm_target", &self.shm_target),
        ];
        for (field, path) in absolute {
            if !path.is_absolute() {
                return Err(TmpdirError::Config(format!(
                    "{} must be an absolute path, got {}",
                    field,
                    path.display()
                )));
            }
        }

        if self.licensed_fs_name.is_empty()
            || self.licensed_fs_name.contains('/')
            || self.licensed_fs_name.starts_with('.')
        {
            return Err(TmpdirError::Config(format!(
                "licensed_fs_name {:?} must be a plain directory name",
                self.licensed_fs_name
            )));
        }

        if self.license_name.trim().is_empty() {
            return Err(TmpdirError::Config("license_name is empty".to_string()));
        }

        if !self.tmpdir_value.starts_with('/') {
            return Err(TmpdirError::Config(format!(
                "tmpdir_value must be absolute, got {:?}",
                self.tmpdir_value
            )));
        }

        for (field, argv) in [
            ("license_query", &self.license_query),
            ("running_jobs_query", &self.running_jobs_query),
            ("sysctl_reload", &self.sysctl_reload),
        ] {
            if argv.first().map_or(true, |program| program.is_empty()) {
                return Err(TmpdirError::Config(format!("{} has no program", field)));
            }
        }

        Ok(())
    }
}

/// Substitute `placeholder` in every argument of an argv template
pub fn render_argv(template: &[String], placeholder: &str, value: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace(placeholder, value))
        .collect()
}
