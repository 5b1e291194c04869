//! private-tmpdir: per-job private scratch for batch-scheduled jobs
//!
//! Every job on a shared node gets its own `/tmp`, `/var/tmp`, `/scratch` and
//! `/dev/shm`, backed by directories named after the job and overlaid with bind
//! mounts inside a private mount namespace. A licensed filesystem is hidden
//! from jobs the scheduler has not granted the matching license.
//!
//! # Architecture
//!
//! ## Configuration ([`config`])
//! - [`config::settings`]: node configuration loading and validation
//! - [`config::types`]: error taxonomy, job identifiers
//!
//! ## Job identity ([`job`])
//! - [`job::context`]: host job-context interface
//! - [`job::paths`]: deterministic per-job path derivation
//!
//! ## Scheduler integration ([`scheduler`])
//! - [`scheduler::runner`]: subprocess capability
//! - [`scheduler::license`]: fail-closed license lookup
//! - [`scheduler::jobs`]: running-job listing for this node
//!
//! ## Directory lifecycle ([`safety`])
//! - [`safety::provision`]: exclusive creation with exact ownership and modes
//! - [`safety::safe_cleanup`]: one-filesystem, no-follow tree removal
//! - [`safety::reaper`]: best-effort epilog cleanup
//! - [`safety::sweep`]: orphaned directory detection
//!
//! ## Kernel primitives ([`kernel`])
//! - [`kernel::namespace`]: mount/IPC unshare and propagation hardening
//! - [`kernel::mount`]: bind-mount overlay
//! - [`kernel::credentials`]: UID/GID transition for the command line wrapper
//!
//! ## Setup sequencing ([`exec`])
//! - [`exec::setup`]: type-state chain Unisolated -> Isolated -> Overlaid -> Finalized
//! - [`exec::environment`]: TMPDIR export and kernel tunable reload
//!
//! ## Entry points
//! - [`hooks`]: privileged task init and job epilog
//! - [`cli`]: command line front end

pub mod config;

pub mod job;

pub mod scheduler;

pub mod safety;

pub mod kernel;

pub mod exec;

pub mod hooks;

pub mod cli;

pub use config::settings::TmpdirConfig;
pub use config::types::{JobId, LicenseMatch, Result, TmpdirError};
pub use hooks::{on_job_epilog, on_privileged_task_init};
