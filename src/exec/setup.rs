//! Privileged setup ordering.
//!
//! The sequence is fixed:
//! 1. directories provisioned (a [`DirectoryLease`] exists)
//! 2. new mount + IPC namespaces, `/` made recursively private
//! 3. bind mounts over the well-known paths
//! 4. TMPDIR exported, kernel tunables reloaded
//!
//! Each step consumes the prior state, so skipping or repeating a step does
//! not compile:
//!
//! ```compile_fail
//! use private_tmpdir::exec::setup::{TaskSetup, Unisolated};
//!
//! fn skip_isolation(setup: TaskSetup<Unisolated>) {
//!     // Only Isolated has overlay()
//!     let _ = setup.overlay();
//! }
//! ```
//!
//! ```compile_fail
//! use private_tmpdir::exec::setup::{Isolated, TaskSetup};
//! use private_tmpdir::job::LocalJobContext;
//! use private_tmpdir::scheduler::SystemCommandRunner;
//!
//! fn skip_overlay(setup: TaskSetup<Isolated>, ctx: &mut LocalJobContext) {
//!     // Only Overlaid has finalize()
//!     let _ = setup.finalize(ctx, &SystemCommandRunner);
//! }
//! ```
//!
//! ```compile_fail
//! use private_tmpdir::exec::setup::{TaskSetup, Unisolated};
//!
//! fn isolate_twice(setup: TaskSetup<Unisolated>) {
//!     let _first = setup.isolate();
//!     let _second = setup.isolate();
//! }
//! ```
//!
//! ```compile_fail
//! use private_tmpdir::safety::DirectoryLease;
//!
//! // A lease only comes out of provision()
//! fn forge() -> DirectoryLease {
//!     DirectoryLease { paths: todo!(), owner: todo!(), licensed: false }
//! }
//! ```

use crate::config::settings::TmpdirConfig;
use crate::config::types::Result;
use crate::exec::environment;
use crate::job::context::JobContext;
use crate::kernel::mount::MountOverlay;
use crate::kernel::namespace;
use crate::safety::provision::DirectoryLease;
use crate::scheduler::runner::CommandRunner;
use std::marker::PhantomData;

/// Directories exist, task still shares the host namespaces
pub struct Unisolated;

/// Task has private mount and IPC namespaces
pub struct Isolated;

/// Job directories are bound over the well-known paths
pub struct Overlaid;

/// Environment exported; setup complete
pub struct Finalized;

/// Setup of one job task with type-state tracking
pub struct TaskSetup<'a, S> {
    config: &'a TmpdirConfig,
    lease: DirectoryLease,
    _state: PhantomData<S>,
}

impl<'a, S> TaskSetup<'a, S> {
    pub fn lease(&self) -> &DirectoryLease {
        &self.lease
    }

    fn advance<N>(self) -> TaskSetup<'a, N> {
        TaskSetup {
            config: self.config,
            lease: self.lease,
            _state: PhantomData,
        }
    }
}

impl<'a> TaskSetup<'a, Unisolated> {
    pub fn new(config: &'a TmpdirConfig, lease: DirectoryLease) -> Self {
        Self {
            config,
            lease,
            _state: PhantomData,
        }
    }

    pub fn isolate(self) -> Result<TaskSetup<'a, Isolated>> {
        namespace::isolate()?;
        Ok(self.advance())
    }
}

impl<'a> TaskSetup<'a, Isolated> {
    /// Plan of the bind mounts [`overlay`](Self::overlay) will perform
    pub fn overlay_plan(&self) -> MountOverlay {
        MountOverlay::plan(&self.lease, self.config)
    }

    pub fn overlay(self) -> Result<TaskSetup<'a, Overlaid>> {
        self.overlay_plan().apply()?;
        Ok(self.advance())
    }
}

impl<'a> TaskSetup<'a, Overlaid> {
    pub fn finalize<C: JobContext + ?Sized>(
        self,
        ctx: &mut C,
        runner: &dyn CommandRunner,
    ) -> Result<TaskSetup<'a, Finalized>> {
        environment::finalize(self.config, ctx, runner)?;
        log::info!(
            "Private scratch ready for job {}",
            self.lease.paths().job_id
        );
        Ok(self.advance())
    }
}

impl<'a> TaskSetup<'a, Finalized> {
    /// Release the lease; the directories stay until the epilog reaps them
    pub fn into_lease(self) -> DirectoryLease {
        self.lease
    }
}
