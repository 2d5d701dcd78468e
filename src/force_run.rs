//! Forcing held jobs onto reserved nodes
//!
//! Pairs whose nodes are both reserved are submitted held and then started
//! explicitly on their two hosts. The overflow pair shares nodes with the pair it
//! depends on, so it is only released once that pair has finished.

use anyhow::Result;
use log::{info, warn};
use std::thread;
use std::time::Duration;

use crate::job::{Job, JobStatus, RunState};
use crate::lifecycle::JobLifecycleManager;
use crate::scheduler::SchedulerInterface;
use crate::status::StatusReporter;

/// Decide whether a force-run request can be honored.
///
/// Unsupported or unauthorized requests are downgraded to a warning.
pub fn force_run_enabled(
    scheduler: &dyn SchedulerInterface,
    requested: bool,
    user: &str,
    allowed_users: &[String],
) -> bool {
    if !requested {
        return false;
    }
    if !scheduler.supports_holds() {
        warn!(
            "Force run is not supported with {}; jobs will wait in the normal queue",
            scheduler.batch_system()
        );
        return false;
    }
    if !allowed_users.iter().any(|u| u == user) {
        warn!(
            "User {} is not authorized to force jobs onto reserved nodes; ignoring --force",
            user
        );
        return false;
    }
    true
}

pub struct ForceRunCoordinator<'a> {
    scheduler: &'a dyn SchedulerInterface,
    poll_interval: Duration,
}

impl<'a> ForceRunCoordinator<'a> {
    pub fn new(scheduler: &'a dyn SchedulerInterface, poll_interval: Duration) -> Self {
        Self {
            scheduler,
            poll_interval,
        }
    }

    /// Release every held reservation job. Returns how many were released.
    ///
    /// A job that depends on another pair blocks here, polling on the standard
    /// interval, until that pair completes. Release failures are not retried.
    pub fn release_holds(
        &self,
        jobs: &mut [Job],
        state: &mut RunState,
        lifecycle: &JobLifecycleManager<'_>,
        reporter: &mut StatusReporter,
    ) -> Result<usize> {
        let mut released = 0;
        for index in 0..jobs.len() {
            if !jobs[index].reservation_flag || jobs[index].status() != JobStatus::Submitted {
                continue;
            }

            if jobs[index].wait_flag {
                self.wait_for_dependency(index, jobs, state, lifecycle, reporter)?;
            }

            self.scheduler.release_hold(&jobs[index])?;
            released += 1;
        }
        info!("Released {} held jobs onto reserved nodes", released);
        Ok(released)
    }

    fn wait_for_dependency(
        &self,
        index: usize,
        jobs: &mut [Job],
        state: &mut RunState,
        lifecycle: &JobLifecycleManager<'_>,
        reporter: &mut StatusReporter,
    ) -> Result<()> {
        let Some(label) = jobs[index].depends_on.clone() else {
            return Ok(());
        };
        let Some(blocker) = jobs.iter().position(|j| j.label == label) else {
            warn!(
                "Pair {} depends on unknown pair {}; releasing without waiting",
                jobs[index].label, label
            );
            return Ok(());
        };

        if !jobs[blocker].is_completed() {
            info!(
                "Waiting for pair {} to finish before releasing {}",
                label, jobs[index].label
            );
        }
        while !jobs[blocker].is_completed() {
            thread::sleep(self.poll_interval);
            lifecycle.poll(jobs, state)?;
            reporter.report(state)?;
        }
        Ok(())
    }
}
