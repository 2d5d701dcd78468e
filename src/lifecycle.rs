//! Job lifecycle: materialize, submit, and poll diagnostic jobs
//!
//! Completion is inferred purely from the filesystem. A job is finished once its
//! result artifact exists; a job that dies without writing one is never detected.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::RunConfig;
use crate::job::{Job, JobStatus, RunState};
use crate::scheduler::{SchedulerInterface, SubmitRequest};
use crate::status::StatusReporter;

/// Recursively copy the case template into a job's working directory
pub fn materialize_case(template: &Path, destination: &Path) -> Result<()> {
    if !template.is_dir() {
        anyhow::bail!("Case template {} is not a directory", template.display());
    }

    for entry in WalkDir::new(template).follow_links(true) {
        let entry = entry
            .with_context(|| format!("Failed to walk case template {}", template.display()))?;
        let relative = entry.path().strip_prefix(template)?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }

    debug!(
        "Copied case {} to {}",
        template.display(),
        destination.display()
    );
    Ok(())
}

/// Drives jobs from Pending through Submitted to Completed
pub struct JobLifecycleManager<'a> {
    scheduler: &'a dyn SchedulerInterface,
    account: String,
    queue: String,
    case_path: PathBuf,
    job_script: String,
    error_marker: String,
    hold_reserved: bool,
}

impl<'a> JobLifecycleManager<'a> {
    /// `hold_reserved` submits reservation-targeted jobs held for a later forced start
    pub fn new(
        scheduler: &'a dyn SchedulerInterface,
        run: &RunConfig,
        hold_reserved: bool,
    ) -> Self {
        Self {
            scheduler,
            account: run.account.clone(),
            queue: run.queue.clone(),
            case_path: run.case_path.clone(),
            job_script: run.job_script.clone(),
            error_marker: run.error_marker.clone(),
            hold_reserved,
        }
    }

    /// Copy the case, submit the job, and record it as active
    pub fn submit(&self, job: &mut Job, state: &mut RunState) -> Result<()> {
        materialize_case(&self.case_path, &job.working_path)?;

        let script = job.working_path.join(&self.job_script);
        let request = SubmitRequest {
            job: &*job,
            script: &script,
            account: &self.account,
            queue: &self.queue,
            hold: self.hold_reserved && job.reservation_flag,
        };
        let job_id = self.scheduler.submit_job(&request)?;

        job.mark_submitted(job_id)?;
        state.record_submission();
        Ok(())
    }

    /// Submit every pending job, reporting status between submissions when due
    pub fn submit_all(
        &self,
        jobs: &mut [Job],
        state: &mut RunState,
        reporter: &mut StatusReporter,
    ) -> Result<()> {
        info!("Submitting {} jobs to {}", jobs.len(), self.scheduler.batch_system());
        for job in jobs.iter_mut() {
            if job.status() != JobStatus::Pending {
                continue;
            }
            self.submit(job, state)?;
            reporter.maybe_report(state)?;
        }
        Ok(())
    }

    /// Scan result artifacts of submitted jobs. Returns how many jobs completed.
    ///
    /// Each artifact is read at most once; completed jobs are skipped.
    pub fn poll(&self, jobs: &mut [Job], state: &mut RunState) -> Result<usize> {
        let mut completed = 0;
        for job in jobs.iter_mut() {
            if job.status() != JobStatus::Submitted || !job.result_path.exists() {
                continue;
            }

            let bytes = fs::read(&job.result_path).with_context(|| {
                format!("Failed to read result {}", job.result_path.display())
            })?;
            let has_error = String::from_utf8_lossy(&bytes).contains(&self.error_marker);

            job.mark_completed(has_error)?;
            let event = has_error.then(|| format!("Errors detected - {}", job.label));
            if has_error {
                warn!(
                    "Errors detected for pair {} (job {}, nodes {} {})",
                    job.label,
                    job.job_id(),
                    job.nodes[0],
                    job.nodes[1]
                );
            } else {
                debug!("Pair {} completed", job.label);
            }
            state.record_completion(event);
            completed += 1;
        }
        Ok(completed)
    }
}
