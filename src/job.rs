//! Diagnostic job entities and the run-wide counters

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::pairing::JobPair;
use crate::run_paths::RunPaths;

/// Lifecycle of one diagnostic job. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Submitted,
    Completed,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Submitted => write!(f, "submitted"),
            JobStatus::Completed => write!(f, "completed"),
        }
    }
}

/// One node pair carried through submit, poll and completion
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Short names of both nodes joined by a hyphen
    pub display_name: String,
    /// Unique name of the job's working directory and result artifact
    pub label: String,
    pub nodes: [String; 2],
    /// Both nodes belong to a reservation
    pub reservation_flag: bool,
    /// Overflow pair that shares nodes with another pair
    pub wait_flag: bool,
    /// Label of the pair that must finish before this one is force-started
    pub depends_on: Option<String>,
    pub working_path: PathBuf,
    pub result_path: PathBuf,
    job_id: String,
    status: JobStatus,
    has_error: bool,
}

impl Job {
    pub fn new(pair: JobPair, paths: &RunPaths) -> Self {
        let display_name = pair.display_name();
        let label = pair.label.clone();
        Self {
            working_path: paths.job_dir(&label),
            result_path: paths.result_path(&label),
            display_name,
            label,
            nodes: pair.nodes,
            reservation_flag: pair.reservation_flag,
            wait_flag: pair.wait_flag,
            depends_on: pair.depends_on,
            job_id: String::new(),
            status: JobStatus::Pending,
            has_error: false,
        }
    }

    /// Scheduler job id; empty until the job is submitted
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Whether the result artifact reported a failure. Only meaningful once completed.
    pub fn has_error(&self) -> bool {
        self.has_error
    }

    pub fn is_completed(&self) -> bool {
        self.status == JobStatus::Completed
    }

    pub fn mark_submitted(&mut self, job_id: String) -> Result<()> {
        if self.status != JobStatus::Pending {
            bail!("job {} is already {}", self.label, self.status);
        }
        if job_id.is_empty() {
            bail!("job {} was submitted without a job id", self.label);
        }
        self.job_id = job_id;
        self.status = JobStatus::Submitted;
        Ok(())
    }

    pub fn mark_completed(&mut self, has_error: bool) -> Result<()> {
        if self.status != JobStatus::Submitted {
            bail!("job {} cannot complete while {}", self.label, self.status);
        }
        self.has_error = has_error;
        self.status = JobStatus::Completed;
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn for_test(first: &str, second: &str) -> Self {
        let pair = JobPair::new(first, second, false, false, None);
        Job::new(pair, &RunPaths::new("/tmp/nodetest-unit", "run"))
    }
}

/// Counters shared by submission, polling and reporting
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunState {
    pub total_planned: usize,
    pub submitted_count: usize,
    pub active_count: usize,
    pub error_count: usize,
    pub event_log: Vec<String>,
}

impl RunState {
    pub fn new(total_planned: usize) -> Self {
        Self {
            total_planned,
            ..Default::default()
        }
    }

    pub fn record_submission(&mut self) {
        self.submitted_count += 1;
        self.active_count += 1;
    }

    /// Record a finished job, logging `error_event` when its artifact reported a failure
    pub fn record_completion(&mut self, error_event: Option<String>) {
        self.active_count = self.active_count.saturating_sub(1);
        if let Some(event) = error_event {
            self.error_count += 1;
            self.event_log.push(event);
        }
    }

    pub fn completed_count(&self) -> usize {
        self.submitted_count - self.active_count
    }

    /// Percentage of planned jobs submitted so far
    pub fn pct_submitted(&self) -> f64 {
        percent(self.submitted_count, self.total_planned)
    }

    /// Percentage of planned jobs whose result artifact has appeared
    pub fn pct_completed(&self) -> f64 {
        percent(self.completed_count(), self.total_planned)
    }

    pub fn is_finished(&self) -> bool {
        self.active_count == 0
    }
}

fn percent(count: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 * count as f64 / total as f64
}
