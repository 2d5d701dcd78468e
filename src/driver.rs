//! Top-level orchestration of a node-test run
//!
//! discover nodes -> pair -> submit (with interleaved reports) -> optional force
//! run -> poll until no job is active -> final report.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::config::NodetestConfig;
use crate::force_run::{ForceRunCoordinator, force_run_enabled};
use crate::job::{Job, RunState};
use crate::lifecycle::JobLifecycleManager;
use crate::pairing::create_jobs;
use crate::run_paths::{RunPaths, generate_run_id};
use crate::scheduler::SchedulerInterface;
use crate::status::{LogFileSink, StatusReporter, StatusSink};

/// Outcome of a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub run_root: PathBuf,
    pub results_dir: PathBuf,
    pub total_jobs: usize,
    pub error_count: usize,
    pub events: Vec<String>,
    pub jobs: Vec<Job>,
}

impl RunSummary {
    pub fn passed(&self) -> bool {
        self.error_count == 0
    }
}

/// User name used for the force-run allow-list
pub fn current_user() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_default()
}

pub struct NodeTestDriver {
    config: NodetestConfig,
    scheduler: Box<dyn SchedulerInterface>,
    sinks: Vec<Box<dyn StatusSink>>,
    run_id: String,
    user: String,
    poll_interval: Duration,
    report_interval: Duration,
}

impl NodeTestDriver {
    pub fn new(config: NodetestConfig, scheduler: Box<dyn SchedulerInterface>) -> Self {
        let poll_interval = Duration::from_secs(config.run.poll_interval_secs);
        let report_interval = Duration::from_secs(config.run.report_interval_secs);
        Self {
            config,
            scheduler,
            sinks: Vec::new(),
            run_id: generate_run_id(),
            user: current_user(),
            poll_interval,
            report_interval,
        }
    }

    /// Add a destination for status snapshots. The run's log file is always added.
    pub fn with_sink(mut self, sink: Box<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }

    pub fn paths(&self) -> RunPaths {
        RunPaths::new(&self.config.run.output_path, &self.run_id)
    }

    pub fn run(self) -> Result<RunSummary> {
        let Self {
            config,
            scheduler,
            mut sinks,
            run_id,
            user,
            poll_interval,
            report_interval,
        } = self;
        let run = &config.run;
        let scheduler = scheduler.as_ref();

        let paths = RunPaths::new(&run.output_path, &run_id);
        paths.create()?;
        info!("Beginning node test");
        info!("   Batch system  = {}", scheduler.batch_system());
        info!("   Case          = {}", run.case_path.display());
        info!("   Queue         = {}", run.queue);
        info!("   Nodes         = {}", run.node_filter);
        info!("   Account       = {}", run.account);
        info!("Case created in: {}", paths.root().display());

        let inventory = scheduler
            .discover_nodes(&run.queue, &run.node_filter)
            .context("Failed to discover nodes")?;
        let mut jobs = create_jobs(&inventory, &paths);

        let mut summary = RunSummary {
            run_id: run_id.clone(),
            run_root: paths.root().to_path_buf(),
            results_dir: paths.results_dir(),
            total_jobs: jobs.len(),
            error_count: 0,
            events: Vec::new(),
            jobs: Vec::new(),
        };
        if jobs.is_empty() {
            warn!(
                "Found {} matching nodes; at least two are needed to run a pair",
                inventory.len()
            );
            write_summary(&paths, &summary)?;
            return Ok(summary);
        }

        let force = force_run_enabled(
            scheduler,
            run.force,
            &user,
            &config.scheduler.force_users,
        );

        sinks.push(Box::new(LogFileSink::open(&paths.status_log())?));
        let mut reporter = StatusReporter::new(sinks, report_interval);
        let mut state = RunState::new(jobs.len());
        let lifecycle = JobLifecycleManager::new(scheduler, run, force);

        lifecycle.submit_all(&mut jobs, &mut state, &mut reporter)?;

        if force {
            ForceRunCoordinator::new(scheduler, poll_interval).release_holds(
                &mut jobs,
                &mut state,
                &lifecycle,
                &mut reporter,
            )?;
        }

        lifecycle.poll(&mut jobs, &mut state)?;
        reporter.report(&state)?;
        while !state.is_finished() {
            thread::sleep(poll_interval);
            let completed = lifecycle.poll(&mut jobs, &mut state)?;
            debug!("{} jobs completed this poll", completed);
            reporter.report(&state)?;
        }

        info!("Nodetest complete!");
        info!("Results in: {}", paths.results_dir().display());

        summary.error_count = state.error_count;
        summary.events = state.event_log;
        summary.jobs = jobs;
        write_summary(&paths, &summary)?;
        Ok(summary)
    }
}

fn write_summary(paths: &RunPaths, summary: &RunSummary) -> Result<()> {
    let path = paths.summary_file();
    let content = serde_json::to_string_pretty(summary)?;
    fs::write(&path, content)
        .with_context(|| format!("Failed to write summary {}", path.display()))
}
