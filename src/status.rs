//! Periodic status snapshots
//!
//! A [`StatusReporter`] turns the [`RunState`] counters into a [`Snapshot`] and hands
//! it to every configured [`StatusSink`]. Percentages are always taken against the
//! number of jobs planned when the nodes were paired.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::debug;
use serde::Serialize;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::job::RunState;

/// Clear screen and move the cursor home
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Point-in-time view of a run
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Local>,
    pub elapsed_secs: u64,
    pub total_planned: usize,
    pub submitted: usize,
    pub active: usize,
    pub errors: usize,
    pub pct_submitted: f64,
    pub pct_completed: f64,
    pub event_log: Vec<String>,
}

impl Snapshot {
    pub fn from_state(state: &RunState, elapsed: Duration) -> Self {
        Self {
            timestamp: Local::now(),
            elapsed_secs: elapsed.as_secs(),
            total_planned: state.total_planned,
            submitted: state.submitted_count,
            active: state.active_count,
            errors: state.error_count,
            pct_submitted: state.pct_submitted(),
            pct_completed: state.pct_completed(),
            event_log: state.event_log.clone(),
        }
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time passed - {} seconds", self.elapsed_secs)?;
        writeln!(f, "   Total jobs planned    = {}", self.total_planned)?;
        writeln!(
            f,
            "   Total jobs submitted  = {} ({:.1}%)",
            self.submitted, self.pct_submitted
        )?;
        writeln!(f, "   Number of active jobs = {}", self.active)?;
        writeln!(f, "   Number of errors      = {}", self.errors)?;
        writeln!(f, "   Percent complete      = {:.1}", self.pct_completed)?;
        writeln!(f)?;
        writeln!(f, "Event Log:")?;
        for event in &self.event_log {
            writeln!(f, "   {}", event)?;
        }
        Ok(())
    }
}

/// Destination for status snapshots
pub trait StatusSink {
    fn emit(&mut self, snapshot: &Snapshot) -> Result<()>;
}

/// Redraws the terminal with the latest snapshot
pub struct ConsoleSink {
    clear: bool,
}

impl ConsoleSink {
    pub fn new(clear: bool) -> Self {
        Self { clear }
    }
}

impl StatusSink for ConsoleSink {
    fn emit(&mut self, snapshot: &Snapshot) -> Result<()> {
        let mut stdout = io::stdout().lock();
        if self.clear {
            write!(stdout, "{}", CLEAR_SCREEN)?;
        }
        write!(stdout, "{}", snapshot)?;
        stdout.flush()?;
        Ok(())
    }
}

/// Appends every snapshot to a log file
pub struct LogFileSink {
    file: File,
}

impl LogFileSink {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open status log {}", path.display()))?;
        Ok(Self { file })
    }
}

impl StatusSink for LogFileSink {
    fn emit(&mut self, snapshot: &Snapshot) -> Result<()> {
        writeln!(
            self.file,
            "[{}]",
            snapshot.timestamp.format("%Y-%m-%d %H:%M:%S")
        )?;
        writeln!(self.file, "{}", snapshot)?;
        self.file.flush()?;
        Ok(())
    }
}

/// Emits snapshots to its sinks, throttled to one per interval during submission
pub struct StatusReporter {
    sinks: Vec<Box<dyn StatusSink>>,
    interval: Duration,
    start: Instant,
    last_report: Instant,
}

impl StatusReporter {
    pub fn new(sinks: Vec<Box<dyn StatusSink>>, interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            sinks,
            interval,
            start: now,
            last_report: now,
        }
    }

    /// Build a snapshot and send it to every sink
    pub fn report(&mut self, state: &RunState) -> Result<Snapshot> {
        let snapshot = Snapshot::from_state(state, self.start.elapsed());
        self.last_report = Instant::now();
        debug!(
            "Status: {}/{} submitted, {} active, {} errors",
            snapshot.submitted, snapshot.total_planned, snapshot.active, snapshot.errors
        );
        for sink in &mut self.sinks {
            sink.emit(&snapshot)?;
        }
        Ok(snapshot)
    }

    /// Report only if at least one interval has passed since the last report
    pub fn maybe_report(&mut self, state: &RunState) -> Result<Option<Snapshot>> {
        if self.last_report.elapsed() >= self.interval {
            self.report(state).map(Some)
        } else {
            Ok(None)
        }
    }
}
