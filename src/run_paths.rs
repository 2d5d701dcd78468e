//! Directory layout of a single node-test run
//!
//! ```text
//! <output>/<run id>/
//!     <label>/            copy of the case template, job is submitted from here
//!     results/<label>     result artifact written by the diagnostic job
//!     nodetest.log        appended status snapshots
//!     summary.json        final counters
//! ```

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

/// Generate a run identifier from the current local time
pub fn generate_run_id() -> String {
    Local::now().format("%Y-%m-%d_%H:%M:%S").to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    run_id: String,
    root: PathBuf,
}

impl RunPaths {
    pub fn new(output_path: impl AsRef<Path>, run_id: impl Into<String>) -> Self {
        let run_id = run_id.into();
        let root = output_path.as_ref().join(&run_id);
        Self { run_id, root }
    }

    /// Create the run root and results directory
    pub fn create(&self) -> Result<()> {
        let results = self.results_dir();
        fs::create_dir_all(&results)
            .with_context(|| format!("Failed to create results directory {}", results.display()))
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join("results")
    }

    pub fn job_dir(&self, label: &str) -> PathBuf {
        self.root.join(label)
    }

    pub fn result_path(&self, label: &str) -> PathBuf {
        self.results_dir().join(label)
    }

    pub fn status_log(&self) -> PathBuf {
        self.root.join("nodetest.log")
    }

    pub fn summary_file(&self) -> PathBuf {
        self.root.join("summary.json")
    }
}
