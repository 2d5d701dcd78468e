//! Configuration management for nodetest
//!
//! Settings are read from TOML files in priority order (system, user, local) and
//! then overridden by command-line flags. Each file only needs to name the keys
//! it changes; everything else falls back to the defaults below.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::BatchSystem;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodetestConfig {
    /// Settings for a single node-test run
    pub run: RunConfig,

    /// Scheduler-specific settings
    pub scheduler: SchedulerConfig,
}

/// Options recognized for one run of the node test
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Batch system to use (LSF or PBS)
    pub batch: String,

    /// Project/billing account charged for the diagnostic jobs
    pub account: String,

    /// Queue the diagnostic jobs are submitted to
    pub queue: String,

    /// Regular expression matched against node listings
    pub node_filter: String,

    /// Case template directory copied into every job directory
    pub case_path: PathBuf,

    /// Submit reserved pairs held and release them onto the reserved nodes
    pub force: bool,

    /// Root directory under which each run creates its own directory
    pub output_path: PathBuf,

    /// Enable debug logging
    pub verbose: bool,

    /// Name of the job script inside the case template
    pub job_script: String,

    /// Seconds to sleep between result polls
    pub poll_interval_secs: u64,

    /// Minimum seconds between status snapshots while submitting
    pub report_interval_secs: u64,

    /// Substring in a result artifact that marks the pair as failed
    pub error_marker: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch: String::new(),
            account: "SCSG0001".to_string(),
            queue: "caldera".to_string(),
            node_filter: ".".to_string(),
            case_path: PathBuf::from("def_ca"),
            force: false,
            output_path: default_output_path(),
            verbose: false,
            job_script: "runwrf.job".to_string(),
            poll_interval_secs: 10,
            report_interval_secs: 10,
            error_marker: "ERROR".to_string(),
        }
    }
}

/// Scheduler-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// CPUs requested per node in a PBS select chunk
    pub ncpus_per_node: u32,

    /// MPI ranks requested per node in a PBS select chunk
    pub mpiprocs_per_node: u32,

    /// Users allowed to force held jobs onto reserved nodes
    pub force_users: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ncpus_per_node: 36,
            mpiprocs_per_node: 36,
            force_users: Vec::new(),
        }
    }
}

/// `$SCRATCH/nodetests`, or the temp dir when `$SCRATCH` is unset
fn default_output_path() -> PathBuf {
    let base = env::var("SCRATCH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir());
    base.join("nodetests")
}

/// Locations searched for configuration files
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// System-wide configuration
    pub system: PathBuf,
    /// Per-user configuration, if a config directory exists for this platform
    pub user: Option<PathBuf>,
    /// Configuration in the current directory
    pub local: PathBuf,
}

impl ConfigPaths {
    pub fn new() -> Self {
        Self {
            system: PathBuf::from("/etc/nodetest/config.toml"),
            user: dirs::config_dir().map(|d| d.join("nodetest").join("config.toml")),
            local: PathBuf::from("nodetest.toml"),
        }
    }

    /// Directory holding the per-user configuration file
    pub fn user_config_dir(&self) -> Option<&Path> {
        self.user.as_deref().and_then(Path::parent)
    }

    /// Paths that exist, lowest priority first
    pub fn existing_paths(&self) -> Vec<&PathBuf> {
        let mut paths = vec![&self.system];
        if let Some(user) = &self.user {
            paths.push(user);
        }
        paths.push(&self.local);
        paths.into_iter().filter(|p| p.exists()).collect()
    }
}

impl Default for ConfigPaths {
    fn default() -> Self {
        Self::new()
    }
}

impl NodetestConfig {
    /// Load configuration from the standard locations
    pub fn load() -> Result<Self> {
        Self::load_with_paths(&ConfigPaths::new())
    }

    pub fn load_with_paths(paths: &ConfigPaths) -> Result<Self> {
        let files: Vec<PathBuf> = paths.existing_paths().into_iter().cloned().collect();
        Self::load_from_files(&files)
    }

    /// Load and merge the given files. Later files override earlier ones key by key;
    /// missing files are skipped.
    pub fn load_from_files(files: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in files {
            if !path.exists() {
                debug!("Skipping missing config file {}", path.display());
                continue;
            }
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let table: toml::Table = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            debug!("Loaded config file {}", path.display());
            merge_tables(&mut merged, table);
        }

        let config = toml::Value::Table(merged)
            .try_into()
            .context("Invalid configuration values")?;
        Ok(config)
    }

    /// Check every setting and report all problems at once
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let run = &self.run;

        if !run.batch.is_empty() && run.batch.parse::<BatchSystem>().is_err() {
            errors.push(format!("run.batch must be LSF or PBS, got '{}'", run.batch));
        }
        if run.account.trim().is_empty() {
            errors.push("run.account must not be empty".to_string());
        }
        if run.queue.trim().is_empty() {
            errors.push("run.queue must not be empty".to_string());
        }
        if let Err(e) = regex::Regex::new(&run.node_filter) {
            errors.push(format!("run.node_filter is not a valid pattern: {}", e));
        }
        if run.job_script.trim().is_empty() {
            errors.push("run.job_script must not be empty".to_string());
        }
        if run.poll_interval_secs == 0 {
            errors.push("run.poll_interval_secs must be greater than 0".to_string());
        }
        if run.error_marker.is_empty() {
            errors.push("run.error_marker must not be empty".to_string());
        }
        if self.scheduler.ncpus_per_node == 0 {
            errors.push("scheduler.ncpus_per_node must be greater than 0".to_string());
        }
        if self.scheduler.mpiprocs_per_node == 0 {
            errors.push("scheduler.mpiprocs_per_node must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Commented default configuration suitable for writing to a new file
    pub fn generate_default_config() -> String {
        let body = Self::default()
            .to_toml()
            .unwrap_or_else(|_| String::from("[run]\n\n[scheduler]\n"));
        format!(
            "# nodetest configuration\n\
             # Files are read from /etc/nodetest/config.toml, the user config directory,\n\
             # and ./nodetest.toml; later files override earlier ones.\n\n{}",
            body
        )
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
