//! Command plumbing shared by the scheduler interfaces

use anyhow::{Context, Result};
use log::trace;
use regex::Regex;
use std::env;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::errors::NodetestError;
use crate::job::Job;

/// Captured result of one scheduler command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub return_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.return_code == 0
    }

    /// Convert a non-zero return code into [`NodetestError::CommandFailed`]
    pub fn check(self, command: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(NodetestError::CommandFailed {
                command: command.to_string(),
                return_code: self.return_code,
                stderr: self.stderr.trim().to_string(),
            }
            .into())
        }
    }
}

/// Everything a backend needs to submit one diagnostic pair
#[derive(Debug, Clone, Copy)]
pub struct SubmitRequest<'a> {
    pub job: &'a Job,
    /// Job script inside the job's working directory
    pub script: &'a Path,
    pub account: &'a str,
    pub queue: &'a str,
    /// Submit the job held so it can be released onto reserved nodes later
    pub hold: bool,
}

/// Resolve a scheduler executable, allowing tests to substitute a fake binary
pub fn executable(name: &str, override_var: &str) -> String {
    env::var(override_var).unwrap_or_else(|_| name.to_string())
}

/// Run a scheduler command once. Commands are never retried.
pub fn run_command(
    cmd: &str,
    args: &[&str],
    cwd: Option<&Path>,
    stdin: Option<&Path>,
) -> Result<CommandOutput> {
    trace!("Running command: {} {:?}", cmd, args);

    let mut command = Command::new(cmd);
    command.args(args);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }
    if let Some(input) = stdin {
        let file = File::open(input)
            .with_context(|| format!("Failed to open {} for {}", input.display(), cmd))?;
        command.stdin(Stdio::from(file));
    }

    let output = command
        .output()
        .with_context(|| format!("Failed to execute {}", cmd))?;

    Ok(CommandOutput {
        return_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Compile the user's node-name filter
pub fn compile_filter(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).with_context(|| format!("Invalid node filter pattern: {}", pattern))
}
