//! LSF scheduler interface implementation

use anyhow::{Context, Result};
use log::{debug, info, trace, warn};
use regex::Regex;

use super::BatchSystem;
use super::common::{SubmitRequest, compile_filter, executable, run_command};
use super::scheduler_interface::SchedulerInterface;
use crate::errors::NodetestError;
use crate::inventory::NodeInventory;
use crate::job::Job;

/// `bhosts` status for hosts that accept jobs
const AVAILABLE_STATUS: &str = "ok";

/// LSF scheduler implementation
pub struct LsfInterface {
    bsub_regex: Regex,
}

impl LsfInterface {
    pub fn new() -> Result<Self> {
        // Job <1234567> is submitted to queue <caldera>.
        let bsub_regex = Regex::new(r"<([^<>\s]+)>")?;
        Ok(Self { bsub_regex })
    }

    fn get_bhosts_exec() -> String {
        executable("bhosts", "NODETEST_FAKE_BHOSTS")
    }

    fn get_brsvs_exec() -> String {
        executable("brsvs", "NODETEST_FAKE_BRSVS")
    }

    fn get_bsub_exec() -> String {
        executable("bsub", "NODETEST_FAKE_BSUB")
    }

    /// Parse a `bhosts` status table.
    ///
    /// A line is kept when it matches `name_filter` and carries the `ok` status
    /// token. Indented continuation lines are never host rows.
    pub fn parse_hosts(listing: &str, name_filter: &Regex) -> Vec<String> {
        listing
            .lines()
            .filter(|line| !line.starts_with(char::is_whitespace))
            .filter(|line| name_filter.is_match(line))
            .filter(|line| {
                line.split_whitespace()
                    .skip(1)
                    .any(|field| field == AVAILABLE_STATUS)
            })
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    /// A host is reserved iff its name appears anywhere in the `brsvs` output
    pub fn parse_reservations(names: &[String], reservations: &str) -> Vec<bool> {
        names
            .iter()
            .map(|name| reservations.contains(name.as_str()))
            .collect()
    }

    fn fetch_reservations(&self) -> Result<String> {
        let brsvs = Self::get_brsvs_exec();
        let output = run_command(&brsvs, &[], None, None)?;
        if !output.success() {
            // brsvs exits non-zero when no reservations exist
            warn!(
                "{} returned {}; treating all hosts as unreserved: {}",
                brsvs,
                output.return_code,
                output.stderr.trim()
            );
            return Ok(String::new());
        }
        Ok(output.stdout)
    }
}

impl SchedulerInterface for LsfInterface {
    fn batch_system(&self) -> BatchSystem {
        BatchSystem::Lsf
    }

    fn discover_nodes(&self, _queue: &str, name_filter: &str) -> Result<NodeInventory> {
        let filter = compile_filter(name_filter)?;
        let bhosts = Self::get_bhosts_exec();
        let output = run_command(&bhosts, &[], None, None)?.check(&bhosts)?;
        trace!("bhosts output: [{}]", output.stdout);

        let names = Self::parse_hosts(&output.stdout, &filter);
        let reservations = self.fetch_reservations()?;
        let flags = Self::parse_reservations(&names, &reservations);

        let mut inventory = NodeInventory::new();
        for (name, reserved) in names.into_iter().zip(flags) {
            inventory.push(name, reserved);
        }
        debug!(
            "LSF reported {} available hosts ({} reserved)",
            inventory.len(),
            inventory.num_reserved()
        );
        Ok(inventory)
    }

    fn submit_job(&self, request: &SubmitRequest<'_>) -> Result<String> {
        if request.hold {
            return Err(NodetestError::HoldsUnsupported(BatchSystem::Lsf.to_string()).into());
        }

        let job = request.job;
        let hosts = job.nodes.join(" ");
        let bsub = Self::get_bsub_exec();
        let output = run_command(
            &bsub,
            &[
                "-m",
                &hosts,
                "-P",
                request.account,
                "-q",
                request.queue,
            ],
            Some(&job.working_path),
            Some(request.script),
        )
        .with_context(|| format!("Failed to submit job for pair {}", job.label))?
        .check(&bsub)?;

        let job_id = self.parse_job_id(&output.stdout)?;
        info!("Submitted LSF job {} for pair {}", job_id, job.label);
        Ok(job_id)
    }

    fn parse_job_id(&self, output: &str) -> Result<String> {
        match self.bsub_regex.captures(output).and_then(|c| c.get(1)) {
            Some(id) => Ok(id.as_str().to_string()),
            None => Err(NodetestError::JobIdParse(output.to_string()).into()),
        }
    }

    fn supports_holds(&self) -> bool {
        false
    }

    fn release_hold(&self, _job: &Job) -> Result<()> {
        Err(NodetestError::HoldsUnsupported(BatchSystem::Lsf.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_job_id() {
        let lsf = LsfInterface::new().unwrap();
        let id = lsf
            .parse_job_id("Job <4471901> is submitted to queue <caldera>.\n")
            .unwrap();
        assert_eq!(id, "4471901");
    }

    #[test]
    fn test_parse_job_id_missing() {
        let lsf = LsfInterface::new().unwrap();
        let err = lsf.parse_job_id("Request aborted by esub.\n").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NodetestError>(),
            Some(NodetestError::JobIdParse(_))
        ));
    }

    #[test]
    fn test_parse_hosts_requires_ok_field() {
        let listing = "\
HOST_NAME          STATUS       JL/U    MAX  NJOBS    RUN  SSUSP  USUSP    RSV
book01-ib          closed          -     32     16     16      0      0      0
ys0146-ib          ok              -     32      0      0      0      0      0
";
        let filter = Regex::new(".").unwrap();
        assert_eq!(LsfInterface::parse_hosts(listing, &filter), vec!["ys0146-ib"]);
    }

    #[test]
    fn test_parse_reservations_by_substring() {
        let names = vec!["ys0146-ib".to_string(), "ys0214-ib".to_string()];
        let blob = "RSVID  TYPE  USER  NCPUS  RSV_HOSTS\nsys_1  sys  admin  0/32  ys0214-ib:32\n";
        assert_eq!(
            LsfInterface::parse_reservations(&names, blob),
            vec![false, true]
        );
    }

    #[test]
    fn test_release_hold_unsupported() {
        let lsf = LsfInterface::new().unwrap();
        let job = Job::for_test("ys0146-ib", "ys0214-ib");
        assert!(lsf.release_hold(&job).is_err());
    }
}
