//! PBS Pro scheduler interface implementation

use anyhow::{Context, Result};
use log::{debug, info, trace};
use regex::Regex;

use super::BatchSystem;
use super::common::{SubmitRequest, compile_filter, executable, run_command};
use super::scheduler_interface::SchedulerInterface;
use crate::config::SchedulerConfig;
use crate::errors::NodetestError;
use crate::inventory::NodeInventory;
use crate::job::Job;

/// Attribute line present in a node stanza while the node belongs to a reservation
pub const RESERVATION_MARKER: &str = "resv =";

/// PBS reservation queues are named after their reservation id, e.g. `R123456`
pub const RESERVATION_QUEUE_PREFIX: char = 'R';

/// PBS scheduler implementation
pub struct PbsInterface {
    ncpus_per_node: u32,
    mpiprocs_per_node: u32,
}

impl PbsInterface {
    pub fn new(config: &SchedulerConfig) -> Self {
        Self {
            ncpus_per_node: config.ncpus_per_node,
            mpiprocs_per_node: config.mpiprocs_per_node,
        }
    }

    fn get_pbsnodes_exec() -> String {
        executable("pbsnodes", "NODETEST_FAKE_PBSNODES")
    }

    fn get_qsub_exec() -> String {
        executable("qsub", "NODETEST_FAKE_QSUB")
    }

    fn get_qrun_exec() -> String {
        executable("qrun", "NODETEST_FAKE_QRUN")
    }

    /// True when the caller targets a reservation queue rather than a regular queue
    pub fn targets_reservation(queue: &str) -> bool {
        queue.starts_with(RESERVATION_QUEUE_PREFIX)
    }

    /// Parse `pbsnodes -a` stanzas.
    ///
    /// A line at column 0 opens a stanza for that node. Indented attribute lines belong
    /// to the open stanza; the stanza is emitted as soon as one of them mentions
    /// `queue`. A reservation attribute marks the node reserved unless the caller is
    /// itself targeting a reservation queue.
    pub fn parse_node_stanzas(listing: &str, queue: &str, name_filter: &Regex) -> NodeInventory {
        let targeting_reservation = Self::targets_reservation(queue);
        let mut inventory = NodeInventory::new();
        let mut current: Option<(&str, bool)> = None;

        for line in listing.lines() {
            if line.trim().is_empty() {
                continue;
            }

            if !line.starts_with(char::is_whitespace) {
                let name = line.trim();
                current = name_filter.is_match(name).then_some((name, false));
                continue;
            }

            let Some((name, reserved)) = current.as_mut() else {
                continue;
            };

            if !targeting_reservation && line.contains(RESERVATION_MARKER) {
                *reserved = true;
            }

            if line.contains(queue) {
                inventory.push(*name, *reserved);
                current = None;
            }
        }

        inventory
    }

    /// Node names listed by `pbsnodes -l` (down or offline)
    pub fn parse_down_nodes(listing: &str) -> Vec<String> {
        listing
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .map(str::to_string)
            .collect()
    }

    /// Resource selection pinning one chunk to each node of the pair
    pub fn select_statement(&self, nodes: &[String]) -> String {
        let chunks: Vec<String> = nodes
            .iter()
            .map(|node| {
                format!(
                    "ncpus={}:mpiprocs={}:host={}",
                    self.ncpus_per_node, self.mpiprocs_per_node, node
                )
            })
            .collect();
        format!("select={}", chunks.join("+"))
    }
}

impl SchedulerInterface for PbsInterface {
    fn batch_system(&self) -> BatchSystem {
        BatchSystem::Pbs
    }

    fn discover_nodes(&self, queue: &str, name_filter: &str) -> Result<NodeInventory> {
        let filter = compile_filter(name_filter)?;
        let pbsnodes = Self::get_pbsnodes_exec();

        let output = run_command(&pbsnodes, &["-a"], None, None)?.check(&pbsnodes)?;
        trace!("pbsnodes -a output: [{}]", output.stdout);
        let mut inventory = Self::parse_node_stanzas(&output.stdout, queue, &filter);

        let down = run_command(&pbsnodes, &["-l"], None, None)?.check(&pbsnodes)?;
        let down_nodes = Self::parse_down_nodes(&down.stdout);
        if !down_nodes.is_empty() {
            debug!("Excluding {} down/offline nodes", down_nodes.len());
            inventory.retain(|r| !down_nodes.contains(&r.name));
        }

        debug!(
            "PBS reported {} available nodes for queue {} ({} reserved)",
            inventory.len(),
            queue,
            inventory.num_reserved()
        );
        Ok(inventory)
    }

    fn submit_job(&self, request: &SubmitRequest<'_>) -> Result<String> {
        let job = request.job;
        let select = self.select_statement(&job.nodes);
        let script = request.script.to_string_lossy();

        let mut args = vec![
            "-l",
            select.as_str(),
            "-A",
            request.account,
            "-q",
            request.queue,
        ];
        if request.hold {
            args.push("-h");
        }
        args.push(&script);

        let qsub = Self::get_qsub_exec();
        let output = run_command(&qsub, &args, Some(&job.working_path), None)
            .with_context(|| format!("Failed to submit job for pair {}", job.label))?
            .check(&qsub)?;

        let job_id = self.parse_job_id(&output.stdout)?;
        info!(
            "Submitted PBS job {} for pair {}{}",
            job_id,
            job.label,
            if request.hold { " (held)" } else { "" }
        );
        Ok(job_id)
    }

    fn parse_job_id(&self, output: &str) -> Result<String> {
        // 4471901.chadmin1.ib0.cheyenne.ucar.edu
        output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .and_then(|line| line.split('.').next())
            .filter(|id| !id.is_empty() && !id.contains(char::is_whitespace))
            .map(str::to_string)
            .ok_or_else(|| NodetestError::JobIdParse(output.to_string()).into())
    }

    fn supports_holds(&self) -> bool {
        true
    }

    fn release_hold(&self, job: &Job) -> Result<()> {
        let hosts = job.nodes.join("+");
        let qrun = Self::get_qrun_exec();
        run_command(&qrun, &["-H", &hosts, job.job_id()], None, None)
            .with_context(|| format!("Failed to release job {}", job.job_id()))?
            .check(&qrun)?;
        info!("Released job {} onto {}", job.job_id(), hosts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pbs() -> PbsInterface {
        PbsInterface::new(&SchedulerConfig::default())
    }

    #[test]
    fn test_parse_job_id_takes_dot_prefix() {
        assert_eq!(
            pbs().parse_job_id("4471901.chadmin1.ib0.cheyenne.ucar.edu\n").unwrap(),
            "4471901"
        );
        assert_eq!(pbs().parse_job_id("\n  88.server\n").unwrap(), "88");
    }

    #[test]
    fn test_parse_job_id_empty_output() {
        assert!(pbs().parse_job_id("").is_err());
        assert!(pbs().parse_job_id("qsub: illegal -l value").is_err());
    }

    #[test]
    fn test_select_statement() {
        let nodes = vec!["r1i0n0".to_string(), "r9i7n8".to_string()];
        assert_eq!(
            pbs().select_statement(&nodes),
            "select=ncpus=36:mpiprocs=36:host=r1i0n0+ncpus=36:mpiprocs=36:host=r9i7n8"
        );
    }

    #[test]
    fn test_targets_reservation() {
        assert!(PbsInterface::targets_reservation("R1234567"));
        assert!(!PbsInterface::targets_reservation("regular"));
    }

    #[test]
    fn test_parse_down_nodes() {
        let listing = "r1i0n3   offline   admin maintenance\nr2i1n5   down\n";
        assert_eq!(PbsInterface::parse_down_nodes(listing), vec!["r1i0n3", "r2i1n5"]);
    }
}
