//! Capability trait implemented by each batch system

use anyhow::Result;

use super::BatchSystem;
use super::common::SubmitRequest;
use crate::inventory::NodeInventory;
use crate::job::Job;

/// Operations the node test needs from a batch scheduler
pub trait SchedulerInterface {
    /// Which batch system this interface drives
    fn batch_system(&self) -> BatchSystem;

    /// List available nodes, in scheduler report order, with their reservation flags.
    ///
    /// `queue` is the queue (or reservation) the test targets and `name_filter` is a
    /// regular expression that node listings must match.
    fn discover_nodes(&self, queue: &str, name_filter: &str) -> Result<NodeInventory>;

    /// Submit one diagnostic pair and return the scheduler-assigned job id
    fn submit_job(&self, request: &SubmitRequest<'_>) -> Result<String>;

    /// Extract the job id from the scheduler's submission response
    fn parse_job_id(&self, output: &str) -> Result<String>;

    /// Whether jobs can be submitted held and later released onto specific hosts
    fn supports_holds(&self) -> bool;

    /// Release a held job onto its two nodes
    fn release_hold(&self, job: &Job) -> Result<()>;
}
