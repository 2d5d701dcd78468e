//! Pairwise node and interconnect testing for HPC clusters
//!
//! Available compute nodes are discovered through the batch scheduler, paired
//! from opposite ends of the listing, and each pair runs a diagnostic job. The
//! run is finished when every pair has written its result artifact.
//!
//! The main entry point is [`driver::NodeTestDriver`]; scheduler backends live
//! under [`scheduler`].

pub mod config;
pub mod driver;
pub mod errors;
pub mod force_run;
pub mod inventory;
pub mod job;
pub mod lifecycle;
pub mod pairing;
pub mod run_paths;
pub mod scheduler;
pub mod status;

pub use config::{ConfigPaths, NodetestConfig, RunConfig, SchedulerConfig};
pub use driver::{NodeTestDriver, RunSummary};
pub use errors::NodetestError;
pub use inventory::{NodeInventory, NodeRecord};
pub use job::{Job, JobStatus, RunState};
pub use scheduler::{
    BatchSystem, LsfInterface, PbsInterface, SchedulerInterface, create_scheduler_interface,
};
