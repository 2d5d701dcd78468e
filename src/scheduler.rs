//! Batch scheduler management functionality
//!
//! This module provides the [`SchedulerInterface`] capability trait and one
//! implementation per supported batch system. The backend is chosen once at
//! startup; all scheduler text parsing stays behind the trait.

pub mod common;
pub mod lsf_interface;
pub mod pbs_interface;
pub mod scheduler_interface;

pub use common::{CommandOutput, SubmitRequest};
pub use lsf_interface::LsfInterface;
pub use pbs_interface::PbsInterface;
pub use scheduler_interface::SchedulerInterface;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::SchedulerConfig;
use crate::errors::NodetestError;

/// Supported batch systems
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchSystem {
    /// IBM Spectrum LSF (`bhosts`, `bsub`)
    Lsf,
    /// Altair PBS Pro (`pbsnodes`, `qsub`, `qrun`)
    Pbs,
}

impl FromStr for BatchSystem {
    type Err = NodetestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LSF" => Ok(BatchSystem::Lsf),
            "PBS" => Ok(BatchSystem::Pbs),
            _ => Err(NodetestError::UnknownBatchSystem(s.to_string())),
        }
    }
}

impl fmt::Display for BatchSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchSystem::Lsf => write!(f, "LSF"),
            BatchSystem::Pbs => write!(f, "PBS"),
        }
    }
}

/// Factory function to create a scheduler interface for the given batch system
pub fn create_scheduler_interface(
    batch_system: BatchSystem,
    config: &SchedulerConfig,
) -> Result<Box<dyn SchedulerInterface>> {
    match batch_system {
        BatchSystem::Lsf => Ok(Box::new(LsfInterface::new()?)),
        BatchSystem::Pbs => Ok(Box::new(PbsInterface::new(config))),
    }
}
