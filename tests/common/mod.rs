#![allow(dead_code)]

use anyhow::{Result, bail};
use rstest::fixture;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

use nodetest::config::NodetestConfig;
use nodetest::inventory::{NodeInventory, NodeRecord};
use nodetest::job::Job;
use nodetest::scheduler::{BatchSystem, SchedulerInterface, SubmitRequest};
use nodetest::status::{Snapshot, StatusSink};

pub const ERROR_TEXT: &str = "MPI_ABORT: ERROR on rank 12\n";
pub const SUCCESS_TEXT: &str = "wrf: SUCCESS COMPLETE WRF\n";

/// Scheduler stand-in that records every call and can write result artifacts
/// as if the diagnostic job had finished.
pub struct FakeScheduler {
    pub inventory: NodeInventory,
    pub holds: bool,
    /// Write the result artifact when a job is submitted (or released, if held)
    pub finish_immediately: bool,
    /// Labels whose artifact contains the error marker
    pub failing: Vec<String>,
    /// Labels whose artifact is left for the test to write
    pub deferred: Vec<String>,
    /// Fail the submission with this 1-based index
    pub fail_submission: Option<usize>,
    pub calls: Rc<RefCell<Vec<String>>>,
    next_id: Cell<u32>,
}

impl FakeScheduler {
    pub fn new(inventory: NodeInventory) -> Self {
        Self {
            inventory,
            holds: false,
            finish_immediately: true,
            failing: Vec::new(),
            deferred: Vec::new(),
            fail_submission: None,
            calls: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(1000),
        }
    }

    fn finish(&self, job: &Job) -> Result<()> {
        if self.deferred.contains(&job.label) {
            return Ok(());
        }
        let text = if self.failing.contains(&job.label) {
            ERROR_TEXT
        } else {
            SUCCESS_TEXT
        };
        fs::write(&job.result_path, text)?;
        Ok(())
    }
}

impl SchedulerInterface for FakeScheduler {
    fn batch_system(&self) -> BatchSystem {
        BatchSystem::Pbs
    }

    fn discover_nodes(&self, _queue: &str, _name_filter: &str) -> Result<NodeInventory> {
        Ok(self.inventory.clone())
    }

    fn submit_job(&self, request: &SubmitRequest<'_>) -> Result<String> {
        let count = self
            .calls
            .borrow()
            .iter()
            .filter(|c| c.starts_with("submit"))
            .count();
        if self.fail_submission == Some(count + 1) {
            bail!("qsub: Job rejected by all possible destinations");
        }
        if !request.script.is_file() {
            bail!("missing job script {}", request.script.display());
        }

        let id = self.next_id.get();
        self.next_id.set(id + 1);
        let held = if request.hold { " held" } else { "" };
        self.calls
            .borrow_mut()
            .push(format!("submit {}{}", request.job.label, held));

        if self.finish_immediately && !request.hold {
            self.finish(request.job)?;
        }
        self.parse_job_id(&format!("{}.fake-server\n", id))
    }

    fn parse_job_id(&self, output: &str) -> Result<String> {
        match output.split('.').next() {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => bail!("no job id in {:?}", output),
        }
    }

    fn supports_holds(&self) -> bool {
        self.holds
    }

    fn release_hold(&self, job: &Job) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("release {} {}", job.label, job.job_id()));
        if self.finish_immediately {
            self.finish(job)?;
        }
        Ok(())
    }
}

/// Collects every snapshot emitted by a reporter
pub struct CollectSink(pub Rc<RefCell<Vec<Snapshot>>>);

impl StatusSink for CollectSink {
    fn emit(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.0.borrow_mut().push(snapshot.clone());
        Ok(())
    }
}

/// Writes a deferred result artifact on the `after`-th report that follows the
/// first hold release, logging each of those reports into the scheduler call log.
pub struct ArtifactAfterReports {
    pub calls: Rc<RefCell<Vec<String>>>,
    pub result_path: PathBuf,
    pub after: usize,
    seen: usize,
}

impl ArtifactAfterReports {
    pub fn new(calls: Rc<RefCell<Vec<String>>>, result_path: PathBuf, after: usize) -> Self {
        Self {
            calls,
            result_path,
            after,
            seen: 0,
        }
    }
}

impl StatusSink for ArtifactAfterReports {
    fn emit(&mut self, _snapshot: &Snapshot) -> Result<()> {
        let releasing = self.calls.borrow().iter().any(|c| c.starts_with("release"));
        if !releasing || self.seen > self.after {
            return Ok(());
        }
        self.seen += 1;
        self.calls.borrow_mut().push("report".to_string());
        if self.seen == self.after {
            fs::write(&self.result_path, SUCCESS_TEXT)?;
            self.calls.borrow_mut().push("artifact".to_string());
        }
        Ok(())
    }
}

/// Node names `ys0001-ib`, `ys0002-ib`, ...
pub fn node_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("ys{:04}-ib", i)).collect()
}

pub fn inventory(count: usize, reserved: bool) -> NodeInventory {
    node_names(count)
        .into_iter()
        .map(|name| NodeRecord::new(name, reserved))
        .collect()
}

/// Temporary case template and output root
pub struct Workspace {
    pub dir: TempDir,
    pub case_path: PathBuf,
    pub output_path: PathBuf,
}

impl Workspace {
    pub fn config(&self) -> NodetestConfig {
        let mut config = NodetestConfig::default();
        config.run.batch = "PBS".to_string();
        config.run.case_path = self.case_path.clone();
        config.run.output_path = self.output_path.clone();
        config
    }
}

#[fixture]
pub fn workspace() -> Workspace {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let case_path = dir.path().join("def_ca");
    fs::create_dir_all(&case_path).expect("Failed to create case dir");
    fs::write(case_path.join("runwrf.job"), "#!/bin/bash\nmpiexec ./wrf.exe\n")
        .expect("Failed to write job script");
    let output_path = dir.path().join("nodetests");
    Workspace {
        dir,
        case_path,
        output_path,
    }
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap_or_default()
}
