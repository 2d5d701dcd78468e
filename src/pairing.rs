//! Node pairing
//!
//! Nodes are paired from opposite ends of the scheduler listing (first with last,
//! second with second-to-last, ...). Listings are ordered by physical placement,
//! so this puts the most distant nodes on the same diagnostic.
//!
//! With an odd number of nodes the middle node is left out and one extra pair of
//! the first and last nodes is appended. That pair shares both nodes with pair 0
//! and carries a dependency on it so it is never force-started alongside it.

use log::{info, warn};
use std::collections::HashSet;

use crate::inventory::{NodeInventory, short_name};
use crate::job::Job;
use crate::run_paths::RunPaths;

/// Suffix that keeps the overflow pair's directories apart from pair 0
const OVERFLOW_SUFFIX: &str = ".extra";

/// Two nodes tested together by one diagnostic job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPair {
    pub nodes: [String; 2],
    /// Directory name for this pair, unique within a run once pairs are created
    pub label: String,
    pub reservation_flag: bool,
    pub wait_flag: bool,
    pub depends_on: Option<String>,
}

impl JobPair {
    pub fn new(
        first: &str,
        second: &str,
        reservation_flag: bool,
        wait_flag: bool,
        depends_on: Option<String>,
    ) -> Self {
        let nodes = [first.to_string(), second.to_string()];
        let mut label = format!("{}-{}", short_name(&nodes[0]), short_name(&nodes[1]));
        if wait_flag {
            label.push_str(OVERFLOW_SUFFIX);
        }
        Self {
            nodes,
            label,
            reservation_flag,
            wait_flag,
            depends_on,
        }
    }

    /// Short names of both nodes joined by a hyphen, e.g. `ys0146-ys2869`
    pub fn display_name(&self) -> String {
        format!("{}-{}", short_name(&self.nodes[0]), short_name(&self.nodes[1]))
    }
}

/// Pair node names using far-index pairing.
///
/// `reserved` must be index-aligned with `names`. Fewer than two nodes yields no pairs.
pub fn create_pairs(names: &[String], reserved: &[bool]) -> Vec<JobPair> {
    debug_assert_eq!(names.len(), reserved.len());
    let n = names.len();
    if n < 2 {
        return Vec::new();
    }

    let mut pairs: Vec<JobPair> = (0..n / 2)
        .map(|i| {
            let j = n - 1 - i;
            JobPair::new(&names[i], &names[j], reserved[i] && reserved[j], false, None)
        })
        .collect();

    if n % 2 == 1 {
        let blocker = pairs.first().map(|p| p.label.clone());
        pairs.push(JobPair::new(
            &names[0],
            &names[n - 1],
            reserved[0] && reserved[n - 1],
            true,
            blocker,
        ));
    }

    make_labels_unique(&mut pairs);
    pairs
}

/// Suffix repeated labels with `.1`, `.2`, ... in listing order.
///
/// Short names only keep the text before the first hyphen, so distinct nodes such as
/// `gpu-01` and `gpu-02` collapse to the same display name. Pair 0 always keeps its
/// plain label, which is what the overflow pair's dependency refers to.
fn make_labels_unique(pairs: &mut [JobPair]) {
    let mut seen = HashSet::new();
    for pair in pairs.iter_mut() {
        let base = pair.label.clone();
        let mut n = 0;
        while !seen.insert(pair.label.clone()) {
            n += 1;
            pair.label = format!("{}.{}", base, n);
        }
    }
}

/// Build the jobs for a run from the discovered nodes
pub fn create_jobs(inventory: &NodeInventory, paths: &RunPaths) -> Vec<Job> {
    let pairs = create_pairs(&inventory.names(), &inventory.reserved_flags());

    if inventory.len() % 2 == 1 && !pairs.is_empty() {
        warn!(
            "Odd number of nodes ({}); node {} is not tested and an extra job reuses the first \
             and last nodes. This job may not start until the others finish.",
            inventory.len(),
            inventory.records()[inventory.len() / 2].name
        );
    }
    info!("Created {} node pairs from {} nodes", pairs.len(), inventory.len());

    pairs.into_iter().map(|pair| Job::new(pair, paths)).collect()
}
