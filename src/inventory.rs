//! Uniform node listing produced by every scheduler backend

use log::debug;
use serde::{Deserialize, Serialize};

/// A compute node as reported by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Hyphenated host name, e.g. `ys0146-ib`
    pub name: String,
    /// Whether the node is held by a scheduler reservation
    pub reserved: bool,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>, reserved: bool) -> Self {
        Self {
            name: name.into(),
            reserved,
        }
    }

    /// Portion of the host name before the first hyphen
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }
}

/// Portion of a host name before the first hyphen
pub fn short_name(name: &str) -> &str {
    name.split('-').next().unwrap_or(name)
}

/// Ordered, duplicate-free set of discovered nodes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInventory {
    records: Vec<NodeRecord>,
}

impl NodeInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, keeping the first occurrence when the scheduler repeats a name
    pub fn push(&mut self, name: impl Into<String>, reserved: bool) {
        let name = name.into();
        if self.records.iter().any(|r| r.name == name) {
            debug!("Ignoring duplicate node {}", name);
            return;
        }
        self.records.push(NodeRecord::new(name, reserved));
    }

    /// Drop nodes for which `keep` returns false, preserving order
    pub fn retain(&mut self, mut keep: impl FnMut(&NodeRecord) -> bool) {
        self.records.retain(|r| keep(r));
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[NodeRecord] {
        &self.records
    }

    /// Node names in scheduler report order
    pub fn names(&self) -> Vec<String> {
        self.records.iter().map(|r| r.name.clone()).collect()
    }

    /// Reservation flags, index-aligned with [`NodeInventory::names`]
    pub fn reserved_flags(&self) -> Vec<bool> {
        self.records.iter().map(|r| r.reserved).collect()
    }

    pub fn num_reserved(&self) -> usize {
        self.records.iter().filter(|r| r.reserved).count()
    }
}

impl FromIterator<NodeRecord> for NodeInventory {
    fn from_iter<I: IntoIterator<Item = NodeRecord>>(iter: I) -> Self {
        let mut inventory = NodeInventory::new();
        for record in iter {
            inventory.push(record.name, record.reserved);
        }
        inventory
    }
}
