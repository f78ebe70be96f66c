use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::target::TargetItem;

/// The authoritative assignment of targets to collectors.
///
/// Holds the target registry, the per-collector assignment sets, and the set
/// of targets that exist but have no collector yet. Every target key in the
/// registry is either in exactly one collector's set or in the unassigned
/// set, never both.
#[derive(Debug, Default, Clone)]
pub struct AllocationState {
    targets: HashMap<String, Arc<TargetItem>>,
    collectors: BTreeMap<String, BTreeSet<String>>,
    assignments: HashMap<String, String>,
    unassigned: BTreeSet<String>,
}

impl AllocationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> &HashMap<String, Arc<TargetItem>> {
        &self.targets
    }

    pub fn target(&self, key: &str) -> Option<&Arc<TargetItem>> {
        self.targets.get(key)
    }

    pub fn contains_target(&self, key: &str) -> bool {
        self.targets.contains_key(key)
    }

    /// Collector names in lexicographic order.
    pub fn collector_names(&self) -> impl Iterator<Item = &String> {
        self.collectors.keys()
    }

    pub fn has_collector(&self, name: &str) -> bool {
        self.collectors.contains_key(name)
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.len()
    }

    /// Keys assigned to a collector, in key order.
    pub fn targets_of(&self, collector: &str) -> Option<&BTreeSet<String>> {
        self.collectors.get(collector)
    }

    pub fn load_of(&self, collector: &str) -> usize {
        self.collectors.get(collector).map_or(0, BTreeSet::len)
    }

    pub fn collector_of(&self, key: &str) -> Option<&str> {
        self.assignments.get(key).map(String::as_str)
    }

    pub fn assignments(&self) -> &HashMap<String, String> {
        &self.assignments
    }

    pub fn unassigned(&self) -> &BTreeSet<String> {
        &self.unassigned
    }

    /// Registers a target as unassigned. Returns false, leaving the stored
    /// item untouched, if the key is already known.
    pub fn insert_target(&mut self, key: String, item: Arc<TargetItem>) -> bool {
        if self.targets.contains_key(&key) {
            return false;
        }
        self.unassigned.insert(key.clone());
        self.targets.insert(key, item);
        true
    }

    /// Drops a target from the registry and from whichever set holds it.
    pub fn remove_target(&mut self, key: &str) -> Option<Arc<TargetItem>> {
        let item = self.targets.remove(key)?;
        match self.assignments.remove(key) {
            Some(collector) => {
                if let Some(keys) = self.collectors.get_mut(&collector) {
                    keys.remove(key);
                }
            }
            None => {
                self.unassigned.remove(key);
            }
        }
        Some(item)
    }

    /// Adds a collector with no targets. Returns false if it already exists.
    pub fn add_collector(&mut self, name: String) -> bool {
        if self.collectors.contains_key(&name) {
            return false;
        }
        self.collectors.insert(name, BTreeSet::new());
        true
    }

    /// Removes a collector. Its targets stay in the registry and move to the
    /// unassigned set; their keys are returned in key order so a strategy
    /// can place them again.
    pub fn remove_collector(&mut self, name: &str) -> Vec<String> {
        let Some(keys) = self.collectors.remove(name) else {
            return Vec::new();
        };
        for key in &keys {
            self.assignments.remove(key);
            self.unassigned.insert(key.clone());
        }
        keys.into_iter().collect()
    }

    /// Assigns a known target to a known collector, moving it off whatever
    /// collector held it before. Returns the previous collector, if any.
    pub fn assign(&mut self, key: &str, collector: &str) -> Result<Option<String>> {
        if !self.targets.contains_key(key) {
            return Err(Error::invariant(format!(
                "cannot assign unknown target {key}"
            )));
        }
        let Some(keys) = self.collectors.get_mut(collector) else {
            return Err(Error::invariant(format!(
                "cannot assign target {key} to unknown collector {collector}"
            )));
        };
        keys.insert(key.to_string());

        let previous = self
            .assignments
            .insert(key.to_string(), collector.to_string());
        match &previous {
            Some(old) if old != collector => {
                if let Some(old_keys) = self.collectors.get_mut(old) {
                    old_keys.remove(key);
                }
            }
            Some(_) => {}
            None => {
                self.unassigned.remove(key);
            }
        }
        Ok(previous)
    }

    /// Verifies the structural invariants: every target is either assigned
    /// to exactly one existing collector or unassigned, every assigned key
    /// exists in the registry, and unassigned targets only remain while no
    /// collector exists.
    pub fn check_invariants(&self) -> Result<()> {
        let mut seen = 0usize;
        for (collector, keys) in &self.collectors {
            for key in keys {
                if !self.targets.contains_key(key) {
                    return Err(Error::invariant(format!(
                        "collector {collector} holds unknown target {key}"
                    )));
                }
                if self.assignments.get(key) != Some(collector) {
                    return Err(Error::invariant(format!(
                        "target {key} is in collector {collector}'s set but assigned to {:?}",
                        self.assignments.get(key)
                    )));
                }
                seen += 1;
            }
        }
        if seen != self.assignments.len() {
            return Err(Error::invariant(format!(
                "{} assignments recorded but {seen} found in collector sets",
                self.assignments.len()
            )));
        }

        for key in &self.unassigned {
            if !self.targets.contains_key(key) {
                return Err(Error::invariant(format!("unknown target {key} is unassigned")));
            }
            if self.assignments.contains_key(key) {
                return Err(Error::invariant(format!(
                    "target {key} is both assigned and unassigned"
                )));
            }
        }
        if seen + self.unassigned.len() != self.targets.len() {
            return Err(Error::invariant(format!(
                "{} targets registered but {} accounted for",
                self.targets.len(),
                seen + self.unassigned.len()
            )));
        }

        self.check_fully_assigned()
    }

    /// Constant-time part of [`AllocationState::check_invariants`]: with at
    /// least one collector, no target may be left unassigned.
    pub fn check_fully_assigned(&self) -> Result<()> {
        if !self.collectors.is_empty() && !self.unassigned.is_empty() {
            return Err(Error::invariant(format!(
                "{} targets left unassigned with {} collectors available",
                self.unassigned.len(),
                self.collectors.len()
            )));
        }
        Ok(())
    }
}
