use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::state::AllocationState;
use crate::target::TargetItem;

use super::ring::HashRing;
use super::{AllocationStrategy, MembershipChange, CONSISTENT_HASHING};

/// Virtual nodes per collector. Enough to keep per-collector load within a
/// few percent of even for typical collector counts.
pub const DEFAULT_VNODES_PER_COLLECTOR: usize = 100;

/// Assigns each target to the collector owning its content hash on a
/// consistent hash ring.
///
/// Placement is a pure function of the target hash and the collector set,
/// so it is reproducible. When a collector joins, only the targets whose
/// positions fall into the new collector's ring segments move; when one
/// leaves, only its own targets move. Targets are indexed by ring position
/// so that a membership change only looks at the affected segments.
pub struct ConsistentHashingStrategy {
    ring: HashRing,
    by_position: BTreeMap<u64, BTreeSet<String>>,
}

impl Default for ConsistentHashingStrategy {
    fn default() -> Self {
        Self::new(DEFAULT_VNODES_PER_COLLECTOR)
    }
}

impl ConsistentHashingStrategy {
    pub fn new(vnodes_per_collector: usize) -> Self {
        Self {
            ring: HashRing::new(vnodes_per_collector),
            by_position: BTreeMap::new(),
        }
    }

    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    fn position_of(state: &AllocationState, key: &str) -> Result<u64> {
        state
            .target(key)
            .map(|item| item.ring_position())
            .ok_or_else(|| Error::invariant(format!("target {key} missing from registry")))
    }
}

impl AllocationStrategy for ConsistentHashingStrategy {
    fn name(&self) -> &'static str {
        CONSISTENT_HASHING
    }

    fn place(&mut self, state: &mut AllocationState, keys: &[String]) -> Result<()> {
        for key in keys {
            let position = Self::position_of(state, key)?;
            self.by_position
                .entry(position)
                .or_default()
                .insert(key.clone());
            if let Some(collector) = self.ring.locate(position) {
                state.assign(key, collector)?;
            }
        }
        Ok(())
    }

    fn collectors_changed(
        &mut self,
        state: &mut AllocationState,
        change: &MembershipChange,
    ) -> Result<usize> {
        self.ring
            .rebuild(state.collector_names().map(String::as_str));

        // Orphans of removed collectors plus anything placed while the ring
        // was empty.
        let mut candidates: BTreeSet<String> = state.unassigned().clone();
        for collector in &change.added {
            for segment in self.ring.segments_of(collector) {
                for keys in self.by_position.range(segment).map(|(_, keys)| keys) {
                    candidates.extend(keys.iter().cloned());
                }
            }
        }

        let orphaned: HashSet<&str> = change.orphaned.iter().map(String::as_str).collect();
        let mut moved = 0;
        for key in &candidates {
            let position = Self::position_of(state, key)?;
            let Some(owner) = self.ring.locate(position) else {
                continue;
            };
            if state.collector_of(key) == Some(owner) {
                continue;
            }
            let previous = state.assign(key, owner)?;
            if previous.is_some() || orphaned.contains(key.as_str()) {
                moved += 1;
            }
        }
        Ok(moved)
    }

    fn targets_removed(&mut self, removed: &[(String, Arc<TargetItem>)]) {
        for (key, item) in removed {
            let position = item.ring_position();
            if let Some(keys) = self.by_position.get_mut(&position) {
                keys.remove(key);
                if keys.is_empty() {
                    self.by_position.remove(&position);
                }
            }
        }
    }
}
