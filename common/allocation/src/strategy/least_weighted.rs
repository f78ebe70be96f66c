use std::collections::BTreeSet;

use crate::error::Result;
use crate::state::AllocationState;

use super::{AllocationStrategy, MembershipChange, LEAST_WEIGHTED};

/// Assigns each new target to the collector with the fewest targets.
///
/// Ties go to the lexicographically smallest collector name, so the same
/// inputs always produce the same placement. Purely incremental: targets
/// whose collector still exists never move, and a new collector only
/// receives targets discovered or orphaned after it joined.
pub struct LeastWeightedStrategy;

impl LeastWeightedStrategy {
    fn assign_least_loaded(state: &mut AllocationState, keys: &[String]) -> Result<usize> {
        let mut loads: BTreeSet<(usize, String)> = state
            .collector_names()
            .map(|name| (state.load_of(name), name.clone()))
            .collect();

        let mut placed = 0;
        for key in keys {
            let Some((load, collector)) = loads.pop_first() else {
                break;
            };
            state.assign(key, &collector)?;
            loads.insert((load + 1, collector));
            placed += 1;
        }
        Ok(placed)
    }
}

impl AllocationStrategy for LeastWeightedStrategy {
    fn name(&self) -> &'static str {
        LEAST_WEIGHTED
    }

    fn place(&mut self, state: &mut AllocationState, keys: &[String]) -> Result<()> {
        Self::assign_least_loaded(state, keys)?;
        Ok(())
    }

    fn collectors_changed(
        &mut self,
        state: &mut AllocationState,
        change: &MembershipChange,
    ) -> Result<usize> {
        // Orphans and anything left over from a period with no collectors.
        let pending: Vec<String> = state.unassigned().iter().cloned().collect();
        let placed = Self::assign_least_loaded(state, &pending)?;
        Ok(placed.min(change.orphaned.len()))
    }
}
