mod consistent_hashing;
mod least_weighted;
mod ring;

pub use consistent_hashing::{ConsistentHashingStrategy, DEFAULT_VNODES_PER_COLLECTOR};
pub use least_weighted::LeastWeightedStrategy;
pub use ring::HashRing;

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::state::AllocationState;
use crate::target::TargetItem;

pub const LEAST_WEIGHTED: &str = "least-weighted";
pub const CONSISTENT_HASHING: &str = "consistent-hashing";

/// Strategy names accepted by [`from_name`].
pub const STRATEGY_NAMES: [&str; 2] = [LEAST_WEIGHTED, CONSISTENT_HASHING];

/// A change in collector membership, already applied to the state.
///
/// `orphaned` lists the targets that belonged to the removed collectors.
/// They are in the state's unassigned set when the strategy is called.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipChange {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub orphaned: Vec<String>,
}

/// Trait for target placement strategies.
///
/// The allocator applies every diff to the [`AllocationState`] itself
/// (registering new targets as unassigned, dropping removed ones, adding and
/// removing collectors) and then calls the strategy to settle placement.
/// When a call returns, every target must be assigned unless no collector
/// exists. Implementations may keep their own derived structures across
/// calls but must not hold references into the state.
pub trait AllocationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Places newly registered targets. `keys` are in key order and are all
    /// currently unassigned.
    fn place(&mut self, state: &mut AllocationState, keys: &[String]) -> Result<()>;

    /// Settles placement after collectors were added or removed. Returns the
    /// number of targets that changed collector.
    fn collectors_changed(
        &mut self,
        state: &mut AllocationState,
        change: &MembershipChange,
    ) -> Result<usize>;

    /// Called with targets that were dropped from the registry.
    fn targets_removed(&mut self, _removed: &[(String, Arc<TargetItem>)]) {}
}

/// Builds a strategy from its configuration name.
pub fn from_name(name: &str) -> Result<Box<dyn AllocationStrategy>> {
    match name {
        LEAST_WEIGHTED => Ok(Box::new(LeastWeightedStrategy)),
        CONSISTENT_HASHING => Ok(Box::new(ConsistentHashingStrategy::default())),
        other => Err(Error::UnknownStrategy(other.to_string())),
    }
}
