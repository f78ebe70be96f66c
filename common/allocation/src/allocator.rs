use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::metrics_consts::{
    COLLECTORS_ALLOCATABLE, TARGETS, TARGETS_MOVED, TARGETS_PER_COLLECTOR, TARGETS_UNASSIGNED,
    TIME_TO_ALLOCATE,
};
use crate::state::AllocationState;
use crate::strategy::{self, AllocationStrategy, MembershipChange};
use crate::target::TargetItem;

/// A collector and the number of targets currently assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collector {
    pub name: String,
    pub num_targets: usize,
}

/// A view of the whole allocation taken under a single read lock.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub targets: HashMap<String, Arc<TargetItem>>,
    pub collectors: BTreeMap<String, Collector>,
    /// Target key to collector name, for assigned targets only.
    pub assignments: HashMap<String, String>,
}

impl Snapshot {
    pub fn collector_for(&self, key: &str) -> Option<&str> {
        self.assignments.get(key).map(String::as_str)
    }

    /// Targets ordered by key.
    pub fn sorted_targets(&self) -> Vec<(&String, &Arc<TargetItem>)> {
        let mut targets: Vec<_> = self.targets.iter().collect();
        targets.sort_by(|a, b| a.0.cmp(b.0));
        targets
    }
}

struct Inner {
    state: AllocationState,
    strategy: Box<dyn AllocationStrategy>,
}

/// Thread-safe entry point to the allocation engine.
///
/// Discovery replaces the full collector set and the full target set through
/// [`Allocator::set_collectors`] and [`Allocator::set_targets`]; the HTTP
/// layer reads through the accessors. Each mutation computes its diff under
/// an upgradable read lock, so readers keep going while it runs, and only
/// takes the write lock to apply the delta and let the strategy settle
/// placement. Readers therefore only ever see fully reconciled state.
pub struct Allocator {
    inner: RwLock<Inner>,
    strategy_name: &'static str,
}

impl Allocator {
    /// Builds an allocator using the named strategy.
    pub fn new(strategy_name: &str) -> Result<Self> {
        Ok(Self::with_strategy(strategy::from_name(strategy_name)?))
    }

    pub fn with_strategy(strategy: Box<dyn AllocationStrategy>) -> Self {
        let strategy_name = strategy.name();
        Self {
            inner: RwLock::new(Inner {
                state: AllocationState::new(),
                strategy,
            }),
            strategy_name,
        }
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy_name
    }

    /// Replaces the collector membership.
    ///
    /// New collectors join with no targets. Targets of collectors that are
    /// gone are redistributed among the remaining ones in the same call. An
    /// empty set is allowed; targets then stay registered but unassigned
    /// until a collector appears.
    pub fn set_collectors<I, S>(&self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let start = Instant::now();
        let desired: BTreeSet<String> = names.into_iter().map(Into::into).collect();

        let guard = self.inner.upgradable_read();
        let removed: Vec<String> = guard
            .state
            .collector_names()
            .filter(|name| !desired.contains(*name))
            .cloned()
            .collect();
        let added: Vec<String> = desired
            .into_iter()
            .filter(|name| !guard.state.has_collector(name))
            .collect();
        if added.is_empty() && removed.is_empty() {
            return;
        }

        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        let Inner { state, strategy } = &mut *guard;

        let mut orphaned = Vec::new();
        for name in &removed {
            orphaned.extend(state.remove_collector(name));
        }
        for name in &added {
            state.add_collector(name.clone());
        }
        let change = MembershipChange {
            added,
            removed,
            orphaned,
        };

        let moved = match strategy
            .collectors_changed(state, &change)
            .and_then(|moved| verify(state).map(|()| moved))
        {
            Ok(moved) => moved,
            Err(e) => reconciliation_failed("set_collectors", &e),
        };

        tracing::info!(
            strategy = self.strategy_name,
            added = ?change.added,
            removed = ?change.removed,
            collectors = state.collector_count(),
            moved,
            "collector membership changed"
        );
        if state.collector_count() == 0 && !state.targets().is_empty() {
            tracing::warn!(
                targets = state.targets().len(),
                "no collectors available, targets are unassigned"
            );
        }

        self.record_metrics(state, "set_collectors", start, moved, &change.removed);
    }

    /// Replaces the full target set, keyed by target hash.
    ///
    /// Keys not seen before are placed by the strategy; keys no longer
    /// present are dropped. Targets whose key is already known keep their
    /// stored item and their collector. An item passed under any other key
    /// is stored under its own hash.
    pub fn set_targets(&self, targets: HashMap<String, TargetItem>) {
        let start = Instant::now();
        let targets = rekey_by_hash(targets);

        let guard = self.inner.upgradable_read();
        let removed: Vec<String> = guard
            .state
            .targets()
            .keys()
            .filter(|key| !targets.contains_key(*key))
            .cloned()
            .collect();
        let mut added: Vec<(String, TargetItem)> = targets
            .into_iter()
            .filter(|(key, _)| !guard.state.contains_target(key))
            .collect();
        if added.is_empty() && removed.is_empty() {
            tracing::debug!("target set unchanged");
            return;
        }
        added.sort_by(|a, b| a.0.cmp(&b.0));

        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        let Inner { state, strategy } = &mut *guard;

        let removed: Vec<(String, Arc<TargetItem>)> = removed
            .into_iter()
            .filter_map(|key| state.remove_target(&key).map(|item| (key, item)))
            .collect();
        strategy.targets_removed(&removed);

        let mut keys = Vec::with_capacity(added.len());
        for (key, item) in added {
            state.insert_target(key.clone(), Arc::new(item));
            keys.push(key);
        }

        if let Err(e) = strategy
            .place(state, &keys)
            .and_then(|()| verify(state))
        {
            reconciliation_failed("set_targets", &e);
        }

        tracing::debug!(
            strategy = self.strategy_name,
            added = keys.len(),
            removed = removed.len(),
            targets = state.targets().len(),
            unassigned = state.unassigned().len(),
            "target set updated"
        );

        self.record_metrics(state, "set_targets", start, 0, &[]);
    }

    /// All registered targets, keyed by hash.
    pub fn target_items(&self) -> HashMap<String, Arc<TargetItem>> {
        self.inner.read().state.targets().clone()
    }

    /// All collectors with their current target counts.
    pub fn collectors(&self) -> BTreeMap<String, Collector> {
        collectors_of(&self.inner.read().state)
    }

    /// Targets of `job_name` assigned to `collector_name`, ordered by key.
    /// Unknown collectors and jobs yield an empty list.
    pub fn targets_for_collector_and_job(
        &self,
        collector_name: &str,
        job_name: &str,
    ) -> Vec<Arc<TargetItem>> {
        let inner = self.inner.read();
        let Some(keys) = inner.state.targets_of(collector_name) else {
            return Vec::new();
        };
        keys.iter()
            .filter_map(|key| inner.state.target(key))
            .filter(|item| item.job_name() == job_name)
            .cloned()
            .collect()
    }

    pub fn collector_for_target(&self, key: &str) -> Option<String> {
        self.inner
            .read()
            .state
            .collector_of(key)
            .map(str::to_string)
    }

    pub fn snapshot(&self) -> Snapshot {
        let inner = self.inner.read();
        Snapshot {
            targets: inner.state.targets().clone(),
            collectors: collectors_of(&inner.state),
            assignments: inner.state.assignments().clone(),
        }
    }

    /// Runs the full invariant check against the current state.
    pub fn check_invariants(&self) -> Result<()> {
        self.inner.read().state.check_invariants()
    }

    fn record_metrics(
        &self,
        state: &AllocationState,
        method: &'static str,
        start: Instant,
        moved: usize,
        removed_collectors: &[String],
    ) {
        let strategy = self.strategy_name;
        metrics::gauge!(COLLECTORS_ALLOCATABLE, "strategy" => strategy)
            .set(state.collector_count() as f64);
        metrics::gauge!(TARGETS).set(state.targets().len() as f64);
        metrics::gauge!(TARGETS_UNASSIGNED).set(state.unassigned().len() as f64);
        for name in state.collector_names() {
            metrics::gauge!(TARGETS_PER_COLLECTOR, "collector_name" => name.clone(), "strategy" => strategy)
                .set(state.load_of(name) as f64);
        }
        for name in removed_collectors {
            metrics::gauge!(TARGETS_PER_COLLECTOR, "collector_name" => name.clone(), "strategy" => strategy)
                .set(0.0);
        }
        if moved > 0 {
            metrics::counter!(TARGETS_MOVED, "strategy" => strategy).increment(moved as u64);
        }
        metrics::histogram!(TIME_TO_ALLOCATE, "method" => method, "strategy" => strategy)
            .record(start.elapsed().as_secs_f64());
    }
}

fn collectors_of(state: &AllocationState) -> BTreeMap<String, Collector> {
    state
        .collector_names()
        .map(|name| {
            (
                name.clone(),
                Collector {
                    name: name.clone(),
                    num_targets: state.load_of(name),
                },
            )
        })
        .collect()
}

fn rekey_by_hash(targets: HashMap<String, TargetItem>) -> HashMap<String, TargetItem> {
    targets
        .into_iter()
        .map(|(key, item)| {
            let hash = item.hash();
            if key != hash {
                tracing::warn!(key = %key, hash = %hash, "target key differs from its hash, re-keyed");
            }
            (hash, item)
        })
        .collect()
}

/// Every build checks that no target is left unassigned while collectors
/// exist. The full, linear check runs in debug builds only.
fn verify(state: &AllocationState) -> Result<()> {
    state.check_fully_assigned()?;
    if cfg!(debug_assertions) {
        state.check_invariants()?;
    }
    Ok(())
}

/// A strategy broke the allocation invariants. That is a logic error, not
/// something a later discovery tick can fix, so stop here.
fn reconciliation_failed(method: &str, error: &Error) -> ! {
    tracing::error!(method, error = %error, "reconciliation failed");
    panic!("{method}: {error}");
}
