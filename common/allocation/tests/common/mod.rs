#![allow(dead_code)]

use std::collections::{HashMap, HashSet};

use allocation::{items_by_hash, Allocator, Labels, TargetItem};

pub const JOBS: [&str; 3] = ["node-exporter", "kube-state-metrics", "app"];

/// Builds `count` distinct targets spread across [`JOBS`].
pub fn make_targets(count: usize) -> HashMap<String, TargetItem> {
    items_by_hash((0..count).map(|i| {
        let job = JOBS[i % JOBS.len()];
        let mut labels = Labels::new();
        labels.insert("__meta_kubernetes_namespace", "default");
        labels.insert("__meta_kubernetes_pod_name", format!("pod-{i}"));
        TargetItem::new(
            job,
            format!("10.{}.{}.{}:8080", i / 65_536, (i / 256) % 256, i % 256),
            labels,
            "",
        )
    }))
}

pub fn collector_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("collector-{i}")).collect()
}

/// Target key to collector name for every assigned target.
pub fn assignment_map(allocator: &Allocator) -> HashMap<String, String> {
    allocator.snapshot().assignments
}

/// Checks that every target is assigned to exactly one existing collector,
/// and that the per-collector views agree with the target registry.
pub fn assert_fully_assigned(allocator: &Allocator) {
    allocator
        .check_invariants()
        .expect("allocation invariants should hold");

    let snapshot = allocator.snapshot();
    assert!(!snapshot.collectors.is_empty());

    let mut seen = HashSet::new();
    for collector in snapshot.collectors.keys() {
        for job in JOBS {
            for item in allocator.targets_for_collector_and_job(collector, job) {
                assert!(
                    seen.insert(item.hash()),
                    "target {} listed under more than one collector",
                    item.hash()
                );
            }
        }
    }
    assert_eq!(seen.len(), snapshot.targets.len());
    let counted: usize = snapshot.collectors.values().map(|c| c.num_targets).sum();
    assert_eq!(counted, snapshot.targets.len());
}
