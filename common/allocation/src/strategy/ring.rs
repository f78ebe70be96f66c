//! Consistent hash ring with virtual nodes.
//!
//! The ring is a sorted array of virtual nodes. A position is owned by the
//! first virtual node at or after it, wrapping around past the end. Virtual
//! nodes that land on the same position are ordered by label, so the smaller
//! label owns the position.

use std::ops::Bound;

use crate::hash::stable_hash;

#[derive(Debug, Clone, PartialEq, Eq)]
struct VirtualNode {
    position: u64,
    label: String,
    collector: String,
}

/// A hash ring mapping positions to collectors.
#[derive(Debug, Clone)]
pub struct HashRing {
    vnodes: Vec<VirtualNode>,
    vnodes_per_collector: usize,
}

/// A half-open range of ring positions, `(start, end]` in ring order.
pub type Segment = (Bound<u64>, Bound<u64>);

impl HashRing {
    pub fn new(vnodes_per_collector: usize) -> Self {
        Self {
            vnodes: Vec::new(),
            vnodes_per_collector: vnodes_per_collector.max(1),
        }
    }

    pub fn vnodes_per_collector(&self) -> usize {
        self.vnodes_per_collector
    }

    pub fn is_empty(&self) -> bool {
        self.vnodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.vnodes.len()
    }

    fn vnode_label(collector: &str, index: usize) -> String {
        format!("{collector}#{index}")
    }

    /// Replaces the ring contents with the virtual nodes of `collectors`.
    pub fn rebuild<'a>(&mut self, collectors: impl IntoIterator<Item = &'a str>) {
        let mut vnodes = Vec::new();
        for collector in collectors {
            for index in 0..self.vnodes_per_collector {
                let label = Self::vnode_label(collector, index);
                vnodes.push(VirtualNode {
                    position: stable_hash([label.as_bytes()]),
                    label,
                    collector: collector.to_string(),
                });
            }
        }
        vnodes.sort_by(|a, b| (a.position, &a.label).cmp(&(b.position, &b.label)));
        self.vnodes = vnodes;
    }

    /// The collector owning `position`, or `None` for an empty ring.
    pub fn locate(&self, position: u64) -> Option<&str> {
        if self.vnodes.is_empty() {
            return None;
        }
        let idx = self.vnodes.partition_point(|v| v.position < position);
        let vnode = self.vnodes.get(idx).unwrap_or(&self.vnodes[0]);
        Some(vnode.collector.as_str())
    }

    /// The position ranges owned by `collector`'s virtual nodes.
    ///
    /// Each virtual node owns the positions after its predecessor up to and
    /// including its own; the first node also owns everything past the last.
    pub fn segments_of(&self, collector: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let last = match self.vnodes.last() {
            Some(last) => last.position,
            None => return segments,
        };

        for (idx, vnode) in self.vnodes.iter().enumerate() {
            if vnode.collector != collector {
                continue;
            }
            if idx == 0 {
                if self.vnodes.len() == 1 || last == vnode.position {
                    // Every node shares one position; the first owns all of it.
                    segments.push((Bound::Unbounded, Bound::Unbounded));
                    continue;
                }
                segments.push((Bound::Excluded(last), Bound::Unbounded));
                segments.push((Bound::Unbounded, Bound::Included(vnode.position)));
            } else {
                let prev = self.vnodes[idx - 1].position;
                if prev != vnode.position {
                    segments.push((Bound::Excluded(prev), Bound::Included(vnode.position)));
                }
            }
        }
        segments
    }
}
