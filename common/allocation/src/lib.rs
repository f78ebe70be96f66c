//! Target allocation engine.
//!
//! Keeps track of scrape targets and the collectors that scrape them, and
//! assigns every target to exactly one collector. Discovery pushes the full
//! desired collector and target sets; a pluggable strategy decides where new
//! and orphaned targets go while moving as few existing targets as possible.
//!
//! ```rust
//! use allocation::{items_by_hash, Allocator, Labels, TargetItem};
//!
//! let allocator = Allocator::new("consistent-hashing").unwrap();
//! allocator.set_collectors(["collector-0", "collector-1"]);
//! allocator.set_targets(items_by_hash([
//!     TargetItem::new("node", "10.0.0.1:9100", Labels::new(), ""),
//!     TargetItem::new("node", "10.0.0.2:9100", Labels::new(), ""),
//! ]));
//!
//! let total: usize = allocator.collectors().values().map(|c| c.num_targets).sum();
//! assert_eq!(total, 2);
//! ```

pub mod allocator;
pub mod error;
pub mod hash;
pub mod metrics_consts;
pub mod state;
pub mod strategy;
pub mod target;

pub use allocator::{Allocator, Collector, Snapshot};
pub use error::{Error, Result};
pub use state::AllocationState;
pub use strategy::{AllocationStrategy, MembershipChange, CONSISTENT_HASHING, LEAST_WEIGHTED};
pub use target::{items_by_hash, Labels, TargetItem};
