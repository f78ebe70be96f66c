pub const COLLECTORS_ALLOCATABLE: &str = "target_allocator_collectors_allocatable";
pub const TARGETS: &str = "target_allocator_targets";
pub const TARGETS_UNASSIGNED: &str = "target_allocator_targets_unassigned";
pub const TARGETS_PER_COLLECTOR: &str = "target_allocator_targets_per_collector";
pub const TARGETS_MOVED: &str = "target_allocator_targets_moved_total";
pub const TIME_TO_ALLOCATE: &str = "target_allocator_time_to_allocate_seconds";
