//! Fixed operational constants. Per the runtime's design these are not
//! user-configurable: they are part of the core's contract, not deployment
//! knobs, so they live here as `pub const` items rather than behind a
//! config loader.

use std::time::Duration;

/// Number of lifecycle partitions serializing role-actor create/evict
/// decisions, independent of any actor's own mailbox.
pub const WORKER_COUNT: usize = 10;

/// A role actor's `lastActiveAt` is considered hot (no need to take the
/// lifecycle partition) within this window of the last touch.
pub const IDLE_HOT_WINDOW: Duration = Duration::from_secs(10 * 60);

/// A role actor idle longer than this is a candidate for eviction.
pub const IDLE_EVICT_THRESHOLD: Duration = Duration::from_secs(15 * 60);

/// Batch size for the steady-state timer save sweep.
pub const ONCE_SAVE_COUNT: usize = 1000;

/// Default work item deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(13);

/// Wait budget for cross-day completion of global (non-driver) actors.
pub const CROSS_DAY_GLOBAL_WAIT: Duration = Duration::from_secs(60);

/// Wait budget for cross-day completion of non-role, non-global actors.
pub const CROSS_DAY_NON_ROLE_WAIT: Duration = Duration::from_secs(120);

/// Interval the timer-save sweep sleeps between batches.
pub const TIMER_SAVE_SLEEP: Duration = Duration::from_secs(1);

/// A `None` deadline means "lifecycle deadline" (effectively infinite):
/// used for save/deactivate/cross-day, which must never be truncated.
pub type Deadline = Option<Duration>;

/// The effectively-infinite deadline used by lifecycle operations.
pub const LIFECYCLE_DEADLINE: Deadline = None;

/// Shorthand for `Some(DEFAULT_DEADLINE)`.
pub fn default_deadline() -> Deadline {
    Some(DEFAULT_DEADLINE)
}
