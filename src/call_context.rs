//! Propagates `(chainId, actorId)` across the asynchronous suspension
//! points of a single logical call. The mechanism is a `tokio::task_local`
//! slot scoped around each work item's execution (spec §9 option (a):
//! "a task-local storage slot tied to the concurrency primitive").
//! `task_local!` is logical-call-local rather than OS-thread-local, so it
//! survives a suspension resuming on a different pool worker, which a
//! thread-local would not.

use crate::id::ActorId;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

tokio::task_local! {
    static CURRENT: CallContext;
}

/// `chainId == 0` means "no active chain": the call originates outside
/// any actor.
#[derive(Clone, Copy, Debug)]
pub struct CallContext {
    pub chain_id: u64,
    pub actor_id: ActorId,
}

impl CallContext {
    pub const NONE: CallContext = CallContext {
        chain_id: 0,
        actor_id: ActorId::new(0, 0),
    };

    pub fn new(chain_id: u64, actor_id: ActorId) -> Self {
        CallContext { chain_id, actor_id }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        CallContext::NONE
    }
}

/// The chain id observed by the caller right now: the task-local value if
/// one has been installed by an enclosing mailbox item, or `NONE`.
pub fn current() -> CallContext {
    CURRENT.try_with(|c| *c).unwrap_or_default()
}

/// Installs `ctx` as the current call context for the duration of `fut`,
/// including across every suspension point inside it.
pub async fn scope<F: Future>(ctx: CallContext, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}

fn seed() -> &'static AtomicU64 {
    static SEED: OnceLock<AtomicU64> = OnceLock::new();
    SEED.get_or_init(|| {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1);
        AtomicU64::new(nanos | 1)
    })
}

/// A monotonically increasing id, skipping 0 (reserved for "no chain").
/// Seeded from wall-clock ticks at first use; uniqueness only needs to
/// hold within a process lifetime.
pub fn next_chain_id() -> u64 {
    let counter = seed();
    let id = counter.fetch_add(1, Ordering::Relaxed);
    if id == 0 {
        counter.fetch_add(1, Ordering::Relaxed)
    } else {
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_zero() {
        for _ in 0..1000 {
            assert_ne!(next_chain_id(), 0);
        }
    }

    #[tokio::test]
    async fn scope_is_visible_across_suspension() {
        let ctx = CallContext::new(42, ActorId::new(1, 1));
        scope(ctx, async {
            assert_eq!(current().chain_id, 42);
            tokio::task::yield_now().await;
            assert_eq!(current().chain_id, 42);
        })
        .await;
        assert_eq!(current().chain_id, 0);
    }
}
