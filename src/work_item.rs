//! A `WorkItem` carries a single thunk of one of four shapes (sync/async
//! x void/result) and a promise that completes with the thunk's result or
//! a default on error. `runOnce()` installs the `CallContext`, invokes the
//! thunk, and completes the promise; `forceComplete()` releases the
//! promise without touching the thunk, used only by the mailbox's
//! deadline path. The two must never both complete the same promise, so
//! both close over the same `Arc<Mutex<Option<Sender<T>>>>` slot:
//! whichever fires first takes it, the other is a no-op.
//!
//! Rather than require every possible result type to implement `Default`
//! just to name its "nothing happened" value, `forceComplete` simply
//! drops the sender: the waiting receiver observes a disconnect, which
//! `Mailbox::ask`/`ask_async` surface as `None`. This is the Rust-idiomatic
//! shape of the source design's `default(T)` on forced completion.
//!
//! The thunk itself runs inside a spawned task so that a deadline can
//! release the promise without cancelling the thunk (spec §4.3: it keeps
//! running detached; dropping a `JoinHandle` does not abort the task).

use crate::call_context::{self, CallContext};
use crate::id::ActorId;
use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
type Slot<T> = Arc<Mutex<Option<oneshot::Sender<T>>>>;

enum Thunk<T> {
    SyncResult(Box<dyn FnOnce() -> T + Send>),
    AsyncResult(BoxFuture<'static, T>),
}

/// A single queued unit of mailbox work, type-erased to `()` at the
/// boundary so a mailbox's FIFO can hold heterogeneous work items.
pub struct WorkItem {
    pub chain_id: u64,
    pub actor_id: ActorId,
    pub deadline: Option<std::time::Duration>,
    pub trace: Cow<'static, str>,
    run: BoxFuture<'static, ()>,
    forcer: Arc<dyn Fn() + Send + Sync>,
}

impl WorkItem {
    fn build<T: Send + 'static>(
        chain_id: u64,
        actor_id: ActorId,
        deadline: Option<std::time::Duration>,
        trace: Cow<'static, str>,
        thunk: Thunk<T>,
        tx: oneshot::Sender<T>,
    ) -> Self {
        let slot: Slot<T> = Arc::new(Mutex::new(Some(tx)));
        let run_slot = slot.clone();
        let ctx = CallContext::new(chain_id, actor_id);
        let run: BoxFuture<'static, ()> = Box::pin(async move {
            let result = call_context::scope(ctx, run_thunk(thunk)).await;
            if let Some(tx) = run_slot.lock().unwrap().take() {
                let _ = tx.send(result);
            }
        });
        let forcer: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
            // Dropping the sender (rather than sending a value) is the
            // force-complete signal the receiver observes as `None`.
            slot.lock().unwrap().take();
        });
        WorkItem {
            chain_id,
            actor_id,
            deadline,
            trace,
            run,
            forcer,
        }
    }

    pub fn sync<T, F>(
        chain_id: u64,
        actor_id: ActorId,
        deadline: Option<std::time::Duration>,
        trace: impl Into<Cow<'static, str>>,
        thunk: F,
    ) -> (Self, oneshot::Receiver<T>)
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let item = Self::build(
            chain_id,
            actor_id,
            deadline,
            trace.into(),
            Thunk::SyncResult(Box::new(thunk)),
            tx,
        );
        (item, rx)
    }

    pub fn async_work<T, Fut>(
        chain_id: u64,
        actor_id: ActorId,
        deadline: Option<std::time::Duration>,
        trace: impl Into<Cow<'static, str>>,
        thunk: Fut,
    ) -> (Self, oneshot::Receiver<T>)
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let item = Self::build(
            chain_id,
            actor_id,
            deadline,
            trace.into(),
            Thunk::AsyncResult(Box::pin(thunk)),
            tx,
        );
        (item, rx)
    }

    /// `runOnce()`/`forceComplete()` as a matched pair: the returned
    /// future drives the thunk to completion (consumed exactly once, by
    /// spawning it); the `Arc<dyn Fn()>` is `forceComplete`, callable
    /// independently by the mailbox's deadline path.
    pub fn into_run(self) -> (BoxFuture<'static, ()>, Arc<dyn Fn() + Send + Sync>) {
        (self.run, self.forcer)
    }
}

async fn run_thunk<T>(thunk: Thunk<T>) -> T {
    match thunk {
        Thunk::SyncResult(f) => f(),
        Thunk::AsyncResult(fut) => fut.await,
    }
}
