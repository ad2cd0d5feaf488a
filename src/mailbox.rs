//! Per-actor single-consumer queue executing work items serially, and the
//! reentrancy short-circuit that lets a call chain safely invoke back into
//! the mailbox it is already running on.
//!
//! `tell` always enqueues with a freshly minted chain id. `ask` evaluates
//! `needEnqueue = (ctx.chainId == 0) || (ctx.chainId != mailbox.currentChainId)`:
//! when false, the caller is already executing on this mailbox under the
//! same chain, so the work runs inline in the caller's stack instead of
//! being queued behind itself.
//!
//! `ask`/`ask_async` return `Option<T>` rather than requiring `T: Default`:
//! `None` means the item was force-completed (deadline exceeded, or the
//! thunk panicked) rather than that it produced a genuine zero value.

use crate::call_context::{self, CallContext};
use crate::constants::Deadline;
use crate::id::ActorId;
use crate::work_item::WorkItem;
use slog::{crit, warn, Logger};
use std::borrow::Cow;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

struct Shared {
    actor_id: ActorId,
    current_chain_id: AtomicU64,
    log: Logger,
}

/// A single actor's serial execution lane.
#[derive(Clone)]
pub struct Mailbox {
    shared: Arc<Shared>,
    tx: mpsc::UnboundedSender<WorkItem>,
}

impl Mailbox {
    pub fn new(actor_id: ActorId, log: Logger) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            actor_id,
            current_chain_id: AtomicU64::new(0),
            log,
        });
        tokio::spawn(run_worker(shared.clone(), rx));
        Mailbox { shared, tx }
    }

    pub fn actor_id(&self) -> ActorId {
        self.shared.actor_id
    }

    pub fn current_chain_id(&self) -> u64 {
        self.shared.current_chain_id.load(Ordering::Acquire)
    }

    /// Fire-and-forget: always enqueues a new work item under a fresh
    /// chain id. The caller is not expected to await anything.
    pub fn tell<F>(&self, deadline: Deadline, trace: impl Into<Cow<'static, str>>, thunk: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let chain_id = call_context::next_chain_id();
        let (item, _rx) = WorkItem::sync(chain_id, self.shared.actor_id, deadline, trace, move || {
            thunk();
        });
        let _ = self.tx.send(item);
    }

    /// Fire-and-forget, async thunk.
    pub fn tell_async<Fut>(&self, deadline: Deadline, trace: impl Into<Cow<'static, str>>, thunk: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let chain_id = call_context::next_chain_id();
        let (item, _rx) = WorkItem::async_work(chain_id, self.shared.actor_id, deadline, trace, thunk);
        let _ = self.tx.send(item);
    }

    /// Request/response with the reentrancy rule applied. `None` signals
    /// force-completion rather than a genuine result.
    pub async fn ask<T, F>(&self, deadline: Deadline, trace: impl Into<Cow<'static, str>>, thunk: F) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let ctx = call_context::current();
        if !self.needs_enqueue(&ctx) {
            return Some(call_context::scope(ctx, async move { thunk() }).await);
        }
        self.ask_enqueued(deadline, trace, thunk).await
    }

    /// Request/response, async thunk, with the reentrancy rule applied.
    pub async fn ask_async<T, Fut>(
        &self,
        deadline: Deadline,
        trace: impl Into<Cow<'static, str>>,
        thunk: Fut,
    ) -> Option<T>
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let ctx = call_context::current();
        if !self.needs_enqueue(&ctx) {
            return Some(call_context::scope(ctx, thunk).await);
        }
        self.ask_async_enqueued(deadline, trace, thunk).await
    }

    /// The "ask-without-reentry-check" variant named in the spec for
    /// `Actor::getAgent`'s activation item: always enqueues, even when the
    /// caller is already executing on this mailbox under the same chain
    /// (needed because activation runs *during* the outer call that is
    /// itself the currently-executing item).
    pub async fn ask_enqueued<T, F>(
        &self,
        deadline: Deadline,
        trace: impl Into<Cow<'static, str>>,
        thunk: F,
    ) -> Option<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let ctx = call_context::current();
        let chain_id = self.chain_for(&ctx);
        let (item, rx) = WorkItem::sync(chain_id, self.shared.actor_id, deadline, trace, thunk);
        let _ = self.tx.send(item);
        rx.await.ok()
    }

    pub async fn ask_async_enqueued<T, Fut>(
        &self,
        deadline: Deadline,
        trace: impl Into<Cow<'static, str>>,
        thunk: Fut,
    ) -> Option<T>
    where
        T: Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let ctx = call_context::current();
        let chain_id = self.chain_for(&ctx);
        let (item, rx) = WorkItem::async_work(chain_id, self.shared.actor_id, deadline, trace, thunk);
        let _ = self.tx.send(item);
        rx.await.ok()
    }

    fn needs_enqueue(&self, ctx: &CallContext) -> bool {
        ctx.chain_id == 0 || ctx.chain_id != self.current_chain_id()
    }

    fn chain_for(&self, ctx: &CallContext) -> u64 {
        if ctx.chain_id != 0 {
            ctx.chain_id
        } else {
            call_context::next_chain_id()
        }
    }
}

async fn run_worker(shared: Arc<Shared>, mut rx: mpsc::UnboundedReceiver<WorkItem>) {
    while let Some(item) = rx.recv().await {
        let trace = item.trace.clone();
        let actor_id = item.actor_id;
        let chain_id = item.chain_id;
        let deadline = item.deadline;
        shared.current_chain_id.store(chain_id, Ordering::Release);

        let (fut, forcer) = item.into_run();
        let handle = tokio::spawn(fut);
        match deadline {
            Some(d) => match tokio::time::timeout(d, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!(shared.log, "work item panicked"; "actor" => %actor_id, "trace" => %trace, "err" => %join_err);
                    forcer();
                }
                Err(_) => {
                    crit!(shared.log, "work item exceeded deadline"; "actor" => %actor_id, "trace" => %trace, "deadline_ms" => d.as_millis() as u64);
                    forcer();
                }
            },
            None => match handle.await {
                Ok(()) => {}
                Err(join_err) => {
                    warn!(shared.log, "work item panicked"; "actor" => %actor_id, "trace" => %trace, "err" => %join_err);
                    forcer();
                }
            },
        }

        shared.current_chain_id.store(0, Ordering::Release);
    }
}
