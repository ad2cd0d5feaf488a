//! Ties the registry, directory, and runtime flags together into a single
//! value a host process constructs once at startup and hands to its RPC
//! and timer front ends. Mirrors the lifecycle order: registry before
//! directory, directory before timer-driven scans.

use crate::call_context;
use crate::id::ActorId;
use crate::id::ActorKinds;
use crate::manager::{ActorFactory, ActorManager};
use crate::registry::ComponentRegistry;
use slog::{o, warn, Drain, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Falls back to an async-drained terminal logger when the host process
/// does not supply its own `slog::Logger`.
pub fn default_log() -> Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    Logger::root(drain, o!())
}

/// The assembled runtime: registry (static bindings) + manager (directory,
/// lifecycle) + the two process-wide flags the spec names as consumed
/// runtime inputs (`shutdown`, `debug`).
pub struct ActorRuntime {
    pub registry: Arc<ComponentRegistry>,
    pub manager: Arc<ActorManager>,
    pub log: Logger,
    debug: Arc<AtomicBool>,
}

impl ActorRuntime {
    /// `registry` is shared (not owned) because `factory` almost always
    /// needs its own clone to build each `Actor` with the same bindings
    /// this runtime checks against in `get_agent`/`for_each_of_type`.
    pub fn new(
        registry: Arc<ComponentRegistry>,
        kinds: ActorKinds,
        factory: ActorFactory,
        log: Logger,
    ) -> Arc<Self> {
        let manager = ActorManager::new(kinds, factory, registry.clone(), log.clone());
        Arc::new(ActorRuntime {
            registry,
            manager,
            log,
            debug: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Shared with [`ActorManager::timer_save`]'s abort check; the host's
    /// shutdown sequence sets this before calling `save_all_now`/`remove_all`.
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.manager.shutdown_flag()
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    pub fn set_debug(&self, value: bool) {
        self.debug.store(value, Ordering::Relaxed);
    }

    /// The development-time call-permission check named in spec §6: when
    /// `debug` is on, flags a call reaching `target` from inside a chain
    /// already bound to a *different* actor without going through that
    /// actor's own mailbox (i.e. the caller skipped `ask`/`tell` and is
    /// touching another actor's state directly). A no-op when `debug` is
    /// off, so it costs nothing in production.
    pub fn assert_call_allowed(&self, target: ActorId) {
        if !self.is_debug() {
            return;
        }
        let ctx = call_context::current();
        if ctx.chain_id != 0 && ctx.actor_id != target {
            warn!(self.log, "cross-actor access outside ask/tell"; "from" => %ctx.actor_id, "to" => %target);
        }
    }
}
