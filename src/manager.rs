//! The global directory: lookup/create, idle scan, broadcast save, and
//! cross-day coordination. Role actors are lazily created, kept hot while
//! recently active, and reaped after an idle window; global actors live
//! for the process lifetime once created.

use crate::actor::Actor;
use crate::constants::{
    default_deadline, CROSS_DAY_GLOBAL_WAIT, CROSS_DAY_NON_ROLE_WAIT, IDLE_EVICT_THRESHOLD,
    IDLE_HOT_WINDOW, LIFECYCLE_DEADLINE, ONCE_SAVE_COUNT, TIMER_SAVE_SLEEP,
};
use crate::id::{ActorId, ActorKinds, ActorType};
use crate::mailbox::Mailbox;
use crate::registry::ComponentRegistry;
use dashmap::DashMap;
use slog::{o, warn, Logger};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Builds a fresh [`Actor`] for an id the directory has not seen before.
/// The application supplies this: it knows which concrete actor type and
/// component set a given id denotes.
pub type ActorFactory = Arc<dyn Fn(ActorId) -> Arc<Actor> + Send + Sync>;

/// Number of fixed lifecycle partitions serializing role-actor create/evict
/// decisions. Each partition is itself a mailbox, distinct from any actor's
/// own, so a reap decision never waits on the actor it is trying to reap.
const N: usize = crate::constants::WORKER_COUNT;

pub struct ActorManager {
    directory: DashMap<ActorId, Arc<Actor>>,
    last_active: DashMap<ActorId, Instant>,
    partitions: Vec<Mailbox>,
    kinds: ActorKinds,
    factory: ActorFactory,
    registry: Arc<ComponentRegistry>,
    log: Logger,
    shutdown: Arc<AtomicBool>,
}

impl ActorManager {
    pub fn new(
        kinds: ActorKinds,
        factory: ActorFactory,
        registry: Arc<ComponentRegistry>,
        log: Logger,
    ) -> Arc<Self> {
        let partitions = (0..N)
            .map(|i| Mailbox::new(ActorId::singleton(i as ActorType), log.new(o!("partition" => i))))
            .collect();
        Arc::new(ActorManager {
            directory: DashMap::new(),
            last_active: DashMap::new(),
            partitions,
            kinds,
            factory,
            registry,
            log,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    fn partition_for(&self, id: ActorId) -> &Mailbox {
        &self.partitions[(id.raw() % N as u64) as usize]
    }

    /// `getOrCreate(actorId)`. Global actors: insert-if-absent directly.
    /// Role actors: the hot path (recently active) bumps `lastActiveAt`
    /// and returns the cached actor without touching a lifecycle
    /// partition; otherwise the lookup-and-insert is routed through the
    /// partition so a concurrent idle-reap cannot race it.
    pub async fn get_or_create(self: &Arc<Self>, id: ActorId) -> Arc<Actor> {
        if !self.kinds.is_role(id.actor_type()) {
            if let Some(actor) = self.directory.get(&id) {
                return actor.clone();
            }
            let actor = (self.factory)(id);
            return self.directory.entry(id).or_insert(actor).clone();
        }

        if let Some(last) = self.last_active.get(&id) {
            if last.elapsed() < IDLE_HOT_WINDOW {
                if let Some(actor) = self.directory.get(&id) {
                    self.last_active.insert(id, Instant::now());
                    return actor.clone();
                }
            }
        }

        let this = self.clone();
        self.partition_for(id)
            .ask_async(default_deadline(), "get-or-create-role", async move {
                let actor = this
                    .directory
                    .entry(id)
                    .or_insert_with(|| (this.factory)(id))
                    .clone();
                this.last_active.insert(id, Instant::now());
                actor
            })
            .await
            .expect("get-or-create work item cannot panic or exceed its deadline")
    }

    /// `forEachOfType(agentType, work)`: broadcasts a fire-and-forget call
    /// to every actor hosting `component_type`. The agent-type key the
    /// spec names collapses into `component_type` in this design (see
    /// `registry.rs`); the actor type it actually broadcasts against is
    /// resolved through the [`ComponentRegistry`] binding rather than
    /// taken as a raw [`ActorType`] from the caller.
    pub fn for_each_of_type<F>(&self, component_type: &'static str, work: F)
    where
        F: Fn(&Arc<Actor>) + Send + Sync + 'static,
    {
        let Some(actor_type) = self.registry.actor_type_of(component_type) else {
            warn!(self.log, "for_each_of_type: component type has no actorType binding"; "component_type" => component_type);
            return;
        };
        let work = Arc::new(work);
        for entry in self.directory.iter() {
            if entry.key().actor_type() == actor_type {
                let actor = entry.value().clone();
                let work = work.clone();
                actor.mailbox().tell(default_deadline(), "for-each-of-type", move || {
                    work(&actor);
                });
            }
        }
    }

    /// Idle scan: evicts role actors idle past [`IDLE_EVICT_THRESHOLD`].
    /// A missing `lastActiveAt` entry is treated as "just touched" rather
    /// than as indefinitely idle, since `getOrCreate` may have raced with
    /// a prior scan before seeding it.
    pub async fn idle_scan(self: &Arc<Self>) {
        let now = Instant::now();
        let candidates: Vec<ActorId> = self
            .directory
            .iter()
            .filter(|e| self.kinds.is_role(e.key().actor_type()))
            .filter(|e| {
                let idle = self
                    .last_active
                    .get(e.key())
                    .map(|t| now.duration_since(*t))
                    .unwrap_or(Duration::ZERO);
                idle > IDLE_EVICT_THRESHOLD
            })
            .map(|e| *e.key())
            .collect();

        for id in candidates {
            let this = self.clone();
            self.partition_for(id)
                .ask_async(LIFECYCLE_DEADLINE, "idle-evict", async move {
                    this.evict_if_still_idle(id).await;
                })
                .await;
        }
    }

    /// The double-checked eviction: activity may have arrived between the
    /// scan's decision and this partitioned re-check.
    async fn evict_if_still_idle(self: &Arc<Self>, id: ActorId) {
        let still_idle = self
            .last_active
            .get(&id)
            .map(|t| t.elapsed() > IDLE_EVICT_THRESHOLD)
            .unwrap_or(true);
        if !still_idle {
            return;
        }
        let Some(actor) = self.directory.get(&id).map(|a| a.clone()) else {
            return;
        };
        if !actor.ready_to_deactivate() {
            self.last_active.insert(id, Instant::now());
            return;
        }
        actor.deactivate().await;
        self.directory.remove(&id);
        self.last_active.remove(&id);
    }

    /// Saves every actor, awaiting all in parallel. Used at shutdown.
    pub async fn save_all_now(&self) {
        let mut set = tokio::task::JoinSet::new();
        for entry in self.directory.iter() {
            let actor = entry.value().clone();
            set.spawn(async move { actor.save_all().await });
        }
        while set.join_next().await.is_some() {}
    }

    /// Steady-state batched save, smoothing persistence I/O. Aborts as
    /// soon as the shutdown flag is observed; `save_all_now` covers the
    /// shutdown path instead.
    pub async fn timer_save(&self) {
        let ids: Vec<ActorId> = self.directory.iter().map(|e| *e.key()).collect();
        for batch in ids.chunks(ONCE_SAVE_COUNT) {
            if self.shutdown.load(Ordering::Acquire) {
                return;
            }
            let mut set = tokio::task::JoinSet::new();
            for &id in batch {
                if let Some(actor) = self.directory.get(&id).map(|a| a.clone()) {
                    set.spawn(async move { actor.save_all().await });
                }
            }
            while set.join_next().await.is_some() {}
            tokio::time::sleep(TIMER_SAVE_SLEEP).await;
        }
    }

    /// Phased cross-day: driver first (synchronously), then all other
    /// globals in parallel bounded by [`CROSS_DAY_GLOBAL_WAIT`], then all
    /// non-role non-global actors bounded by [`CROSS_DAY_NON_ROLE_WAIT`].
    /// Role actors cross-day separately via [`Self::for_each_role_cross_day`].
    /// The driver is auto-created if it does not yet exist in the
    /// directory, rather than treated as a configuration error.
    pub async fn cross_day(self: &Arc<Self>, open_server_day: u32, driver_id: ActorId) {
        let driver = self.get_or_create(driver_id).await;
        driver.cross_day(open_server_day).await;

        let globals: Vec<Arc<Actor>> = self
            .directory
            .iter()
            .filter(|e| *e.key() != driver_id && self.kinds.is_global(e.key().actor_type()))
            .map(|e| e.value().clone())
            .collect();
        self.cross_day_wait(globals, open_server_day, CROSS_DAY_GLOBAL_WAIT, "global")
            .await;

        let others: Vec<Arc<Actor>> = self
            .directory
            .iter()
            .filter(|e| {
                let t = e.key().actor_type();
                *e.key() != driver_id && !self.kinds.is_role(t) && !self.kinds.is_global(t)
            })
            .map(|e| e.value().clone())
            .collect();
        self.cross_day_wait(others, open_server_day, CROSS_DAY_NON_ROLE_WAIT, "non-role")
            .await;

        self.for_each_role_cross_day(open_server_day);
    }

    async fn cross_day_wait(&self, actors: Vec<Arc<Actor>>, open_server_day: u32, budget: Duration, phase: &'static str) {
        let mut set = tokio::task::JoinSet::new();
        for actor in actors {
            set.spawn(async move { actor.cross_day(open_server_day).await });
        }
        if tokio::time::timeout(budget, async { while set.join_next().await.is_some() {} })
            .await
            .is_err()
        {
            warn!(self.log, "cross-day phase exceeded wait budget"; "phase" => phase, "budget_secs" => budget.as_secs());
        }
    }

    /// Fire-and-forget cross-day for role actors: never gates the other
    /// phases on a potentially huge per-player population.
    fn for_each_role_cross_day(&self, open_server_day: u32) {
        for entry in self.directory.iter() {
            if self.kinds.is_role(entry.key().actor_type()) {
                let actor = entry.value().clone();
                tokio::spawn(async move { actor.cross_day(open_server_day).await });
            }
        }
    }

    /// Deactivates every actor, awaits all, clears the directory.
    pub async fn remove_all(&self) {
        let mut set = tokio::task::JoinSet::new();
        for entry in self.directory.iter() {
            let actor = entry.value().clone();
            set.spawn(async move { actor.deactivate().await });
        }
        while set.join_next().await.is_some() {}
        self.directory.clear();
        self.last_active.clear();
    }
}
