//! Identity + typed role + owned component set + mailbox handle. All
//! operations below are routed through the actor's own mailbox except
//! where noted, so that reads/writes of the component map always happen
//! on the mailbox (spec §3 invariant ii).

use crate::component::ComponentHandle;
use crate::constants::LIFECYCLE_DEADLINE;
use crate::error::ActivationError;
use crate::id::{ActorId, ActorType};
use crate::mailbox::Mailbox;
use crate::registry::ComponentRegistry;
use dashmap::DashMap;
use futures_util::future::FutureExt;
use slog::{crit, warn, Logger};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// The identifiers an actor is allowed to cancel its own timers by; the
/// hotfix/timer collaborators own the actual scheduling, the actor only
/// tracks which ids belong to it so it can cancel them on deactivation.
pub type TimerId = u64;

/// Called once per outstanding timer id when an actor deactivates, so the
/// external scheduler that actually owns the timer wheel can drop it. The
/// default (no canceller supplied) is a no-op, matching an actor that
/// never registered any timers.
pub type TimerCanceller = Arc<dyn Fn(TimerId) + Send + Sync>;

pub struct Actor {
    id: ActorId,
    actor_type: ActorType,
    mailbox: Mailbox,
    components: DashMap<&'static str, Arc<dyn ComponentHandle>>,
    registry: Arc<ComponentRegistry>,
    auto_recycle: AtomicBool,
    timers: std::sync::Mutex<std::collections::HashSet<TimerId>>,
    timer_canceller: TimerCanceller,
    log: Logger,
}

impl Actor {
    pub fn new(
        id: ActorId,
        actor_type: ActorType,
        auto_recycle: bool,
        registry: Arc<ComponentRegistry>,
        log: Logger,
    ) -> Arc<Self> {
        Self::with_timer_canceller(id, actor_type, auto_recycle, registry, Arc::new(|_| {}), log)
    }

    pub fn with_timer_canceller(
        id: ActorId,
        actor_type: ActorType,
        auto_recycle: bool,
        registry: Arc<ComponentRegistry>,
        timer_canceller: TimerCanceller,
        log: Logger,
    ) -> Arc<Self> {
        Arc::new(Actor {
            id,
            actor_type,
            mailbox: Mailbox::new(id, log.clone()),
            components: DashMap::new(),
            registry,
            auto_recycle: AtomicBool::new(auto_recycle),
            timers: std::sync::Mutex::new(std::collections::HashSet::new()),
            timer_canceller,
            log,
        })
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn actor_type(&self) -> ActorType {
        self.actor_type
    }

    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn auto_recycle(&self) -> bool {
        self.auto_recycle.load(Ordering::Acquire)
    }

    /// Posts onto the mailbox to avoid races with in-flight work.
    pub fn set_auto_recycle(self: &Arc<Self>, value: bool) {
        let this = self.clone();
        self.mailbox.tell(LIFECYCLE_DEADLINE, "set-auto-recycle", move || {
            this.auto_recycle.store(value, Ordering::Release);
        });
    }

    pub fn add_timer(&self, id: TimerId) {
        self.timers.lock().unwrap().insert(id);
    }

    pub fn take_timers(&self) -> Vec<TimerId> {
        self.timers.lock().unwrap().drain().collect()
    }

    /// `getAgent(agentType)`: resolves (creating via `make` if absent) the
    /// component backing this agent type, ensures it is active, and
    /// returns its cached agent. Activation runs via the
    /// ask-without-reentry-check variant since `getAgent` itself may
    /// already be executing on this mailbox.
    pub async fn get_agent<F>(
        self: &Arc<Self>,
        component_type: &'static str,
        make: F,
    ) -> Result<Arc<dyn crate::agent::Agent>, ActivationError>
    where
        F: FnOnce() -> Arc<dyn ComponentHandle> + Send + 'static,
    {
        self.registry
            .assert_registered(self.actor_type, component_type)
            .map_err(|_| ActivationError::UnregisteredComponent {
                actor_id: self.id,
                component_type,
            })?;

        let component = self
            .components
            .entry(component_type)
            .or_insert_with(make)
            .clone();

        if !component.is_active() {
            let comp = component.clone();
            let error_slot: Arc<std::sync::Mutex<Option<ActivationError>>> =
                Arc::new(std::sync::Mutex::new(None));
            let slot = error_slot.clone();
            self.mailbox
                .ask_async_enqueued::<(), _>(LIFECYCLE_DEADLINE, "activate-component", async move {
                    if let Err(e) = comp.activate().await {
                        *slot.lock().unwrap() = Some(e);
                    }
                })
                .await;
            if let Some(e) = error_slot.lock().unwrap().take() {
                return Err(e);
            }
        }

        Ok(component.agent())
    }

    /// Idempotent: cancels every outstanding timer this actor owns, then
    /// deactivates every component (order not preserved across runs).
    pub async fn deactivate(self: &Arc<Self>) {
        let this = self.clone();
        self.mailbox
            .ask_async_enqueued::<(), _>(LIFECYCLE_DEADLINE, "deactivate-actor", async move {
                for id in this.take_timers() {
                    (this.timer_canceller)(id);
                }
                for entry in this.components.iter() {
                    entry.value().deactivate().await;
                }
            })
            .await;
    }

    /// Saves every component; each consults its own `ChangeDetector`.
    pub async fn save_all(self: &Arc<Self>) {
        let this = self.clone();
        self.mailbox
            .ask_async_enqueued::<(), _>(LIFECYCLE_DEADLINE, "save-all", async move {
                for entry in this.components.iter() {
                    if let Err(e) = entry.value().save().await {
                        warn!(this.log, "component save failed"; "actor" => %this.id, "component" => *entry.key(), "err" => %e);
                    }
                }
            })
            .await;
    }

    /// For each component whose agent opts into the cross-day capability,
    /// invokes its cross-day hook. Each call is individually caught, so a
    /// panic inside one component's hook is logged and does not prevent
    /// the others from running.
    pub async fn cross_day(self: &Arc<Self>, open_server_day: u32) {
        let this = self.clone();
        self.mailbox
            .ask_async_enqueued::<(), _>(LIFECYCLE_DEADLINE, "cross-day", async move {
                for entry in this.components.iter() {
                    let component_type = *entry.key();
                    let result = AssertUnwindSafe(entry.value().cross_day(open_server_day))
                        .catch_unwind()
                        .await;
                    if let Err(e) = result {
                        crit!(this.log, "component cross-day hook panicked"; "actor" => %this.id, "component" => component_type, "panic" => %panic_message(&e));
                    }
                }
            })
            .await;
    }

    /// Drops each component's cached agent, forcing the next access to
    /// re-resolve. Fire-and-forget: posted as a work item so no in-flight
    /// item observes a torn agent.
    pub fn clear_agent_cache(self: &Arc<Self>) {
        let this = self.clone();
        self.mailbox.tell(LIFECYCLE_DEADLINE, "clear-agent-cache", move || {
            for entry in this.components.iter() {
                entry.value().clear_agent_cache();
            }
        });
    }

    pub fn ready_to_deactivate(&self) -> bool {
        self.components.iter().all(|e| e.value().ready_to_deactivate())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
