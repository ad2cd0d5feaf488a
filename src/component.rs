//! State container + lifecycle. A component is created by the registry on
//! first lookup, activated (loads state, runs the activation hook),
//! mutated via agent calls on the owning actor's mailbox, saved (possibly
//! many times, skipping unchanged state via `ChangeDetector`), and finally
//! deactivated (final save + release). A component is only ever touched
//! while its owning actor's mailbox is executing the current item, so
//! interior mutability here does not need to defend against concurrent
//! writers, only against holding a lock across the occasional await.

use crate::agent::Agent;
use crate::change_detector::{ChangeDetector, DigestWriter};
use crate::error::{ActivationError, SaveError};
use crate::id::ActorId;
use crate::persistence::{PersistenceStore, Serializer};
use async_trait::async_trait;
use slog::{warn, Logger};
use std::error::Error as StdError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Any object with a durable id and a deterministic serialization.
pub trait StateModel: Send + Sync + 'static {
    fn state_id(&self) -> String;
}

pub type SharedState<S> = Arc<AsyncMutex<S>>;
pub type AgentFactory<S> = Arc<dyn Fn(SharedState<S>) -> Arc<dyn Agent> + Send + Sync>;

/// Type-erased component operations, so an `Actor` can hold a
/// `componentType -> Component` map of heterogeneous component types.
#[async_trait]
pub trait ComponentHandle: Send + Sync {
    fn component_type(&self) -> &'static str;
    fn is_active(&self) -> bool;
    fn ready_to_deactivate(&self) -> bool;
    async fn activate(&self) -> Result<(), ActivationError>;
    async fn save(&self) -> Result<(), SaveError>;
    async fn deactivate(&self);
    fn supports_cross_day(&self) -> bool;
    async fn cross_day(&self, open_server_day: u32);
    fn clear_agent_cache(&self);
    fn agent(&self) -> Arc<dyn Agent>;
}

/// The concrete (state, agent) pair owned by an actor for one feature.
pub struct Component<S, Ser, Store>
where
    S: StateModel,
    Ser: Serializer<S>,
    Ser::Error: StdError + Send + Sync + 'static,
    Store: PersistenceStore<S>,
    Store::Error: StdError + Send + Sync + 'static,
{
    actor_id: ActorId,
    component_type: &'static str,
    state: SharedState<S>,
    serializer: Arc<Ser>,
    store: Arc<Store>,
    agent_factory: AgentFactory<S>,
    agent_cache: std::sync::Mutex<Option<Arc<dyn Agent>>>,
    detector: AsyncMutex<ChangeDetector>,
    active: AtomicBool,
    /// Mirrors spec §4.2's settable `readyToDeactivate` flag: cleared
    /// whenever a save fails, so idle eviction doesn't drop state that
    /// never made it to the store, and set again once a save succeeds.
    ready_to_deactivate: AtomicBool,
    log: Logger,
}

impl<S, Ser, Store> Component<S, Ser, Store>
where
    S: StateModel,
    Ser: Serializer<S>,
    Ser::Error: StdError + Send + Sync + 'static,
    Store: PersistenceStore<S>,
    Store::Error: StdError + Send + Sync + 'static,
{
    pub fn new(
        actor_id: ActorId,
        component_type: &'static str,
        initial_state: S,
        serializer: Arc<Ser>,
        store: Arc<Store>,
        agent_factory: AgentFactory<S>,
        log: Logger,
    ) -> Self {
        Component {
            actor_id,
            component_type,
            state: Arc::new(AsyncMutex::new(initial_state)),
            serializer,
            store,
            agent_factory,
            agent_cache: std::sync::Mutex::new(None),
            detector: AsyncMutex::new(ChangeDetector::new()),
            active: AtomicBool::new(false),
            ready_to_deactivate: AtomicBool::new(true),
            log,
        }
    }

    /// Returns the cached agent façade, rebuilding it if it was dropped by
    /// `clearAgentCache()`.
    pub fn agent(&self) -> Arc<dyn Agent> {
        let mut cache = self.agent_cache.lock().unwrap();
        if let Some(agent) = cache.as_ref() {
            return agent.clone();
        }
        let agent = (self.agent_factory)(self.state.clone());
        *cache = Some(agent.clone());
        agent
    }
}

#[async_trait]
impl<S, Ser, Store> ComponentHandle for Component<S, Ser, Store>
where
    S: StateModel,
    Ser: Serializer<S>,
    Ser::Error: StdError + Send + Sync + 'static,
    Store: PersistenceStore<S>,
    Store::Error: StdError + Send + Sync + 'static,
{
    fn component_type(&self) -> &'static str {
        self.component_type
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn ready_to_deactivate(&self) -> bool {
        self.ready_to_deactivate.load(Ordering::Acquire)
    }

    async fn activate(&self) -> Result<(), ActivationError> {
        if self.is_active() {
            return Ok(());
        }
        let state_id = { self.state.lock().await.state_id() };
        let loaded = self
            .store
            .load_by_id(&state_id)
            .await
            .map_err(|e| ActivationError::LoadFailed {
                actor_id: self.actor_id,
                component_type: self.component_type,
                source: Box::new(e),
            })?;

        {
            let mut state = self.state.lock().await;
            if let Some(s) = loaded {
                *state = s;
            }
            let mut w = DigestWriter::new();
            self.serializer
                .serialize(&mut w, &state)
                .map_err(|e| ActivationError::LoadFailed {
                    actor_id: self.actor_id,
                    component_type: self.component_type,
                    source: Box::new(e),
                })?;
            let (digest, _bytes) = w.finish();
            self.detector.lock().await.observe_loaded(digest);
        }

        self.agent()
            .on_activate()
            .await
            .map_err(|e| ActivationError::HookFailed {
                actor_id: self.actor_id,
                component_type: self.component_type,
                source: e,
            })?;

        self.active.store(true, Ordering::Release);
        Ok(())
    }

    async fn save(&self) -> Result<(), SaveError> {
        if !self.is_active() {
            return Ok(());
        }
        let (state_id, digest, bytes) = {
            let state = self.state.lock().await;
            let mut w = DigestWriter::new();
            self.serializer
                .serialize(&mut w, &state)
                .map_err(|_| SaveError::SerializationFailed {
                    actor_id: self.actor_id,
                    component_type: self.component_type,
                })?;
            let (digest, bytes) = w.finish();
            (state.state_id(), digest, bytes)
        };

        let mut detector = self.detector.lock().await;
        if detector.is_changed(digest) {
            if let Err(e) = self.store.upsert(&state_id, bytes).await {
                self.ready_to_deactivate.store(false, Ordering::Release);
                return Err(SaveError::UpsertFailed {
                    actor_id: self.actor_id,
                    component_type: self.component_type,
                    source: Box::new(e),
                });
            }
            // detector only advances on a confirmed successful write, so a
            // save error above leaves `persisted` stale and the next save
            // retries.
            detector.mark_persisted();
        }
        self.ready_to_deactivate.store(true, Ordering::Release);
        Ok(())
    }

    async fn deactivate(&self) {
        if let Err(e) = self.save().await {
            warn!(self.log, "component save failed during deactivate"; "actor" => %self.actor_id, "component" => self.component_type, "err" => %e);
        }
        self.agent().on_deactivate().await;
        self.active.store(false, Ordering::Release);
    }

    fn supports_cross_day(&self) -> bool {
        self.agent().supports_cross_day()
    }

    async fn cross_day(&self, open_server_day: u32) {
        if self.supports_cross_day() {
            self.agent().on_cross_day(open_server_day).await;
        }
    }

    fn clear_agent_cache(&self) {
        *self.agent_cache.lock().unwrap() = None;
    }

    fn agent(&self) -> Arc<dyn Agent> {
        Component::agent(self)
    }
}
