//! End-to-end scenarios from spec.md §8, exercised through the public API:
//! a component backed by an in-memory store, wired into actors created
//! through an `ActorManager`.

use actor_runtime_core::change_detector::DigestWriter;
use actor_runtime_core::manager::ActorFactory;
use actor_runtime_core::{
    Actor, ActorId, ActorKinds, ActorManager, Agent, Component, ComponentHandle, ComponentRegistry,
    ComponentRegistryBuilder, PersistenceStore, Serializer, SharedState, StateModel,
};
use async_trait::async_trait;
use dashmap::DashMap;
use slog::Logger;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const GLOBAL_TYPE: u16 = 1;
const ROLE_TYPE: u16 = 2;

fn test_log() -> Logger {
    Logger::root(slog::Discard, slog::o!())
}

/// `counter` backs role actors, `counter-global` backs the global/driver
/// actor; a component type binds to exactly one actor type, so the two
/// need distinct names even though they share an implementation.
fn test_registry() -> Arc<ComponentRegistry> {
    let mut b = ComponentRegistryBuilder::new();
    b.register(ROLE_TYPE, "counter", None);
    b.register(GLOBAL_TYPE, "counter-global", None);
    b.bind_agent("counter");
    b.bind_agent("counter-global");
    Arc::new(b.build().unwrap())
}

#[derive(Clone)]
struct Counter {
    id: String,
    value: u32,
}

impl StateModel for Counter {
    fn state_id(&self) -> String {
        self.id.clone()
    }
}

struct CounterSerializer;

impl Serializer<Counter> for CounterSerializer {
    type Error = std::convert::Infallible;

    fn serialize(&self, sink: &mut DigestWriter, state: &Counter) -> Result<(), Self::Error> {
        sink.write(state.id.as_bytes());
        sink.write(&state.value.to_le_bytes());
        Ok(())
    }
}

#[derive(Default)]
struct MemoryStore {
    rows: DashMap<String, Vec<u8>>,
}

#[async_trait]
impl PersistenceStore<Counter> for MemoryStore {
    type Error = std::convert::Infallible;

    async fn upsert(&self, state_id: &str, serialized: Vec<u8>) -> Result<(), Self::Error> {
        self.rows.insert(state_id.to_string(), serialized);
        Ok(())
    }

    async fn load_by_id(&self, _state_id: &str) -> Result<Option<Counter>, Self::Error> {
        Ok(None)
    }
}

struct CounterAgent {
    state: SharedState<Counter>,
    cross_day_hits: Arc<AtomicU32>,
}

impl CounterAgent {
    async fn increment(&self) -> u32 {
        let mut s = self.state.lock().await;
        s.value += 1;
        s.value
    }
}

#[async_trait]
impl Agent for CounterAgent {
    fn supports_cross_day(&self) -> bool {
        true
    }

    async fn on_cross_day(&self, _open_server_day: u32) {
        self.cross_day_hits.fetch_add(1, Ordering::Relaxed);
    }
}

/// Builds a component factory bound to `component_type`, stashing the
/// concrete agent into `captured` as it's built so the test retains a
/// typed handle alongside the actor's type-erased `Arc<dyn ComponentHandle>`.
fn make_counter_component(
    actor_id: ActorId,
    component_type: &'static str,
    cross_day_hits: Arc<AtomicU32>,
    captured: Arc<Mutex<Option<Arc<CounterAgent>>>>,
) -> Arc<dyn ComponentHandle> {
    let store = Arc::new(MemoryStore::default());
    let serializer = Arc::new(CounterSerializer);
    let initial = Counter {
        id: actor_id.to_string(),
        value: 0,
    };
    Arc::new(Component::new(
        actor_id,
        component_type,
        initial,
        serializer,
        store,
        Arc::new(move |state| {
            let agent = Arc::new(CounterAgent {
                state,
                cross_day_hits: cross_day_hits.clone(),
            });
            *captured.lock().unwrap() = Some(agent.clone());
            agent
        }),
        test_log(),
    ))
}

fn make_actor(id: ActorId) -> Arc<Actor> {
    Actor::new(
        id,
        id.actor_type(),
        id.actor_type() == ROLE_TYPE,
        test_registry(),
        test_log(),
    )
}

#[tokio::test]
async fn ping_pong_preserves_chain_across_actors() {
    let r1 = make_actor(ActorId::new(ROLE_TYPE, 1));
    let r2 = make_actor(ActorId::new(ROLE_TYPE, 2));
    let r2c = r2.clone();

    let result = r1
        .mailbox()
        .ask_async(
            actor_runtime_core::constants::default_deadline(),
            "ping",
            async move {
                r2c.mailbox()
                    .ask(
                        actor_runtime_core::constants::default_deadline(),
                        "pong",
                        || 42u32,
                    )
                    .await
                    .unwrap()
            },
        )
        .await;
    assert_eq!(result, Some(42));
}

#[tokio::test]
async fn self_reentrant_get_agent_does_not_deadlock() {
    let actor = make_actor(ActorId::new(ROLE_TYPE, 3));
    let hits = Arc::new(AtomicU32::new(0));
    let captured = Arc::new(Mutex::new(None));
    let captured_for_factory = captured.clone();
    let actor_id = actor.id();
    let _handle = actor
        .get_agent("counter", move || {
            make_counter_component(actor_id, "counter", hits, captured_for_factory)
        })
        .await
        .unwrap();

    let counter = captured.lock().unwrap().clone().unwrap();
    let first = counter.increment().await;
    let second = counter.increment().await;
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

#[tokio::test]
async fn deadline_exceeded_does_not_lose_subsequent_items() {
    let actor = make_actor(ActorId::new(ROLE_TYPE, 4));
    let slow = actor
        .mailbox()
        .ask_async(Some(Duration::from_millis(50)), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            1u32
        })
        .await;
    assert_eq!(slow, None);

    let fast = actor
        .mailbox()
        .ask(actor_runtime_core::constants::default_deadline(), "fast", || 7u32)
        .await;
    assert_eq!(fast, Some(7));
}

#[tokio::test]
async fn idle_scan_spares_a_freshly_touched_role_actor() {
    let kinds = ActorKinds::new(10, ROLE_TYPE);
    let registry = test_registry();
    let factory: ActorFactory = Arc::new(move |id| {
        Actor::new(id, id.actor_type(), kinds.is_role(id.actor_type()), registry.clone(), test_log())
    });
    let manager = ActorManager::new(kinds, factory, test_registry(), test_log());
    let id = ActorId::new(ROLE_TYPE, 42);
    let actor = manager.get_or_create(id).await;

    let hits = Arc::new(AtomicU32::new(0));
    let captured = Arc::new(Mutex::new(None));
    let captured_for_factory = captured.clone();
    let actor_id = actor.id();
    actor
        .get_agent("counter", move || {
            make_counter_component(actor_id, "counter", hits, captured_for_factory)
        })
        .await
        .unwrap();
    let counter = captured.lock().unwrap().clone().unwrap();
    counter.increment().await;

    manager.idle_scan().await;
    // no time has passed, so the actor is still hot and must be the same
    // instance, not a freshly recreated one.
    let still_there = manager.get_or_create(id).await;
    assert!(Arc::ptr_eq(&actor, &still_there));
}

#[tokio::test]
async fn cross_day_invokes_opted_in_agents() {
    let kinds = ActorKinds::new(10, ROLE_TYPE);
    let registry = test_registry();
    let factory: ActorFactory =
        Arc::new(move |id| Actor::new(id, id.actor_type(), false, registry.clone(), test_log()));
    let manager = ActorManager::new(kinds, factory, test_registry(), test_log());
    let driver_id = ActorId::singleton(GLOBAL_TYPE);
    let driver = manager.get_or_create(driver_id).await;

    let hits = Arc::new(AtomicU32::new(0));
    let captured = Arc::new(Mutex::new(None));
    let hits_for_factory = hits.clone();
    let actor_id = driver.id();
    driver
        .get_agent("counter-global", move || {
            make_counter_component(actor_id, "counter-global", hits_for_factory, captured)
        })
        .await
        .unwrap();

    manager.cross_day(7, driver_id).await;
    assert_eq!(hits.load(Ordering::Relaxed), 1);
}

/// An agent that opts into cross-day and appends a label to a shared
/// order log instead of just counting hits, so a test can assert ordering
/// across actors rather than only per-actor hit counts.
struct OrderAgent {
    label: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Agent for OrderAgent {
    fn supports_cross_day(&self) -> bool {
        true
    }

    async fn on_cross_day(&self, _open_server_day: u32) {
        self.order.lock().unwrap().push(self.label);
    }
}

fn make_order_component(
    actor_id: ActorId,
    component_type: &'static str,
    label: &'static str,
    order: Arc<Mutex<Vec<&'static str>>>,
) -> Arc<dyn ComponentHandle> {
    let store = Arc::new(MemoryStore::default());
    let serializer = Arc::new(CounterSerializer);
    let initial = Counter {
        id: actor_id.to_string(),
        value: 0,
    };
    Arc::new(Component::new(
        actor_id,
        component_type,
        initial,
        serializer,
        store,
        Arc::new(move |_state| Arc::new(OrderAgent { label, order: order.clone() })),
        test_log(),
    ))
}

/// spec.md §8 scenario 5: the driver completes before any other global
/// starts, and all globals complete before any non-role actor starts.
#[tokio::test]
async fn cross_day_phases_run_in_order() {
    const OTHER_GLOBAL_TYPE: u16 = 11;
    const OTHER_ENTITY_TYPE: u16 = 5;

    let kinds = ActorKinds::new(10, ROLE_TYPE);
    let mut b = ComponentRegistryBuilder::new();
    b.register(GLOBAL_TYPE, "driver", None);
    b.register(OTHER_GLOBAL_TYPE, "global", None);
    b.register(OTHER_ENTITY_TYPE, "entity", None);
    b.bind_agent("driver");
    b.bind_agent("global");
    b.bind_agent("entity");
    let registry = Arc::new(b.build().unwrap());
    let registry_for_factory = registry.clone();
    let factory: ActorFactory =
        Arc::new(move |id| Actor::new(id, id.actor_type(), false, registry_for_factory.clone(), test_log()));
    let manager = ActorManager::new(kinds, factory, registry, test_log());

    let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

    let driver_id = ActorId::singleton(GLOBAL_TYPE);
    let driver = manager.get_or_create(driver_id).await;
    let driver_order = order.clone();
    let actor_id = driver.id();
    driver
        .get_agent("driver", move || {
            make_order_component(actor_id, "driver", "driver", driver_order)
        })
        .await
        .unwrap();

    let global_id = ActorId::new(OTHER_GLOBAL_TYPE, 1);
    let global = manager.get_or_create(global_id).await;
    let global_order = order.clone();
    let actor_id = global.id();
    global
        .get_agent("global", move || {
            make_order_component(actor_id, "global", "global", global_order)
        })
        .await
        .unwrap();

    let entity_id = ActorId::new(OTHER_ENTITY_TYPE, 1);
    let entity = manager.get_or_create(entity_id).await;
    let entity_order = order.clone();
    let actor_id = entity.id();
    entity
        .get_agent("entity", move || {
            make_order_component(actor_id, "entity", "entity", entity_order)
        })
        .await
        .unwrap();

    manager.cross_day(7, driver_id).await;

    let recorded = order.lock().unwrap();
    let driver_pos = recorded.iter().position(|&l| l == "driver").unwrap();
    let global_pos = recorded.iter().position(|&l| l == "global").unwrap();
    let entity_pos = recorded.iter().position(|&l| l == "entity").unwrap();
    assert!(driver_pos < global_pos, "driver must complete before globals start");
    assert!(global_pos < entity_pos, "globals must complete before non-role actors start");
}

/// spec.md §8 scenario 6: a hotfix clears the cached agent, so the next
/// `get_agent` rebuilds a fresh instance via the same factory.
#[tokio::test]
async fn clear_agent_cache_rebuilds_a_fresh_agent() {
    let actor = make_actor(ActorId::new(ROLE_TYPE, 7));
    let hits = Arc::new(AtomicU32::new(0));
    let captured = Arc::new(Mutex::new(None));
    let captured_for_factory = captured.clone();
    let build_count = Arc::new(AtomicU32::new(0));
    let build_count_for_factory = build_count.clone();
    let actor_id = actor.id();

    let first = actor
        .get_agent("counter", move || {
            build_count_for_factory.fetch_add(1, Ordering::Relaxed);
            make_counter_component(actor_id, "counter", hits, captured_for_factory)
        })
        .await
        .unwrap();

    actor.clear_agent_cache();
    // `clear_agent_cache` is fire-and-forget (posted onto the mailbox), so
    // wait for it to actually run before re-resolving the agent.
    actor
        .mailbox()
        .ask(actor_runtime_core::constants::default_deadline(), "sync", || ())
        .await
        .unwrap();

    let second = actor
        .get_agent("counter", || unreachable!("component already exists, make is not called again"))
        .await
        .unwrap();

    assert_eq!(build_count.load(Ordering::Relaxed), 1);
    assert!(!Arc::ptr_eq(&first, &second), "clearing the cache must rebuild the agent facade");
}
