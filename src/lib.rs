//! Per-entity serial execution, reentrant call-chain tracking, lifecycle
//! eviction, and change-detected persistence for a stateful actor runtime.
//!
//! An external caller resolves an agent by type via [`manager::ActorManager`],
//! which resolves-or-creates an [`actor::Actor`] and ensures its
//! [`component::Component`] is active. A call on the agent is dispatched
//! through the actor's [`mailbox::Mailbox`], which applies the reentrancy
//! rule so a call chain can safely re-enter the mailbox it already owns.

pub mod actor;
pub mod agent;
pub mod call_context;
pub mod change_detector;
pub mod component;
pub mod constants;
pub mod error;
pub mod id;
pub mod mailbox;
pub mod manager;
pub mod persistence;
pub mod registry;
pub mod runtime;
pub mod work_item;

pub use actor::Actor;
pub use agent::Agent;
pub use call_context::CallContext;
pub use change_detector::{ChangeDetector, Digest, DigestWriter};
pub use component::{Component, ComponentHandle, SharedState, StateModel};
pub use id::{ActorId, ActorKinds, ActorType};
pub use mailbox::Mailbox;
pub use manager::ActorManager;
pub use persistence::{PersistenceStore, Serializer};
pub use registry::{ComponentRegistry, ComponentRegistryBuilder};
pub use runtime::ActorRuntime;
