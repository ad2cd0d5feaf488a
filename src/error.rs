//! Error taxonomy (spec §7). Each failure domain gets its own enum rather
//! than one crate-wide error type, since the handling differs per site:
//! activation errors propagate to the caller, save/registration errors
//! are logged, and a work item's own thunk error never reaches here at
//! all (it is swallowed inside the mailbox, see `mailbox.rs`).

use crate::id::ActorId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActivationError {
    #[error("actor {actor_id}: component {component_type} has no registered factory")]
    UnregisteredComponent {
        actor_id: ActorId,
        component_type: &'static str,
    },

    #[error("actor {actor_id}: load for component {component_type} failed: {source}")]
    LoadFailed {
        actor_id: ActorId,
        component_type: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("actor {actor_id}: activation hook for component {component_type} failed: {source}")]
    HookFailed {
        actor_id: ActorId,
        component_type: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("actor {actor_id}: save for component {component_type} failed: {source}")]
    UpsertFailed {
        actor_id: ActorId,
        component_type: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("actor {actor_id}: serialization for component {component_type} failed")]
    SerializationFailed {
        actor_id: ActorId,
        component_type: &'static str,
    },
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("component {component_type} has no actorType binding")]
    UnboundComponent { component_type: &'static str },

    #[error("component {component_type} has no agent implementation")]
    MissingAgent { component_type: &'static str },

    #[error("component {component_type} is not registered to actor type {actor_type}")]
    NotRegisteredToType {
        component_type: &'static str,
        actor_type: u16,
    },
}

/// Raised internally when a cross-day wait budget elapses. It is logged
/// at warning and cross-day proceeds to the next phase; it is never
/// returned to an external caller.
#[derive(Debug, Error)]
#[error("cross-day wait of {0:?} exceeded")]
pub struct CrossDayWaitExceeded(pub std::time::Duration);
