//! The interfaces the core consumes but does not implement: a
//! deterministic streaming serializer (required for `ChangeDetector`) and
//! an object-addressed upsert/load persistence store. Both are specified
//! only by shape; the MessagePack/BSON codec and the actual store are
//! external collaborators, out of scope per the spec.

use crate::change_detector::DigestWriter;
use async_trait::async_trait;

/// `serialize(writerStream, state)`: deterministic, streaming, writes raw
/// bytes into a [`DigestWriter`], which folds them into a change-detection
/// digest while retaining them for `PersistenceStore::upsert`. The
/// concrete codec (MessagePack, BSON, ...) lives outside this crate; this
/// trait is the seam the core depends on.
pub trait Serializer<S>: Send + Sync {
    type Error;

    fn serialize(&self, sink: &mut DigestWriter, state: &S) -> Result<(), Self::Error>;
}

/// `upsert(stateId, serializedBytes)` and `loadById(stateId) -> state?`,
/// both asynchronous and fallible.
#[async_trait]
pub trait PersistenceStore<S>: Send + Sync {
    type Error;

    async fn upsert(&self, state_id: &str, serialized: Vec<u8>) -> Result<(), Self::Error>;
    async fn load_by_id(&self, state_id: &str) -> Result<Option<S>, Self::Error>;
}
