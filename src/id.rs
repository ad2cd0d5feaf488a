//! Actor identity. An `ActorId` packs an `ActorType` discriminant into its
//! high bits and a per-instance discriminator into the low bits, the way
//! the spec's composite id is described: global singletons carry a fixed
//! id derived from their type alone, role actors carry a per-player id.

use std::fmt;

/// The numeric `ActorType` discriminant. Concrete actor types are defined
/// by the application; the core only needs their raw numeric ordering to
/// classify global vs. role vs. other-entity actors against a `Separator`.
pub type ActorType = u16;

const TYPE_SHIFT: u32 = 48;
const DISCRIMINATOR_MASK: u64 = (1u64 << TYPE_SHIFT) - 1;

/// Composite 64-bit actor id: `[ actor_type : 16 ][ discriminator : 48 ]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    pub fn new(actor_type: ActorType, discriminator: u64) -> Self {
        assert!(
            discriminator <= DISCRIMINATOR_MASK,
            "actor discriminator overflows the 48-bit field"
        );
        ActorId(((actor_type as u64) << TYPE_SHIFT) | (discriminator & DISCRIMINATOR_MASK))
    }

    /// A global singleton's id: derived from its type alone.
    pub fn singleton(actor_type: ActorType) -> Self {
        Self::new(actor_type, 0)
    }

    pub fn actor_type(&self) -> ActorType {
        (self.0 >> TYPE_SHIFT) as ActorType
    }

    pub fn discriminator(&self) -> u64 {
        self.0 & DISCRIMINATOR_MASK
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl std::convert::TryFrom<u64> for ActorId {
    type Error = std::convert::Infallible;

    /// Every `u64` is a valid packed id (there is no reserved bit pattern
    /// in `[actor_type:16][discriminator:48]`), so this never fails; it is
    /// `TryFrom` rather than `From` so logs and tests can round-trip a raw
    /// id through the same conversion family `u64::try_from(id)` reads go
    /// through, without a separate infallible special case.
    fn try_from(raw: u64) -> Result<Self, Self::Error> {
        Ok(ActorId(raw))
    }
}

impl From<ActorId> for u64 {
    fn from(id: ActorId) -> Self {
        id.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.actor_type(), self.discriminator())
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorId({}:{})", self.actor_type(), self.discriminator())
    }
}

/// The `Separator`/`Role` classification table. `Separator` is the
/// `ActorType` enumerant whose numeric value separates globals (strictly
/// greater) from per-entity actors; `Role` is the specific sub-`Separator`
/// value that denotes a per-player actor. The application supplies both
/// at startup, since the core has no concrete `ActorType` enum of its own.
#[derive(Clone, Copy, Debug)]
pub struct ActorKinds {
    pub separator: ActorType,
    pub role: ActorType,
}

impl ActorKinds {
    pub fn new(separator: ActorType, role: ActorType) -> Self {
        assert!(role <= separator, "Role must be a sub-Separator ActorType");
        ActorKinds { separator, role }
    }

    /// `type > Separator`: exactly one instance per process.
    pub fn is_global(&self, t: ActorType) -> bool {
        t > self.separator
    }

    /// `type == Role`: per-player, auto-recycled when idle.
    pub fn is_role(&self, t: ActorType) -> bool {
        t == self.role
    }

    /// `type <= Separator && type != Role`: other per-entity globals.
    pub fn is_other_entity(&self, t: ActorType) -> bool {
        t <= self.separator && t != self.role
    }
}
