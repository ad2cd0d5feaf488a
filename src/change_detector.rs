//! Computes a stable digest of a state object's serialized form and
//! reports whether it differs from the last persisted digest, without
//! requiring user code to maintain an explicit dirty flag.
//!
//! The digest is a rolling mix over the serialized byte stream:
//! `h = (h + byte) * K` from a fixed odd seed, `K` a large odd 64-bit
//! constant. The final digest is the 128-bit pair `(h, totalBytes)`. The
//! constants are fixed in this module (not configurable) so the round
//! trip is portable across processes, per spec.

/// Seed and mixing constant are arbitrary large odd 64-bit values; their
/// only requirement is process-stability, not cryptographic strength.
const SEED: u64 = 0xcbf29ce484222325;
const K: u64 = 0x100000001b3;

/// A 128-bit `(hash, length)` pair over a state object's canonical
/// serialization.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Digest {
    pub hash: u64,
    pub len: u64,
}

impl Digest {
    pub const ZERO: Digest = Digest { hash: 0, len: 0 };

    pub fn is_zero(&self) -> bool {
        self.hash == 0 && self.len == 0
    }
}

struct Mixer {
    h: u64,
    len: u64,
}

impl Mixer {
    fn new() -> Self {
        Mixer { h: SEED, len: 0 }
    }

    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.h = (self.h.wrapping_add(b as u64)).wrapping_mul(K);
        }
        self.len = self.len.wrapping_add(bytes.len() as u64);
    }

    fn digest(self) -> Digest {
        Digest {
            hash: self.h,
            len: self.len,
        }
    }
}

/// A sink a `Serializer` writes raw bytes through: it folds every slice
/// into the rolling digest mixer *and* retains the bytes themselves, so a
/// single serialization pass yields both the digest and the payload ready
/// for `PersistenceStore::upsert`.
#[derive(Default)]
pub struct DigestWriter {
    mixer: Mixer,
    bytes: Vec<u8>,
}

impl Default for Mixer {
    fn default() -> Self {
        Mixer::new()
    }
}

impl DigestWriter {
    pub fn new() -> Self {
        DigestWriter {
            mixer: Mixer::new(),
            bytes: Vec::new(),
        }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.mixer.write(bytes);
        self.bytes.extend_from_slice(bytes);
    }

    pub fn finish(self) -> (Digest, Vec<u8>) {
        (self.mixer.digest(), self.bytes)
    }
}

/// Lazily attached to each state object; tracks the digest as of the last
/// successful persist.
#[derive(Clone, Copy, Debug, Default)]
pub struct ChangeDetector {
    current: Digest,
    persisted: Digest,
    initialized: bool,
}

impl ChangeDetector {
    pub fn new() -> Self {
        ChangeDetector::default()
    }

    /// First observation after load from the store: record `digest` as
    /// both `current` and `persisted`.
    pub fn observe_loaded(&mut self, digest: Digest) {
        self.current = digest;
        self.persisted = digest;
        self.initialized = true;
    }

    /// Re-derives `current` from a fresh digest and reports whether a
    /// save is warranted. The `current == 0` clause defends against a
    /// digest collision with the sentinel by forcing a resave.
    pub fn is_changed(&mut self, fresh: Digest) -> bool {
        if !self.initialized {
            self.observe_loaded(fresh);
            return false;
        }
        if self.current != self.persisted {
            return true;
        }
        self.current = fresh;
        self.current != self.persisted || self.current.is_zero()
    }

    /// On successful persist: copy `current` to `persisted`.
    pub fn mark_persisted(&mut self) {
        self.persisted = self.current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(h: u64, l: u64) -> Digest {
        Digest { hash: h, len: l }
    }

    #[test]
    fn unchanged_after_load_with_no_mutation() {
        let mut cd = ChangeDetector::new();
        cd.observe_loaded(d(10, 3));
        assert!(!cd.is_changed(d(10, 3)));
    }

    #[test]
    fn changed_after_mutation() {
        let mut cd = ChangeDetector::new();
        cd.observe_loaded(d(10, 3));
        assert!(cd.is_changed(d(11, 3)));
    }

    #[test]
    fn unchanged_again_after_save() {
        let mut cd = ChangeDetector::new();
        cd.observe_loaded(d(10, 3));
        assert!(cd.is_changed(d(11, 3)));
        cd.mark_persisted();
        assert!(!cd.is_changed(d(11, 3)));
    }

    #[test]
    fn idempotent_without_intervening_mutation() {
        let mut cd = ChangeDetector::new();
        cd.observe_loaded(d(10, 3));
        cd.is_changed(d(11, 3));
        let first = cd.is_changed(d(11, 3));
        let second = cd.is_changed(d(11, 3));
        assert_eq!(first, second);
    }

    #[test]
    fn zero_digest_forces_resave() {
        let mut cd = ChangeDetector::new();
        cd.observe_loaded(d(10, 3));
        cd.mark_persisted();
        assert!(cd.is_changed(Digest::ZERO));
    }

    #[test]
    fn mixer_is_order_sensitive_and_stable() {
        let mut a = Mixer::new();
        a.write(b"hello");
        let da = a.digest();
        let mut b = Mixer::new();
        b.write(b"hello");
        let db = b.digest();
        assert_eq!(da, db);

        let mut c = Mixer::new();
        c.write(b"olleh");
        assert_ne!(da, c.digest());
    }
}
