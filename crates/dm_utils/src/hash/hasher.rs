//! Provide `FixedHasher` and `NoOpHasher`.
//!
//! `FixedHasher` is `foldhash` with a fixed seed, so equal input always
//! produces the same hash within and across runs of the same build.
//!
//! `NoOpHasher` passes a `u64` straight through, for keys that are
//! already well distributed (such as `TypeId`).

use core::hash::{BuildHasher, Hash, Hasher};

use foldhash::fast::{FixedState, FoldHasher};

// -----------------------------------------------------------------------------
// FixedHasher

const FIXED_HASH_STATE: FixedState = FixedState::with_seed(0x3C6E_F372_FE94_F82B);

/// A hasher whose result depends only on its input.
///
/// Created through [`FixedHashState::build_hasher`].
pub type FixedHasher = FoldHasher<'static>;

/// Builds [`FixedHasher`]s from a single compiled-in seed.
///
/// # Examples
///
/// ```
/// use core::hash::BuildHasher;
/// use dm_utils::hash::FixedHashState;
///
/// let a = FixedHashState.hash_one("departments.*.name");
/// let b = FixedHashState.hash_one("departments.*.name");
/// assert_eq!(a, b);
/// ```
#[derive(Copy, Clone, Default, Debug)]
pub struct FixedHashState;

impl BuildHasher for FixedHashState {
    type Hasher = FixedHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        FIXED_HASH_STATE.build_hasher()
    }
}

/// Hashes `value` with [`FixedHashState`].
///
/// Used to fingerprint file contents and class signatures; two calls
/// agree if and only if the hashed data (very likely) agrees.
///
/// # Examples
///
/// ```
/// use dm_utils::hash::fingerprint;
///
/// assert_eq!(fingerprint(b"struct A;"), fingerprint(b"struct A;"));
/// assert_ne!(fingerprint(b"struct A;"), fingerprint(b"struct B;"));
/// ```
#[inline]
pub fn fingerprint<T: Hash + ?Sized>(value: &T) -> u64 {
    FixedHashState.hash_one(value)
}

// -----------------------------------------------------------------------------
// NoOpHasher

/// A hasher that stores the last `u64` it was given.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHasher {
    hash: u64,
}

impl Hasher for NoOpHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, bytes: &[u8]) {
        for byte in bytes.iter().rev() {
            self.hash = self.hash.rotate_left(8).wrapping_add(*byte as u64);
        }
    }

    #[inline]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}

/// Builds [`NoOpHasher`]s.
#[derive(Copy, Clone, Default, Debug)]
pub struct NoOpHashState;

impl BuildHasher for NoOpHashState {
    type Hasher = NoOpHasher;

    #[inline(always)]
    fn build_hasher(&self) -> Self::Hasher {
        NoOpHasher { hash: 0 }
    }
}

#[cfg(test)]
mod tests {
    use core::hash::BuildHasher;

    use super::{FixedHashState, NoOpHashState, fingerprint};

    #[test]
    fn fixed_state_is_deterministic() {
        assert_eq!(
            FixedHashState.hash_one(42_u32),
            FixedHashState.hash_one(42_u32)
        );
        assert_eq!(fingerprint("a.b"), fingerprint("a.b"));
        assert_ne!(fingerprint("a.b"), fingerprint("a.c"));
    }

    #[test]
    fn noop_passes_u64_through() {
        assert_eq!(NoOpHashState.hash_one(7_u64), 7);
    }
}
