//! The deterministic key/value stream that writer and verifier both walk.
//!
//! Entry `i` is derived from the stream seed and `i` alone:
//!
//! ```text
//! seed_i = sha256(stream_seed_be ++ i_be)
//! key    = sha256(seed_i)
//! value  = sha256(seed_i ++ key)
//! ```
//!
//! Keys are assumed unique across indices. This only holds with the
//! probability given by the birthday bound over a 256-bit digest, which the
//! verifier relies on without checking.

use sha2::{Digest, Sha256};

/// Width of every generated key and value.
pub const ENTRY_LEN: usize = 32;

/// A fixed-width generated key or value.
pub type Bytes = [u8; ENTRY_LEN];

/// A restartable, infinite, seeded stream of key/value pairs.
///
/// Cheap to copy, and safe to share between threads: every entry is a pure
/// function of `(seed, index)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyStream {
    seed: u64,
}

/// One generated pair along with its position in the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub index: u64,
    pub key: Bytes,
    pub value: Bytes,
}

impl KeyStream {
    pub const fn new(seed: u64) -> KeyStream {
        KeyStream { seed }
    }

    /// Returns the key and value at `index`.
    pub fn entry(&self, index: u64) -> (Bytes, Bytes) {
        let mut hasher = Sha256::new();
        hasher.update(self.seed.to_be_bytes());
        hasher.update(index.to_be_bytes());
        let seed: Bytes = hasher.finalize().into();

        let key: Bytes = Sha256::digest(seed).into();

        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(key);
        let value: Bytes = hasher.finalize().into();

        (key, value)
    }

    /// Calls `visit` for indices `0, 1, 2, ...` until it returns `true`.
    ///
    /// Returns the index at which `visit` asked to stop.
    pub fn iterate<F>(&self, mut visit: F) -> u64
    where
        F: FnMut(u64, &[u8], &[u8]) -> bool,
    {
        for entry in self.entries() {
            if visit(entry.index, &entry.key, &entry.value) {
                return entry.index;
            }
        }
        unreachable!("the key stream is infinite")
    }

    /// A fresh cursor positioned at index 0.
    pub fn entries(&self) -> Entries {
        Entries { stream: *self, next: 0 }
    }
}

/// Cursor over a [`KeyStream`], yielding entries in index order forever.
#[derive(Debug, Clone)]
pub struct Entries {
    stream: KeyStream,
    next: u64,
}

impl Entries {
    /// The index the next call to `next` will yield.
    pub fn position(&self) -> u64 {
        self.next
    }
}

impl Iterator for Entries {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let index = self.next;
        // u64::MAX entries is unreachable in practice
        self.next = self.next.checked_add(1)?;
        let (key, value) = self.stream.entry(index);
        Some(Entry { index, key, value })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (usize::MAX, None)
    }
}
