use crate::{Result, StoreConfig};

// every key and value is counted with an 8-byte length prefix
const LEN_PREFIX: usize = 8;

/// The surface of an ordered, persistent key-value store that the harness
/// drives. A store owns its directory exclusively while open.
pub trait Store: Sized {
    /// Open or recover the store described by `config`.
    ///
    /// Fails with [`Error::Locked`](crate::Error::Locked) when another handle
    /// holds the directory.
    fn open(config: &StoreConfig) -> Result<Self>;

    /// Set a key to a new value.
    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Apply every write in `batch`. All-or-nothing when the store was
    /// opened with `batch_transactional`.
    fn apply_batch(&self, batch: &Batch) -> Result<()>;

    /// Retrieve a value. `None` means the key is not present.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Flush everything and release the directory lock.
    fn close(self) -> Result<()>;
}

/// A batch of updates that will be applied to a [`Store`] in one call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Batch {
    pub(crate) writes: Vec<(Vec<u8>, Vec<u8>)>,
    serialized_size: usize,
}

impl Batch {
    /// Set a key to a new value
    pub fn insert<K, V>(&mut self, key: K, value: V)
    where
        K: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let key = key.into();
        let value = value.into();
        self.serialized_size += 2 * LEN_PREFIX + key.len() + value.len();
        self.writes.push((key, value));
    }

    /// Length-prefixed size of every key and value in the batch.
    pub fn serialized_size(&self) -> usize {
        self.serialized_size
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Drop all writes while keeping the allocation.
    pub fn clear(&mut self) {
        self.writes.clear();
        self.serialized_size = 0;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.writes.iter().map(|(k, v)| (&k[..], &v[..]))
    }
}
