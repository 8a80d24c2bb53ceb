//! `sled` as the store under test.

use std::io;
use std::path::{Path, PathBuf};

use crate::{Batch, Error, Result, Store, StoreConfig};

/// A `sled::Db` driven with the durability options of a [`StoreConfig`].
///
/// With `sync` every acknowledged write is followed by `Db::flush`. sled
/// applies a `sled::Batch` atomically, so a batch that is not
/// `batch_transactional` is written as one insert per entry instead.
#[derive(Debug)]
pub struct SledStore {
    db: sled::Db,
    path: PathBuf,
    sync: bool,
    batch_transactional: bool,
}

impl Store for SledStore {
    fn open(config: &StoreConfig) -> Result<SledStore> {
        let db: sled::Db = sled::Config::new()
            .path(&config.path)
            .cache_capacity_bytes(config.cache_capacity_bytes)
            .flush_every_ms(config.flush_every_ms)
            .open()
            .map_err(|e| open_error(&config.path, e))?;

        log::debug!("opened sled at {:?}", config.path);

        Ok(SledStore {
            db,
            path: config.path.clone(),
            sync: config.sync,
            batch_transactional: config.batch_transactional,
        })
    }

    fn insert(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        self.flush_if_sync()
    }

    fn apply_batch(&self, batch: &Batch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        if self.batch_transactional {
            let mut sled_batch = sled::Batch::default();
            for (key, value) in batch.iter() {
                sled_batch.insert(key, value);
            }
            self.db.apply_batch(sled_batch)?;
        } else {
            for (key, value) in batch.iter() {
                self.db.insert(key, value)?;
            }
        }

        self.flush_if_sync()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|value| value.to_vec()))
    }

    fn close(self) -> Result<()> {
        self.db.flush()?;
        log::debug!("closed sled at {:?}", self.path);
        Ok(())
    }
}

impl SledStore {
    fn flush_if_sync(&self) -> Result<()> {
        if self.sync {
            self.db.flush()?;
        }
        Ok(())
    }
}

// sled reports a held directory lock as `WouldBlock` and a damaged file as
// `InvalidData`.
fn open_error(path: &Path, error: io::Error) -> Error {
    match error.kind() {
        io::ErrorKind::WouldBlock => Error::Locked(path.into()),
        io::ErrorKind::InvalidData => Error::Corruption {
            path: path.into(),
            reason: error.to_string(),
        },
        _ => Error::Io(error),
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempdir::TempDir;

    use super::*;

    fn config(dir: &TempDir) -> StoreConfig {
        StoreConfig::new(dir.path().join("db"))
    }

    #[test]
    fn recovers_inserts_and_batches() {
        let dir = TempDir::new("sled_store").unwrap();
        let config = config(&dir);

        let store = SledStore::open(&config).unwrap();
        store.insert(b"a", b"1").unwrap();
        store.insert(b"b", b"2").unwrap();
        let mut batch = Batch::default();
        batch.insert(&b"c"[..], &b"3"[..]);
        batch.insert(&b"a"[..], &b"4"[..]);
        store.apply_batch(&batch).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"4".to_vec()));
        store.close().unwrap();

        let store = SledStore::open(&config).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"4".to_vec()));
        assert_eq!(store.get(b"b").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"c").unwrap(), Some(b"3".to_vec()));
        assert_eq!(store.get(b"zzz").unwrap(), None);
        store.close().unwrap();
    }

    #[test]
    fn non_transactional_batches_apply_every_entry() {
        let dir = TempDir::new("sled_store").unwrap();
        let config = config(&dir).sync(false).batch_transactional(false);

        let store = SledStore::open(&config).unwrap();
        let mut batch = Batch::default();
        for i in 0_u8..20 {
            batch.insert(vec![i], vec![i, i]);
        }
        store.apply_batch(&batch).unwrap();
        store.close().unwrap();

        let store = SledStore::open(&config).unwrap();
        for i in 0_u8..20 {
            assert_eq!(store.get(&[i]).unwrap(), Some(vec![i, i]));
        }
    }

    #[test]
    fn second_handle_is_locked_out() {
        let dir = TempDir::new("sled_store").unwrap();
        let config = config(&dir);

        let _held = SledStore::open(&config).unwrap();
        assert!(matches!(SledStore::open(&config), Err(Error::Locked(_))));
    }

    #[test]
    fn small_cache_keeps_everything() {
        let dir = TempDir::new("sled_store").unwrap();
        let mut config = config(&dir).sync(false);
        config.cache_capacity_bytes = 256 * 1024;

        let store = SledStore::open(&config).unwrap();
        for i in 0_u32..20_000 {
            store.insert(&i.to_be_bytes(), &[7; 64]).unwrap();
        }
        store.close().unwrap();

        let store = SledStore::open(&config).unwrap();
        for i in (0_u32..20_000).step_by(97) {
            assert_eq!(store.get(&i.to_be_bytes()).unwrap(), Some(vec![7; 64]));
        }
    }

    #[test]
    fn unopenable_directory_is_not_locked() {
        let dir = TempDir::new("sled_store").unwrap();
        let config = config(&dir);
        fs::write(&config.path, b"not a directory").unwrap();

        let err = SledStore::open(&config).unwrap_err();
        assert!(!err.is_fatal(), "{:?}", err);
    }
}
