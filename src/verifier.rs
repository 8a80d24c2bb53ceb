//! Checks a recovered store against the key stream.

use std::path::Path;

use crate::{Error, KeyStream, Result, Store, StoreConfig};

/// Opens the store in `dir` and returns how many leading stream entries it
/// holds with the exact expected value.
///
/// The scan walks the stream from index 0 and stops at the first key that is
/// missing, which marks the end of the recovered prefix and is not an error.
/// A present key with any other value fails with [`Error::Mismatch`]. Later
/// entries are never examined once the scan stops, so the first failure in
/// index order is the one reported.
///
/// Failing to open the store is returned as is: a store must always either
/// recover or report definite corruption after a crash.
pub fn verify<S: Store>(dir: &Path, stream: KeyStream) -> Result<u64> {
    // verification only reads, so no background flusher is needed
    let config = StoreConfig { flush_every_ms: None, ..StoreConfig::new(dir) };
    let store = S::open(&config)?;

    let scan_res = scan(&store, stream);
    let close_res = store.close();

    let max_verified = scan_res?;
    close_res?;

    log::info!("  == database has keys up to {}", max_verified);

    Ok(max_verified)
}

/// The scan behind [`verify`], over an already open store.
pub fn scan<S: Store>(store: &S, stream: KeyStream) -> Result<u64> {
    for entry in stream.entries() {
        match store.get(&entry.key)? {
            None => return Ok(entry.index),
            Some(actual) if actual[..] == entry.value[..] => {}
            Some(actual) => {
                log::error!(
                    "entry {} recovered with the wrong value",
                    entry.index
                );
                return Err(Error::Mismatch {
                    index: entry.index,
                    key: entry.key.to_vec(),
                    expected: entry.value.to_vec(),
                    actual,
                });
            }
        }
    }

    Err(Error::ReportableBug("the key stream ended".into()))
}

#[cfg(test)]
mod tests {
    use tempdir::TempDir;

    use super::*;
    use crate::SledStore;

    fn write_prefix(dir: &Path, stream: KeyStream, n: u64) -> SledStore {
        let store = SledStore::open(&StoreConfig::new(dir)).unwrap();
        for entry in stream.entries().take(n as usize) {
            store.insert(&entry.key, &entry.value).unwrap();
        }
        store
    }

    #[test]
    fn empty_store_verifies_zero() {
        let dir = TempDir::new("verifier").unwrap();
        let path = dir.path().join("db");
        let max = verify::<SledStore>(&path, KeyStream::default()).unwrap();
        assert_eq!(max, 0);
    }

    #[test]
    fn prefix_is_counted() {
        let dir = TempDir::new("verifier").unwrap();
        let path = dir.path().join("db");
        let stream = KeyStream::new(9);
        write_prefix(&path, stream, 77).close().unwrap();

        assert_eq!(verify::<SledStore>(&path, stream).unwrap(), 77);
        // verifying twice is stable
        assert_eq!(verify::<SledStore>(&path, stream).unwrap(), 77);
    }

    #[test]
    fn scan_stops_at_first_gap() {
        let dir = TempDir::new("verifier").unwrap();
        let path = dir.path().join("db");
        let stream = KeyStream::default();
        let store = write_prefix(&path, stream, 10);

        // entry 12 is present but 10 and 11 are not
        let (key, value) = stream.entry(12);
        store.insert(&key, &value).unwrap();

        assert_eq!(scan(&store, stream).unwrap(), 10);
    }

    #[test]
    fn first_mismatch_is_reported() {
        let dir = TempDir::new("verifier").unwrap();
        let path = dir.path().join("db");
        let stream = KeyStream::default();
        let store = write_prefix(&path, stream, 20);

        let (key5, _) = stream.entry(5);
        store.insert(&key5, b"garbage").unwrap();
        let (key8, _) = stream.entry(8);
        store.insert(&key8, b"more garbage").unwrap();
        store.close().unwrap();

        match verify::<SledStore>(&path, stream) {
            Err(Error::Mismatch { index, key, actual, .. }) => {
                assert_eq!(index, 5);
                assert_eq!(key, key5.to_vec());
                assert_eq!(actual, b"garbage".to_vec());
            }
            other => panic!("expected a mismatch, got {:?}", other),
        }
    }

    #[test]
    fn wrong_seed_sees_nothing() {
        let dir = TempDir::new("verifier").unwrap();
        let path = dir.path().join("db");
        write_prefix(&path, KeyStream::new(1), 5).close().unwrap();
        assert_eq!(verify::<SledStore>(&path, KeyStream::new(2)).unwrap(), 0);
    }

    #[test]
    fn locked_store_is_fatal() {
        let dir = TempDir::new("verifier").unwrap();
        let path = dir.path().join("db");
        let _held = write_prefix(&path, KeyStream::default(), 1);

        let err =
            verify::<SledStore>(&path, KeyStream::default()).unwrap_err();
        assert!(matches!(err, Error::Locked(_)));
        assert!(err.is_fatal());
    }
}
