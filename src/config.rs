use std::path::PathBuf;
use std::time::Duration;


/// Options a store is opened with.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory that holds the store's files. Created if missing.
    pub path: PathBuf,
    /// Sync the log to disk before any write returns.
    pub sync: bool,
    /// Write each batch as a single checksummed frame, making it
    /// all-or-nothing across a crash. When disabled every batch entry is
    /// framed separately and a crash may expose a prefix of the batch.
    pub batch_transactional: bool,
    /// Upper bound on the engine's in-memory cache.
    pub cache_capacity_bytes: usize,
    /// Period of the engine's background flusher. `None` leaves only the
    /// flushes issued by `sync` and `close`.
    pub flush_every_ms: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> StoreConfig {
        StoreConfig {
            path: "crashtest.default".into(),
            sync: true,
            batch_transactional: true,
            cache_capacity_bytes: 64 * 1024 * 1024,
            flush_every_ms: Some(200),
        }
    }
}

impl StoreConfig {
    pub fn new<P: Into<PathBuf>>(path: P) -> StoreConfig {
        StoreConfig { path: path.into(), ..Default::default() }
    }

    /// Builder, set whether writes are synced before returning.
    pub fn sync(mut self, to: bool) -> StoreConfig {
        self.sync = to;
        self
    }

    /// Builder, set whether batches are applied as one atomic frame.
    pub fn batch_transactional(mut self, to: bool) -> StoreConfig {
        self.batch_transactional = to;
        self
    }
}

/// Settings that shape a whole harness run.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Directory under which one fixture directory per strategy is created.
    pub base_dir: PathBuf,
    /// Trials to run for every selected strategy.
    pub repetitions: u64,
    /// Average lifetime of the writer child before it is killed.
    pub average_wait: Duration,
    /// Seed of the key/value stream shared by writer and verifier.
    pub seed: u64,
    /// Stop each writer voluntarily after this many entries.
    pub entry_limit: Option<u64>,
    /// Rename a failing fixture out of the way instead of letting the next
    /// trial delete it.
    pub keep_failed: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> OrchestratorConfig {
        OrchestratorConfig {
            base_dir: ".".into(),
            repetitions: 1000,
            average_wait: Duration::from_secs(30),
            seed: 0,
            entry_limit: None,
            keep_failed: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_override_defaults() {
        let config =
            StoreConfig::new("x").sync(false).batch_transactional(false);
        assert_eq!(config.path, PathBuf::from("x"));
        assert!(!config.sync);
        assert!(!config.batch_transactional);
        assert_eq!(
            config.cache_capacity_bytes,
            StoreConfig::default().cache_capacity_bytes
        );
    }
}
