//! Write strategies: how the writer child applies the key stream to a store.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::stream::{Entries, Entry};
use crate::{Batch, Error, Result, Store, StoreConfig};

/// Default serialized size at which a batch is submitted.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

const PROGRESS_INTERVAL: u64 = 10_000;

/// One way of writing the stream, each with its own durability contract.
///
/// * `Sequential { sync: true }`: every acknowledged insert survives a crash.
/// * `Sequential { sync: false }`: acknowledged inserts may be lost, but
///   whatever survives is byte-exact.
/// * `Batched { .. }`: the same contracts per batch. A `transactional` batch
///   is never observed partially applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Sequential { sync: bool },
    Batched { sync: bool, batch_size: usize, transactional: bool },
}

impl Strategy {
    pub const fn sequential(sync: bool) -> Strategy {
        Strategy::Sequential { sync }
    }

    pub const fn batched(sync: bool, batch_size: usize) -> Strategy {
        Strategy::Batched { sync, batch_size, transactional: true }
    }

    pub fn is_sync(&self) -> bool {
        match *self {
            Strategy::Sequential { sync } | Strategy::Batched { sync, .. } => {
                sync
            }
        }
    }

    /// Whether every acknowledged write must be visible after a crash, and
    /// no batch may be visible in part.
    pub fn guarantees_acknowledged_writes(&self) -> bool {
        match *self {
            Strategy::Sequential { sync } => sync,
            Strategy::Batched { sync, transactional, .. } => {
                sync && transactional
            }
        }
    }

    /// The options the writer opens its store with.
    pub fn store_config(&self, path: &Path) -> StoreConfig {
        let transactional = match *self {
            Strategy::Sequential { .. } => true,
            Strategy::Batched { transactional, .. } => transactional,
        };
        StoreConfig::new(path)
            .sync(self.is_sync())
            .batch_transactional(transactional)
    }

    /// Runs this strategy against the store in `path` until `entries` has
    /// yielded `limit` entries, forever when `limit` is `None`. Returns the
    /// number of acknowledged entries.
    pub fn run<S: Store>(
        &self,
        path: &Path,
        entries: Entries,
        limit: Option<u64>,
    ) -> Result<u64> {
        let mut writer: Writer<S> = Writer::open(*self, path)?;

        for entry in entries {
            let last = limit.is_some_and(|limit| entry.index + 1 >= limit);
            if limit.is_some_and(|limit| entry.index >= limit) {
                break;
            }

            writer.write(&entry, last)?;

            if entry.index > 0 && entry.index % PROGRESS_INTERVAL == 0 {
                log::info!("{} entries written", entry.index);
            }

            if last {
                break;
            }
        }

        writer.close()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sync = |sync| if sync { "sync" } else { "nosync" };
        match *self {
            Strategy::Sequential { sync: s } => {
                write!(f, "sequential ({})", sync(s))
            }
            Strategy::Batched { sync: s, batch_size, transactional } => write!(
                f,
                "batched ({}, {} byte batches{})",
                sync(s),
                batch_size,
                if transactional { "" } else { ", non-transactional" }
            ),
        }
    }
}

/// Lifecycle of a [`Writer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Opened,
    Writing,
    BatchFlushing,
    Closed,
}

/// A store handle driven by one [`Strategy`].
pub struct Writer<S: Store> {
    strategy: Strategy,
    store: S,
    state: WriterState,
    batch: Batch,
    pending: u64,
    acknowledged: u64,
}

impl<S: Store> Writer<S> {
    pub fn open(strategy: Strategy, path: &Path) -> Result<Writer<S>> {
        let store = S::open(&strategy.store_config(path))?;

        Ok(Writer {
            strategy,
            store,
            state: WriterState::Opened,
            batch: Batch::default(),
            pending: 0,
            acknowledged: 0,
        })
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    /// Entries whose write call has returned successfully.
    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    /// Applies one entry. `last` forces a pending batch out.
    pub fn write(&mut self, entry: &Entry, last: bool) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(Error::ReportableBug(
                "write issued to a closed writer".into(),
            ));
        }
        self.state = WriterState::Writing;

        match self.strategy {
            Strategy::Sequential { .. } => {
                self.store.insert(&entry.key, &entry.value)?;
                self.acknowledged += 1;
            }
            Strategy::Batched { batch_size, .. } => {
                self.batch.insert(&entry.key[..], &entry.value[..]);
                self.pending += 1;
                if last || self.batch.serialized_size() >= batch_size {
                    self.flush_batch()?;
                }
            }
        }

        Ok(())
    }

    fn flush_batch(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }

        self.state = WriterState::BatchFlushing;
        log::trace!(
            "submitting batch of {} entries ({} bytes)",
            self.batch.len(),
            self.batch.serialized_size()
        );
        self.store.apply_batch(&self.batch)?;
        self.acknowledged += self.pending;
        self.pending = 0;
        self.batch.clear();
        self.state = WriterState::Writing;

        Ok(())
    }

    /// Submits any pending batch and releases the store. Returns the number
    /// of acknowledged entries.
    pub fn close(mut self) -> Result<u64> {
        self.flush_batch()?;
        self.state = WriterState::Closed;
        self.store.close()?;
        Ok(self.acknowledged)
    }
}

/// Names of the strategies in a default [`Registry`].
pub const SEQUENTIAL_SYNC: &str = "sequential-sync";
pub const SEQUENTIAL_NOSYNC: &str = "sequential-nosync";
pub const BATCHED_SYNC: &str = "batched-sync";
pub const BATCHED_NOSYNC: &str = "batched-nosync";
pub const BATCHED_SYNC_NONTX: &str = "batched-sync-nontx";
pub const BATCHED_NOSYNC_NONTX: &str = "batched-nosync-nontx";

/// Name to strategy mapping, built once at startup and handed to the
/// orchestrator and the writer child.
#[derive(Debug, Clone)]
pub struct Registry {
    strategies: BTreeMap<String, Strategy>,
}

impl Default for Registry {
    fn default() -> Registry {
        let nontx = |sync| Strategy::Batched {
            sync,
            batch_size: DEFAULT_BATCH_SIZE,
            transactional: false,
        };

        let mut registry = Registry::empty();
        registry.register(SEQUENTIAL_SYNC, Strategy::sequential(true));
        registry.register(SEQUENTIAL_NOSYNC, Strategy::sequential(false));
        registry.register(
            BATCHED_SYNC,
            Strategy::batched(true, DEFAULT_BATCH_SIZE),
        );
        registry.register(
            BATCHED_NOSYNC,
            Strategy::batched(false, DEFAULT_BATCH_SIZE),
        );
        registry.register(BATCHED_SYNC_NONTX, nontx(true));
        registry.register(BATCHED_NOSYNC_NONTX, nontx(false));
        registry
    }
}

impl Registry {
    pub fn empty() -> Registry {
        Registry { strategies: BTreeMap::new() }
    }

    /// Adds or replaces a strategy.
    pub fn register<N: Into<String>>(&mut self, name: N, strategy: Strategy) {
        self.strategies.insert(name.into(), strategy);
    }

    pub fn get(&self, name: &str) -> Result<Strategy> {
        self.strategies
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownStrategy(name.into()))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    /// Parses a comma-separated selection, failing on the first unknown name
    /// or when nothing is selected.
    pub fn select(&self, selection: &str) -> Result<Vec<String>> {
        let mut ret = vec![];
        for name in selection.split(',').map(str::trim) {
            if name.is_empty() {
                continue;
            }
            self.get(name)?;
            ret.push(name.to_owned());
        }

        if ret.is_empty() {
            return Err(Error::NoStrategies);
        }

        Ok(ret)
    }
}
