//! `crashtest` kills a process while it writes to a key-value store and then
//! checks what the store recovered.
//!
//! A trial clears a fixture directory, re-executes the current binary as a
//! writer child that applies a deterministic key stream with one of several
//! write strategies, kills the child with `SIGKILL` after a randomized
//! deadline, and finally reopens the store and walks the stream from the
//! start. A missing key ends the recovered prefix; a present key with the
//! wrong value fails the trial.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use crashtest::{Orchestrator, OrchestratorConfig, OsProcess, Registry};
//!
//! fn main() -> crashtest::Result<()> {
//!     // the writer child lands here, runs until killed, and never returns
//!     if let Some(invocation) = crashtest::WriterInvocation::from_env()? {
//!         invocation.run::<crashtest::SledStore>(&Registry::default())?;
//!         return Ok(());
//!     }
//!
//!     let orchestrator: Orchestrator = Orchestrator::new(
//!         Registry::default(),
//!         OsProcess::current_exe()?,
//!         OrchestratorConfig::default(),
//!     );
//!     let strategies = vec!["sequential-sync".to_string()];
//!     let report =
//!         orchestrator.run_all(&strategies, 10, Duration::from_secs(2))?;
//!     assert!(!report.any_failed());
//!     Ok(())
//! }
//! ```

mod config;
mod duration;
mod logger;
mod orchestrator;
mod process;
mod result;
mod sled_store;
mod store;
pub mod strategy;
pub mod stream;
mod supervisor;
mod verifier;
mod writer;

pub use crate::config::{OrchestratorConfig, StoreConfig};
pub use crate::duration::parse_duration;
pub use crate::logger::setup_logger;
pub use crate::orchestrator::{Orchestrator, Report, Status, TrialOutcome};
pub use crate::process::{OsProcess, Process, Termination};
pub use crate::result::{Error, Result};
pub use crate::sled_store::SledStore;
pub use crate::store::{Batch, Store};
pub use crate::strategy::{Registry, Strategy, Writer, WriterState};
pub use crate::stream::{Entry, KeyStream, ENTRY_LEN};
pub use crate::supervisor::{
    clear_fixture, CrashWindow, Supervisor, CRASH_WIGGLE,
};
pub use crate::verifier::{scan, verify};
pub use crate::writer::{
    WriterInvocation, DIR_ENV_VAR, LIMIT_ENV_VAR, SEED_ENV_VAR, WRITER_ENV_VAR,
};
