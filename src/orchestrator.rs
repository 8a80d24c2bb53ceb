//! Repeats crash trials over a set of strategies and tallies the outcomes.

use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::supervisor::clear_fixture;
use crate::{
    verify, Error, KeyStream, OrchestratorConfig, OsProcess, Process,
    Registry, Result, SledStore, Store, Supervisor, Termination,
    WriterInvocation,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pass,
    Fail,
}

/// The result of one crash trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutcome {
    pub strategy: String,
    /// 1-based repetition number.
    pub repetition: u64,
    pub status: Status,
    /// Length of the verified prefix of the key stream.
    pub max_verified_index: u64,
    pub termination: Termination,
    /// Why the trial failed.
    pub diagnostic: Option<String>,
}

impl TrialOutcome {
    pub fn passed(&self) -> bool {
        self.status == Status::Pass
    }
}

impl fmt::Display for TrialOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "test {:?} #{}: {:?} with {} verified entries",
            self.strategy, self.repetition, self.status, self.max_verified_index
        )?;
        if let Some(diagnostic) = &self.diagnostic {
            write!(f, " ({})", diagnostic)?;
        }
        Ok(())
    }
}

/// Every outcome of a run, in execution order.
#[derive(Debug, Default, Clone)]
pub struct Report {
    pub outcomes: Vec<TrialOutcome>,
}

impl Report {
    pub fn any_failed(&self) -> bool {
        self.outcomes.iter().any(|outcome| !outcome.passed())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TrialOutcome> {
        self.outcomes.iter().filter(|outcome| !outcome.passed())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Drives supervisor and verifier for each selected strategy.
pub struct Orchestrator<S: Store = SledStore, P: Process = OsProcess> {
    registry: Registry,
    supervisor: Supervisor<P>,
    config: OrchestratorConfig,
    _store: PhantomData<fn() -> S>,
}

impl<S: Store, P: Process> Orchestrator<S, P> {
    pub fn new(
        registry: Registry,
        process: P,
        config: OrchestratorConfig,
    ) -> Orchestrator<S, P> {
        Orchestrator {
            registry,
            supervisor: Supervisor::new(process),
            config,
            _store: PhantomData,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Where trials of `strategy` keep their store.
    pub fn fixture_dir(&self, strategy: &str) -> PathBuf {
        self.config.base_dir.join(format!("crashtest-{strategy}"))
    }

    /// Runs `repetitions` trials of every strategy in `strategies`.
    ///
    /// A failed trial is recorded and the run goes on. Harness errors, such
    /// as an unknown strategy or a fixture that cannot be cleared, abort the
    /// run with `Err`.
    pub fn run_all(
        &self,
        strategies: &[String],
        repetitions: u64,
        average_wait: Duration,
    ) -> Result<Report> {
        if strategies.is_empty() {
            return Err(Error::NoStrategies);
        }
        for name in strategies {
            self.registry.get(name)?;
        }

        let mut report = Report::default();

        for name in strategies {
            for repetition in 1..=repetitions {
                log::info!(
                    "== running test {:?} ({}/{})",
                    name,
                    repetition,
                    repetitions
                );

                let outcome = self.run_trial(name, repetition, average_wait)?;

                if !outcome.passed() {
                    log::error!(
                        "test {:?} failed on repetition {}: {}",
                        name,
                        repetition,
                        outcome.diagnostic.as_deref().unwrap_or("unknown")
                    );
                }

                report.outcomes.push(outcome);
            }
        }

        Ok(report)
    }

    /// One crash trial of `strategy`.
    pub fn run_trial(
        &self,
        strategy: &str,
        repetition: u64,
        average_wait: Duration,
    ) -> Result<TrialOutcome> {
        let dir = self.fixture_dir(strategy);
        let invocation = WriterInvocation {
            strategy: strategy.to_owned(),
            dir: dir.clone(),
            seed: self.config.seed,
            limit: self.config.entry_limit,
        };

        let termination = self.supervisor.run_trial(&invocation, average_wait)?;

        let stream = KeyStream::new(self.config.seed);
        let (max_verified_index, diagnostic) = match verify::<S>(&dir, stream)
        {
            Ok(max) => (max, self.check_completed(termination, max)),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => match e {
                Error::Mismatch { index, .. } => (index, Some(e.to_string())),
                _ => (0, Some(format!("store failed to recover: {e}"))),
            },
        };

        let status =
            if diagnostic.is_some() { Status::Fail } else { Status::Pass };

        if status == Status::Fail && self.config.keep_failed {
            let kept = self.keep_fixture(&dir, repetition)?;
            log::warn!("kept failing fixture at {:?}", kept);
        }

        Ok(TrialOutcome {
            strategy: strategy.to_owned(),
            repetition,
            status,
            max_verified_index,
            termination,
            diagnostic,
        })
    }

    // a writer that ended on its own has either finished its limit, in which
    // case all of it must be there, or failed, which is a store bug.
    fn check_completed(
        &self,
        termination: Termination,
        max_verified: u64,
    ) -> Option<String> {
        match termination {
            Termination::Killed => None,
            Termination::Exited(Some(0)) => match self.config.entry_limit {
                Some(limit) if max_verified < limit => Some(format!(
                    "writer completed {} entries but only {} were recovered",
                    limit, max_verified
                )),
                _ => None,
            },
            Termination::Exited(code) => {
                Some(format!("writer exited abnormally with status {:?}", code))
            }
        }
    }

    fn keep_fixture(&self, dir: &Path, repetition: u64) -> Result<PathBuf> {
        let mut kept = dir.as_os_str().to_owned();
        kept.push(format!("-failed-{repetition}"));
        let kept = PathBuf::from(kept);

        clear_fixture(&kept)?;
        fs::rename(dir, &kept).map_err(|e| Error::Fixture(dir.into(), e))?;

        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use std::thread::{self, JoinHandle};

    use tempdir::TempDir;

    use super::*;

    /// Runs the writer on a thread of this process until its entry limit.
    struct InProcess {
        registry: Registry,
        corrupt_after: bool,
    }

    impl Process for InProcess {
        type Handle = Option<JoinHandle<Result<u64>>>;

        fn spawn(&self, invocation: &WriterInvocation) -> Result<Self::Handle> {
            let registry = self.registry.clone();
            let invocation = invocation.clone();
            let corrupt_after = self.corrupt_after;
            Ok(Some(thread::spawn(move || {
                let written = invocation.run::<SledStore>(&registry)?;
                if corrupt_after {
                    // the store directory becomes a garbage file
                    fs::remove_dir_all(&invocation.dir)?;
                    fs::write(&invocation.dir, vec![0xFF_u8; 64])?;
                }
                Ok(written)
            })))
        }

        fn kill_after(
            &self,
            handle: &mut Self::Handle,
            _deadline: Duration,
        ) -> Result<Termination> {
            self.wait(handle)
        }

        fn wait(&self, handle: &mut Self::Handle) -> Result<Termination> {
            let join_handle = handle.take().expect("waited on twice");
            match join_handle.join() {
                Ok(Ok(_)) => Ok(Termination::Exited(Some(0))),
                Ok(Err(_)) | Err(_) => Ok(Termination::Exited(Some(1))),
            }
        }
    }

    fn orchestrator(
        dir: &TempDir,
        corrupt_after: bool,
        keep_failed: bool,
    ) -> Orchestrator<SledStore, InProcess> {
        let registry = Registry::default();
        let config = OrchestratorConfig {
            base_dir: dir.path().into(),
            entry_limit: Some(300),
            keep_failed,
            ..Default::default()
        };
        Orchestrator::new(
            registry.clone(),
            InProcess { registry, corrupt_after },
            config,
        )
    }

    #[test]
    fn completed_writers_pass() {
        let dir = TempDir::new("orchestrator").unwrap();
        let orchestrator = orchestrator(&dir, false, false);
        let strategies: Vec<String> =
            orchestrator.registry().names().map(String::from).collect();

        let report = orchestrator
            .run_all(&strategies, 2, Duration::from_millis(10))
            .unwrap();

        assert_eq!(report.len(), strategies.len() * 2);
        assert!(
            !report.any_failed(),
            "{:?}",
            report.failures().collect::<Vec<_>>()
        );
        for outcome in &report.outcomes {
            assert_eq!(outcome.max_verified_index, 300);
            assert_eq!(outcome.termination, Termination::Exited(Some(0)));
        }
    }

    #[test]
    fn unopenable_store_is_a_trial_failure() {
        let dir = TempDir::new("orchestrator").unwrap();
        let orchestrator = orchestrator(&dir, true, true);
        let strategies = vec!["sequential-sync".to_string()];

        let report = orchestrator
            .run_all(&strategies, 2, Duration::from_millis(10))
            .unwrap();

        assert!(report.any_failed());
        assert_eq!(report.failures().count(), 2);
        let outcome = &report.outcomes[0];
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.max_verified_index, 0);
        let diagnostic = outcome.diagnostic.as_ref().unwrap();
        assert!(diagnostic.contains("failed to recover"), "{}", diagnostic);

        let fixture = orchestrator.fixture_dir("sequential-sync");
        let mut kept = fixture.clone().into_os_string();
        kept.push("-failed-1");
        assert!(PathBuf::from(kept).exists());
    }

    #[test]
    fn selection_errors_are_fatal() {
        let dir = TempDir::new("orchestrator").unwrap();
        let orchestrator = orchestrator(&dir, false, false);

        assert!(matches!(
            orchestrator.run_all(&[], 1, Duration::ZERO),
            Err(Error::NoStrategies)
        ));
        assert!(matches!(
            orchestrator.run_all(&["nope".to_string()], 1, Duration::ZERO),
            Err(Error::UnknownStrategy(_))
        ));
    }
}
