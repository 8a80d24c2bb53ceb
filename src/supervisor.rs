//! Runs one writer child against a fresh fixture and kills it at a random
//! point.

use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;

use rand::Rng;

use crate::{Error, Process, Result, Termination, WriterInvocation};

/// Upper bound on how far a crash deadline strays from the average wait.
pub const CRASH_WIGGLE: Duration = Duration::from_millis(500);

/// The span a writer is allowed to live before it is killed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrashWindow {
    pub average: Duration,
    pub jitter: Duration,
}

impl CrashWindow {
    /// Centers a window of [`CRASH_WIGGLE`] on `average`, or of half of
    /// `average` when the wiggle would exceed it.
    pub fn new(average: Duration) -> CrashWindow {
        let jitter =
            if CRASH_WIGGLE > average { average / 2 } else { CRASH_WIGGLE };
        CrashWindow { average, jitter }
    }

    /// `[average - jitter/2, average - jitter/2 + jitter)`
    pub fn bounds(&self) -> Range<Duration> {
        let start = self.average - self.jitter / 2;
        start..start + self.jitter
    }

    /// Draws a deadline uniformly from [`CrashWindow::bounds`].
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let bounds = self.bounds();
        let jitter_nanos =
            u64::try_from(self.jitter.as_nanos()).unwrap_or(u64::MAX);
        if jitter_nanos == 0 {
            return bounds.start;
        }
        bounds.start + Duration::from_nanos(rng.random_range(0..jitter_nanos))
    }
}

/// Removes the fixture left by a previous trial. A missing directory is
/// fine, anything else means the harness cannot guarantee a fresh store.
pub fn clear_fixture(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Fixture(dir.into(), e)),
    }
}

/// Spawns writers through a [`Process`] and crashes them.
#[derive(Debug, Clone)]
pub struct Supervisor<P: Process> {
    process: P,
}

impl<P: Process> Supervisor<P> {
    pub fn new(process: P) -> Supervisor<P> {
        Supervisor { process }
    }

    /// Clears `invocation.dir`, starts a writer on it, and kills the writer
    /// after a deadline drawn from the crash window around `average_wait`,
    /// unless it exits first. The directory is left exactly as the writer
    /// left it.
    pub fn run_trial(
        &self,
        invocation: &WriterInvocation,
        average_wait: Duration,
    ) -> Result<Termination> {
        clear_fixture(&invocation.dir)?;

        let deadline = CrashWindow::new(average_wait).sample(&mut rand::rng());
        log::debug!(
            "starting {} writer on {:?}, killing it after {:?}",
            invocation.strategy,
            invocation.dir,
            deadline
        );

        let mut handle = self.process.spawn(invocation)?;
        let termination = self.process.kill_after(&mut handle, deadline)?;

        log::debug!("{} writer ended: {:?}", invocation.strategy, termination);

        Ok(termination)
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;
    use tempdir::TempDir;

    use super::*;

    quickcheck! {
        fn deadlines_stay_in_window(average_ms: u32, draws: u8) -> bool {
            let average = Duration::from_millis(u64::from(average_ms));
            let window = CrashWindow::new(average);
            let bounds = window.bounds();
            let mut rng = rand::rng();
            (0..draws).all(|_| {
                let deadline = window.sample(&mut rng);
                bounds.contains(&deadline)
                    || (window.jitter.is_zero() && deadline == bounds.start)
            })
        }
    }

    #[test]
    fn jitter_is_capped() {
        let window = CrashWindow::new(Duration::from_secs(30));
        assert_eq!(window.jitter, CRASH_WIGGLE);
        assert_eq!(
            window.bounds(),
            Duration::from_millis(29_750)..Duration::from_millis(30_250)
        );

        let window = CrashWindow::new(Duration::from_millis(200));
        assert_eq!(window.jitter, Duration::from_millis(100));
        assert_eq!(
            window.bounds(),
            Duration::from_millis(150)..Duration::from_millis(250)
        );

        let window = CrashWindow::new(Duration::ZERO);
        assert_eq!(window.sample(&mut rand::rng()), Duration::ZERO);
    }

    #[test]
    fn clear_fixture_tolerates_missing() {
        let dir = TempDir::new("supervisor").unwrap();
        let fixture = dir.path().join("fixture");
        clear_fixture(&fixture).unwrap();

        fs::create_dir_all(fixture.join("nested")).unwrap();
        fs::write(fixture.join("nested").join("file"), b"x").unwrap();
        clear_fixture(&fixture).unwrap();
        assert!(!fixture.exists());
    }

    #[test]
    fn clear_fixture_rejects_files() {
        let dir = TempDir::new("supervisor").unwrap();
        let fixture = dir.path().join("not_a_dir");
        fs::write(&fixture, b"x").unwrap();
        assert!(matches!(clear_fixture(&fixture), Err(Error::Fixture(..))));
    }
}
