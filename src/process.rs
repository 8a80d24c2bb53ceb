//! Launching and killing the writer child.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use crossbeam_channel::{after, select, tick};

use crate::{Error, Result, WriterInvocation};

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How a writer child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The supervisor killed it when its deadline passed.
    Killed,
    /// It exited on its own with the given status code. `None` means it was
    /// terminated by a signal nobody in this process sent.
    Exited(Option<i32>),
}

/// The ability to run a writer in isolation and end it abruptly.
pub trait Process {
    type Handle;

    /// Start a writer for `invocation`. It shares nothing with the caller
    /// except the store directory.
    fn spawn(&self, invocation: &WriterInvocation) -> Result<Self::Handle>;

    /// Wait up to `deadline` for the writer to exit on its own, then kill it
    /// without warning. Returns once the writer is confirmed dead.
    fn kill_after(
        &self,
        handle: &mut Self::Handle,
        deadline: Duration,
    ) -> Result<Termination>;

    /// Wait for the writer to exit on its own.
    fn wait(&self, handle: &mut Self::Handle) -> Result<Termination>;
}

/// Runs the writer as an OS child process: an executable that checks
/// [`WriterInvocation::from_env`] first thing in `main`, normally the
/// current executable.
#[derive(Debug, Clone)]
pub struct OsProcess {
    program: PathBuf,
    poll_interval: Duration,
}

impl OsProcess {
    pub fn new<P: Into<PathBuf>>(program: P) -> OsProcess {
        OsProcess { program: program.into(), poll_interval: POLL_INTERVAL }
    }

    /// Re-invoke the running executable as the writer.
    pub fn current_exe() -> Result<OsProcess> {
        let program = std::env::current_exe().map_err(|e| {
            Error::InvalidInvocation(format!(
                "can't figure out executable path: {e}"
            ))
        })?;
        Ok(OsProcess::new(program))
    }
}

fn reap_error(e: std::io::Error) -> Error {
    Error::ReportableBug(format!("unable to reap writer child: {e}"))
}

impl Process for OsProcess {
    type Handle = Child;

    fn spawn(&self, invocation: &WriterInvocation) -> Result<Child> {
        Command::new(&self.program)
            .envs(invocation.env())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| {
                Error::InvalidInvocation(format!(
                    "could not spawn child process {:?} for {} test: {e}",
                    self.program, invocation.strategy
                ))
            })
    }

    fn kill_after(
        &self,
        child: &mut Child,
        deadline: Duration,
    ) -> Result<Termination> {
        let timeout = after(deadline);
        let ticker = tick(self.poll_interval);

        loop {
            if let Some(status) = child.try_wait().map_err(reap_error)? {
                return Ok(Termination::Exited(status.code()));
            }

            select! {
                recv(timeout) -> _ => break,
                recv(ticker) -> _ => {}
            }
        }

        // SIGKILL on unix: no handlers run and nothing is flushed
        if let Err(e) = child.kill() {
            // the child can win the race and exit between the last poll and
            // the kill
            if e.kind() != std::io::ErrorKind::InvalidInput {
                return Err(reap_error(e));
            }
            let status = child.wait().map_err(reap_error)?;
            return Ok(Termination::Exited(status.code()));
        }

        child.wait().map_err(reap_error)?;
        log::trace!("killed writer child {}", child.id());

        Ok(Termination::Killed)
    }

    fn wait(&self, child: &mut Child) -> Result<Termination> {
        let status = child.wait().map_err(reap_error)?;
        Ok(Termination::Exited(status.code()))
    }
}
