use std::{
    error::Error as StdError,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

/// The top-level result type for the harness and the stores it drives.
pub type Result<T> = std::result::Result<T, Error>;

/// An Error type encapsulating the ways a crash trial, or the store
/// underneath it, can go wrong.
#[derive(Debug)]
pub enum Error {
    /// A read or write error has happened when interacting with the file
    /// system.
    Io(io::Error),
    /// The store found its durable files damaged while recovering.
    Corruption {
        /// The store directory.
        path: PathBuf,
        /// What the store reported.
        reason: String,
    },
    /// Another handle already holds the store's directory lock.
    Locked(PathBuf),
    /// A trial fixture directory could not be cleared or moved aside.
    Fixture(PathBuf, io::Error),
    /// The requested write strategy is not registered.
    UnknownStrategy(String),
    /// The run selected zero write strategies.
    NoStrategies,
    /// The writer child was started with an unusable environment.
    InvalidInvocation(String),
    /// A recovered key holds a value other than the one it was written with.
    Mismatch {
        /// Stream index of the entry.
        index: u64,
        /// The key that was looked up.
        key: Vec<u8>,
        /// The value the stream generated for `key`.
        expected: Vec<u8>,
        /// The value the store returned.
        actual: Vec<u8>,
    },
    /// An unexpected bug has happened inside the harness itself.
    ReportableBug(String),
}

impl Error {
    /// Returns `true` for errors that invalidate the whole run rather than a
    /// single trial. A locked store during verification means the writer
    /// child was not reaped, which is a harness bug.
    pub fn is_fatal(&self) -> bool {
        use self::Error::*;

        match self {
            Locked(_)
            | Fixture(..)
            | UnknownStrategy(_)
            | NoStrategies
            | InvalidInvocation(_)
            | ReportableBug(_) => true,
            Io(_) | Corruption { .. } | Mismatch { .. } => false,
        }
    }
}

impl Clone for Error {
    fn clone(&self) -> Self {
        use self::Error::*;

        match self {
            Io(ioe) => Io(io::Error::new(ioe.kind(), format!("{:?}", ioe))),
            Corruption { path, reason } => {
                Corruption { path: path.clone(), reason: reason.clone() }
            }
            Locked(path) => Locked(path.clone()),
            Fixture(path, ioe) => Fixture(
                path.clone(),
                io::Error::new(ioe.kind(), format!("{:?}", ioe)),
            ),
            UnknownStrategy(name) => UnknownStrategy(name.clone()),
            NoStrategies => NoStrategies,
            InvalidInvocation(why) => InvalidInvocation(why.clone()),
            Mismatch { index, key, expected, actual } => Mismatch {
                index: *index,
                key: key.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            ReportableBug(what) => ReportableBug(what.clone()),
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(io_error: io::Error) -> Self {
        Error::Io(io_error)
    }
}

impl From<Error> for io::Error {
    fn from(error: Error) -> io::Error {
        use self::Error::*;

        match error {
            Io(ioe) => ioe,
            Locked(path) => io::Error::new(
                io::ErrorKind::WouldBlock,
                format!("store at {:?} is locked by another process", path),
            ),
            other => io::Error::new(io::ErrorKind::Other, other.to_string()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(ioe) | Error::Fixture(_, ioe) => Some(ioe),
            _ => None,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::Error::*;

        match self {
            Io(e) => write!(f, "IO error: {}", e),
            Corruption { path, reason } => {
                write!(f, "Corruption detected in {:?}: {}", path, reason)
            }
            Locked(path) => write!(
                f,
                "store directory {:?} is locked by another process",
                path
            ),
            Fixture(path, e) => {
                write!(f, "unable to prepare fixture {:?}: {}", path, e)
            }
            UnknownStrategy(name) => write!(f, "unknown test {:?}", name),
            NoStrategies => {
                write!(f, "no tests to run, use --test to select tests")
            }
            InvalidInvocation(why) => {
                write!(f, "invalid writer invocation: {}", why)
            }
            Mismatch { index, key, expected, actual } => write!(
                f,
                "mismatch at index {} for key {}: want {}, found {}",
                index,
                hex(key),
                hex(expected),
                hex(actual)
            ),
            ReportableBug(what) => write!(
                f,
                "Unexpected bug has happened: {}. \
                 PLEASE REPORT THIS BUG!",
                what
            ),
        }
    }
}

pub(crate) fn hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    let mut ret = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(ret, "{:02x}", byte);
    }
    ret
}
