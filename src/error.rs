use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors reported by the training and sampling engines.
///
/// Everything here is treated as a programmer or configuration error rather
/// than a transient condition, so there is no retry machinery. The one
/// variant a caller may reasonably recover from is `CheckpointNotFound`,
/// which a fresh run can ignore and a resumed run must treat as fatal.
#[derive(Debug)]
pub enum Error {
    InvalidConfig(String),
    InvalidData(String),
    ShapeMismatch(String),
    CheckpointNotFound(PathBuf),
    Io(io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::InvalidData(msg) => write!(f, "invalid data: {msg}"),
            Error::ShapeMismatch(msg) => write!(f, "shape mismatch: {msg}"),
            Error::CheckpointNotFound(path) => {
                write!(f, "checkpoint not found at {}", path.display())
            }
            Error::Io(err) => write!(f, "io error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}
