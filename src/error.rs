use std::{io, path::PathBuf};

/// Errors that can occur when using the rotating log.
#[derive(Debug, thiserror::Error)]
pub enum RotateLogError {
    #[error("Invalid path template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },
    #[error("Failed to create directory '{0}': {1}")]
    CreateDirectoryFailed(PathBuf, String),
    #[error("Failed to create file '{0}': {1}")]
    CreateFileFailed(PathBuf, String),
    #[error("Failed to set file permissions for '{path}': {error}")]
    SetFilePermissionsError { path: PathBuf, error: String },
    #[error("Failed to link '{link}' to '{target}': {error}")]
    LinkFailed { link: PathBuf, target: PathBuf, error: String },
    #[error("Failed to spawn rotation scheduler: {0}")]
    SpawnSchedulerFailed(String),
    #[error("Rotating log is closed")]
    Closed,
    #[error("File IO error: {0}")]
    FileIOError(#[from] io::Error),
}

impl RotateLogError {
    /// The error handed out by `io::Write` once the log has been closed.
    #[allow(clippy::io_other_error)]
    pub(crate) fn closed_io() -> io::Error {
        io::Error::new(io::ErrorKind::Other, RotateLogError::Closed)
    }
}

/// Returns true if `err` was produced by writing to a closed [`RotateLog`].
///
/// [`RotateLog`]: crate::RotateLog
pub fn is_closed(err: &io::Error) -> bool {
    matches!(
        err.get_ref().and_then(|inner| inner.downcast_ref::<RotateLogError>()),
        Some(RotateLogError::Closed)
    )
}
