use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid scan target {}: {reason}", .path.display())]
    InvalidTarget { path: PathBuf, reason: String },

    #[error("Unable to read {}: {source}", .path.display())]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Signature fetch failed: {0}")]
    SignatureFetchFailed(String),

    #[error("A scan is already in progress")]
    AlreadyRunning,

    #[error("Failed to quarantine {}: {source}", .path.display())]
    QuarantineMoveFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to delete {}: {source}", .path.display())]
    DeleteFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Deleting matched files requires explicit confirmation")]
    ConfirmationRequired,

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("{0}")]
    Other(String),
}
