use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::eraser::EraseErrorKind;

/// Error types for SafeWipe operations
#[derive(Debug, Error)]
pub enum SafeWipeError {
    /// Target disappeared between enumeration and processing
    #[error("Target missing: {}", path.display())]
    TargetMissing { path: PathBuf },

    /// Write or delete permission refused
    #[error("Access denied: {}", path.display())]
    AccessDenied { path: PathBuf },

    /// Any other I/O failure while overwriting or deleting
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scheduler or orchestrator used while a batch is still draining
    #[error("Busy: {0}")]
    Busy(String),

    /// No async runtime available to run workers on
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),
}

impl SafeWipeError {
    /// Classify an I/O error against the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        let path = path.as_ref().to_path_buf();
        match source.kind() {
            std::io::ErrorKind::NotFound => Self::TargetMissing { path },
            std::io::ErrorKind::PermissionDenied => Self::AccessDenied { path },
            _ => Self::Io { path, source },
        }
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Per-file classification used in erase outcomes.
    pub fn kind(&self) -> EraseErrorKind {
        match self {
            Self::TargetMissing { .. } => EraseErrorKind::TargetMissing,
            Self::AccessDenied { .. } => EraseErrorKind::AccessDenied,
            _ => EraseErrorKind::UnclassifiedIo,
        }
    }
}
