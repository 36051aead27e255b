//! Overwrite-then-delete procedure for a single file.
//!
//! [`SecureEraser`] opens a file for writing, covers its whole current length
//! with a replacement pattern one chunk at a time, syncs the data to the
//! operating system, and finally unlinks the file.
//!
//! ## Chunking
//!
//! The scratch buffer is refilled from the [`ReplacementSource`] before every
//! chunk, so a random pattern differs between chunks. For a file of length `L`
//! and chunk size `B` exactly `ceil(L / B)` writes are issued; the last one is
//! `L mod B` bytes long (or `B` when `L` is a multiple of `B`). Empty files are
//! deleted without any write.

use crate::error::SafeWipeError;
use crate::replacement::ReplacementSource;
use crate::reporter::ProgressSink;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, warn};
use zeroize::Zeroizing;

/// Default chunk size (1 MiB)
pub const BUFFER_SIZE: usize = 1024 * 1024;

/// Why a file could not be erased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EraseErrorKind {
    /// File vanished between enumeration and unlink
    TargetMissing,
    /// Permission refused on open, write or delete
    AccessDenied,
    /// Any other I/O failure
    UnclassifiedIo,
}

impl fmt::Display for EraseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TargetMissing => write!(f, "target missing"),
            Self::AccessDenied => write!(f, "access denied"),
            Self::UnclassifiedIo => write!(f, "I/O failure"),
        }
    }
}

/// Terminal result of one erase job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EraseOutcome {
    pub name: String,
    /// False when the file vanished before the erase completed
    pub processed: bool,
    pub success: bool,
    pub error_kind: Option<EraseErrorKind>,
    pub bytes_overwritten: u64,
    pub chunks_written: u64,
}

impl EraseOutcome {
    fn succeeded(name: String, stats: OverwriteStats) -> Self {
        Self {
            name,
            processed: true,
            success: true,
            error_kind: None,
            bytes_overwritten: stats.bytes,
            chunks_written: stats.chunks,
        }
    }

    fn failed(name: String, kind: EraseErrorKind) -> Self {
        Self {
            name,
            processed: kind != EraseErrorKind::TargetMissing,
            success: false,
            error_kind: Some(kind),
            bytes_overwritten: 0,
            chunks_written: 0,
        }
    }
}

/// Counters from one overwrite pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OverwriteStats {
    pub chunks: u64,
    pub bytes: u64,
    /// Length of the final chunk, 0 when nothing was written
    pub last_chunk: usize,
}

/// Write `len` bytes of pattern into `writer`, refilling `buffer` per chunk.
///
/// `on_progress` receives the cumulative offset after each chunk.
pub fn overwrite<W, F>(
    writer: &mut W,
    len: u64,
    source: &dyn ReplacementSource,
    buffer: &mut [u8],
    mut on_progress: F,
) -> io::Result<OverwriteStats>
where
    W: Write + ?Sized,
    F: FnMut(u64),
{
    if buffer.is_empty() && len > 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "overwrite buffer must not be empty",
        ));
    }

    let mut stats = OverwriteStats::default();
    while stats.bytes < len {
        let n = (len - stats.bytes).min(buffer.len() as u64) as usize;
        let chunk = &mut buffer[..n];
        source.fill(chunk);
        writer.write_all(chunk)?;

        stats.bytes += n as u64;
        stats.chunks += 1;
        stats.last_chunk = n;
        on_progress(stats.bytes);
    }

    Ok(stats)
}

/// Erases files with a shared pattern source and progress sink.
#[derive(Clone)]
pub struct SecureEraser {
    source: Arc<dyn ReplacementSource>,
    sink: Arc<dyn ProgressSink>,
    chunk_size: usize,
}

impl SecureEraser {
    pub fn new(source: Arc<dyn ReplacementSource>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            source,
            sink,
            chunk_size: BUFFER_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overwrite and delete `target`, reporting to the sink.
    ///
    /// Never fails: every error is logged and folded into the outcome so a bad
    /// file cannot take down the worker running it. A file that vanished
    /// before the job could finish is reported as skipped, not failed.
    pub fn run(&self, target: &Path) -> EraseOutcome {
        let name = target.display().to_string();

        match self.erase(target, &name) {
            Ok(stats) => {
                debug!(path = %name, bytes = stats.bytes, chunks = stats.chunks, "file erased");
                self.sink.report_finish(&name, true);
                EraseOutcome::succeeded(name, stats)
            }
            Err(SafeWipeError::TargetMissing { .. }) => {
                warn!(path = %name, "file no longer exists, skipping");
                self.sink.report_skip(&name);
                EraseOutcome::failed(name, EraseErrorKind::TargetMissing)
            }
            Err(err) => {
                match &err {
                    SafeWipeError::AccessDenied { .. } => {
                        error!(path = %name, "access denied")
                    }
                    other => error!(path = %name, error = %other, "erase failed"),
                }
                self.sink.report_finish(&name, false);
                EraseOutcome::failed(name, err.kind())
            }
        }
    }

    fn erase(&self, path: &Path, name: &str) -> Result<OverwriteStats, SafeWipeError> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| SafeWipeError::io(path, e))?;

        let len = file
            .metadata()
            .map_err(|e| SafeWipeError::io(path, e))?
            .len();

        let stats = if len == 0 {
            OverwriteStats::default()
        } else {
            let capacity = (self.chunk_size as u64).min(len) as usize;
            let mut buffer = Zeroizing::new(vec![0u8; capacity]);

            let stats = overwrite(&mut file, len, self.source.as_ref(), &mut buffer, |offset| {
                self.sink.report(name, offset as f64 / len as f64)
            })
            .map_err(|e| SafeWipeError::io(path, e))?;

            file.flush().map_err(|e| SafeWipeError::io(path, e))?;
            file.sync_all().map_err(|e| SafeWipeError::io(path, e))?;
            stats
        };

        drop(file);
        fs::remove_file(path).map_err(|e| SafeWipeError::io(path, e))?;
        Ok(stats)
    }
}
