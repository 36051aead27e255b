//! Expansion of command-line arguments into file targets.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Directory levels descended when folders are allowed but not recursion.
pub const DEFAULT_FOLDER_LEVEL: usize = 1;

/// Directory levels descended with recursion enabled.
pub const DEFAULT_RECURSIVE_DEPTH: usize = 5;

/// A file path queued for erasure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileTarget {
    pub path: PathBuf,
}

impl FileTarget {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Key used for progress reporting.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }
}

impl From<PathBuf> for FileTarget {
    fn from(path: PathBuf) -> Self {
        Self::new(path)
    }
}

impl From<&Path> for FileTarget {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for FileTarget {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetOptions {
    /// Expand directory arguments
    pub allow_folders: bool,
    pub recursive: bool,
    /// Deepest directory level (root = 0) descended into when recursive
    pub max_depth: usize,
}

impl Default for TargetOptions {
    fn default() -> Self {
        Self {
            allow_folders: false,
            recursive: false,
            max_depth: DEFAULT_RECURSIVE_DEPTH,
        }
    }
}

impl TargetOptions {
    fn max_level(&self) -> usize {
        if self.recursive {
            self.max_depth
        } else {
            DEFAULT_FOLDER_LEVEL
        }
    }
}

/// Turn raw arguments into file targets.
///
/// Paths that do not exist are passed through so the orchestrator can report
/// them as skipped.
pub fn collect_targets<I, P>(args: I, options: TargetOptions) -> Vec<FileTarget>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut targets = Vec::new();

    for arg in args {
        let path = arg.as_ref();
        if !path.is_dir() {
            targets.push(FileTarget::new(path));
            continue;
        }

        if !options.allow_folders {
            warn!(
                path = %path.display(),
                "is a folder, use --folders to process folders and --recursive to descend"
            );
            continue;
        }

        let before = targets.len();
        expand_dir(path, options.max_level(), &mut targets);
        debug!(
            path = %path.display(),
            files = targets.len() - before,
            "expanded folder"
        );
    }

    targets
}

fn expand_dir(root: &Path, max_level: usize, out: &mut Vec<FileTarget>) {
    // Files inside a directory at level n sit at walk depth n + 1
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_level + 1)
        .sort_by_file_name();

    for entry in walker {
        match entry {
            Ok(entry) if entry.file_type().is_file() => {
                out.push(FileTarget::new(entry.into_path()));
            }
            Ok(_) => {}
            Err(e) => warn!(path = %root.display(), error = %e, "failed to read folder entry"),
        }
    }
}
