//! Abstractions over where kernel pseudo-files are read from.
//!
//! The `ProcSource` trait lets the counter reader work against the real
//! `/proc` tree, a fixture directory, or an in-memory table in tests.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Source of kernel pseudo-file contents.
///
/// Paths are relative to the proc root, e.g. `stat` or `net/dev`.
pub trait ProcSource: Send + Sync {
    /// Reads the entire contents of a pseudo-file as a string.
    fn read_to_string(&self, relative: &Path) -> io::Result<String>;

    /// Full path for log and error messages.
    fn display_path(&self, relative: &Path) -> PathBuf;
}

impl<T: ProcSource + ?Sized> ProcSource for Arc<T> {
    fn read_to_string(&self, relative: &Path) -> io::Result<String> {
        (**self).read_to_string(relative)
    }

    fn display_path(&self, relative: &Path) -> PathBuf {
        (**self).display_path(relative)
    }
}

/// Reads from a directory on disk, `/proc` by default.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    /// Reader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory pseudo-files are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new(crate::DEFAULT_PROC_ROOT)
    }
}

impl ProcSource for ProcFs {
    fn read_to_string(&self, relative: &Path) -> io::Result<String> {
        std::fs::read_to_string(self.root.join(relative))
    }

    fn display_path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }
}

/// In-memory pseudo-files, swappable between polls.
#[derive(Debug, Default)]
pub struct InMemoryProc {
    files: Mutex<HashMap<PathBuf, String>>,
}

impl InMemoryProc {
    /// Empty table; every read fails with `NotFound`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace (or create) the contents of one pseudo-file.
    pub fn set(&self, relative: impl Into<PathBuf>, contents: impl Into<String>) {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.insert(relative.into(), contents.into());
    }

    /// Drop one pseudo-file so the next read fails.
    pub fn remove(&self, relative: impl AsRef<Path>) {
        let mut files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.remove(relative.as_ref());
    }
}

impl ProcSource for InMemoryProc {
    fn read_to_string(&self, relative: &Path) -> io::Result<String> {
        let files = self.files.lock().unwrap_or_else(|e| e.into_inner());
        files.get(relative).cloned().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} not present", relative.display()),
            )
        })
    }

    fn display_path(&self, relative: &Path) -> PathBuf {
        Path::new("memory:").join(relative)
    }
}
