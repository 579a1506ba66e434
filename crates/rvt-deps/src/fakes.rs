//! In-memory fakes for resolution traits (testing only)
//!
//! Provides `MemoryFileSystem` and `RecordingDiagnostics` that satisfy the
//! trait contracts without touching the real file system.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::probe::FileSystemProbe;

// ---------------------------------------------------------------------------
// MemoryFileSystem
// ---------------------------------------------------------------------------

/// File system probe over an in-memory set of files and directories.
///
/// Every `file_exists` / `dir_exists` call is counted, so tests can assert
/// that a cached resolution never touches the probe again.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashSet<PathBuf>>,
    dirs: Mutex<HashSet<PathBuf>>,
    probes: AtomicUsize,
}

impl MemoryFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file and all of its ancestor directories.
    pub fn add_file(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut dirs = self.dirs.lock().unwrap();
        for ancestor in path.ancestors().skip(1) {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
        self.files.lock().unwrap().insert(path.to_path_buf());
    }

    /// Add an empty directory and its ancestors.
    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut dirs = self.dirs.lock().unwrap();
        for ancestor in path.as_ref().ancestors() {
            if ancestor.as_os_str().is_empty() {
                break;
            }
            dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Remove a file; its directories stay.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        self.files.lock().unwrap().remove(path.as_ref());
    }

    /// Number of probe calls made so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn reset_probe_count(&self) {
        self.probes.store(0, Ordering::SeqCst);
    }
}

impl FileSystemProbe for MemoryFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.files.lock().unwrap().contains(path)
    }

    fn dir_exists(&self, path: &Path) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.dirs.lock().unwrap().contains(path)
    }
}

// ---------------------------------------------------------------------------
// RecordingDiagnostics
// ---------------------------------------------------------------------------

/// Diagnostic sink that keeps every diagnostic in arrival order.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    recorded: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.recorded.lock().unwrap().clone()
    }

    /// Rendered form of every diagnostic.
    pub fn messages(&self) -> Vec<String> {
        self.recorded
            .lock()
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        self.recorded.lock().unwrap().push(diagnostic.clone());
    }
}
