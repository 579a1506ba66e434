//! File-system existence checks.
//!
//! Resolution only ever asks "is there a file here" and "is there a
//! directory here". Keeping those two questions behind a trait lets the
//! resolver run against an in-memory layout in tests (see `fakes`).

use std::path::Path;

/// Existence checks used by every resolution step.
pub trait FileSystemProbe: Send + Sync {
    /// Whether `path` exists and is a regular file.
    fn file_exists(&self, path: &Path) -> bool;

    /// Whether `path` exists and is a directory.
    fn dir_exists(&self, path: &Path) -> bool;
}

/// Probe backed by the real file system.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystemProbe for RealFileSystem {
    fn file_exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn dir_exists(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_real_file_system_distinguishes_files_and_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("A.dll");
        std::fs::write(&file, b"MZ").unwrap();

        let probe = RealFileSystem;
        assert!(probe.file_exists(&file));
        assert!(!probe.dir_exists(&file));
        assert!(probe.dir_exists(tmp.path()));
        assert!(!probe.file_exists(tmp.path()));
        assert!(!probe.file_exists(&tmp.path().join("missing.dll")));
    }
}
