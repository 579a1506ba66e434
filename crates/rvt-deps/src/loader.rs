//! Turning a resolved path into a loaded-assembly handle.

use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::paths::asset_stem;

/// Handle for an assembly that a loader accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LoadedAssembly {
    /// Simple assembly name (file stem).
    pub name: String,

    /// Absolute path the assembly was loaded from.
    pub path: PathBuf,
}

impl LoadedAssembly {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(asset_stem)
            .unwrap_or_default()
            .to_string();
        Self { name, path }
    }
}

/// Loads an assembly from a path found by the resolver.
///
/// Returning `None` means the file exists but would not load; resolution
/// then moves on to its next candidate.
pub trait AssemblyLoader: Send + Sync {
    fn load(&self, path: &Path) -> Option<LoadedAssembly>;
}

/// Loader that accepts every path the resolver produced.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathLoader;

impl AssemblyLoader for PathLoader {
    fn load(&self, path: &Path) -> Option<LoadedAssembly> {
        Some(LoadedAssembly::from_path(path))
    }
}

impl<F> AssemblyLoader for F
where
    F: Fn(&Path) -> Option<LoadedAssembly> + Send + Sync,
{
    fn load(&self, path: &Path) -> Option<LoadedAssembly> {
        self(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loaded_assembly_name_is_stem() {
        let loaded = LoadedAssembly::from_path("/bin/Foo.Bar.dll");
        assert_eq!(loaded.name, "Foo.Bar");
        assert_eq!(loaded.path, PathBuf::from("/bin/Foo.Bar.dll"));
    }

    #[test]
    fn test_closure_loader() {
        let refuse_exe = |path: &Path| {
            (path.extension().and_then(|e| e.to_str()) != Some("exe"))
                .then(|| LoadedAssembly::from_path(path))
        };
        assert!(refuse_exe.load(Path::new("/bin/A.dll")).is_some());
        assert!(refuse_exe.load(Path::new("/bin/A.exe")).is_none());
    }
}
