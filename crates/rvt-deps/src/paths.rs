//! Joining probe roots with package and asset paths.

use std::path::{Path, PathBuf};

use crate::manifest::Library;
use crate::probe::FileSystemProbe;

/// Turn a manifest-relative path (`lib/net46/Foo.dll`) into a native path.
pub fn relative_asset_path(asset: &str) -> PathBuf {
    asset
        .split(['/', '\\'])
        .filter(|part| !part.is_empty())
        .collect()
}

/// Package directory of `library` relative to a package root.
///
/// The explicit manifest path wins, otherwise `<name>/<version>`.
pub fn package_relative_path(library: &Library) -> PathBuf {
    match &library.path {
        Some(path) => relative_asset_path(path),
        None => Path::new(&library.name).join(&library.version),
    }
}

/// `base/relative` if it exists as a file.
pub fn resolve_assembly_file(
    probe: &dyn FileSystemProbe,
    base: &Path,
    relative: &str,
) -> Option<PathBuf> {
    let full = base.join(relative_asset_path(relative));
    probe.file_exists(&full).then_some(full)
}

/// The library's package directory under `root`, if that directory exists.
pub fn resolve_package_path(
    probe: &dyn FileSystemProbe,
    library: &Library,
    root: &Path,
) -> Option<PathBuf> {
    let full = root.join(package_relative_path(library));
    probe.dir_exists(&full).then_some(full)
}

/// File stem of a manifest asset path, e.g. `Foo` for `lib/Foo.dll`.
pub fn asset_stem(asset: &str) -> Option<&str> {
    let name = asset_file_name(asset)?;
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => Some(stem),
        _ => Some(name),
    }
}

/// File name of a manifest asset path, e.g. `Foo.dll` for `lib/Foo.dll`.
pub fn asset_file_name(asset: &str) -> Option<&str> {
    asset.rsplit(['/', '\\']).next().filter(|name| !name.is_empty())
}

/// Make `path` absolute without touching the file system.
pub fn absolute(path: PathBuf) -> PathBuf {
    std::path::absolute(&path).unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryFileSystem;

    fn library(path: Option<&str>) -> Library {
        Library {
            name: "Foo".to_string(),
            version: "1.0".to_string(),
            kind: "package".to_string(),
            hash: String::new(),
            serviceable: false,
            path: path.map(str::to_string),
            dependencies: vec![],
            runtime_assembly_groups: vec![],
            native_library_groups: vec![],
        }
    }

    #[test]
    fn test_package_relative_path_prefers_explicit_path() {
        assert_eq!(
            package_relative_path(&library(Some("foo/1.0.0"))),
            Path::new("foo").join("1.0.0")
        );
        assert_eq!(package_relative_path(&library(None)), Path::new("Foo").join("1.0"));
    }

    #[test]
    fn test_resolve_package_path_requires_directory() {
        let fs = MemoryFileSystem::new();
        let root = Path::new("/packages");
        assert!(resolve_package_path(&fs, &library(None), root).is_none());

        fs.add_file("/packages/Foo/1.0/lib/Foo.dll");
        assert_eq!(
            resolve_package_path(&fs, &library(None), root),
            Some(root.join("Foo").join("1.0"))
        );
    }

    #[test]
    fn test_resolve_assembly_file_checks_existence() {
        let fs = MemoryFileSystem::new();
        let base = Path::new("/packages/Foo/1.0");
        assert!(resolve_assembly_file(&fs, base, "lib/Foo.dll").is_none());

        fs.add_file("/packages/Foo/1.0/lib/Foo.dll");
        assert_eq!(
            resolve_assembly_file(&fs, base, "lib/Foo.dll"),
            Some(base.join("lib").join("Foo.dll"))
        );
    }

    #[test]
    fn test_asset_stem_and_file_name() {
        assert_eq!(asset_stem("lib/netstandard2.0/Foo.Bar.dll"), Some("Foo.Bar"));
        assert_eq!(asset_file_name("runtimes/win/native/e_sqlite3.dll"), Some("e_sqlite3.dll"));
        assert_eq!(asset_stem("Tests.dll"), Some("Tests"));
        assert_eq!(asset_stem("lib/"), None);
    }
}
