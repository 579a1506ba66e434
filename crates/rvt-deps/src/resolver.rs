//! Managed assembly lookup for one test assembly.
//!
//! Lookup order for a name, first match wins:
//! 1. `<folder>/<name>.dll`, then `<folder>/<name>.exe`
//! 2. the manifest's name map, resolved against each package root in turn
//!
//! A package root is only accepted when every asset of the selected group
//! exists beneath it. Partial package layouts (e.g. stores that drop the
//! reference assemblies) are skipped rather than half-loaded.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::diagnostics::{emit, Diagnostic, DiagnosticSink};
use crate::manifest::{AssetGroup, AssetKind, Library, Manifest};
use crate::paths::{absolute, asset_file_name, asset_stem, resolve_assembly_file, resolve_package_path};
use crate::probe::FileSystemProbe;
use crate::runtime::CompatibleRuntimes;
use crate::settings::ProbeSettings;

const SOURCE: &str = "ManagedAssemblyResolver";

/// Extensions probed in the assembly folder, in order.
const LOCAL_EXTENSIONS: [&str; 2] = ["dll", "exe"];

/// A library together with the asset group selected for this runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub library: Arc<Library>,
    pub group: AssetGroup,
}

/// Resolves assembly names for one assembly folder and optional manifest.
pub struct ManagedAssemblyResolver {
    assembly_folder: PathBuf,
    managed_map: HashMap<String, ManifestEntry>,
    package_roots: Vec<PathBuf>,
    probe: Arc<dyn FileSystemProbe>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl std::fmt::Debug for ManagedAssemblyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedAssemblyResolver")
            .field("assembly_folder", &self.assembly_folder)
            .field("managed_names", &self.managed_map.len())
            .field("package_roots", &self.package_roots)
            .finish()
    }
}

impl ManagedAssemblyResolver {
    /// Build a resolver. The name map is computed here, once per manifest.
    pub fn new(
        assembly_folder: impl Into<PathBuf>,
        manifest: Option<&Manifest>,
        settings: &ProbeSettings,
        probe: Arc<dyn FileSystemProbe>,
        diagnostics: Option<Arc<dyn DiagnosticSink>>,
    ) -> Self {
        let sink = diagnostics.as_deref();
        let managed_map = match manifest {
            Some(manifest) => {
                let compatible =
                    CompatibleRuntimes::for_manifest(manifest, &settings.runtime_identifier);
                emit(sink, || {
                    Diagnostic::note(
                        SOURCE,
                        format!(
                            "Runtime graph: [{}]",
                            quoted(manifest.runtime_graph.iter().map(|c| c.runtime.as_str()))
                        ),
                    )
                });
                emit(sink, || {
                    Diagnostic::note(
                        SOURCE,
                        format!(
                            "Compatible runtimes: [{}]",
                            quoted(compatible.as_slice().iter().map(String::as_str))
                        ),
                    )
                });
                let map = build_asset_map(manifest, &compatible, AssetKind::Runtime);
                emit(sink, || {
                    let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
                    keys.sort_unstable();
                    Diagnostic::note(
                        SOURCE,
                        format!("Managed assembly map includes: {}", quoted(keys.into_iter())),
                    )
                });
                map
            }
            None => HashMap::new(),
        };

        Self {
            assembly_folder: assembly_folder.into(),
            managed_map,
            package_roots: settings.package_roots.clone(),
            probe,
            diagnostics,
        }
    }

    pub fn assembly_folder(&self) -> &Path {
        &self.assembly_folder
    }

    pub fn package_roots(&self) -> &[PathBuf] {
        &self.package_roots
    }

    /// Entry the manifest contributes for `name` (case-insensitive).
    pub fn manifest_entry(&self, name: &str) -> Option<&ManifestEntry> {
        self.managed_map.get(&name.to_lowercase())
    }

    /// Number of names the manifest map can resolve.
    pub fn manifest_names(&self) -> usize {
        self.managed_map.len()
    }

    /// Resolve `name` to an absolute path, or `None`.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        self.local_candidates(name)
            .into_iter()
            .next()
            .or_else(|| self.resolve_from_manifest(name))
    }

    /// Existing `<folder>/<name>.dll` / `.exe` files, in probe order.
    pub fn local_candidates(&self, name: &str) -> Vec<PathBuf> {
        LOCAL_EXTENSIONS
            .iter()
            .map(|ext| self.assembly_folder.join(format!("{}.{}", name, ext)))
            .filter(|path| self.probe.file_exists(path))
            .map(absolute)
            .collect()
    }

    /// Resolve `name` through the manifest map and the package roots.
    pub fn resolve_from_manifest(&self, name: &str) -> Option<PathBuf> {
        let entry = self.manifest_entry(name)?;
        let sink = self.diagnostics.as_deref();

        let Some(paths) = resolve_package_assets(
            self.probe.as_ref(),
            &self.package_roots,
            &entry.library,
            &entry.group,
        ) else {
            emit(sink, || {
                Diagnostic::note(
                    SOURCE,
                    format!(
                        "Found '{}' in dependency map, but unable to resolve a path in [{}]",
                        name,
                        quoted(sorted(&entry.group.asset_paths))
                    ),
                )
            });
            return None;
        };

        let found = paths.iter().find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(asset_stem)
                .is_some_and(|stem| stem.eq_ignore_ascii_case(name))
        });

        match found {
            Some(path) => Some(absolute(path.clone())),
            None => {
                emit(sink, || {
                    let names: Vec<String> =
                        paths.iter().map(|p| p.display().to_string()).collect();
                    Diagnostic::note(
                        SOURCE,
                        format!(
                            "Found a resolved package, but could not map '{}' in [{}]",
                            name,
                            quoted(sorted(&names))
                        ),
                    )
                });
                None
            }
        }
    }
}

/// Build the name → (library, group) map for one asset kind.
///
/// Keys are lower-cased file stems (managed) or file names (native). The
/// first library to contribute a key keeps it; later duplicates are
/// dropped, not merged.
pub fn build_asset_map(
    manifest: &Manifest,
    compatible: &CompatibleRuntimes,
    kind: AssetKind,
) -> HashMap<String, ManifestEntry> {
    let mut map: HashMap<String, ManifestEntry> = HashMap::new();

    for library in &manifest.libraries {
        let Some(group) = compatible.best_group(library.asset_groups(kind)) else {
            continue;
        };
        let shared = Arc::new(library.clone());

        for asset in &group.asset_paths {
            let key = match kind {
                AssetKind::Runtime => asset_stem(asset),
                AssetKind::Native => asset_file_name(asset),
            };
            let Some(key) = key else { continue };

            map.entry(key.to_lowercase()).or_insert_with(|| ManifestEntry {
                library: Arc::clone(&shared),
                group: group.clone(),
            });
        }
    }

    map
}

/// Full paths of every asset in `group`, from the first complete root.
///
/// Only `package` libraries are probed. A root is rejected as soon as one
/// asset is missing beneath it.
pub fn resolve_package_assets(
    probe: &dyn FileSystemProbe,
    package_roots: &[PathBuf],
    library: &Library,
    group: &AssetGroup,
) -> Option<Vec<PathBuf>> {
    if package_roots.is_empty() || !library.is_package() {
        return None;
    }

    package_roots.iter().find_map(|root| {
        let package_path = resolve_package_path(probe, library, root)?;
        group
            .asset_paths
            .iter()
            .map(|asset| resolve_assembly_file(probe, &package_path, asset))
            .collect::<Option<Vec<PathBuf>>>()
    })
}

fn sorted(items: &[String]) -> impl Iterator<Item = &str> {
    let mut refs: Vec<&str> = items.iter().map(String::as_str).collect();
    refs.sort_unstable_by_key(|s| s.to_lowercase());
    refs.into_iter()
}

fn quoted<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items
        .map(|item| format!("'{}'", item))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryFileSystem, RecordingDiagnostics};

    fn package(name: &str, version: &str, assets: &[&str]) -> Library {
        Library {
            name: name.to_string(),
            version: version.to_string(),
            kind: "package".to_string(),
            hash: String::new(),
            serviceable: true,
            path: None,
            dependencies: vec![],
            runtime_assembly_groups: vec![AssetGroup::new(
                "",
                assets.iter().map(|a| a.to_string()).collect(),
            )],
            native_library_groups: vec![],
        }
    }

    fn manifest(libraries: Vec<Library>) -> Manifest {
        Manifest {
            libraries,
            ..Manifest::default()
        }
    }

    fn settings(roots: &[&str]) -> ProbeSettings {
        ProbeSettings::with_package_roots(roots.iter().map(PathBuf::from).collect())
            .runtime_identifier("win-x64")
    }

    #[test]
    fn test_local_dll_wins_before_exe_and_manifest() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/tests/Foo.dll");
        fs.add_file("/tests/Foo.exe");
        fs.add_file("/packages/Foo/1.0/lib/Foo.dll");

        let m = manifest(vec![package("Foo", "1.0", &["lib/Foo.dll"])]);
        let resolver =
            ManagedAssemblyResolver::new("/tests", Some(&m), &settings(&["/packages"]), fs, None);

        assert_eq!(resolver.resolve("Foo"), Some(PathBuf::from("/tests/Foo.dll")));
        assert_eq!(
            resolver.local_candidates("Foo"),
            vec![PathBuf::from("/tests/Foo.dll"), PathBuf::from("/tests/Foo.exe")]
        );
    }

    #[test]
    fn test_exe_is_probed_when_dll_missing() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/tests/Tool.exe");
        let resolver = ManagedAssemblyResolver::new("/tests", None, &settings(&[]), fs, None);
        assert_eq!(resolver.resolve("Tool"), Some(PathBuf::from("/tests/Tool.exe")));
    }

    #[test]
    fn test_resolves_from_package_root() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/packages/Foo/1.0/lib/Foo.dll");
        let m = manifest(vec![package("Foo", "1.0", &["lib/Foo.dll"])]);
        let resolver =
            ManagedAssemblyResolver::new("/tests", Some(&m), &settings(&["/packages"]), fs, None);

        assert_eq!(
            resolver.resolve("foo"),
            Some(PathBuf::from("/packages/Foo/1.0/lib/Foo.dll"))
        );
    }

    #[test]
    fn test_without_manifest_only_local_folder_is_searched() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/packages/Foo/1.0/lib/Foo.dll");
        let resolver =
            ManagedAssemblyResolver::new("/tests", None, &settings(&["/packages"]), fs, None);
        assert_eq!(resolver.manifest_names(), 0);
        assert!(resolver.resolve("Foo").is_none());
    }

    #[test]
    fn test_duplicate_asset_names_first_library_wins() {
        let m = manifest(vec![
            package("First", "1.0", &["lib/Shared.dll"]),
            package("Second", "2.0", &["lib/Shared.dll", "lib/Other.dll"]),
        ]);
        let compatible = CompatibleRuntimes::new("win-x64", &[]);
        let map = build_asset_map(&m, &compatible, AssetKind::Runtime);

        assert_eq!(map.len(), 2);
        assert_eq!(map["shared"].library.name, "First");
        assert_eq!(map["other"].library.name, "Second");
    }

    #[test]
    fn test_duplicate_names_resolve_to_first_library_on_disk() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/packages/First/1.0/lib/Shared.dll");
        fs.add_file("/packages/Second/2.0/lib/Shared.dll");
        let m = manifest(vec![
            package("First", "1.0", &["lib/Shared.dll"]),
            package("Second", "2.0", &["lib/Shared.dll"]),
        ]);
        let resolver =
            ManagedAssemblyResolver::new("/tests", Some(&m), &settings(&["/packages"]), fs, None);
        assert_eq!(
            resolver.resolve("Shared"),
            Some(PathBuf::from("/packages/First/1.0/lib/Shared.dll"))
        );
    }

    #[test]
    fn test_partial_root_is_skipped_for_complete_root() {
        let fs = Arc::new(MemoryFileSystem::new());
        // Root A is missing the reference assembly
        fs.add_file("/a/Foo/1.0/lib/Foo.dll");
        fs.add_file("/b/Foo/1.0/lib/Foo.dll");
        fs.add_file("/b/Foo/1.0/ref/Foo.Abstractions.dll");

        let m = manifest(vec![package(
            "Foo",
            "1.0",
            &["lib/Foo.dll", "ref/Foo.Abstractions.dll"],
        )]);
        let resolver =
            ManagedAssemblyResolver::new("/tests", Some(&m), &settings(&["/a", "/b"]), fs, None);

        assert_eq!(
            resolver.resolve("Foo"),
            Some(PathBuf::from("/b/Foo/1.0/lib/Foo.dll"))
        );
    }

    #[test]
    fn test_incomplete_everywhere_is_not_found() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/a/Foo/1.0/lib/Foo.dll");
        let sink = Arc::new(RecordingDiagnostics::new());
        let m = manifest(vec![package("Foo", "1.0", &["lib/Foo.dll", "lib/Foo.Core.dll"])]);
        let resolver = ManagedAssemblyResolver::new(
            "/tests",
            Some(&m),
            &settings(&["/a"]),
            fs,
            Some(sink.clone()),
        );
        assert!(resolver.resolve("Foo").is_none());
        assert!(sink
            .messages()
            .iter()
            .any(|m| m.contains("unable to resolve a path")));
    }

    #[test]
    fn test_non_package_libraries_are_not_probed_in_package_roots() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/packages/Proj/1.0/Proj.dll");
        let mut lib = package("Proj", "1.0", &["Proj.dll"]);
        lib.kind = "project".to_string();
        let m = manifest(vec![lib]);
        let resolver =
            ManagedAssemblyResolver::new("/tests", Some(&m), &settings(&["/packages"]), fs, None);
        assert!(resolver.manifest_entry("Proj").is_some());
        assert!(resolver.resolve("Proj").is_none());
    }

    #[test]
    fn test_explicit_library_path_is_used() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/packages/foo/1.0.0/lib/Foo.dll");
        let mut lib = package("Foo", "1.0.0", &["lib/Foo.dll"]);
        lib.path = Some("foo/1.0.0".to_string());
        let m = manifest(vec![lib]);
        let resolver =
            ManagedAssemblyResolver::new("/tests", Some(&m), &settings(&["/packages"]), fs, None);
        assert_eq!(
            resolver.resolve("Foo"),
            Some(PathBuf::from("/packages/foo/1.0.0/lib/Foo.dll"))
        );
    }

    #[test]
    fn test_rid_specific_group_is_selected() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/packages/Foo/1.0/runtimes/win/lib/Foo.dll");
        fs.add_file("/packages/Foo/1.0/lib/Foo.dll");
        let mut lib = package("Foo", "1.0", &[]);
        lib.runtime_assembly_groups = vec![
            AssetGroup::new("unix", vec!["runtimes/unix/lib/Foo.dll".to_string()]),
            AssetGroup::new("win", vec!["runtimes/win/lib/Foo.dll".to_string()]),
            AssetGroup::new("", vec!["lib/Foo.dll".to_string()]),
        ];
        let m = Manifest {
            libraries: vec![lib],
            runtime_graph: vec![crate::manifest::RuntimeFallbackChain {
                runtime: "win-x64".to_string(),
                fallbacks: vec!["win".to_string(), "any".to_string()],
            }],
            ..Manifest::default()
        };
        let resolver =
            ManagedAssemblyResolver::new("/tests", Some(&m), &settings(&["/packages"]), fs, None);
        assert_eq!(
            resolver.resolve("Foo"),
            Some(PathBuf::from("/packages/Foo/1.0/runtimes/win/lib/Foo.dll"))
        );
    }

    #[test]
    fn test_library_without_compatible_group_is_not_mapped() {
        let mut lib = package("UnixOnly", "1.0", &[]);
        lib.runtime_assembly_groups =
            vec![AssetGroup::new("unix", vec!["runtimes/unix/UnixOnly.dll".to_string()])];
        let m = manifest(vec![lib]);
        let compatible = CompatibleRuntimes::new("win-x64", &[]);
        assert!(build_asset_map(&m, &compatible, AssetKind::Runtime).is_empty());
    }
}
