//! Dependency-context resolution for one test assembly.
//!
//! Combines the `ManagedAssemblyResolver` for the assembly's folder and
//! `.deps.json` with the shared `AssemblyResolutionCache` and a loader.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::AssemblyResolutionCache;
use crate::diagnostics::{emit, Diagnostic, DiagnosticSink};
use crate::error::ManifestError;
use crate::loader::{AssemblyLoader, LoadedAssembly};
use crate::manifest::Manifest;
use crate::probe::FileSystemProbe;
use crate::registry::ResolveStrategy;
use crate::resolver::ManagedAssemblyResolver;
use crate::settings::ProbeSettings;

const SOURCE: &str = "DependencyContextResolver";

/// Resolver strategy installed while one assembly's tests run.
pub struct DependencyContextResolver {
    resolver: ManagedAssemblyResolver,
    cache: Arc<AssemblyResolutionCache>,
    loader: Arc<dyn AssemblyLoader>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
}

impl std::fmt::Debug for DependencyContextResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyContextResolver")
            .field("resolver", &self.resolver)
            .finish()
    }
}

impl DependencyContextResolver {
    pub fn new(
        resolver: ManagedAssemblyResolver,
        cache: Arc<AssemblyResolutionCache>,
        loader: Arc<dyn AssemblyLoader>,
    ) -> Self {
        Self {
            resolver,
            cache,
            loader,
            diagnostics: None,
        }
    }

    pub fn with_diagnostics(mut self, sink: Option<Arc<dyn DiagnosticSink>>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Resolver for the assembly at `assembly_path`.
    ///
    /// Reads `<folder>/<stem>.deps.json` when present. A missing or
    /// malformed manifest is reported as a diagnostic and leaves only
    /// folder-local resolution enabled.
    pub fn for_assembly(
        assembly_path: &Path,
        settings: &ProbeSettings,
        probe: Arc<dyn FileSystemProbe>,
        cache: Arc<AssemblyResolutionCache>,
        loader: Arc<dyn AssemblyLoader>,
        diagnostics: Option<Arc<dyn DiagnosticSink>>,
    ) -> Self {
        let folder = assembly_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let manifest_path = manifest_path_for(assembly_path);

        let manifest = if probe.file_exists(&manifest_path) {
            read_manifest(&manifest_path, diagnostics.as_deref())
        } else {
            emit(diagnostics.as_deref(), || {
                Diagnostic::note(
                    SOURCE,
                    format!(
                        "Skipping manifest resolution for '{}': File not found",
                        manifest_path.display()
                    ),
                )
            });
            None
        };

        let resolver = ManagedAssemblyResolver::new(
            folder,
            manifest.as_ref(),
            settings,
            probe,
            diagnostics.clone(),
        );
        Self::new(resolver, cache, loader).with_diagnostics(diagnostics)
    }

    pub fn resolver(&self) -> &ManagedAssemblyResolver {
        &self.resolver
    }

    /// Load `name` through the cache, resolving it at most once.
    pub fn load_managed(&self, name: &str) -> Option<LoadedAssembly> {
        self.cache
            .load_or_resolve_with(name, self.diagnostics.as_deref(), || self.resolve_and_load(name))
    }

    fn resolve_and_load(&self, name: &str) -> Option<LoadedAssembly> {
        for candidate in self.resolver.local_candidates(name) {
            if let Some(loaded) = self.loader.load(&candidate) {
                return Some(loaded);
            }
        }

        let path = self.resolver.resolve_from_manifest(name)?;
        let loaded = self.loader.load(&path);
        if loaded.is_none() {
            emit(self.diagnostics.as_deref(), || {
                Diagnostic::note(
                    SOURCE,
                    format!(
                        "Found assembly path '{}' but the assembly would not load",
                        path.display()
                    ),
                )
            });
        }
        loaded
    }
}

impl ResolveStrategy for DependencyContextResolver {
    fn resolve(&self, name: &str) -> Option<LoadedAssembly> {
        self.load_managed(name)
    }
}

/// `<folder>/<stem>.deps.json` for an assembly path.
pub fn manifest_path_for(assembly_path: &Path) -> PathBuf {
    let stem = assembly_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    assembly_path.with_file_name(format!("{}.deps.json", stem))
}

fn read_manifest(path: &Path, diagnostics: Option<&dyn DiagnosticSink>) -> Option<Manifest> {
    match Manifest::read_file(path) {
        Ok(manifest) => Some(manifest),
        Err(ManifestError::NotFound(_)) => {
            emit(diagnostics, || {
                Diagnostic::note(
                    SOURCE,
                    format!("Skipping manifest resolution for '{}': File not found", path.display()),
                )
            });
            None
        }
        Err(err) => {
            emit(diagnostics, || {
                Diagnostic::note(
                    SOURCE,
                    format!(
                        "Skipping manifest resolution for '{}': File appears to be malformed ({})",
                        path.display(),
                        err
                    ),
                )
            });
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{MemoryFileSystem, RecordingDiagnostics};
    use crate::loader::PathLoader;
    use crate::probe::RealFileSystem;

    #[test]
    fn test_manifest_path_for_assembly() {
        assert_eq!(
            manifest_path_for(Path::new("/bin/My.Tests.dll")),
            PathBuf::from("/bin/My.Tests.deps.json")
        );
    }

    #[test]
    fn test_missing_manifest_falls_back_to_folder() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/bin/Tests.dll");
        fs.add_file("/bin/Helper.dll");
        let sink = Arc::new(RecordingDiagnostics::new());

        let ctx = DependencyContextResolver::for_assembly(
            Path::new("/bin/Tests.dll"),
            &ProbeSettings::with_package_roots(vec![]),
            fs,
            Arc::new(AssemblyResolutionCache::new()),
            Arc::new(PathLoader),
            Some(sink.clone()),
        );

        assert_eq!(ctx.load_managed("Helper").unwrap().path, PathBuf::from("/bin/Helper.dll"));
        assert!(sink.messages().iter().any(|m| m.contains("File not found")));
    }

    #[test]
    fn test_malformed_manifest_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let assembly = tmp.path().join("Tests.dll");
        std::fs::write(&assembly, b"MZ").unwrap();
        std::fs::write(tmp.path().join("Tests.deps.json"), b"{ not json").unwrap();
        let sink = Arc::new(RecordingDiagnostics::new());

        let ctx = DependencyContextResolver::for_assembly(
            &assembly,
            &ProbeSettings::with_package_roots(vec![]),
            Arc::new(RealFileSystem),
            Arc::new(AssemblyResolutionCache::new()),
            Arc::new(PathLoader),
            Some(sink.clone()),
        );

        assert_eq!(ctx.resolver().manifest_names(), 0);
        assert!(sink.messages().iter().any(|m| m.contains("malformed")));
    }

    #[test]
    fn test_loader_refusal_falls_through_to_manifest() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/bin/Foo.dll");
        fs.add_file("/packages/Foo/1.0/lib/Foo.dll");
        let manifest = Manifest::parse_str(
            r#"{
              "targets": { "t": { "Foo/1.0": { "runtime": { "lib/Foo.dll": {} } } } },
              "libraries": { "Foo/1.0": { "type": "package" } }
            }"#,
        )
        .unwrap();
        let resolver = ManagedAssemblyResolver::new(
            "/bin",
            Some(&manifest),
            &ProbeSettings::with_package_roots(vec![PathBuf::from("/packages")]),
            fs,
            None,
        );
        let refuse_local = |path: &Path| {
            (!path.starts_with("/bin")).then(|| LoadedAssembly::from_path(path))
        };
        let ctx = DependencyContextResolver::new(
            resolver,
            Arc::new(AssemblyResolutionCache::new()),
            Arc::new(refuse_local),
        );

        assert_eq!(
            ctx.load_managed("Foo").unwrap().path,
            PathBuf::from("/packages/Foo/1.0/lib/Foo.dll")
        );
    }

    #[test]
    fn test_loader_refusal_everywhere_is_cached_not_found() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.add_file("/bin/Foo.dll");
        let resolver = ManagedAssemblyResolver::new(
            "/bin",
            None,
            &ProbeSettings::with_package_roots(vec![]),
            fs.clone(),
            None,
        );
        let cache = Arc::new(AssemblyResolutionCache::new());
        let refuse_all = |_: &Path| -> Option<LoadedAssembly> { None };
        let ctx = DependencyContextResolver::new(resolver, cache.clone(), Arc::new(refuse_all));

        assert!(ctx.load_managed("Foo").is_none());
        assert_eq!(cache.get("Foo"), Some(None));
    }
}
