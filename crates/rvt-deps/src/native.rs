//! Native-library resolution from a manifest's native asset groups.
//!
//! Separate from managed resolution: nothing in the run pipeline calls this
//! unless a framework collaborator asks for native libraries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::diagnostics::{emit, Diagnostic, DiagnosticSink};
use crate::manifest::{AssetKind, Manifest};
use crate::paths::absolute;
use crate::probe::FileSystemProbe;
use crate::resolver::{build_asset_map, resolve_package_assets, ManifestEntry};
use crate::runtime::CompatibleRuntimes;
use crate::settings::ProbeSettings;

const SOURCE: &str = "NativeLibraryResolver";

/// File name formats tried for a bare native name on `os`.
pub fn platform_formats(os: &str) -> &'static [&'static str] {
    match os {
        "windows" => &["{name}", "{name}.dll"],
        "macos" => &["{name}", "lib{name}.dylib", "{name}.dylib"],
        _ => &["{name}", "lib{name}.so", "{name}.so"],
    }
}

/// Formats for the platform this binary was built for.
pub fn native_library_formats() -> &'static [&'static str] {
    platform_formats(std::env::consts::OS)
}

/// Resolves native library names to absolute paths under the package roots.
pub struct NativeLibraryResolver {
    native_map: HashMap<String, ManifestEntry>,
    package_roots: Vec<PathBuf>,
    formats: &'static [&'static str],
    probe: Arc<dyn FileSystemProbe>,
    diagnostics: Option<Arc<dyn DiagnosticSink>>,
    resolved: Mutex<HashMap<String, Option<PathBuf>>>,
}

impl std::fmt::Debug for NativeLibraryResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeLibraryResolver")
            .field("native_names", &self.native_map.len())
            .field("formats", &self.formats)
            .finish()
    }
}

impl NativeLibraryResolver {
    pub fn new(
        manifest: &Manifest,
        settings: &ProbeSettings,
        probe: Arc<dyn FileSystemProbe>,
        diagnostics: Option<Arc<dyn DiagnosticSink>>,
    ) -> Self {
        let compatible = CompatibleRuntimes::for_manifest(manifest, &settings.runtime_identifier);
        let native_map = build_asset_map(manifest, &compatible, AssetKind::Native);
        emit(diagnostics.as_deref(), || {
            let mut keys: Vec<String> = native_map.keys().map(|k| format!("'{}'", k)).collect();
            keys.sort_unstable();
            Diagnostic::note(
                SOURCE,
                format!("Unmanaged assembly map includes: {}", keys.join(",")),
            )
        });

        Self {
            native_map,
            package_roots: settings.package_roots.clone(),
            formats: native_library_formats(),
            probe,
            diagnostics,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Override the platform format table.
    pub fn with_formats(mut self, formats: &'static [&'static str]) -> Self {
        self.formats = formats;
        self
    }

    /// Number of native file names the manifest can resolve.
    pub fn native_names(&self) -> usize {
        self.native_map.len()
    }

    /// Resolve a bare native name (`sqlite3`) to an absolute file path.
    /// Outcomes, including not-found, are memoised per name.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let key = name.to_lowercase();
        if let Some(cached) = self.lock().get(&key) {
            return cached.clone();
        }

        let outcome = self
            .formats
            .iter()
            .map(|format| format.replace("{name}", name))
            .find_map(|file_name| self.resolve_file_name(&file_name));

        if outcome.is_none() {
            emit(self.diagnostics.as_deref(), || {
                Diagnostic::note(SOURCE, format!("'{}' not found in native asset map", name))
            });
        }
        self.lock().entry(key).or_insert(outcome).clone()
    }

    fn resolve_file_name(&self, file_name: &str) -> Option<PathBuf> {
        let entry = self.native_map.get(&file_name.to_lowercase())?;
        let paths = resolve_package_assets(
            self.probe.as_ref(),
            &self.package_roots,
            &entry.library,
            &entry.group,
        )?;
        paths
            .into_iter()
            .find(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(file_name))
            })
            .map(absolute)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<PathBuf>>> {
        self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
