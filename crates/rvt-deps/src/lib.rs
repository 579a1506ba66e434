//! RVT Deps - dependency manifest resolution for test assemblies
//!
//! This crate is the resolution layer of the RVT test runner. It locates
//! managed assemblies (and, optionally, native libraries) for a test
//! assembly using the assembly's `.deps.json` manifest instead of the
//! default loader.
//!
//! ## Layer 0 - Resolution
//!
//! - `probe`: file-system existence checks behind a trait
//! - `paths`: joining package roots, package paths and asset paths
//! - `manifest`: `.deps.json` parsing into an immutable library graph
//! - `resolver`: local-directory and package-root assembly lookup
//! - `cache`: at-most-once memoisation of resolution results
//! - `registry`: scoped installation of resolvers for one assembly's run
//! - `native`: optional native/unmanaged library lookup

pub mod cache;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod fakes;
pub mod loader;
pub mod manifest;
pub mod native;
pub mod paths;
pub mod probe;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod settings;

pub use cache::AssemblyResolutionCache;
pub use context::DependencyContextResolver;
pub use diagnostics::{Diagnostic, DiagnosticSink, TracingDiagnostics};
pub use error::ManifestError;
pub use loader::{AssemblyLoader, LoadedAssembly, PathLoader};
pub use manifest::{AssetGroup, AssetKind, Dependency, Library, Manifest, RuntimeFallbackChain};
pub use native::NativeLibraryResolver;
pub use probe::{FileSystemProbe, RealFileSystem};
pub use registry::{ResolveStrategy, ResolverRegistry, ResolverSubscription};
pub use resolver::{ManagedAssemblyResolver, ManifestEntry};
pub use runtime::{current_runtime_identifier, CompatibleRuntimes};
pub use settings::{ProbeSettings, PACKAGES_ENV_VAR};
