//! Integration tests for manifest-driven resolution on a real directory tree.

use rvt_deps::fakes::MemoryFileSystem;
use rvt_deps::{
    AssemblyResolutionCache, DependencyContextResolver, PathLoader, ProbeSettings, RealFileSystem,
    ResolverRegistry,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const FOO_MANIFEST: &str = r#"{
  "runtimeTarget": { "name": ".NETCoreApp,Version=v8.0" },
  "targets": {
    ".NETCoreApp,Version=v8.0": {
      "Foo/1.0": {
        "dependencies": { "Bar": "2.0" },
        "runtime": { "lib/Foo.dll": {} }
      },
      "Bar/2.0": {
        "runtime": { "lib/net8.0/Bar.dll": {}, "lib/net8.0/Bar.Extras.dll": {} }
      }
    }
  },
  "libraries": {
    "Foo/1.0": { "type": "package", "sha512": "sha512-foo", "serviceable": true },
    "Bar/2.0": { "type": "package", "path": "bar/2.0" }
  }
}"#;

struct Layout {
    _tmp: tempfile::TempDir,
    assembly: PathBuf,
    packages: PathBuf,
}

fn layout() -> Layout {
    let tmp = tempfile::tempdir().expect("tempdir");
    let bin = tmp.path().join("bin");
    let packages = tmp.path().join("packages");
    fs::create_dir_all(&bin).unwrap();
    fs::create_dir_all(packages.join("Foo/1.0/lib")).unwrap();
    fs::create_dir_all(packages.join("bar/2.0/lib/net8.0")).unwrap();

    let assembly = bin.join("My.Tests.dll");
    fs::write(&assembly, b"MZ").unwrap();
    fs::write(bin.join("My.Tests.deps.json"), FOO_MANIFEST).unwrap();
    fs::write(packages.join("Foo/1.0/lib/Foo.dll"), b"MZ").unwrap();
    fs::write(packages.join("bar/2.0/lib/net8.0/Bar.dll"), b"MZ").unwrap();
    fs::write(packages.join("bar/2.0/lib/net8.0/Bar.Extras.dll"), b"MZ").unwrap();

    Layout {
        _tmp: tmp,
        assembly,
        packages,
    }
}

fn context(layout: &Layout, cache: Arc<AssemblyResolutionCache>) -> DependencyContextResolver {
    DependencyContextResolver::for_assembly(
        &layout.assembly,
        &ProbeSettings::with_package_roots(vec![layout.packages.clone()]),
        Arc::new(RealFileSystem),
        cache,
        Arc::new(PathLoader),
        None,
    )
}

/// Test: a package assembly resolves beneath the package root
#[test]
fn test_package_assembly_resolves_from_root() {
    let layout = layout();
    let ctx = context(&layout, Arc::new(AssemblyResolutionCache::new()));

    let foo = ctx.load_managed("Foo").expect("Foo should resolve");
    assert_eq!(foo.name, "Foo");
    assert!(foo.path.is_absolute());
    assert!(foo.path.ends_with(Path::new("Foo/1.0/lib/Foo.dll")));

    let extras = ctx.load_managed("Bar.Extras").expect("Bar.Extras should resolve");
    assert!(extras.path.ends_with(Path::new("bar/2.0/lib/net8.0/Bar.Extras.dll")));
}

/// Test: the cached outcome survives the file disappearing, until reset
#[test]
fn test_cached_outcome_survives_file_removal_until_reset() {
    let layout = layout();
    let cache = Arc::new(AssemblyResolutionCache::new());
    let ctx = context(&layout, cache.clone());

    let first = ctx.load_managed("Foo").expect("Foo should resolve");
    fs::remove_file(layout.packages.join("Foo/1.0/lib/Foo.dll")).unwrap();

    assert_eq!(ctx.load_managed("Foo"), Some(first));

    cache.reset();
    assert!(ctx.load_managed("Foo").is_none());
}

/// Test: a partial asset set means the whole library is not found
#[test]
fn test_incomplete_package_is_not_found() {
    let layout = layout();
    fs::remove_file(layout.packages.join("bar/2.0/lib/net8.0/Bar.Extras.dll")).unwrap();
    let ctx = context(&layout, Arc::new(AssemblyResolutionCache::new()));

    assert!(ctx.load_managed("Bar").is_none());
    assert!(ctx.load_managed("Foo").is_some());
}

/// Test: a cached name does not probe the file system again
#[test]
fn test_cached_name_does_not_probe_again() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.add_file("/bin/My.Tests.dll");
    fs.add_file("/packages/Foo/1.0/lib/Foo.dll");

    let manifest = rvt_deps::Manifest::parse_str(FOO_MANIFEST).unwrap();
    let resolver = rvt_deps::ManagedAssemblyResolver::new(
        "/bin",
        Some(&manifest),
        &ProbeSettings::with_package_roots(vec![PathBuf::from("/packages")]),
        fs.clone(),
        None,
    );
    let ctx = DependencyContextResolver::new(
        resolver,
        Arc::new(AssemblyResolutionCache::new()),
        Arc::new(PathLoader),
    );

    assert!(ctx.load_managed("Foo").is_some());
    fs.reset_probe_count();
    assert!(ctx.load_managed("Foo").is_some());
    assert_eq!(fs.probe_count(), 0);
}

/// Test: a subscribed context answers through the registry only while held
#[test]
fn test_registry_subscription_scopes_resolution() {
    let layout = layout();
    let registry = ResolverRegistry::new();
    let ctx = Arc::new(context(&layout, Arc::new(AssemblyResolutionCache::new())));

    {
        let _subscription = registry.subscribe(ctx);
        assert!(registry.resolve("Foo").is_some());
    }
    assert!(registry.is_empty());
    assert!(registry.resolve("Foo").is_none());
}
