//! RVT - test runner diagnostics CLI
//!
//! The `rvt` command inspects how the runner would resolve dependencies for
//! a test assembly and renders saved run reports.
//!
//! ## Commands
//!
//! - `resolve`: resolve an assembly (or native library) name for a test assembly
//! - `manifest`: show the libraries a `.deps.json` manifest declares
//! - `settings`: show the package roots and runtime identifier in effect
//! - `transforms`: list the available output formats
//! - `render`: render a JSON run report into another output format

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

use rvt_deps::context::manifest_path_for;
use rvt_deps::{
    AssemblyResolutionCache, DependencyContextResolver, DiagnosticSink, Manifest,
    NativeLibraryResolver, PathLoader, ProbeSettings, RealFileSystem, TracingDiagnostics,
};
use rvt_runner::{RunReport, TransformRegistry};

#[derive(Parser)]
#[command(name = "rvt")]
#[command(author = "StarkBIM")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "RVT test runner diagnostics", long_about = None)]
struct Cli {
    /// Enable verbose output (includes resolver diagnostics)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the resolver's probe settings.
#[derive(clap::Args, Debug, Clone, Default)]
struct ProbeArgs {
    /// Package root to probe (repeatable; default: NUGET_PACKAGES or ~/.nuget/packages)
    #[arg(long = "package-root")]
    package_roots: Vec<PathBuf>,

    /// Runtime identifier used to pick asset groups (default: host platform)
    #[arg(long, env = "RVT_RUNTIME_IDENTIFIER")]
    runtime: Option<String>,
}

impl ProbeArgs {
    fn settings(&self) -> ProbeSettings {
        let mut settings = if self.package_roots.is_empty() {
            ProbeSettings::from_env()
        } else {
            ProbeSettings::with_package_roots(self.package_roots.clone())
        };
        if let Some(rid) = &self.runtime {
            settings = settings.runtime_identifier(rid.clone());
        }
        settings
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a dependency name the way the runner would for an assembly
    Resolve {
        /// Path to the test assembly
        assembly: PathBuf,

        /// Simple assembly name (e.g. `Newtonsoft.Json`)
        name: String,

        /// Resolve a native library instead of a managed assembly
        #[arg(long)]
        native: bool,

        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// Show the libraries declared by a dependency manifest
    Manifest {
        /// Path to a `.deps.json` file, or to the assembly next to it
        path: PathBuf,

        /// Print the parsed manifest as JSON
        #[arg(long)]
        full: bool,
    },

    /// Show the probe settings in effect
    Settings {
        #[command(flatten)]
        probe: ProbeArgs,
    },

    /// List available output formats
    Transforms,

    /// Render a JSON run report into another format
    Render {
        /// Run report written by the `json` transform
        report: PathBuf,

        /// Output format (see `rvt transforms`)
        #[arg(short, long)]
        format: String,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    rvt_runner::init_tracing(cli.json, level);

    match cli.command {
        Commands::Resolve {
            assembly,
            name,
            native,
            probe,
        } => {
            let resolved = cmd_resolve(&assembly, &name, native, &probe.settings(), cli.verbose)?;
            match resolved {
                Some(path) => {
                    println!("{}", path.display());
                    Ok(())
                }
                None => anyhow::bail!("'{}' could not be resolved for {}", name, assembly.display()),
            }
        }
        Commands::Manifest { path, full } => {
            println!("{}", cmd_manifest(&path, full)?);
            Ok(())
        }
        Commands::Settings { probe } => {
            println!("{}", cmd_settings(&probe.settings()));
            Ok(())
        }
        Commands::Transforms => {
            println!("{}", cmd_transforms(&TransformRegistry::builtin()));
            Ok(())
        }
        Commands::Render {
            report,
            format,
            output,
        } => {
            cmd_render(&TransformRegistry::builtin(), &report, &format, &output)?;
            println!("Wrote {} report to {}", format.to_lowercase(), output.display());
            Ok(())
        }
    }
}

/// Resolve `name` for `assembly` without loading anything.
fn cmd_resolve(
    assembly: &Path,
    name: &str,
    native: bool,
    settings: &ProbeSettings,
    verbose: bool,
) -> Result<Option<PathBuf>> {
    let assembly = rvt_deps::paths::absolute(assembly.to_path_buf());
    let label = assembly
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let diagnostics: Option<Arc<dyn DiagnosticSink>> = if verbose {
        Some(Arc::new(TracingDiagnostics::new(label)))
    } else {
        None
    };
    info!(
        assembly = %assembly.display(),
        name = %name,
        native = native,
        runtime = %settings.runtime_identifier,
        "Resolving"
    );

    if native {
        let manifest_path = manifest_path_for(&assembly);
        let manifest = Manifest::read_file(&manifest_path)
            .with_context(|| format!("Failed to read {}", manifest_path.display()))?;
        let resolver = NativeLibraryResolver::new(&manifest, settings, Arc::new(RealFileSystem), diagnostics);
        return Ok(resolver.resolve(name));
    }

    let resolver = DependencyContextResolver::for_assembly(
        &assembly,
        settings,
        Arc::new(RealFileSystem),
        Arc::new(AssemblyResolutionCache::new()),
        Arc::new(PathLoader),
        diagnostics,
    );
    Ok(resolver.load_managed(name).map(|loaded| loaded.path))
}

/// Text (or JSON) listing of a manifest's libraries.
fn cmd_manifest(path: &Path, full: bool) -> Result<String> {
    let manifest_path = if path.extension().is_some_and(|ext| ext == "json") {
        path.to_path_buf()
    } else {
        manifest_path_for(path)
    };
    let manifest = Manifest::read_file(&manifest_path)
        .with_context(|| format!("Failed to read {}", manifest_path.display()))?;

    if full {
        return Ok(serde_json::to_string_pretty(&manifest)?);
    }

    let mut lines = vec![format!(
        "Target: {}",
        manifest.runtime_target.as_deref().unwrap_or("(none)")
    )];
    for library in &manifest.libraries {
        let runtime: usize = library.runtime_assembly_groups.iter().map(|g| g.asset_paths.len()).sum();
        let native: usize = library.native_library_groups.iter().map(|g| g.asset_paths.len()).sum();
        lines.push(format!(
            "  {}/{} ({}) runtime: {}, native: {}{}",
            library.name,
            library.version,
            library.kind,
            runtime,
            native,
            library
                .path
                .as_deref()
                .map(|p| format!(", path: {}", p))
                .unwrap_or_default()
        ));
    }
    lines.push(format!("{} libraries", manifest.libraries.len()));
    Ok(lines.join("\n"))
}

fn cmd_settings(settings: &ProbeSettings) -> String {
    let mut lines = vec![format!("Runtime identifier: {}", settings.runtime_identifier)];
    if settings.package_roots.is_empty() {
        lines.push("Package roots: (none)".to_string());
    } else {
        lines.push("Package roots:".to_string());
        for root in &settings.package_roots {
            lines.push(format!("  {}", root.display()));
        }
    }
    lines.join("\n")
}

fn cmd_transforms(transforms: &TransformRegistry) -> String {
    let width = transforms.iter().map(|t| t.name.len()).max().unwrap_or(0);
    transforms
        .iter()
        .map(|t| format!("  {:<width$}  {}", t.name, t.description, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn cmd_render(transforms: &TransformRegistry, report: &Path, format: &str, output: &Path) -> Result<()> {
    let content =
        std::fs::read_to_string(report).with_context(|| format!("Failed to read {}", report.display()))?;
    let report: RunReport = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON run report", report.display()))?;
    transforms
        .apply(&format.to_lowercase(), &report, output)
        .with_context(|| format!("Failed to render '{}'", format))?;
    Ok(())
}
