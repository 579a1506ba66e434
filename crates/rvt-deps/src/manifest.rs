//! Dependency manifest (`.deps.json`) model and reader.
//!
//! The reader is a pure transform from bytes to an immutable graph of
//! libraries, their asset groups and the runtime fallback graph. Library
//! order follows the document order of the selected target, which is what
//! the resolver's first-wins map depends on.

use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::ManifestError;

/// Kind of asset carried by an asset group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Managed runtime assemblies.
    Runtime,

    /// Native (unmanaged) libraries.
    Native,
}

/// Files of one library scoped to one runtime identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetGroup {
    /// Runtime identifier; empty means "any runtime".
    pub runtime: String,

    /// Asset paths relative to the package directory, `/`-separated.
    pub asset_paths: Vec<String>,
}

impl AssetGroup {
    pub fn new(runtime: impl Into<String>, asset_paths: Vec<String>) -> Self {
        Self {
            runtime: runtime.into(),
            asset_paths,
        }
    }
}

/// A declared dependency of a library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

/// A named, versioned unit of compiled code declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Library {
    pub name: String,
    pub version: String,

    /// Library type as declared (`package`, `project`, `reference`, ...).
    pub kind: String,

    /// Content hash (`sha512-...`), empty when not declared.
    pub hash: String,

    pub serviceable: bool,

    /// Explicit package directory relative to a package root.
    pub path: Option<String>,

    pub dependencies: Vec<Dependency>,

    /// Managed asset groups; RID-specific groups first.
    pub runtime_assembly_groups: Vec<AssetGroup>,

    /// Native asset groups; RID-specific groups first.
    pub native_library_groups: Vec<AssetGroup>,
}

impl Library {
    /// Whether this library lives in a package cache.
    pub fn is_package(&self) -> bool {
        self.kind.eq_ignore_ascii_case("package")
    }

    /// Asset groups of the given kind.
    pub fn asset_groups(&self, kind: AssetKind) -> &[AssetGroup] {
        match kind {
            AssetKind::Runtime => &self.runtime_assembly_groups,
            AssetKind::Native => &self.native_library_groups,
        }
    }
}

/// Compatible fallbacks for one runtime identifier, least-specific last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeFallbackChain {
    pub runtime: String,
    pub fallbacks: Vec<String>,
}

/// Parsed dependency manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    /// Name of the target the libraries were read from.
    pub runtime_target: Option<String>,

    pub runtime_signature: Option<String>,

    /// Libraries in document order.
    pub libraries: Vec<Library>,

    pub runtime_graph: Vec<RuntimeFallbackChain>,
}

impl Manifest {
    /// Parse a manifest from a reader.
    pub fn parse<R: Read>(reader: R) -> Result<Self, ManifestError> {
        let document: Value = serde_json::from_reader(reader)?;
        Self::from_value(&document)
    }

    /// Parse a manifest from a string.
    pub fn parse_str(content: &str) -> Result<Self, ManifestError> {
        let document: Value = serde_json::from_str(content)?;
        Self::from_value(&document)
    }

    /// Read and parse a manifest file.
    ///
    /// A missing file yields `ManifestError::NotFound`, distinct from a
    /// present but malformed one.
    pub fn read_file(path: &Path) -> Result<Self, ManifestError> {
        if !path.is_file() {
            return Err(ManifestError::NotFound(path.to_path_buf()));
        }
        let file = File::open(path)?;
        Self::parse(BufReader::new(file))
    }

    /// Fallback chain declared for `runtime` (case-insensitive).
    pub fn fallbacks_for(&self, runtime: &str) -> Option<&RuntimeFallbackChain> {
        self.runtime_graph
            .iter()
            .find(|chain| chain.runtime.eq_ignore_ascii_case(runtime))
    }

    /// First library with the given name (case-insensitive).
    pub fn library(&self, name: &str) -> Option<&Library> {
        self.libraries
            .iter()
            .find(|lib| lib.name.eq_ignore_ascii_case(name))
    }

    fn from_value(document: &Value) -> Result<Self, ManifestError> {
        let root = document
            .as_object()
            .ok_or_else(|| malformed("document root must be an object"))?;

        let (target_name, signature) = read_runtime_target(root.get("runtimeTarget"))?;
        let library_infos = optional_object(root, "libraries")?;

        let mut libraries = Vec::new();
        let mut selected_target = None;

        if let Some(targets) = optional_object(root, "targets")? {
            // An unknown target name falls back to the first target
            let selected = target_name
                .as_deref()
                .and_then(|name| targets.get(name).map(|t| (name.to_string(), t)))
                .or_else(|| targets.iter().next().map(|(k, v)| (k.clone(), v)));

            if let Some((name, target)) = selected {
                selected_target = Some(name.clone());
                let entries = target
                    .as_object()
                    .ok_or_else(|| malformed(format!("target '{}' must be an object", name)))?;
                for (key, entry) in entries {
                    let info = library_infos.and_then(|infos| infos.get(key));
                    libraries.push(read_library(key, entry, info)?);
                }
            }
        }

        let mut runtime_graph = Vec::new();
        if let Some(runtimes) = optional_object(root, "runtimes")? {
            for (runtime, fallbacks) in runtimes {
                runtime_graph.push(RuntimeFallbackChain {
                    runtime: runtime.clone(),
                    fallbacks: string_array(fallbacks, runtime)?,
                });
            }
        }

        Ok(Self {
            runtime_target: selected_target.or(target_name),
            runtime_signature: signature,
            libraries,
            runtime_graph,
        })
    }
}

fn malformed(message: impl Into<String>) -> ManifestError {
    ManifestError::Malformed(message.into())
}

fn optional_object<'a>(
    parent: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ManifestError> {
    match parent.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(malformed(format!("'{}' must be an object", key))),
    }
}

fn read_runtime_target(
    value: Option<&Value>,
) -> Result<(Option<String>, Option<String>), ManifestError> {
    match value {
        None | Some(Value::Null) => Ok((None, None)),
        // Older manifests carry the target name as a bare string
        Some(Value::String(name)) => Ok((Some(name.clone()), None)),
        Some(Value::Object(map)) => {
            let name = map.get("name").and_then(Value::as_str).map(str::to_string);
            let signature = map
                .get("signature")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            Ok((name, signature))
        }
        Some(_) => Err(malformed("'runtimeTarget' must be a string or an object")),
    }
}

fn read_library(key: &str, entry: &Value, info: Option<&Value>) -> Result<Library, ManifestError> {
    let (name, version) = key
        .rsplit_once('/')
        .filter(|(name, version)| !name.is_empty() && !version.is_empty())
        .ok_or_else(|| malformed(format!("library key '{}' is not 'name/version'", key)))?;

    let entry = entry
        .as_object()
        .ok_or_else(|| malformed(format!("library '{}' must be an object", key)))?;
    let info = match info {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(malformed(format!("library info '{}' must be an object", key))),
        None => return Err(malformed(format!("no library information for '{}'", key))),
    };

    let mut dependencies = Vec::new();
    if let Some(deps) = optional_object(entry, "dependencies")? {
        for (dep_name, dep_version) in deps {
            dependencies.push(Dependency {
                name: dep_name.clone(),
                version: dep_version.as_str().unwrap_or_default().to_string(),
            });
        }
    }

    let mut runtime_groups = rid_groups(entry, "runtime")?;
    runtime_groups.extend(rid_less_group(entry, "runtime")?);
    let mut native_groups = rid_groups(entry, "native")?;
    native_groups.extend(rid_less_group(entry, "native")?);

    Ok(Library {
        name: name.to_string(),
        version: version.to_string(),
        kind: info
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        hash: info
            .get("sha512")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        serviceable: info
            .get("serviceable")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        path: info
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .map(str::to_string),
        dependencies,
        runtime_assembly_groups: runtime_groups,
        native_library_groups: native_groups,
    })
}

/// The RID-less group declared by `"runtime": { path: {} }` or `"native"`.
fn rid_less_group(
    entry: &Map<String, Value>,
    section: &str,
) -> Result<Option<AssetGroup>, ManifestError> {
    let paths: Vec<String> = match entry.get(section) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(map)) => map.keys().cloned().collect(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(_) => return Err(malformed(format!("'{}' must be an object", section))),
    };
    if paths.is_empty() {
        return Ok(None);
    }
    Ok(Some(AssetGroup::new("", paths)))
}

/// Groups declared under `runtimeTargets`, one per RID in first-seen order.
fn rid_groups(entry: &Map<String, Value>, asset_type: &str) -> Result<Vec<AssetGroup>, ManifestError> {
    let mut groups: Vec<AssetGroup> = Vec::new();
    let Some(targets) = optional_object(entry, "runtimeTargets")? else {
        return Ok(groups);
    };

    for (path, props) in targets {
        let props = props
            .as_object()
            .ok_or_else(|| malformed(format!("runtime target '{}' must be an object", path)))?;
        let kind = props.get("assetType").and_then(Value::as_str).unwrap_or_default();
        if !kind.eq_ignore_ascii_case(asset_type) {
            continue;
        }
        let rid = props.get("rid").and_then(Value::as_str).unwrap_or_default();
        match groups.iter_mut().find(|g| g.runtime == rid) {
            Some(group) => group.asset_paths.push(path.clone()),
            None => groups.push(AssetGroup::new(rid, vec![path.clone()])),
        }
    }
    Ok(groups)
}

fn string_array(value: &Value, runtime: &str) -> Result<Vec<String>, ManifestError> {
    let items = value
        .as_array()
        .ok_or_else(|| malformed(format!("fallbacks of '{}' must be an array", runtime)))?;
    Ok(items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect())
}
