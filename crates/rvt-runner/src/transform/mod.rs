//! Output transforms: render a `RunReport` into a named file format.
//!
//! Built-ins: `xml` (xUnit v2), `xmlv1` (xUnit v1), `html`, `nunit`
//! (NUnit 2.5) and `json`. Handlers are pure functions of the report.

mod html;
mod nunit;
mod xml;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::TransformError;
use crate::report::RunReport;

pub use xml::escape as xml_escape;

/// Renders a report into file contents.
pub type TransformHandler = fn(&RunReport) -> Result<String, TransformError>;

/// A named output format.
#[derive(Clone)]
pub struct Transform {
    pub name: String,
    pub description: String,
    pub handler: TransformHandler,
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl Transform {
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler: TransformHandler) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler,
        }
    }

    pub fn render(&self, report: &RunReport) -> Result<String, TransformError> {
        (self.handler)(report)
    }
}

/// Transforms keyed by lower-cased name.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: BTreeMap<String, Transform>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Transform::new(
            "xml",
            "output results to xUnit.net v2 XML file",
            xml::render_v2,
        ));
        registry.register(Transform::new(
            "xmlv1",
            "output results to xUnit.net v1 XML file",
            xml::render_v1,
        ));
        registry.register(Transform::new("html", "output results to HTML file", html::render));
        registry.register(Transform::new(
            "nunit",
            "output results to NUnit v2.5 XML file",
            nunit::render,
        ));
        registry.register(Transform::new("json", "output results to JSON file", render_json));
        registry
    }

    /// Add or replace a transform.
    pub fn register(&mut self, transform: Transform) {
        self.transforms.insert(transform.name.to_lowercase(), transform);
    }

    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(&name.to_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Transforms in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Transform> {
        self.transforms.values()
    }

    pub fn render(&self, name: &str, report: &RunReport) -> Result<String, TransformError> {
        self.get(name)
            .ok_or_else(|| TransformError::UnknownFormat(name.to_string()))?
            .render(report)
    }

    /// Render `name` and write it to `path`, creating parent directories
    /// and overwriting any existing file.
    pub fn apply(&self, name: &str, report: &RunReport, path: &Path) -> Result<(), TransformError> {
        let content = self.render(name, report)?;
        let write_err = |source| TransformError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)
    }
}

fn render_json(report: &RunReport) -> Result<String, TransformError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Seconds with three decimals, as every XML format writes times.
pub(crate) fn seconds(elapsed_ms: u64) -> String {
    format!("{:.3}", elapsed_ms as f64 / 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;

    #[test]
    fn test_builtin_names() {
        let registry = TransformRegistry::builtin();
        let names: Vec<&str> = registry.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["html", "json", "nunit", "xml", "xmlv1"]);
        assert!(registry.contains("XmlV1"));
    }

    #[test]
    fn test_unknown_format() {
        let err = TransformRegistry::builtin()
            .render("markdown", &sample_report())
            .unwrap_err();
        assert!(matches!(err, TransformError::UnknownFormat(_)));
    }

    #[test]
    fn test_apply_creates_parents_and_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/out/results.xml");
        let registry = TransformRegistry::builtin();
        let report = sample_report();

        registry.apply("xml", &report, &path).unwrap();
        let first = std::fs::read(&path).unwrap();
        registry.apply("xml", &report, &path).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_json_round_trips_report() {
        let report = sample_report();
        let json = TransformRegistry::builtin().render("json", &report).unwrap();
        let back: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn test_every_builtin_renders() {
        let registry = TransformRegistry::builtin();
        let report = sample_report();
        for transform in registry.iter() {
            let content = transform.render(&report).unwrap();
            assert!(content.contains("A"), "{} rendered nothing useful", transform.name);
        }
    }

    #[test]
    fn test_custom_transform_registration() {
        fn count(report: &RunReport) -> Result<String, TransformError> {
            Ok(report.assemblies.len().to_string())
        }
        let mut registry = TransformRegistry::builtin();
        registry.register(Transform::new("Count", "assembly count", count));
        assert_eq!(registry.render("count", &sample_report()).unwrap(), "2");
    }
}
