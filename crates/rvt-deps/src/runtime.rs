//! Runtime identifiers and the compatible-runtime set.

use crate::manifest::{AssetGroup, Manifest};

/// Runtime identifier of the current process, e.g. `win-x64`, `linux-arm64`.
pub fn current_runtime_identifier() -> String {
    runtime_identifier_for(std::env::consts::OS, std::env::consts::ARCH)
}

fn runtime_identifier_for(os: &str, arch: &str) -> String {
    let os = match os {
        "windows" => "win",
        "macos" => "osx",
        other => other,
    };
    let arch = match arch {
        "x86_64" => "x64",
        "x86" => "x86",
        "aarch64" => "arm64",
        "arm" => "arm",
        other => other,
    };
    format!("{}-{}", os, arch)
}

/// Ordered set of runtime identifiers compatible with the current runtime.
///
/// Always `[current, fallbacks..., ""]`, compared case-insensitively. The
/// empty identifier ("any runtime") is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompatibleRuntimes {
    ordered: Vec<String>,
}

impl CompatibleRuntimes {
    /// Compatible set for `current` using the manifest's runtime graph.
    pub fn for_manifest(manifest: &Manifest, current: &str) -> Self {
        let fallbacks = manifest
            .fallbacks_for(current)
            .map(|chain| chain.fallbacks.as_slice())
            .unwrap_or_default();
        Self::new(current, fallbacks)
    }

    pub fn new(current: &str, fallbacks: &[String]) -> Self {
        let mut ordered: Vec<String> = Vec::with_capacity(fallbacks.len() + 2);
        for rid in std::iter::once(current).chain(fallbacks.iter().map(String::as_str)) {
            if rid.is_empty() || ordered.iter().any(|r| r.eq_ignore_ascii_case(rid)) {
                continue;
            }
            ordered.push(rid.to_string());
        }
        ordered.push(String::new());
        Self { ordered }
    }

    /// Position of `rid` in the set, lower is more specific.
    pub fn rank(&self, rid: &str) -> Option<usize> {
        self.ordered.iter().position(|r| r.eq_ignore_ascii_case(rid))
    }

    pub fn contains(&self, rid: &str) -> bool {
        self.rank(rid).is_some()
    }

    /// The group whose runtime ranks best; ties keep declaration order.
    pub fn best_group<'a>(&self, groups: &'a [AssetGroup]) -> Option<&'a AssetGroup> {
        groups
            .iter()
            .filter_map(|group| self.rank(&group.runtime).map(|rank| (rank, group)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, group)| group)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ordered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_identifier_mapping() {
        assert_eq!(runtime_identifier_for("windows", "x86_64"), "win-x64");
        assert_eq!(runtime_identifier_for("macos", "aarch64"), "osx-arm64");
        assert_eq!(runtime_identifier_for("linux", "x86_64"), "linux-x64");
        assert_eq!(runtime_identifier_for("freebsd", "riscv64"), "freebsd-riscv64");
    }

    #[test]
    fn test_compatible_set_always_ends_with_any() {
        let set = CompatibleRuntimes::new("win-x64", &["win".to_string(), "any".to_string()]);
        assert_eq!(set.as_slice(), &["win-x64", "win", "any", ""]);

        let bare = CompatibleRuntimes::new("linux-x64", &[]);
        assert_eq!(bare.as_slice(), &["linux-x64", ""]);
    }

    #[test]
    fn test_compatible_set_dedups_case_insensitively() {
        let set = CompatibleRuntimes::new(
            "win-x64",
            &["WIN-X64".to_string(), "win".to_string(), "".to_string()],
        );
        assert_eq!(set.as_slice(), &["win-x64", "win", ""]);
        assert!(set.contains("WIN"));
        assert!(set.contains(""));
        assert!(!set.contains("osx"));
    }

    #[test]
    fn test_best_group_prefers_most_specific() {
        let set = CompatibleRuntimes::new("win-x64", &["win".to_string()]);
        let groups = vec![
            AssetGroup::new("unix", vec!["runtimes/unix/A.dll".to_string()]),
            AssetGroup::new("", vec!["lib/A.dll".to_string()]),
            AssetGroup::new("win", vec!["runtimes/win/A.dll".to_string()]),
        ];
        assert_eq!(set.best_group(&groups).unwrap().runtime, "win");

        let only_unix = vec![AssetGroup::new("unix", vec![])];
        assert!(set.best_group(&only_unix).is_none());
    }
}
