//! Test case filters applied between discovery and execution.

use crate::framework::TestCase;

/// Include/exclude rules for discovered test cases.
///
/// Every non-empty include category must match. Classes and methods form
/// one category: a case matching either is included. Any matching
/// excluded trait rejects the case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TestFilters {
    pub include_traits: Vec<(String, String)>,
    pub exclude_traits: Vec<(String, String)>,
    pub classes: Vec<String>,
    /// Fully qualified `Class.Method` patterns; `*` matches any run of characters.
    pub methods: Vec<String>,
    pub namespaces: Vec<String>,
}

impl TestFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.include_traits.is_empty()
            && self.exclude_traits.is_empty()
            && self.classes.is_empty()
            && self.methods.is_empty()
            && self.namespaces.is_empty()
    }

    pub fn include_trait(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.include_traits.push((name.into(), value.into()));
        self
    }

    pub fn exclude_trait(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.exclude_traits.push((name.into(), value.into()));
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn method(mut self, pattern: impl Into<String>) -> Self {
        self.methods.push(pattern.into());
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }

    /// Parse a `name=value` trait expression.
    pub fn parse_trait(expr: &str) -> Option<(String, String)> {
        let (name, value) = expr.split_once('=')?;
        let (name, value) = (name.trim(), value.trim());
        (!name.is_empty() && !value.is_empty()).then(|| (name.to_string(), value.to_string()))
    }

    pub fn matches(&self, case: &TestCase) -> bool {
        self.matches_classes_and_methods(case)
            && !self.matches_excluded_traits(case)
            && self.matches_included_traits(case)
            && self.matches_namespaces(case)
    }

    fn matches_classes_and_methods(&self, case: &TestCase) -> bool {
        if self.classes.is_empty() && self.methods.is_empty() {
            return true;
        }
        if self
            .classes
            .iter()
            .any(|class| class.eq_ignore_ascii_case(&case.class_name))
        {
            return true;
        }
        let full_name = format!("{}.{}", case.class_name, case.method_name);
        self.methods
            .iter()
            .any(|pattern| wildcard_match(pattern, &full_name))
    }

    fn matches_excluded_traits(&self, case: &TestCase) -> bool {
        self.exclude_traits
            .iter()
            .any(|(name, value)| case.has_trait(name, value))
    }

    fn matches_included_traits(&self, case: &TestCase) -> bool {
        self.include_traits.is_empty()
            || self
                .include_traits
                .iter()
                .any(|(name, value)| case.has_trait(name, value))
    }

    fn matches_namespaces(&self, case: &TestCase) -> bool {
        if self.namespaces.is_empty() {
            return true;
        }
        let class = case.class_name.to_lowercase();
        self.namespaces.iter().any(|namespace| {
            let namespace = namespace.to_lowercase();
            class
                .strip_prefix(&namespace)
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Case-insensitive match where `*` stands for any run of characters.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let text = text.to_lowercase();
    let parts: Vec<&str> = pattern.split('*').collect();

    if parts.len() == 1 {
        return pattern == text;
    }

    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return true,
    };
    for part in middle {
        match remaining.find(part) {
            Some(index) => remaining = &remaining[index + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case(class: &str, method: &str) -> TestCase {
        TestCase::new(class, method)
    }

    #[test]
    fn test_empty_filters_match_everything() {
        assert!(TestFilters::new().matches(&case("A.B", "C")));
    }

    #[test]
    fn test_wildcards() {
        assert!(wildcard_match("My.*.Adds", "My.Tests.Math.Adds"));
        assert!(wildcard_match("*Adds", "My.Tests.Adds"));
        assert!(wildcard_match("My.*", "My.Tests.Adds"));
        assert!(wildcard_match("my.tests.adds", "My.Tests.Adds"));
        assert!(!wildcard_match("My.*.Subtracts", "My.Tests.Adds"));
        assert!(!wildcard_match("*a*a*", "ab"));
    }

    #[test]
    fn test_classes_and_methods_are_one_category() {
        let filters = TestFilters::new().class("My.A").method("My.B.Only*");
        assert!(filters.matches(&case("My.A", "Anything")));
        assert!(filters.matches(&case("My.B", "OnlyThis")));
        assert!(!filters.matches(&case("My.B", "Other")));
    }

    #[test]
    fn test_traits_include_or_exclude_wins() {
        let filters = TestFilters::new()
            .include_trait("Category", "Fast")
            .include_trait("Category", "Unit")
            .exclude_trait("Flaky", "true");

        assert!(filters.matches(&case("A", "B").with_trait("Category", "Unit")));
        assert!(!filters.matches(&case("A", "B").with_trait("Category", "Slow")));
        assert!(!filters.matches(
            &case("A", "B")
                .with_trait("Category", "Fast")
                .with_trait("Flaky", "true")
        ));
    }

    #[test]
    fn test_namespace_matches_whole_segments() {
        let filters = TestFilters::new().namespace("My.Tests");
        assert!(filters.matches(&case("My.Tests.MathTests", "Adds")));
        assert!(filters.matches(&case("My.Tests.Deep.Inner", "Adds")));
        assert!(!filters.matches(&case("My.TestsExtra.MathTests", "Adds")));
    }

    #[test]
    fn test_every_category_must_match() {
        let filters = TestFilters::new()
            .namespace("My.Tests")
            .include_trait("Category", "Fast");
        assert!(!filters.matches(&case("My.Tests.A", "B")));
        assert!(filters.matches(&case("My.Tests.A", "B").with_trait("Category", "Fast")));
    }

    #[test]
    fn test_parse_trait() {
        assert_eq!(
            TestFilters::parse_trait("Category = Fast"),
            Some(("Category".to_string(), "Fast".to_string()))
        );
        assert_eq!(TestFilters::parse_trait("Category"), None);
        assert_eq!(TestFilters::parse_trait("=Fast"), None);
    }
}
