//! HTML report rendered through a Handlebars template.

use handlebars::Handlebars;
use serde::Serialize;

use super::seconds;
use crate::error::TransformError;
use crate::framework::ExecutionSummary;
use crate::report::{RunReport, TestResultKind};

const TEMPLATE_NAME: &str = "report";
const TEMPLATE: &str = include_str!("../../templates/report.html.hbs");

#[derive(Serialize)]
struct HtmlView<'a> {
    generated_at: String,
    assemblies: Vec<AssemblyView<'a>>,
    total: ExecutionSummary,
    total_time: String,
    error_count: usize,
    errors: Vec<&'a str>,
    failures: Vec<FailureView<'a>>,
    skipped: Vec<SkipView<'a>>,
    classes: Vec<ClassView<'a>>,
}

#[derive(Serialize)]
struct AssemblyView<'a> {
    assembly_path: &'a str,
    config_path: Option<&'a str>,
    test_framework: &'a str,
    environment: &'a str,
}

#[derive(Serialize)]
struct FailureView<'a> {
    name: &'a str,
    message: Option<&'a str>,
    stack_trace: Option<&'a str>,
}

#[derive(Serialize)]
struct SkipView<'a> {
    name: &'a str,
    reason: &'a str,
}

#[derive(Serialize)]
struct ClassView<'a> {
    name: &'a str,
    time: String,
    total: usize,
    failed: usize,
    skipped: usize,
    tests: Vec<TestView<'a>>,
}

#[derive(Serialize)]
struct TestView<'a> {
    name: &'a str,
    status: &'static str,
    time: String,
    traits: Vec<String>,
    output: &'a str,
}

fn view(report: &RunReport) -> HtmlView<'_> {
    let total = report.total();
    let mut view = HtmlView {
        generated_at: report.generated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        assemblies: Vec::new(),
        total,
        total_time: seconds(total.elapsed_ms),
        error_count: 0,
        errors: Vec::new(),
        failures: Vec::new(),
        skipped: Vec::new(),
        classes: Vec::new(),
    };

    for assembly in &report.assemblies {
        view.assemblies.push(AssemblyView {
            assembly_path: &assembly.assembly_path,
            config_path: assembly.config_path.as_deref(),
            test_framework: &assembly.test_framework,
            environment: &assembly.environment,
        });
        view.errors.extend(assembly.errors.iter().map(String::as_str));

        for (class, tests) in assembly.tests_by_class() {
            let mut class_view = ClassView {
                name: class,
                time: seconds(tests.iter().map(|t| t.elapsed_ms).sum()),
                total: tests.len(),
                failed: 0,
                skipped: 0,
                tests: Vec::with_capacity(tests.len()),
            };
            for test in tests {
                let status = match test.result {
                    TestResultKind::Pass => "success",
                    TestResultKind::Fail => {
                        class_view.failed += 1;
                        view.failures.push(FailureView {
                            name: &test.name,
                            message: test.message.as_deref(),
                            stack_trace: test.stack_trace.as_deref(),
                        });
                        "failure"
                    }
                    TestResultKind::Skip => {
                        class_view.skipped += 1;
                        view.skipped.push(SkipView {
                            name: &test.name,
                            reason: test.reason.as_deref().unwrap_or_default(),
                        });
                        "skipped"
                    }
                };
                class_view.tests.push(TestView {
                    name: &test.name,
                    status,
                    time: seconds(test.elapsed_ms),
                    traits: test
                        .traits
                        .iter()
                        .flat_map(|(name, values)| values.iter().map(move |v| format!("{}: {}", name, v)))
                        .collect(),
                    output: &test.output,
                });
            }
            view.classes.push(class_view);
        }
    }
    view.error_count = view.errors.len();
    view
}

pub(super) fn render(report: &RunReport) -> Result<String, TransformError> {
    let mut handlebars = Handlebars::new();
    handlebars.register_template_string(TEMPLATE_NAME, TEMPLATE)?;
    Ok(handlebars.render(TEMPLATE_NAME, &view(report))?)
}
