//! NUnit 2.5 XML.

use std::fmt::Write;

use super::seconds;
use super::xml::escape;
use crate::error::TransformError;
use crate::report::{RunReport, TestResult, TestResultKind};

fn success(failed: usize) -> &'static str {
    if failed == 0 {
        "True"
    } else {
        "False"
    }
}

fn suite_result(failed: usize) -> &'static str {
    if failed == 0 {
        "Success"
    } else {
        "Failure"
    }
}

pub(super) fn render(report: &RunReport) -> Result<String, TransformError> {
    let total = report.total();
    let errors: usize = report.assemblies.iter().map(|a| a.errors.len()).sum();
    let failed = total.failed as usize;

    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\" standalone=\"no\"?>\n");
    let _ = writeln!(
        out,
        "<test-results name=\"Test results\" total=\"{}\" errors=\"{}\" failures=\"{}\" not-run=\"{}\" inconclusive=\"0\" ignored=\"{}\" skipped=\"0\" invalid=\"0\" date=\"{}\" time=\"{}\">",
        total.total,
        errors,
        total.failed,
        total.skipped,
        total.skipped,
        report.generated_at.format("%Y-%m-%d"),
        report.generated_at.format("%H:%M:%S")
    );
    let _ = writeln!(
        out,
        "  <test-suite type=\"Assemblies\" name=\"xUnit.net Tests\" executed=\"True\" result=\"{}\" success=\"{}\" time=\"{}\">",
        suite_result(failed + errors),
        success(failed + errors),
        seconds(total.elapsed_ms)
    );
    out.push_str("    <results>\n");

    for assembly in &report.assemblies {
        let s = &assembly.summary;
        let assembly_failed = s.failed as usize + assembly.errors.len();
        let _ = writeln!(
            out,
            "      <test-suite type=\"Assembly\" executed=\"True\" name=\"{}\" result=\"{}\" success=\"{}\" time=\"{}\">",
            escape(&assembly.assembly_path),
            suite_result(assembly_failed),
            success(assembly_failed),
            seconds(s.elapsed_ms)
        );
        out.push_str("        <results>\n");

        for (class, tests) in assembly.tests_by_class() {
            let class_failed = tests
                .iter()
                .filter(|t| t.result == TestResultKind::Fail)
                .count();
            let time: u64 = tests.iter().map(|t| t.elapsed_ms).sum();
            let _ = writeln!(
                out,
                "          <test-suite type=\"TestFixture\" name=\"{}\" executed=\"True\" result=\"{}\" success=\"{}\" time=\"{}\">",
                escape(class),
                suite_result(class_failed),
                success(class_failed),
                seconds(time)
            );
            out.push_str("            <results>\n");
            for test in tests {
                write_case(&mut out, test);
            }
            out.push_str("            </results>\n");
            out.push_str("          </test-suite>\n");
        }

        out.push_str("        </results>\n");
        out.push_str("      </test-suite>\n");
    }

    out.push_str("    </results>\n");
    out.push_str("  </test-suite>\n");
    out.push_str("</test-results>\n");
    Ok(out)
}

fn write_case(out: &mut String, test: &TestResult) {
    let (executed, result, succeeded) = match test.result {
        TestResultKind::Pass => ("True", "Success", "True"),
        TestResultKind::Fail => ("True", "Failure", "False"),
        TestResultKind::Skip => ("False", "Ignored", "False"),
    };
    let _ = write!(
        out,
        "              <test-case name=\"{}\" executed=\"{}\" result=\"{}\" success=\"{}\"",
        escape(&test.name),
        executed,
        result,
        succeeded
    );
    if test.result != TestResultKind::Skip {
        let _ = write!(out, " time=\"{}\"", seconds(test.elapsed_ms));
    }

    let mut body = String::new();
    if !test.traits.is_empty() {
        body.push_str("                <properties>\n");
        for (name, values) in &test.traits {
            for value in values {
                let _ = writeln!(
                    body,
                    "                  <property name=\"{}\" value=\"{}\" />",
                    escape(name),
                    escape(value)
                );
            }
        }
        body.push_str("                </properties>\n");
    }
    match test.result {
        TestResultKind::Fail => {
            body.push_str("                <failure>\n");
            if let Some(message) = &test.message {
                let _ = writeln!(body, "                  <message>{}</message>", escape(message));
            }
            if let Some(stack) = &test.stack_trace {
                let _ = writeln!(body, "                  <stack-trace>{}</stack-trace>", escape(stack));
            }
            body.push_str("                </failure>\n");
        }
        TestResultKind::Skip => {
            let _ = writeln!(
                body,
                "                <reason>\n                  <message>{}</message>\n                </reason>",
                escape(test.reason.as_deref().unwrap_or_default())
            );
        }
        TestResultKind::Pass => {}
    }

    if body.is_empty() {
        out.push_str(" />\n");
    } else {
        out.push_str(">\n");
        out.push_str(&body);
        out.push_str("              </test-case>\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;

    #[test]
    fn test_nunit_totals_and_results() {
        let xml = render(&sample_report()).unwrap();
        assert!(xml.contains("<test-results name=\"Test results\" total=\"3\" errors=\"0\" failures=\"1\" not-run=\"1\""));
        assert!(xml.contains("<test-suite type=\"Assemblies\" name=\"xUnit.net Tests\" executed=\"True\" result=\"Failure\" success=\"False\""));
        assert!(xml.contains("result=\"Ignored\""));
        assert!(xml.contains("<property name=\"Category\" value=\"Unit\" />"));
        assert!(xml.contains("type=\"TestFixture\" name=\"A.MathTests\""));
    }
}
