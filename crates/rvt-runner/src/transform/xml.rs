//! xUnit.net v2 and v1 XML.

use std::fmt::Write;

use super::seconds;
use crate::error::TransformError;
use crate::report::{AssemblyReport, RunReport, TestResult, TestResultKind};

/// Escape text for use in XML content and attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}

pub(super) fn render_v2(report: &RunReport) -> Result<String, TransformError> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    let _ = writeln!(
        out,
        "<assemblies timestamp=\"{}\">",
        report.generated_at.format("%m/%d/%Y %H:%M:%S")
    );

    for assembly in &report.assemblies {
        let s = &assembly.summary;
        let _ = write!(
            out,
            "  <assembly name=\"{}\" environment=\"{}\" test-framework=\"{}\" run-date=\"{}\" run-time=\"{}\"",
            escape(&assembly.assembly_path),
            escape(&assembly.environment),
            escape(&assembly.test_framework),
            assembly.run_at.format("%Y-%m-%d"),
            assembly.run_at.format("%H:%M:%S"),
        );
        if let Some(config) = &assembly.config_path {
            let _ = write!(out, " config-file=\"{}\"", escape(config));
        }
        let _ = writeln!(
            out,
            " total=\"{}\" passed=\"{}\" failed=\"{}\" skipped=\"{}\" time=\"{}\" errors=\"{}\">",
            s.total,
            s.passed(),
            s.failed,
            s.skipped,
            seconds(s.elapsed_ms),
            assembly.errors.len()
        );

        write_errors(&mut out, assembly);

        if !assembly.tests.is_empty() {
            let _ = writeln!(
                out,
                "    <collection total=\"{}\" passed=\"{}\" failed=\"{}\" skipped=\"{}\" name=\"Test collection for {}\" time=\"{}\">",
                s.total,
                s.passed(),
                s.failed,
                s.skipped,
                escape(&assembly.name),
                seconds(s.elapsed_ms)
            );
            for test in &assembly.tests {
                write_v2_test(&mut out, test);
            }
            out.push_str("    </collection>\n");
        }
        out.push_str("  </assembly>\n");
    }

    out.push_str("</assemblies>\n");
    Ok(out)
}

fn write_errors(out: &mut String, assembly: &AssemblyReport) {
    if assembly.errors.is_empty() {
        out.push_str("    <errors />\n");
        return;
    }
    out.push_str("    <errors>\n");
    for error in &assembly.errors {
        let _ = writeln!(
            out,
            "      <error type=\"fatal\"><failure><message>{}</message></failure></error>",
            escape(error)
        );
    }
    out.push_str("    </errors>\n");
}

fn write_v2_test(out: &mut String, test: &TestResult) {
    let _ = write!(
        out,
        "      <test name=\"{}\" type=\"{}\" method=\"{}\" time=\"{}\" result=\"{}\"",
        escape(&test.name),
        escape(&test.class_name),
        escape(&test.method_name),
        seconds(test.elapsed_ms),
        test.result.as_str()
    );
    let body = test_body(test, "        ");
    if body.is_empty() {
        out.push_str(" />\n");
    } else {
        out.push_str(">\n");
        out.push_str(&body);
        out.push_str("      </test>\n");
    }
}

/// Failure, skip reason, output and traits of one test.
fn test_body(test: &TestResult, indent: &str) -> String {
    let mut body = String::new();
    match test.result {
        TestResultKind::Fail => {
            let _ = writeln!(body, "{}<failure>", indent);
            if let Some(message) = &test.message {
                let _ = writeln!(body, "{}  <message>{}</message>", indent, escape(message));
            }
            if let Some(stack) = &test.stack_trace {
                let _ = writeln!(body, "{}  <stack-trace>{}</stack-trace>", indent, escape(stack));
            }
            let _ = writeln!(body, "{}</failure>", indent);
        }
        TestResultKind::Skip => {
            if let Some(reason) = &test.reason {
                let _ = writeln!(body, "{}<reason>{}</reason>", indent, escape(reason));
            }
        }
        TestResultKind::Pass => {}
    }
    if !test.output.is_empty() {
        let _ = writeln!(body, "{}<output>{}</output>", indent, escape(&test.output));
    }
    if !test.traits.is_empty() {
        let _ = writeln!(body, "{}<traits>", indent);
        for (name, values) in &test.traits {
            for value in values {
                let _ = writeln!(
                    body,
                    "{}  <trait name=\"{}\" value=\"{}\" />",
                    indent,
                    escape(name),
                    escape(value)
                );
            }
        }
        let _ = writeln!(body, "{}</traits>", indent);
    }
    body
}

pub(super) fn render_v1(report: &RunReport) -> Result<String, TransformError> {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<assemblies>\n");

    for assembly in &report.assemblies {
        let s = &assembly.summary;
        let _ = write!(
            out,
            "  <assembly name=\"{}\" run-date=\"{}\" run-time=\"{}\"",
            escape(&assembly.assembly_path),
            assembly.run_at.format("%Y-%m-%d"),
            assembly.run_at.format("%H:%M:%S"),
        );
        if let Some(config) = &assembly.config_path {
            let _ = write!(out, " configFile=\"{}\"", escape(config));
        }
        let _ = writeln!(
            out,
            " time=\"{}\" total=\"{}\" passed=\"{}\" failed=\"{}\" skipped=\"{}\" environment=\"{}\" test-framework=\"{}\">",
            seconds(s.elapsed_ms),
            s.total,
            s.passed(),
            s.failed,
            s.skipped,
            escape(&assembly.environment),
            escape(&assembly.test_framework)
        );

        for (class, tests) in assembly.tests_by_class() {
            let count = |kind: TestResultKind| tests.iter().filter(|t| t.result == kind).count();
            let time: u64 = tests.iter().map(|t| t.elapsed_ms).sum();
            let _ = writeln!(
                out,
                "    <class time=\"{}\" name=\"{}\" total=\"{}\" passed=\"{}\" failed=\"{}\" skipped=\"{}\">",
                seconds(time),
                escape(class),
                tests.len(),
                count(TestResultKind::Pass),
                count(TestResultKind::Fail),
                count(TestResultKind::Skip)
            );
            for test in tests {
                write_v1_test(&mut out, test);
            }
            out.push_str("    </class>\n");
        }
        out.push_str("  </assembly>\n");
    }

    out.push_str("</assemblies>\n");
    Ok(out)
}

fn write_v1_test(out: &mut String, test: &TestResult) {
    let _ = write!(
        out,
        "      <test name=\"{}\" type=\"{}\" method=\"{}\" result=\"{}\"",
        escape(&test.name),
        escape(&test.class_name),
        escape(&test.method_name),
        test.result.as_str()
    );
    if test.result != TestResultKind::Skip {
        let _ = write!(out, " time=\"{}\"", seconds(test.elapsed_ms));
    }

    let mut body = String::new();
    match test.result {
        TestResultKind::Fail => {
            body.push_str("        <failure exception-type=\"\">\n");
            if let Some(message) = &test.message {
                let _ = writeln!(body, "          <message>{}</message>", escape(message));
            }
            if let Some(stack) = &test.stack_trace {
                let _ = writeln!(body, "          <stack-trace>{}</stack-trace>", escape(stack));
            }
            body.push_str("        </failure>\n");
        }
        TestResultKind::Skip => {
            let reason = test.reason.as_deref().unwrap_or_default();
            let _ = writeln!(
                body,
                "        <reason>\n          <message>{}</message>\n        </reason>",
                escape(reason)
            );
        }
        TestResultKind::Pass => {}
    }
    if !test.output.is_empty() {
        let _ = writeln!(body, "        <output>{}</output>", escape(&test.output));
    }

    if body.is_empty() {
        out.push_str(" />\n");
    } else {
        out.push_str(">\n");
        out.push_str(&body);
        out.push_str("      </test>\n");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::tests::sample_report;

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & \"c\" 'd'>"), "a&lt;b &amp; &quot;c&quot; &apos;d&apos;&gt;");
        assert_eq!(escape("bell\u{7}"), "bell\\x07");
    }

    #[test]
    fn test_v2_structure() {
        let xml = render_v2(&sample_report()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<assemblies timestamp=\"03/14/2026 09:26:53\">"));
        assert!(xml.contains("<assembly name=\"/bin/A.dll\""));
        assert!(xml.contains("total=\"3\" passed=\"1\" failed=\"1\" skipped=\"1\" time=\"0.036\" errors=\"0\""));
        assert!(xml.contains("result=\"Fail\""));
        assert!(xml.contains("<message>Assert.Equal() Failure &lt;1&gt; &amp; &quot;2&quot;</message>"));
        assert!(xml.contains("<reason>not today</reason>"));
        assert!(xml.contains("<trait name=\"Category\" value=\"Unit\" />"));
        assert!(xml.contains("config-file=\"/bin/B.json\""));
        assert!(xml.trim_end().ends_with("</assemblies>"));
    }

    #[test]
    fn test_v1_groups_by_class() {
        let xml = render_v1(&sample_report()).unwrap();
        assert!(xml.contains("<class time=\"0.024\" name=\"A.MathTests\" total=\"2\" passed=\"1\" failed=\"1\" skipped=\"0\">"));
        assert!(xml.contains("<class time=\"0.012\" name=\"A.OtherTests\" total=\"1\" passed=\"0\" failed=\"0\" skipped=\"1\">"));
        assert!(xml.contains("<failure exception-type=\"\">"));
        assert!(xml.contains("configFile=\"/bin/B.json\""));
    }
}
