//! Report emission
//!
//! Serializes a finalized `RunReport` as JSON or as JUnit-style XML.

use std::fmt::Write as _;
use std::io::Write;
use std::str::FromStr;

use super::{ReportError, RunReport};
use crate::models::{format_timestamp, CaseMessage, TestCase, TestSuite};

/// Report output format
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    #[default]
    Xml,
}

impl ReportFormat {
    /// JSON when the flag is set, XML otherwise
    pub fn from_flag(emit_json: bool) -> Self {
        if emit_json {
            ReportFormat::Json
        } else {
            ReportFormat::Xml
        }
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "xml" | "junit" => Ok(ReportFormat::Xml),
            _ => Err(format!("unknown report format: {s}")),
        }
    }
}

/// Write `report` to `out` in `format`, followed by a newline
pub fn emit(
    report: &RunReport,
    format: ReportFormat,
    out: &mut dyn Write,
) -> Result<(), ReportError> {
    let document = render(report, format)?;
    writeln!(out, "{document}")?;
    out.flush()?;
    Ok(())
}

/// Render `report` without writing it
fn render(report: &RunReport, format: ReportFormat) -> Result<String, ReportError> {
    if !report.is_finalized() {
        return Err(ReportError::NotFinalized);
    }
    match format {
        ReportFormat::Json => render_json(report),
        ReportFormat::Xml => render_xml(report),
    }
}

fn render_json(report: &RunReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn render_xml(report: &RunReport) -> Result<String, ReportError> {
    let mut output = String::new();

    writeln!(output, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    write!(
        output,
        r#"<testsuites name="{}" tests="{}" skipped="{}" failures="{}" errors="{}" timestamp="{}" time="{}""#,
        escape_xml(&report.name),
        report.total(),
        report.skipped(),
        report.failures(),
        report.errors(),
        format_timestamp(&report.started()),
        seconds(report.time().as_secs_f64())
    )?;

    if report.suites().is_empty() {
        write!(output, " />")?;
        return Ok(output);
    }

    writeln!(output, ">")?;
    for suite in report.suites() {
        write_suite(&mut output, suite)?;
    }
    write!(output, "</testsuites>")?;

    Ok(output)
}

fn write_suite(output: &mut String, suite: &TestSuite) -> std::fmt::Result {
    write!(
        output,
        r#"  <testsuite name="{}" tests="{}" skipped="{}" failures="{}" errors="{}""#,
        escape_xml(&suite.name),
        suite.total,
        suite.skipped,
        suite.failures,
        suite.errors
    )?;
    if let Some(timestamp) = &suite.timestamp {
        write!(output, r#" timestamp="{}""#, format_timestamp(timestamp))?;
    }
    write!(output, r#" time="{}""#, seconds(suite.time.as_secs_f64()))?;

    if suite.cases.is_empty() {
        return writeln!(output, " />");
    }

    writeln!(output, ">")?;
    for case in &suite.cases {
        write_case(output, case)?;
    }
    writeln!(output, "  </testsuite>")
}

fn write_case(output: &mut String, case: &TestCase) -> std::fmt::Result {
    write!(output, r#"    <testcase name="{}""#, escape_xml(&case.name))?;
    if !case.classname.is_empty() {
        write!(output, r#" classname="{}""#, escape_xml(&case.classname))?;
    }
    write!(output, r#" time="{}""#, seconds(case.time.as_secs_f64()))?;

    let children = [
        ("failure", &case.failure),
        ("error", &case.error),
        ("skipped", &case.skipped),
    ];
    if children.iter().all(|(_, m)| m.is_none()) && case.system_out.is_none() {
        return writeln!(output, " />");
    }

    writeln!(output, ">")?;
    for (tag, message) in children {
        if let Some(message) = message {
            write_message(output, tag, message)?;
        }
    }
    if let Some(out) = &case.system_out {
        writeln!(output, "      <system-out>{}</system-out>", escape_xml(out))?;
    }
    writeln!(output, "    </testcase>")
}

fn write_message(output: &mut String, tag: &str, message: &CaseMessage) -> std::fmt::Result {
    match &message.detail {
        Some(detail) => writeln!(
            output,
            r#"      <{tag} message="{}">{}</{tag}>"#,
            escape_xml(&message.message),
            escape_xml(detail)
        ),
        None => writeln!(
            output,
            r#"      <{tag} message="{}" />"#,
            escape_xml(&message.message)
        ),
    }
}

fn seconds(secs: f64) -> String {
    format!("{secs:.3}")
}

/// Escape text for use in XML attributes and character data
fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' | '\r' | '\t' => escaped.push(c),
            c if (c as u32) < 0x20 => {}
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TaskOutcome;
    use std::time::Duration;

    fn finished_report() -> RunReport {
        let mut report = RunReport::start("smoke <nightly>", "1.0");
        report
            .fold(vec![
                TaskOutcome::Suite(TestSuite::from_cases(
                    "ping",
                    vec![
                        TestCase::pass("reachable", Duration::from_millis(120)),
                        TestCase::fail("latency", Duration::from_millis(30), "took > 20ms"),
                        TestCase::skip("ipv6", "disabled"),
                    ],
                )),
                TaskOutcome::Suite(TestSuite::from_cases(
                    "api",
                    vec![TestCase::error("login", Duration::ZERO, "crash")
                        .with_output("a & b")],
                )),
            ])
            .unwrap();
        report.finish().unwrap();
        report
    }

    fn attr<'a>(xml: &'a str, tag: &str, name: &str) -> &'a str {
        let start = xml.find(&format!("<{tag} ")).unwrap();
        let element = &xml[start..];
        let key = format!(" {name}=\"");
        let value = &element[element.find(&key).unwrap() + key.len()..];
        &value[..value.find('"').unwrap()]
    }

    #[test]
    fn test_json_and_xml_agree() {
        let report = finished_report();
        let json: serde_json::Value =
            serde_json::from_str(&render(&report, ReportFormat::Json).unwrap()).unwrap();
        let xml = render(&report, ReportFormat::Xml).unwrap();

        for key in ["tests", "skipped", "failures", "errors"] {
            assert_eq!(
                json[key].to_string(),
                attr(&xml, "testsuites", key),
                "mismatch on {key}"
            );
        }
        assert_eq!(json["timestamp"], attr(&xml, "testsuites", "timestamp"));
        assert_eq!(json["tests"], 4);
        assert_eq!(json["errors"], 1);
    }

    #[test]
    fn test_xml_structure() {
        let xml = render(&finished_report(), ReportFormat::Xml).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<testsuites "));
        assert!(xml.ends_with("</testsuites>"));
        assert_eq!(xml.matches("<testsuite ").count(), 2);
        assert_eq!(xml.matches("<testcase ").count(), 4);
        assert!(xml.contains(r#"name="smoke &lt;nightly&gt;""#));
        assert!(xml.contains(r#"<failure message="took &gt; 20ms" />"#));
        assert!(xml.contains(r#"<skipped message="disabled" />"#));
        assert!(xml.contains("<system-out>a &amp; b</system-out>"));
        assert!(xml.contains("\n  <testsuite name=\"ping\""));
        assert!(xml.contains("\n    <testcase name=\"reachable\" time=\"0.120\" />"));
    }

    #[test]
    fn test_empty_report() {
        let mut report = RunReport::start("empty", "");
        report.finish().unwrap();
        let xml = render(&report, ReportFormat::Xml).unwrap();
        assert!(xml.contains(r#"tests="0""#));
        assert!(xml.trim_end().ends_with("/>"));
    }

    #[test]
    fn test_unfinalized_report_is_rejected() {
        let report = RunReport::start("run", "");
        let mut out = Vec::new();
        assert!(matches!(
            emit(&report, ReportFormat::Json, &mut out),
            Err(ReportError::NotFinalized)
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_emit_appends_newline() {
        let report = finished_report();
        let mut out = Vec::new();
        emit(&report, ReportFormat::Json, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("{\n  \"name\""));
        assert!(text.ends_with("}\n"));
    }

    #[test]
    fn test_format_selection() {
        assert_eq!(ReportFormat::from_flag(true), ReportFormat::Json);
        assert_eq!(ReportFormat::from_flag(false), ReportFormat::Xml);
        assert_eq!("JSON".parse::<ReportFormat>(), Ok(ReportFormat::Json));
        assert!("csv".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml(r#"<a href="x">&'"#), "&lt;a href=&quot;x&quot;&gt;&amp;&apos;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
    }
}
