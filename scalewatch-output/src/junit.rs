//! testgrid compatible JUnit XML
//!
//! Every record becomes a test case whose value is carried in a
//! `perf_latency` property, which is what testgrid plots.

use crate::errors::DeliveryError;
use handlebars::Handlebars;
use scalewatch_core::TestCaseRecord;
use serde_json::json;

/// Property name testgrid reads metric values from
pub const PERF_PROPERTY: &str = "perf_latency";

const JUNIT_TEMPLATE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<testsuites>
  <testsuite name="{{suite}}" time="0" failures="0" tests="{{tests}}">
{{#each cases}}
    <testcase class_name="{{../suite}}" name="{{name}}" time="0">
      <properties>
        <property name="{{../property}}" value="{{value}}"></property>
      </properties>
    </testcase>
{{/each}}
  </testsuite>
</testsuites>
"#;

/// Render the records of a suite as a JUnit XML document.
///
/// Rendered with handlebars' default escaping, so names are safe inside
/// attribute values.
pub fn render_junit(suite: &str, records: &[TestCaseRecord]) -> Result<String, DeliveryError> {
    let mut handlebars = Handlebars::new();
    handlebars.set_strict_mode(true);

    let cases: Vec<_> = records
        .iter()
        .map(|record| json!({ "name": record.name, "value": record.value.to_string() }))
        .collect();
    let data = json!({
        "suite": suite,
        "tests": records.len(),
        "property": PERF_PROPERTY,
        "cases": cases,
    });

    handlebars
        .render_template(JUNIT_TEMPLATE, &data)
        .map_err(|e| DeliveryError::TemplateRender {
            template: "junit".to_string(),
            error: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalewatch_core::Metric;

    #[test]
    fn test_render_junit() {
        let records = vec![
            TestCaseRecord::new("clients-010", Metric::RequestCount, 6000.0),
            TestCaseRecord::new("clients-010", Metric::ScaleDelta { from: 0, to: 1 }, 5.5),
        ];
        let xml = render_junit("scale-by-load", &records).unwrap();

        assert!(xml.starts_with("<?xml"));
        assert!(xml.contains("<testsuite name=\"scale-by-load\" time=\"0\" failures=\"0\" tests=\"2\">"));
        assert!(xml.contains(
            "<testcase class_name=\"scale-by-load\" name=\"clients-010/requestCount\" time=\"0\">"
        ));
        assert!(xml.contains("<property name=\"perf_latency\" value=\"6000\"></property>"));
        assert!(xml.contains("name=\"clients-010/scale-from-00-to-01(seconds)\""));
        assert!(xml.contains("value=\"5.5\""));
        assert_eq!(xml.matches("<testcase ").count(), 2);
        assert!(xml.trim_end().ends_with("</testsuites>"));
    }

    #[test]
    fn test_escapes_names() {
        let records = vec![TestCaseRecord {
            name: "a<b>&\"c\"".to_string(),
            value: 1.0,
        }];
        let xml = render_junit("s&s", &records).unwrap();
        assert!(xml.contains("name=\"a&lt;b&gt;&amp;&quot;c&quot;\""));
        assert!(xml.contains("<testsuite name=\"s&amp;s\""));
        assert!(xml.contains("class_name=\"s&amp;s\""));
    }

    #[test]
    fn test_empty_suite() {
        let xml = render_junit("empty", &[]).unwrap();
        assert!(xml.contains("tests=\"0\""));
        assert!(!xml.contains("<testcase"));
    }
}
