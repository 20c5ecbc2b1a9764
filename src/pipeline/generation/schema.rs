// Schema validator: parsed JSON object → typed TestSuite.
// No defaults are substituted; a missing or mistyped field is a violation.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use serde_path_to_error::Path;

use super::types::ExtractedPayload;
use crate::models::TestSuite;
use crate::pipeline::diagnostic::preview;

/// Characters of payload kept in a schema violation.
pub const SCHEMA_PREVIEW_LEN: usize = 200;

static MISSING_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"missing field `([^`]+)`").unwrap());

/// Structural or type mismatch between the payload and [`TestSuite`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaViolation {
    /// Underlying deserializer message.
    pub message: String,
    /// JSON path of the offending value (`test_cases[12].estimated_duration_minutes`).
    pub field: Option<String>,
    pub payload_preview: String,
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{} (field: {field})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Consume the payload and deserialize it into a [`TestSuite`].
pub fn validate_schema(payload: ExtractedPayload) -> Result<TestSuite, SchemaViolation> {
    let payload_preview = preview(&payload.text, SCHEMA_PREVIEW_LEN);

    let suite: TestSuite =
        serde_path_to_error::deserialize(Value::Object(payload.object)).map_err(|e| {
            let field = field_path(e.path(), &e.inner().to_string());
            SchemaViolation {
                message: e.inner().to_string(),
                field,
                payload_preview: payload_preview.clone(),
            }
        })?;

    // Serde accepts empty arrays; acceptance criteria must not be empty.
    if let Some((idx, test)) = suite
        .test_cases
        .iter()
        .enumerate()
        .find(|(_, t)| t.acceptance_criteria.is_empty())
    {
        return Err(SchemaViolation {
            message: format!("Test case {} has no acceptance criteria", test.test_id),
            field: Some(format!("test_cases[{idx}].acceptance_criteria")),
            payload_preview,
        });
    }

    tracing::debug!(
        suite_id = %suite.suite_id,
        tests = suite.test_cases.len(),
        "Payload matches suite schema"
    );

    Ok(suite)
}

/// Location of a deserialization error. A missing field is reported on its
/// container, so the field name from the message is appended to the path.
fn field_path(path: &Path, message: &str) -> Option<String> {
    let container = path.to_string();
    let container = (container != ".").then_some(container);
    let missing = MISSING_FIELD
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    match (container, missing) {
        (Some(container), Some(name)) => Some(format!("{container}.{name}")),
        (None, Some(name)) => Some(name.to_string()),
        (container, None) => container,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GampCategory, RiskLevel, TestCategory};
    use crate::pipeline::diagnostic::ExtractionStrategy;
    use serde_json::json;

    fn payload(value: Value) -> ExtractedPayload {
        let text = value.to_string();
        let Value::Object(object) = value else {
            panic!("fixture must be an object");
        };
        ExtractedPayload {
            strategy: ExtractionStrategy::TaggedFence,
            text,
            object,
        }
    }

    fn suite_json() -> Value {
        json!({
            "suite_id": "OQ-SUITE-0001",
            "suite_name": "LIMS OQ",
            "version": "1.0",
            "gamp_category": 3,
            "document_name": "URS.docx",
            "test_cases": [{
                "test_id": "OQ-001",
                "test_name": "Install check",
                "test_category": "installation",
                "gamp_category": 3,
                "objective": "Verify installation",
                "prerequisites": [],
                "test_steps": [{
                    "step_number": 1,
                    "action": "Open the installation log",
                    "expected_result": "Log present",
                    "data_to_capture": ["log path"],
                    "verification_method": "visual"
                }],
                "acceptance_criteria": ["Installation completes"],
                "regulatory_basis": ["21 CFR Part 11"],
                "risk_level": "medium",
                "linked_requirements": ["URS-001"],
                "data_integrity_requirements": ["ALCOA+"],
                "estimated_duration_minutes": 15
            }],
            "requirements_coverage": {"URS-001": ["OQ-001"]},
            "risk_coverage": {"medium": ["OQ-001"]},
            "compliance_coverage": {"gmp": ["OQ-001"]},
            "total_test_count": 1,
            "estimated_execution_time": 15
        })
    }

    #[test]
    fn valid_payload_becomes_typed_suite() {
        let suite = validate_schema(payload(suite_json())).unwrap();
        assert_eq!(suite.gamp_category, GampCategory::Category3);
        let test = &suite.test_cases[0];
        assert_eq!(test.test_category, TestCategory::Installation);
        assert_eq!(test.risk_level, RiskLevel::Medium);
        assert_eq!(suite.risk_coverage[&RiskLevel::Medium], vec!["OQ-001"]);
    }

    #[test]
    fn missing_field_is_named() {
        let mut value = suite_json();
        value.as_object_mut().unwrap().remove("suite_id");
        let err = validate_schema(payload(value)).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("suite_id"));
        assert!(err.message.contains("missing field"));
        assert!(err.to_string().contains("(field: suite_id)"));
    }

    #[test]
    fn wrong_primitive_type_is_rejected() {
        let mut value = suite_json();
        value["total_test_count"] = json!("one");
        let err = validate_schema(payload(value)).unwrap_err();
        assert!(err.message.contains("invalid type"), "{}", err.message);
        assert_eq!(err.field.as_deref(), Some("total_test_count"));
    }

    #[test]
    fn nested_type_error_reports_its_path() {
        let mut value = suite_json();
        value["test_cases"][0]["estimated_duration_minutes"] = json!("30");
        let err = validate_schema(payload(value)).unwrap_err();
        assert!(err.message.contains("expected u32"), "{}", err.message);
        assert_eq!(
            err.field.as_deref(),
            Some("test_cases[0].estimated_duration_minutes")
        );
        assert!(err.to_string().contains("(field: test_cases[0].estimated_duration_minutes)"));
    }

    #[test]
    fn nested_missing_field_is_qualified_by_its_container() {
        let mut value = suite_json();
        value["test_cases"][0]["test_steps"][0]
            .as_object_mut()
            .unwrap()
            .remove("expected_result");
        let err = validate_schema(payload(value)).unwrap_err();
        assert_eq!(
            err.field.as_deref(),
            Some("test_cases[0].test_steps[0].expected_result")
        );
    }

    #[test]
    fn unknown_enum_value_is_rejected() {
        let mut value = suite_json();
        value["test_cases"][0]["risk_level"] = json!("catastrophic");
        let err = validate_schema(payload(value)).unwrap_err();
        assert!(err.message.contains("catastrophic"));
    }

    #[test]
    fn unsupported_category_code_is_rejected() {
        let mut value = suite_json();
        value["gamp_category"] = json!(2);
        assert!(validate_schema(payload(value)).is_err());
    }

    #[test]
    fn short_step_action_is_rejected() {
        let mut value = suite_json();
        value["test_cases"][0]["test_steps"][0]["action"] = json!("Click");
        let err = validate_schema(payload(value)).unwrap_err();
        assert!(err.message.contains("too short"), "{}", err.message);
        assert_eq!(err.field.as_deref(), Some("test_cases[0].test_steps[0].action"));
    }

    #[test]
    fn empty_acceptance_criteria_is_rejected() {
        let mut value = suite_json();
        value["test_cases"][0]["acceptance_criteria"] = json!([]);
        let err = validate_schema(payload(value)).unwrap_err();
        assert_eq!(
            err.field.as_deref(),
            Some("test_cases[0].acceptance_criteria")
        );
    }

    #[test]
    fn model_supplied_compliance_flags_are_ignored() {
        let mut value = suite_json();
        value["pharmaceutical_compliance"] = json!({"gmp_compliant": true});
        let suite = validate_schema(payload(value)).unwrap();
        assert!(!suite.pharmaceutical_compliance.gmp_compliant);
    }

    #[test]
    fn preview_is_bounded() {
        let mut value = suite_json();
        value["suite_name"] = json!("x".repeat(1000));
        value.as_object_mut().unwrap().remove("version");
        let err = validate_schema(payload(value)).unwrap_err();
        assert!(err.payload_preview.chars().count() <= SCHEMA_PREVIEW_LEN + 1);
    }
}
