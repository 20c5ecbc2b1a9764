use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::enums::{GampCategory, RiskLevel, TestCategory};
use super::ModelError;

/// Literal prefix of every test case identifier (`OQ-001`).
pub const TEST_ID_PREFIX: &str = "OQ-";
/// Exact length of a test case identifier.
pub const TEST_ID_LEN: usize = 6;

/// Literal prefix of a suite identifier (`OQ-SUITE-0001`).
pub const SUITE_ID_PREFIX: &str = "OQ-SUITE-";
/// Exact length of a suite identifier.
pub const SUITE_ID_LEN: usize = 13;

/// Prefix of user requirement references used for traceability.
pub const URS_PREFIX: &str = "URS-";

/// Minimum trimmed length of a step action.
pub const MIN_ACTION_LENGTH: usize = 10;

/// Exact literal prefix followed by ASCII digits up to a fixed total length.
pub fn matches_fixed_format(id: &str, prefix: &str, total_len: usize) -> bool {
    id.len() == total_len
        && id.starts_with(prefix)
        && id[prefix.len()..].chars().all(|c| c.is_ascii_digit())
}

pub fn is_valid_test_id(id: &str) -> bool {
    matches_fixed_format(id, TEST_ID_PREFIX, TEST_ID_LEN)
}

pub fn is_valid_suite_id(id: &str) -> bool {
    matches_fixed_format(id, SUITE_ID_PREFIX, SUITE_ID_LEN)
}

/// A complete OQ test suite as accepted by the schema validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSuite {
    pub suite_id: String,
    pub suite_name: String,
    pub version: String,
    pub gamp_category: GampCategory,
    pub document_name: String,
    pub test_cases: Vec<TestCase>,
    /// URS requirement id → test ids.
    pub requirements_coverage: BTreeMap<String, Vec<String>>,
    pub risk_coverage: BTreeMap<RiskLevel, Vec<String>>,
    /// Compliance tag (`alcoa_plus`, `cfr_part_11`, `gmp`, ...) → test ids.
    pub compliance_coverage: BTreeMap<String, Vec<String>>,
    pub total_test_count: u32,
    /// Minutes.
    pub estimated_execution_time: u32,
    /// Computed by the rule validator and serialized with the suite. Never
    /// read back: re-validating a serialized suite recomputes it.
    #[serde(default, skip_deserializing)]
    pub pharmaceutical_compliance: ComplianceFlags,
}

impl TestSuite {
    pub fn test_ids(&self) -> impl Iterator<Item = &str> {
        self.test_cases.iter().map(|t| t.test_id.as_str())
    }

    pub fn steps(&self) -> impl Iterator<Item = &TestStep> {
        self.test_cases.iter().flat_map(|t| t.test_steps.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub test_id: String,
    pub test_name: String,
    pub test_category: TestCategory,
    pub gamp_category: GampCategory,
    pub objective: String,
    pub prerequisites: Vec<String>,
    pub test_steps: Vec<TestStep>,
    pub acceptance_criteria: Vec<String>,
    pub regulatory_basis: Vec<String>,
    pub risk_level: RiskLevel,
    pub linked_requirements: Vec<String>,
    pub data_integrity_requirements: Vec<String>,
    pub estimated_duration_minutes: u32,
}

impl TestCase {
    pub fn references_urs(&self) -> bool {
        self.linked_requirements
            .iter()
            .any(|r| r.trim().starts_with(URS_PREFIX))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStep {
    pub step_number: u32,
    pub action: StepAction,
    pub expected_result: String,
    pub data_to_capture: Vec<String>,
    pub verification_method: String,
}

/// Step action text, at least [`MIN_ACTION_LENGTH`] characters once trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StepAction(String);

impl StepAction {
    pub fn new(action: impl Into<String>) -> Result<Self, ModelError> {
        let action = action.into();
        let len = action.trim().chars().count();
        if len < MIN_ACTION_LENGTH {
            return Err(ModelError::ActionTooShort {
                action,
                len,
                min: MIN_ACTION_LENGTH,
            });
        }
        Ok(Self(action))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StepAction {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StepAction> for String {
    fn from(action: StepAction) -> Self {
        action.0
    }
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Regulatory compliance flags derived from the suite content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceFlags {
    pub alcoa_plus_compliant: bool,
    pub cfr_part_11_compliant: bool,
    pub gmp_compliant: bool,
    pub audit_trail_verified: bool,
    pub data_integrity_verified: bool,
}

impl ComplianceFlags {
    pub fn all_passed(&self) -> bool {
        self.alcoa_plus_compliant
            && self.cfr_part_11_compliant
            && self.gmp_compliant
            && self.audit_trail_verified
            && self.data_integrity_verified
    }
}
