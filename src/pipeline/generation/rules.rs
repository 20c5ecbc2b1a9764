//! Business rule validator: domain invariants a schema cannot express.
//!
//! Every rule runs on every suite; violations are collected, never
//! short-circuited. The suite content is never altered: a passing suite is
//! returned with its computed [`ComplianceFlags`] attached.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::bounds::CategoryBound;
use super::types::ValidationOutcome;
use crate::models::{
    is_valid_suite_id, is_valid_test_id, ComplianceFlags, GampCategory, TestCategory, TestSuite,
};

/// Step actions that evidence audit-trail review.
static AUDIT_EVIDENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(audit|trail)").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessRule {
    CountMismatch,
    CategoryMismatch,
    CountOutOfBounds,
    InvalidSuiteId,
    InvalidTestId,
    DuplicateTestId,
    TestCategoryMismatch,
    DanglingCoverageReference,
    DuplicateStepNumber,
    MissingDataIntegrityTest,
    MissingSecurityTest,
    MissingDataIntegrityRequirement,
    MissingAuditTrailStep,
}

impl BusinessRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CountMismatch => "count_mismatch",
            Self::CategoryMismatch => "category_mismatch",
            Self::CountOutOfBounds => "count_out_of_bounds",
            Self::InvalidSuiteId => "invalid_suite_id",
            Self::InvalidTestId => "invalid_test_id",
            Self::DuplicateTestId => "duplicate_test_id",
            Self::TestCategoryMismatch => "test_category_mismatch",
            Self::DanglingCoverageReference => "dangling_coverage_reference",
            Self::DuplicateStepNumber => "duplicate_step_number",
            Self::MissingDataIntegrityTest => "missing_data_integrity_test",
            Self::MissingSecurityTest => "missing_security_test",
            Self::MissingDataIntegrityRequirement => "missing_data_integrity_requirement",
            Self::MissingAuditTrailStep => "missing_audit_trail_step",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleViolation {
    pub rule: BusinessRule,
    pub message: String,
}

impl RuleViolation {
    pub fn new(rule: BusinessRule, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub requested_category: GampCategory,
    pub bound: &'a CategoryBound,
}

pub fn validate_business_rules(mut suite: TestSuite, ctx: &RuleContext<'_>) -> ValidationOutcome {
    let mut violations = Vec::new();

    check_counts(&suite, ctx, &mut violations);
    check_categories(&suite, ctx, &mut violations);
    check_identifiers(&suite, &mut violations);
    check_coverage_references(&suite, &mut violations);
    check_step_numbers(&suite, &mut violations);
    let evidence = check_compliance(&suite, &mut violations);

    if !violations.is_empty() {
        tracing::debug!(
            suite_id = %suite.suite_id,
            violations = violations.len(),
            "Business rule validation failed"
        );
        return ValidationOutcome::Invalid(violations);
    }

    suite.pharmaceutical_compliance = compliance_flags(&suite, &evidence);
    ValidationOutcome::Valid(suite)
}

// ──────────────────────────────────────────────
// Individual rules
// ──────────────────────────────────────────────

fn check_counts(suite: &TestSuite, ctx: &RuleContext<'_>, out: &mut Vec<RuleViolation>) {
    let actual = suite.test_cases.len();
    if suite.total_test_count as usize != actual {
        out.push(RuleViolation::new(
            BusinessRule::CountMismatch,
            format!(
                "total_test_count is {} but the suite contains {actual} test cases",
                suite.total_test_count
            ),
        ));
    }

    let bound = ctx.bound;
    if !bound.contains(actual as u32) {
        out.push(RuleViolation::new(
            BusinessRule::CountOutOfBounds,
            format!(
                "{actual} test cases is outside the {}-{} range for {}",
                bound.min_tests, bound.max_tests, ctx.requested_category
            ),
        ));
    }
}

fn check_categories(suite: &TestSuite, ctx: &RuleContext<'_>, out: &mut Vec<RuleViolation>) {
    if suite.gamp_category != ctx.requested_category {
        out.push(RuleViolation::new(
            BusinessRule::CategoryMismatch,
            format!(
                "Suite reports {} but {} was requested",
                suite.gamp_category, ctx.requested_category
            ),
        ));
    }

    for test in &suite.test_cases {
        if test.gamp_category != suite.gamp_category {
            out.push(RuleViolation::new(
                BusinessRule::TestCategoryMismatch,
                format!(
                    "{} reports {} but the suite is {}",
                    test.test_id, test.gamp_category, suite.gamp_category
                ),
            ));
        }
    }
}

fn check_identifiers(suite: &TestSuite, out: &mut Vec<RuleViolation>) {
    if !is_valid_suite_id(&suite.suite_id) {
        out.push(RuleViolation::new(
            BusinessRule::InvalidSuiteId,
            format!("Suite id '{}' does not match OQ-SUITE-NNNN", suite.suite_id),
        ));
    }

    let mut seen = HashSet::new();
    let mut duplicates = BTreeSet::new();
    for id in suite.test_ids() {
        if !is_valid_test_id(id) {
            out.push(RuleViolation::new(
                BusinessRule::InvalidTestId,
                format!("Test id '{id}' does not match OQ-NNN"),
            ));
        }
        if !seen.insert(id) {
            duplicates.insert(id);
        }
    }

    for id in duplicates {
        out.push(RuleViolation::new(
            BusinessRule::DuplicateTestId,
            format!("Duplicate test id {id}"),
        ));
    }
}

fn check_coverage_references(suite: &TestSuite, out: &mut Vec<RuleViolation>) {
    let known: HashSet<&str> = suite.test_ids().collect();

    let mut check = |map: &str, key: &str, ids: &[String]| {
        for id in ids.iter().filter(|id| !known.contains(id.as_str())) {
            out.push(RuleViolation::new(
                BusinessRule::DanglingCoverageReference,
                format!("{map}[{key}] references unknown test {id}"),
            ));
        }
    };

    for (key, ids) in &suite.requirements_coverage {
        check("requirements_coverage", key, ids.as_slice());
    }
    for (risk, ids) in &suite.risk_coverage {
        check("risk_coverage", risk.as_str(), ids.as_slice());
    }
    for (key, ids) in &suite.compliance_coverage {
        check("compliance_coverage", key, ids.as_slice());
    }
}

fn check_step_numbers(suite: &TestSuite, out: &mut Vec<RuleViolation>) {
    for test in &suite.test_cases {
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for step in &test.test_steps {
            *counts.entry(step.step_number).or_default() += 1;
        }
        for (number, _) in counts.into_iter().filter(|(_, n)| *n > 1) {
            out.push(RuleViolation::new(
                BusinessRule::DuplicateStepNumber,
                format!("{} repeats step number {number}", test.test_id),
            ));
        }
    }
}

/// Evidence gathered while checking compliance, reused for the flags.
#[derive(Debug, Default)]
struct ComplianceEvidence {
    has_security_test: bool,
    has_data_integrity_test: bool,
    has_data_integrity_requirement: bool,
    has_audit_step: bool,
}

fn check_compliance(suite: &TestSuite, out: &mut Vec<RuleViolation>) -> ComplianceEvidence {
    let has_category =
        |category: TestCategory| suite.test_cases.iter().any(|t| t.test_category == category);

    let evidence = ComplianceEvidence {
        has_security_test: has_category(TestCategory::Security),
        has_data_integrity_test: has_category(TestCategory::DataIntegrity),
        has_data_integrity_requirement: suite
            .test_cases
            .iter()
            .any(|t| t.data_integrity_requirements.iter().any(|r| !r.trim().is_empty())),
        has_audit_step: suite
            .steps()
            .any(|s| AUDIT_EVIDENCE.is_match(s.action.as_str())),
    };

    if suite.gamp_category.is_high_risk() {
        if !evidence.has_data_integrity_test {
            out.push(RuleViolation::new(
                BusinessRule::MissingDataIntegrityTest,
                format!("{} requires at least one data_integrity test", suite.gamp_category),
            ));
        }
        if !evidence.has_security_test {
            out.push(RuleViolation::new(
                BusinessRule::MissingSecurityTest,
                format!("{} requires at least one security test", suite.gamp_category),
            ));
        }
    }

    if !evidence.has_data_integrity_requirement {
        out.push(RuleViolation::new(
            BusinessRule::MissingDataIntegrityRequirement,
            "No test case references a data integrity requirement",
        ));
    }
    if !evidence.has_audit_step {
        out.push(RuleViolation::new(
            BusinessRule::MissingAuditTrailStep,
            "No test step verifies audit trail evidence",
        ));
    }

    evidence
}

fn compliance_flags(suite: &TestSuite, evidence: &ComplianceEvidence) -> ComplianceFlags {
    let data_integrity_verified = evidence.has_data_integrity_requirement
        && (!suite.gamp_category.is_high_risk() || evidence.has_data_integrity_test);
    let captures_data = suite.test_cases.iter().all(|t| {
        t.test_steps
            .iter()
            .any(|s| !s.data_to_capture.is_empty())
    });

    ComplianceFlags {
        alcoa_plus_compliant: captures_data && data_integrity_verified,
        cfr_part_11_compliant: evidence.has_audit_step && evidence.has_security_test,
        gmp_compliant: suite
            .test_cases
            .iter()
            .all(|t| !t.regulatory_basis.is_empty()),
        audit_trail_verified: evidence.has_audit_step,
        data_integrity_verified,
    }
}
