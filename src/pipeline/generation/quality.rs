// Quality gate: advisory checks on a rule-valid suite.
// Findings never invalidate the suite; any finding routes it to human review.

use std::fmt;

use serde::Serialize;

use super::bounds::CategoryBound;
use crate::models::TestSuite;

/// Compliance tags every suite is expected to cover.
pub const EXPECTED_COMPLIANCE_TAGS: [&str; 3] = ["alcoa_plus", "cfr_part_11", "gmp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityCheck {
    CountRange,
    Traceability,
    ComplianceCoverage,
    TestCompleteness,
    CategoryDistribution,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QualityIssue {
    pub check: QualityCheck,
    pub message: String,
}

impl QualityIssue {
    fn new(check: QualityCheck, message: impl Into<String>) -> Self {
        Self {
            check,
            message: message.into(),
        }
    }
}

impl fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Run every advisory check. Empty result means the suite can complete.
pub fn review_quality(
    suite: &TestSuite,
    bound: &CategoryBound,
    requested: Option<u32>,
) -> Vec<QualityIssue> {
    let mut issues = Vec::new();

    // Count range
    if !bound.contains(suite.total_test_count) {
        issues.push(QualityIssue::new(
            QualityCheck::CountRange,
            format!(
                "{} tests is outside the recommended {}-{} range",
                suite.total_test_count, bound.min_tests, bound.max_tests
            ),
        ));
    }
    if let Some(requested) = requested {
        if requested as usize != suite.test_cases.len() {
            issues.push(QualityIssue::new(
                QualityCheck::CountRange,
                format!(
                    "{requested} tests requested but {} generated",
                    suite.test_cases.len()
                ),
            ));
        }
    }

    // Traceability
    let untraced: Vec<&str> = suite
        .test_cases
        .iter()
        .filter(|t| !t.references_urs())
        .map(|t| t.test_id.as_str())
        .collect();
    if !suite.test_cases.is_empty() && untraced.len() == suite.test_cases.len() {
        issues.push(QualityIssue::new(
            QualityCheck::Traceability,
            "No test case references a URS requirement",
        ));
    } else if !untraced.is_empty() {
        issues.push(QualityIssue::new(
            QualityCheck::Traceability,
            format!("Tests without URS reference: {}", untraced.join(", ")),
        ));
    }

    // Compliance coverage
    for tag in EXPECTED_COMPLIANCE_TAGS {
        let covered = suite
            .compliance_coverage
            .get(tag)
            .is_some_and(|ids| !ids.is_empty());
        if !covered {
            issues.push(QualityIssue::new(
                QualityCheck::ComplianceCoverage,
                format!("No tests mapped to compliance area '{tag}'"),
            ));
        }
    }

    // Completeness
    for test in &suite.test_cases {
        let id = &test.test_id;
        if test.objective.trim().is_empty() {
            issues.push(QualityIssue::new(
                QualityCheck::TestCompleteness,
                format!("{id} has no objective"),
            ));
        }
        if test.test_steps.is_empty() {
            issues.push(QualityIssue::new(
                QualityCheck::TestCompleteness,
                format!("{id} has no test steps"),
            ));
        }
        for step in &test.test_steps {
            if step.expected_result.trim().is_empty() {
                issues.push(QualityIssue::new(
                    QualityCheck::TestCompleteness,
                    format!("{id} step {} has no expected result", step.step_number),
                ));
            }
        }
        if test.estimated_duration_minutes == 0 {
            issues.push(QualityIssue::new(
                QualityCheck::TestCompleteness,
                format!("{id} has no estimated duration"),
            ));
        }
    }

    // Category distribution
    let missing: Vec<&str> = bound
        .required_test_categories
        .iter()
        .filter(|c| !suite.test_cases.iter().any(|t| t.test_category == **c))
        .map(|c| c.as_str())
        .collect();
    if !missing.is_empty() {
        issues.push(QualityIssue::new(
            QualityCheck::CategoryDistribution,
            format!("Missing required test categories: {}", missing.join(", ")),
        ));
    }

    issues
}
