use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::quality::QualityIssue;
use super::rules::RuleViolation;
use super::GenerationFailure;
use crate::models::{GampCategory, TestSuite};
use crate::pipeline::diagnostic::ExtractionStrategy;

/// Caller parameters for one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub request_id: Uuid,
    pub category: GampCategory,
    /// Explicit target; must lie within the category bound.
    pub requested_test_count: Option<u32>,
    pub document_name: String,
    pub context_summary: String,
}

impl GenerationRequest {
    pub fn new(category: GampCategory, document_name: &str, context_summary: &str) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            category,
            requested_test_count: None,
            document_name: document_name.to_string(),
            context_summary: context_summary.to_string(),
        }
    }

    pub fn with_test_count(mut self, count: u32) -> Self {
        self.requested_test_count = Some(count);
        self
    }
}

/// Text received from the model collaborator. Read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse(String);

impl RawResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A syntactically valid JSON object located in the response.
///
/// Produced once by the extractor and consumed once by the schema validator.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPayload {
    pub strategy: ExtractionStrategy,
    /// The exact candidate span that parsed.
    pub text: String,
    pub object: Map<String, Value>,
}

/// Business-rule classification of a well-typed suite.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationOutcome {
    /// Suite with computed compliance flags.
    Valid(TestSuite),
    /// Every violated invariant, not just the first.
    Invalid(Vec<RuleViolation>),
}

/// Terminal outcome of the generation state machine.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Completed(TestSuite),
    QualityReviewRequired {
        suite: TestSuite,
        advisories: Vec<QualityIssue>,
    },
    Failed(Box<GenerationFailure>),
}

impl GenerationOutcome {
    /// The validated suite, if any.
    pub fn suite(&self) -> Option<&TestSuite> {
        match self {
            Self::Completed(suite) | Self::QualityReviewRequired { suite, .. } => Some(suite),
            Self::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&GenerationFailure> {
        match self {
            Self::Failed(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn requires_review(&self) -> bool {
        matches!(self, Self::QualityReviewRequired { .. })
    }
}

/// Cooperative cancellation, checked at every stage boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_sets_target() {
        let request = GenerationRequest::new(GampCategory::Category3, "URS.docx", "LIMS")
            .with_test_count(7);
        assert_eq!(request.requested_test_count, Some(7));
        assert_eq!(request.document_name, "URS.docx");
    }

    #[test]
    fn requests_get_distinct_ids() {
        let a = GenerationRequest::new(GampCategory::Category1, "a", "");
        let b = GenerationRequest::new(GampCategory::Category1, "a", "");
        assert_ne!(a.request_id, b.request_id);
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn raw_response_reports_length() {
        let raw = RawResponse::new("{}");
        assert_eq!(raw.len(), 2);
        assert!(!raw.is_empty());
        assert_eq!(raw.as_str(), "{}");
    }
}
