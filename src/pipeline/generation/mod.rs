//! OQ test-suite generation: raw model text → validated [`TestSuite`].
//!
//! ```text
//! Requested → (AwaitingModelResponse) → Extracting → SchemaValidating
//!           → RuleValidating → QualityGating → Completed | QualityReviewRequired | Failed
//! ```
//!
//! Nothing is recovered silently: every fatal condition is a [`FailureKind`]
//! carrying the full [`DiagnosticContext`]; the only non-fatal branch routes
//! to human review.
//!
//! [`TestSuite`]: crate::models::TestSuite

pub mod types;
pub mod bounds;
pub mod normalize;
pub mod extractor;
pub mod schema;
pub mod rules;
pub mod quality;
pub mod client;
pub mod orchestrator;

pub use types::*;
pub use bounds::*;
pub use normalize::*;
pub use extractor::*;
pub use schema::*;
pub use rules::*;
pub use quality::*;
pub use client::*;
pub use orchestrator::*;

use serde::Serialize;
use thiserror::Error;

use crate::models::GampCategory;
use crate::pipeline::diagnostic::{DiagnosticContext, PipelineStage};

/// Errors outside a single generation attempt (configuration, lookups).
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No bound configured for {0}")]
    UnknownCategory(GampCategory),
}

/// Failure of the external model collaborator, surfaced verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// The client gave up on its own deadline.
    #[error("Model call timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

/// Why a generation attempt ended without a usable suite.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    #[error("No bound configured for {category}")]
    UnknownCategory { category: GampCategory },

    #[error("Requested {requested} tests for {category}, allowed range is {min}-{max}")]
    CategoryOutOfRange {
        category: GampCategory,
        requested: u32,
        min: u32,
        max: u32,
    },

    #[error("No extraction strategy produced a valid JSON payload (json_found: {json_found})")]
    ExtractionFailure {
        json_found: bool,
        recovery_available: bool,
        suggestions: Vec<String>,
    },

    #[error("Payload failed schema validation: {0}")]
    SchemaInvalid(SchemaViolation),

    #[error("{} business rule violation(s): {}", .violations.len(), summarize(.violations))]
    RuleViolation { violations: Vec<RuleViolation> },

    #[error("Model did not respond within {timeout_ms} ms ({origin} deadline)")]
    UpstreamTimeout {
        timeout_ms: u64,
        origin: TimeoutOrigin,
    },

    #[error("Model unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Generation cancelled before {stage}")]
    Cancelled { stage: PipelineStage },
}

/// Whose deadline expired on the model call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutOrigin {
    /// `GenerationConfig::model_timeout`.
    Pipeline,
    /// Reported by the model client itself.
    Client,
}

impl std::fmt::Display for TimeoutOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pipeline => "pipeline",
            Self::Client => "client",
        })
    }
}

fn summarize(violations: &[RuleViolation]) -> String {
    violations
        .iter()
        .map(|v| v.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A terminal failure with the diagnostic trail accumulated up to it.
#[derive(Error, Debug, Clone)]
#[error("{kind}")]
pub struct GenerationFailure {
    pub kind: FailureKind,
    pub diagnostics: DiagnosticContext,
}
