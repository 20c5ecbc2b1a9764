//! Generation diagnostics: the append-only trail of one generation attempt.
//!
//! Every stage of the pipeline records into a single [`DiagnosticContext`]:
//! input length and bounded preview, normalization report, each extraction
//! strategy tried (pattern, candidates, parse error), and every stage
//! transition. The context is attached unchanged to every failure.
//!
//! **Dump** (optional, `OQGEN_DUMP_DIR`):
//! ```text
//! {dump_dir}/{request_id}/
//!   diagnostics.json
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::GampCategory;

// ──────────────────────────────────────────────
// Stages
// ──────────────────────────────────────────────

/// Where a generation attempt currently is (or stopped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Requested,
    AwaitingModelResponse,
    Extracting,
    SchemaValidating,
    RuleValidating,
    QualityGating,
    Completed,
    QualityReviewRequired,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::AwaitingModelResponse => "awaiting_model_response",
            Self::Extracting => "extracting",
            Self::SchemaValidating => "schema_validating",
            Self::RuleValidating => "rule_validating",
            Self::QualityGating => "quality_gating",
            Self::Completed => "completed",
            Self::QualityReviewRequired => "quality_review_required",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::QualityReviewRequired | Self::Failed
        )
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The ordered extraction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// ```` ```json ```` fenced block.
    TaggedFence,
    /// Any fenced block whose body opens with `{`.
    GenericFence,
    /// Single-backtick span containing braces.
    InlineDelimiter,
    /// Top-level balanced-brace spans.
    BalancedScan,
    /// Brace spans enclosing a required field name.
    KeywordAnchored,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaggedFence => "tagged_fence",
            Self::GenericFence => "generic_fence",
            Self::InlineDelimiter => "inline_delimiter",
            Self::BalancedScan => "balanced_scan",
            Self::KeywordAnchored => "keyword_anchored",
        }
    }
}

// ──────────────────────────────────────────────
// Records
// ──────────────────────────────────────────────

/// One extraction strategy attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: ExtractionStrategy,
    pub pattern: String,
    /// Candidate spans located by the pattern.
    pub candidates: usize,
    pub succeeded: bool,
    /// Last parse error, or why no candidate was found.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageTransition {
    pub stage: PipelineStage,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NormalizationReport {
    pub removed_chars: usize,
    pub leading_bom: bool,
}

/// Append-only diagnostic record for one generation attempt.
///
/// Fields are private: stages can only add to the trail, never rewrite it.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticContext {
    request_id: Uuid,
    category: GampCategory,
    document_name: String,
    started_at: DateTime<Utc>,
    input_length: Option<usize>,
    input_preview: Option<String>,
    normalization: Option<NormalizationReport>,
    attempts: Vec<StrategyAttempt>,
    transitions: Vec<StageTransition>,
    failed_at: Option<PipelineStage>,
    notes: Vec<String>,
}

impl DiagnosticContext {
    pub fn new(request_id: Uuid, category: GampCategory, document_name: &str) -> Self {
        let now = Utc::now();
        Self {
            request_id,
            category,
            document_name: document_name.to_string(),
            started_at: now,
            input_length: None,
            input_preview: None,
            normalization: None,
            attempts: Vec::new(),
            transitions: vec![StageTransition {
                stage: PipelineStage::Requested,
                at: now,
            }],
            failed_at: None,
            notes: Vec::new(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn category(&self) -> GampCategory {
        self.category
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    /// Current (latest) stage.
    pub fn stage(&self) -> PipelineStage {
        self.transitions
            .last()
            .map(|t| t.stage)
            .unwrap_or(PipelineStage::Requested)
    }

    /// Stage at which the attempt failed, if it did.
    pub fn failed_at(&self) -> Option<PipelineStage> {
        self.failed_at
    }

    pub fn stages(&self) -> impl Iterator<Item = PipelineStage> + '_ {
        self.transitions.iter().map(|t| t.stage)
    }

    pub fn input_length(&self) -> Option<usize> {
        self.input_length
    }

    pub fn input_preview(&self) -> Option<&str> {
        self.input_preview.as_deref()
    }

    pub fn normalization(&self) -> Option<NormalizationReport> {
        self.normalization
    }

    pub fn attempts(&self) -> &[StrategyAttempt] {
        &self.attempts
    }

    pub fn notes(&self) -> &[String] {
        &self.notes
    }

    pub fn enter(&mut self, stage: PipelineStage) {
        self.transitions.push(StageTransition {
            stage,
            at: Utc::now(),
        });
    }

    /// Mark the current stage as the failure point and move to `Failed`.
    pub fn mark_failed(&mut self) {
        if self.failed_at.is_none() {
            self.failed_at = Some(self.stage());
        }
        self.enter(PipelineStage::Failed);
    }

    /// Record the raw input once. Later calls are ignored.
    pub fn record_input(&mut self, raw: &str, preview_len: usize) {
        if self.input_length.is_some() {
            return;
        }
        self.input_length = Some(raw.len());
        self.input_preview = Some(preview(raw, preview_len));
    }

    pub fn record_normalization(&mut self, report: NormalizationReport) {
        self.normalization = Some(report);
    }

    pub fn record_attempt(&mut self, attempt: StrategyAttempt) {
        self.attempts.push(attempt);
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// First `max_chars` characters, with an ellipsis marker when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.char_indices();
    match chars.nth(max_chars) {
        Some((byte_idx, _)) => format!("{}…", &text[..byte_idx]),
        None => text.to_string(),
    }
}

// ──────────────────────────────────────────────
// Dump writers
// ──────────────────────────────────────────────

/// `{base}/{request_id}`, created if missing. `None` when it cannot be created.
pub fn dump_dir_for(base: &Path, request_id: &Uuid) -> Option<PathBuf> {
    let dir = base.join(request_id.to_string());
    match std::fs::create_dir_all(&dir) {
        Ok(()) => Some(dir),
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                path = %dir.display(),
                error = %e,
                "Cannot create diagnostic dump directory"
            );
            None
        }
    }
}

/// Pretty-print `value` to `dir/filename`. I/O and serialization errors are
/// logged and swallowed: a dump never fails a generation attempt.
pub fn dump_json<T: Serialize>(dir: &Path, filename: &str, value: &T) {
    let path = dir.join(filename);
    let written = serde_json::to_string_pretty(value)
        .map_err(|e| e.to_string())
        .and_then(|json| {
            std::fs::write(&path, &json)
                .map(|()| json.len())
                .map_err(|e| e.to_string())
        });

    match written {
        Ok(bytes) => tracing::debug!(path = %path.display(), bytes, "Diagnostic dump written"),
        Err(error) => tracing::warn!(path = %path.display(), %error, "Diagnostic dump skipped"),
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
