//! Structured extractor: locate one JSON object inside free-form model text.
//!
//! Five strategies run strictly in order, short-circuiting on the first
//! candidate that parses as a JSON object:
//! 1. ```` ```json ```` fenced block
//! 2. any fenced block whose body opens with `{`
//! 3. single-backtick inline span containing braces
//! 4. top-level balanced-brace spans, in document order
//! 5. brace spans enclosing a required field name (`suite_id`, `gamp_category`, `test_cases`)
//!
//! Strategies 4 and 5 share one linear pass that pairs braces. The pass is
//! string- and escape-aware inside an open object: braces inside JSON string
//! literals never move the depth counter.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::normalize::normalize_response;
use super::types::{ExtractedPayload, RawResponse};
use super::{FailureKind, GenerationFailure};
use crate::pipeline::diagnostic::{DiagnosticContext, ExtractionStrategy, StrategyAttempt};

/// Human-actionable next steps attached to every extraction failure.
pub const EXTRACTION_SUGGESTIONS: [&str; 4] = [
    "Check the response format: the model must return one JSON object describing the test suite",
    "Verify structured-output (JSON) mode is enabled for the model call",
    "Adjust the prompt to ask for the suite inside a ```json fenced block",
    "Review the extraction patterns against the response preview in the diagnostics",
];

/// Field names that anchor the last-resort strategy.
pub const ANCHOR_FIELDS: [&str; 3] = ["suite_id", "gamp_category", "test_cases"];

/// Enclosing-brace candidates examined per anchor occurrence.
const MAX_ANCHOR_CANDIDATES: usize = 32;

static FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```([A-Za-z0-9_+.-]*)[ \t]*\r?\n?(.*?)```").unwrap());

static INLINE_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(`+)([^`]+)(`+)").unwrap());

static ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r#""(?:{})"\s*:"#, ANCHOR_FIELDS.join("|"))).unwrap()
});

type Locator = fn(&str) -> Vec<&str>;

/// Strategy order is part of the contract.
const STRATEGIES: [(ExtractionStrategy, &str, Locator); 5] = [
    (
        ExtractionStrategy::TaggedFence,
        "```json ... ```",
        tagged_fence_candidates,
    ),
    (
        ExtractionStrategy::GenericFence,
        "``` ... ``` with body starting '{'",
        generic_fence_candidates,
    ),
    (
        ExtractionStrategy::InlineDelimiter,
        "`{ ... }`",
        inline_candidates,
    ),
    (
        ExtractionStrategy::BalancedScan,
        "top-level { ... } at depth 0",
        balanced_candidates,
    ),
    (
        ExtractionStrategy::KeywordAnchored,
        "{ ... } enclosing \"suite_id\" | \"gamp_category\" | \"test_cases\"",
        keyword_anchored_candidates,
    ),
];

/// No strategy produced a JSON object. Terminal at this layer.
#[derive(Debug, Clone)]
pub struct ExtractionFailure {
    /// Whether any strategy located a candidate span at all.
    pub json_found: bool,
    pub recovery_available: bool,
    pub suggestions: Vec<String>,
    pub diagnostics: DiagnosticContext,
}

impl ExtractionFailure {
    pub fn kind(&self) -> FailureKind {
        FailureKind::ExtractionFailure {
            json_found: self.json_found,
            recovery_available: self.recovery_available,
            suggestions: self.suggestions.clone(),
        }
    }
}

impl From<ExtractionFailure> for GenerationFailure {
    fn from(failure: ExtractionFailure) -> Self {
        GenerationFailure {
            kind: failure.kind(),
            diagnostics: failure.diagnostics,
        }
    }
}

/// Normalize `raw` and run the strategies in order.
///
/// Every attempt is appended to `diag`, successful or not. Recording the raw
/// input is left to the caller, which owns the preview length.
pub fn extract_payload(
    raw: &RawResponse,
    diag: &mut DiagnosticContext,
) -> Result<ExtractedPayload, ExtractionFailure> {
    let normalized = normalize_response(raw.as_str());
    if normalized.was_modified() {
        tracing::debug!(
            request_id = %diag.request_id(),
            removed = normalized.report.removed_chars,
            "Invisible characters stripped from response"
        );
    }
    diag.record_normalization(normalized.report);

    let text = normalized.text.as_str();
    let mut json_found = false;

    for (strategy, pattern, locate) in STRATEGIES {
        let candidates = locate(text);
        json_found |= !candidates.is_empty();

        let mut last_error = None;
        for candidate in &candidates {
            match parse_object(candidate) {
                Ok(object) => {
                    tracing::debug!(
                        request_id = %diag.request_id(),
                        strategy = strategy.as_str(),
                        chars = candidate.len(),
                        "Extraction strategy succeeded"
                    );
                    diag.record_attempt(StrategyAttempt {
                        strategy,
                        pattern: pattern.to_string(),
                        candidates: candidates.len(),
                        succeeded: true,
                        error: last_error,
                    });
                    return Ok(ExtractedPayload {
                        strategy,
                        text: candidate.trim().to_string(),
                        object,
                    });
                }
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        tracing::debug!(
            request_id = %diag.request_id(),
            strategy = strategy.as_str(),
            candidates = candidates.len(),
            "Extraction strategy found no valid JSON object"
        );
        diag.record_attempt(StrategyAttempt {
            strategy,
            pattern: pattern.to_string(),
            candidates: candidates.len(),
            succeeded: false,
            error: Some(last_error.unwrap_or_else(|| "no candidate span found".into())),
        });
    }

    tracing::warn!(
        request_id = %diag.request_id(),
        input_len = raw.len(),
        json_found,
        "All extraction strategies failed"
    );

    Err(ExtractionFailure {
        json_found,
        recovery_available: false,
        suggestions: EXTRACTION_SUGGESTIONS.iter().map(|s| s.to_string()).collect(),
        diagnostics: diag.clone(),
    })
}

fn parse_object(candidate: &str) -> Result<Map<String, Value>, serde_json::Error> {
    serde_json::from_str::<Map<String, Value>>(candidate.trim())
}

// ──────────────────────────────────────────────
// Locators (pure, document order)
// ──────────────────────────────────────────────

fn fenced_blocks(text: &str) -> impl Iterator<Item = (&str, &str)> {
    FENCE.captures_iter(text).filter_map(|caps| {
        let info = caps.get(1)?.as_str();
        let body = caps.get(2)?.as_str();
        Some((info, body))
    })
}

fn tagged_fence_candidates(text: &str) -> Vec<&str> {
    fenced_blocks(text)
        .filter(|(info, _)| info.eq_ignore_ascii_case("json"))
        .map(|(_, body)| body)
        .collect()
}

fn generic_fence_candidates(text: &str) -> Vec<&str> {
    fenced_blocks(text)
        .map(|(_, body)| body)
        .filter(|body| body.trim_start().starts_with('{'))
        .collect()
}

/// Single-backtick spans only; the braces inside are taken first `{` to last `}`.
fn inline_candidates(text: &str) -> Vec<&str> {
    INLINE_SPAN
        .captures_iter(text)
        .filter(|caps| caps[1].len() == 1 && caps[3].len() == 1)
        .filter_map(|caps| {
            let body = caps.get(2)?.as_str();
            let open = body.find('{')?;
            let close = body.rfind('}')?;
            (open < close).then(|| &body[open..=close])
        })
        .collect()
}

fn balanced_candidates(text: &str) -> Vec<&str> {
    let mut spans = Vec::new();
    let mut covered_to = 0;

    // Pairs are sorted by opening brace; a pair starting inside the last kept
    // span is nested in it.
    for (start, end) in brace_pairs(text) {
        if start >= covered_to {
            spans.push(&text[start..end]);
            covered_to = end;
        }
    }

    spans
}

fn keyword_anchored_candidates(text: &str) -> Vec<&str> {
    let pairs = brace_pairs(text);
    let mut picked = vec![false; pairs.len()];
    let mut spans = Vec::new();

    for anchor in ANCHOR.find_iter(text) {
        // Nearest openers first, walking back from the anchor.
        let before = pairs.partition_point(|&(start, _)| start < anchor.start());
        for idx in (0..before).rev().take(MAX_ANCHOR_CANDIDATES) {
            let (start, end) = pairs[idx];
            if end > anchor.end() && !picked[idx] {
                picked[idx] = true;
                spans.push(&text[start..end]);
            }
        }
    }

    spans
}

/// Every closed `{`/`}` pair as `(open, one past close)` byte offsets,
/// sorted by the opening brace. One pass over the text.
///
/// String literals are tracked only while an object is open, so a stray quote
/// in surrounding prose does not hide the object after it. Byte-wise scanning
/// is UTF-8 safe: ASCII bytes never occur inside a multi-byte sequence.
fn brace_pairs(text: &str) -> Vec<(usize, usize)> {
    let mut open = Vec::new();
    let mut pairs = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &b) in text.as_bytes().iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }

        match b {
            b'"' if !open.is_empty() => in_string = true,
            b'{' => open.push(idx),
            b'}' => {
                if let Some(start) = open.pop() {
                    pairs.push((start, idx + 1));
                }
            }
            _ => {}
        }
    }

    pairs.sort_unstable_by_key(|&(start, _)| start);
    pairs
}
