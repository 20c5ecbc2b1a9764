use std::sync::Arc;

use tracing::Instrument;

use super::bounds::CategoryBound;
use super::client::ModelClient;
use super::extractor::extract_payload;
use super::quality::{review_quality, QualityIssue};
use super::rules::{validate_business_rules, RuleContext};
use super::schema::validate_schema;
use super::types::{CancelFlag, GenerationOutcome, GenerationRequest, RawResponse, ValidationOutcome};
use super::{FailureKind, GenerationFailure, TimeoutOrigin, UpstreamError};
use crate::config::GenerationConfig;
use crate::models::TestSuite;
use crate::pipeline::diagnostic::{dump_dir_for, dump_json, DiagnosticContext, PipelineStage};

/// Drives one request through the generation state machine:
/// Requested → (AwaitingModelResponse) → Extracting → SchemaValidating →
/// RuleValidating → QualityGating → terminal.
///
/// Holds configuration only; every request owns its own diagnostic context,
/// so one pipeline serves concurrent requests without locking.
pub struct GenerationPipeline {
    config: GenerationConfig,
}

impl GenerationPipeline {
    pub fn new(config: GenerationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Validate already-obtained model text.
    pub fn process_response(&self, request: &GenerationRequest, raw_text: &str) -> GenerationOutcome {
        self.process_response_with_cancel(request, raw_text, &CancelFlag::new())
    }

    pub fn process_response_with_cancel(
        &self,
        request: &GenerationRequest,
        raw_text: &str,
        cancel: &CancelFlag,
    ) -> GenerationOutcome {
        let _span = tracing::info_span!(
            "generate_suite",
            request_id = %request.request_id,
            category = request.category.code()
        )
        .entered();

        let diag = self.start(request);
        let bound = match self
            .config
            .bounds
            .check_request(request.category, request.requested_test_count)
        {
            Ok(bound) => bound,
            Err(kind) => return self.fail(kind, diag),
        };

        self.run_stages(request, bound, &RawResponse::new(raw_text), diag, cancel)
    }

    /// Full attempt: bounds check, model call under the configured timeout,
    /// then the same stages as [`Self::process_response`].
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        client: Arc<dyn ModelClient>,
        cancel: &CancelFlag,
    ) -> GenerationOutcome {
        let span = tracing::info_span!(
            "generate_suite",
            request_id = %request.request_id,
            category = request.category.code(),
            client = client.name()
        );
        self.generate_inner(request, client, cancel)
            .instrument(span)
            .await
    }

    async fn generate_inner(
        &self,
        request: &GenerationRequest,
        client: Arc<dyn ModelClient>,
        cancel: &CancelFlag,
    ) -> GenerationOutcome {
        let mut diag = self.start(request);
        let bound = match self
            .config
            .bounds
            .check_request(request.category, request.requested_test_count)
        {
            Ok(bound) => bound,
            Err(kind) => return self.fail(kind, diag),
        };

        if let Err(kind) = advance(&mut diag, cancel, PipelineStage::AwaitingModelResponse) {
            return self.fail(kind, diag);
        }

        let timeout = self.config.model_timeout;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let call_request = request.clone();
        // The blocking call keeps running after a timeout; its result is dropped.
        let call = tokio::task::spawn_blocking(move || client.invoke(&call_request));

        let raw = match tokio::time::timeout(timeout, call).await {
            Ok(Ok(Ok(text))) => RawResponse::new(text),
            Ok(Ok(Err(UpstreamError::Timeout { timeout_ms }))) => {
                let kind = FailureKind::UpstreamTimeout {
                    timeout_ms,
                    origin: TimeoutOrigin::Client,
                };
                return self.fail(kind, diag);
            }
            Err(_) => {
                let kind = FailureKind::UpstreamTimeout {
                    timeout_ms,
                    origin: TimeoutOrigin::Pipeline,
                };
                return self.fail(kind, diag);
            }
            Ok(Ok(Err(UpstreamError::Unavailable(message)))) => {
                return self.fail(FailureKind::UpstreamUnavailable { message }, diag);
            }
            Ok(Err(join_error)) => {
                return self.fail(
                    FailureKind::UpstreamUnavailable {
                        message: format!("Model task aborted: {join_error}"),
                    },
                    diag,
                );
            }
        };

        tracing::info!(
            request_id = %request.request_id,
            response_len = raw.len(),
            "Model response received"
        );

        self.run_stages(request, bound, &raw, diag, cancel)
    }

    fn start(&self, request: &GenerationRequest) -> DiagnosticContext {
        tracing::info!(
            request_id = %request.request_id,
            category = request.category.code(),
            requested = ?request.requested_test_count,
            document = %request.document_name,
            "Generation requested"
        );
        DiagnosticContext::new(request.request_id, request.category, &request.document_name)
    }

    fn run_stages(
        &self,
        request: &GenerationRequest,
        bound: &CategoryBound,
        raw: &RawResponse,
        mut diag: DiagnosticContext,
        cancel: &CancelFlag,
    ) -> GenerationOutcome {
        match self.drive(request, bound, raw, &mut diag, cancel) {
            Ok((suite, advisories)) => self.finish(suite, advisories, diag),
            Err(kind) => self.fail(kind, diag),
        }
    }

    fn drive(
        &self,
        request: &GenerationRequest,
        bound: &CategoryBound,
        raw: &RawResponse,
        diag: &mut DiagnosticContext,
        cancel: &CancelFlag,
    ) -> Result<(TestSuite, Vec<QualityIssue>), FailureKind> {
        diag.record_input(raw.as_str(), self.config.preview_len);

        advance(diag, cancel, PipelineStage::Extracting)?;
        let payload = extract_payload(raw, diag).map_err(|failure| failure.kind())?;

        advance(diag, cancel, PipelineStage::SchemaValidating)?;
        let suite = validate_schema(payload).map_err(FailureKind::SchemaInvalid)?;

        advance(diag, cancel, PipelineStage::RuleValidating)?;
        let ctx = RuleContext {
            requested_category: request.category,
            bound,
        };
        let suite = match validate_business_rules(suite, &ctx) {
            ValidationOutcome::Valid(suite) => suite,
            ValidationOutcome::Invalid(violations) => {
                return Err(FailureKind::RuleViolation { violations });
            }
        };

        advance(diag, cancel, PipelineStage::QualityGating)?;
        let advisories = review_quality(&suite, bound, request.requested_test_count);

        Ok((suite, advisories))
    }

    fn finish(
        &self,
        suite: TestSuite,
        advisories: Vec<QualityIssue>,
        mut diag: DiagnosticContext,
    ) -> GenerationOutcome {
        if advisories.is_empty() {
            diag.enter(PipelineStage::Completed);
            tracing::info!(
                request_id = %diag.request_id(),
                suite_id = %suite.suite_id,
                tests = suite.test_cases.len(),
                "Generation completed"
            );
            self.dump(&diag, None);
            return GenerationOutcome::Completed(suite);
        }

        for issue in &advisories {
            diag.note(issue.message.clone());
        }
        diag.enter(PipelineStage::QualityReviewRequired);
        tracing::warn!(
            request_id = %diag.request_id(),
            suite_id = %suite.suite_id,
            advisories = advisories.len(),
            "Generated suite routed to human review"
        );
        self.dump(&diag, None);
        GenerationOutcome::QualityReviewRequired { suite, advisories }
    }

    fn fail(&self, kind: FailureKind, mut diag: DiagnosticContext) -> GenerationOutcome {
        tracing::warn!(
            request_id = %diag.request_id(),
            stage = diag.stage().as_str(),
            error = %kind,
            "Generation failed"
        );
        diag.mark_failed();
        self.dump(&diag, Some(&kind));
        GenerationOutcome::Failed(Box::new(GenerationFailure {
            kind,
            diagnostics: diag,
        }))
    }

    fn dump(&self, diag: &DiagnosticContext, failure: Option<&FailureKind>) {
        let Some(base) = &self.config.dump_dir else {
            return;
        };
        let Some(dir) = dump_dir_for(base, &diag.request_id()) else {
            return;
        };
        dump_json(&dir, "diagnostics.json", diag);
        if let Some(kind) = failure {
            dump_json(&dir, "failure.json", kind);
        }
    }
}

/// Stage boundary: honour cancellation, then record the transition.
fn advance(
    diag: &mut DiagnosticContext,
    cancel: &CancelFlag,
    next: PipelineStage,
) -> Result<(), FailureKind> {
    if cancel.is_cancelled() {
        return Err(FailureKind::Cancelled { stage: next });
    }
    diag.enter(next);
    tracing::debug!(
        request_id = %diag.request_id(),
        stage = next.as_str(),
        "Stage entered"
    );
    Ok(())
}
