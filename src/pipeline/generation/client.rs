use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::types::{CancelFlag, GenerationRequest};
use super::UpstreamError;

/// The external model collaborator. Blocking; the pipeline runs it on the
/// blocking pool under a timeout.
pub trait ModelClient: Send + Sync {
    /// Produce the raw response text for one request.
    fn invoke(&self, request: &GenerationRequest) -> Result<String, UpstreamError>;

    /// Label used in logs.
    fn name(&self) -> &str {
        "model"
    }
}

/// Mock model client for testing. Returns a canned response or error.
pub struct MockModelClient {
    response: Result<String, UpstreamError>,
    delay: Option<Duration>,
    cancel_during_invoke: Option<CancelFlag>,
    calls: AtomicUsize,
}

impl MockModelClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            delay: None,
            cancel_during_invoke: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self {
            response: Err(error),
            ..Self::new("")
        }
    }

    /// Sleep before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Trip `flag` while the call is in flight.
    pub fn cancelling(mut self, flag: CancelFlag) -> Self {
        self.cancel_during_invoke = Some(flag);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelClient for MockModelClient {
    fn invoke(&self, _request: &GenerationRequest) -> Result<String, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(flag) = &self.cancel_during_invoke {
            flag.cancel();
        }
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        self.response.clone()
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GampCategory;

    fn request() -> GenerationRequest {
        GenerationRequest::new(GampCategory::Category3, "URS.docx", "LIMS")
    }

    #[test]
    fn mock_returns_canned_response_and_counts_calls() {
        let client = MockModelClient::new("{\"ok\": true}");
        assert_eq!(client.invoke(&request()).unwrap(), "{\"ok\": true}");
        client.invoke(&request()).unwrap();
        assert_eq!(client.call_count(), 2);
    }

    #[test]
    fn failing_mock_surfaces_error_verbatim() {
        let client = MockModelClient::failing(UpstreamError::Unavailable("503".into()));
        assert_eq!(
            client.invoke(&request()),
            Err(UpstreamError::Unavailable("503".into()))
        );
    }

    #[test]
    fn cancelling_mock_trips_flag() {
        let flag = CancelFlag::new();
        let client = MockModelClient::new("{}").cancelling(flag.clone());
        client.invoke(&request()).unwrap();
        assert!(flag.is_cancelled());
    }

    #[test]
    fn client_is_object_safe() {
        let client: Box<dyn ModelClient> = Box::new(MockModelClient::new("x"));
        assert_eq!(client.name(), "mock");
    }
}
