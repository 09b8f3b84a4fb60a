//! Mock transport for testing.
//!
//! This module provides a scripted transport that can be used in tests and
//! demos to simulate upstream sources and unreliable egress resources without
//! touching the network.

use crate::core::{FetchError, FetchRequest, Resource, Transport, TransportResponse};

use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

/// One scripted reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    /// Answer with a response (any status).
    Respond(TransportResponse),
    /// Fail at the transport level.
    Fail(String),
}

impl MockReply {
    /// A `200 OK` reply with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Respond(TransportResponse::ok(body))
    }

    /// A reply with the given status and an empty body.
    pub fn status(status: u16) -> Self {
        Self::Respond(TransportResponse::new(status, ""))
    }

    /// A `429` reply with a `Retry-After` hint.
    pub fn rate_limited(retry_after: Option<Duration>) -> Self {
        let response = TransportResponse::new(429, "");
        Self::Respond(match retry_after {
            Some(wait) => response.with_retry_after(wait),
            None => response,
        })
    }

    /// A transport-level failure.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// A request observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Requested URL.
    pub url: String,
    /// Resource the request was routed through.
    pub resource: Option<Resource>,
}

#[derive(Debug)]
struct Route {
    fragment: String,
    script: VecDeque<MockReply>,
}

/// A mock transport for testing purposes.
///
/// Replies are scripted per URL fragment: the first route whose fragment is
/// contained in the request URL answers. A route replays its script in order
/// and keeps repeating the last reply. Requests that match no route get the
/// default reply (`200` with an empty body).
///
/// # Examples
///
/// ```rust
/// use patentbridge::transport::{MockReply, MockTransport};
/// use std::time::Duration;
///
/// // Google Patents answers with one WO number
/// let transport = MockTransport::new()
///     .with_body("patents.google.com", "<a>WO2016162604</a>");
///
/// // Espacenet throttles once, then answers
/// let transport = MockTransport::new().with_sequence(
///     "espacenet",
///     vec![
///         MockReply::rate_limited(Some(Duration::from_secs(1))),
///         MockReply::ok("WO2018162793"),
///     ],
/// );
/// ```
#[derive(Debug)]
pub struct MockTransport {
    name: String,
    routes: RwLock<Vec<Route>>,
    default_reply: MockReply,
    failing_resources: RwLock<HashSet<Resource>>,
    latency: Option<Duration>,
    log: Mutex<Vec<RecordedRequest>>,
    request_count: AtomicU64,
}

impl MockTransport {
    /// Creates a mock that answers every request with an empty `200`.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            routes: RwLock::new(Vec::new()),
            default_reply: MockReply::ok(""),
            failing_resources: RwLock::new(HashSet::new()),
            latency: None,
            log: Mutex::new(Vec::new()),
            request_count: AtomicU64::new(0),
        }
    }

    /// Sets the name of this transport.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the reply for requests that match no route.
    pub fn with_default(mut self, reply: MockReply) -> Self {
        self.default_reply = reply;
        self
    }

    /// Adds a route that always answers `200` with `body`.
    pub fn with_body(self, fragment: impl Into<String>, body: impl Into<String>) -> Self {
        self.with_sequence(fragment, vec![MockReply::ok(body)])
    }

    /// Adds a route that always answers with `response`.
    pub fn with_response(self, fragment: impl Into<String>, response: TransportResponse) -> Self {
        self.with_sequence(fragment, vec![MockReply::Respond(response)])
    }

    /// Adds a route that always fails at the transport level.
    pub fn with_failure(self, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        self.with_sequence(fragment, vec![MockReply::fail(message)])
    }

    /// Adds a route that replays `script` in order.
    pub fn with_sequence(self, fragment: impl Into<String>, script: Vec<MockReply>) -> Self {
        self.add_sequence(fragment, script);
        self
    }

    /// Makes every request through `resource` fail at the transport level.
    pub fn with_failing_resource(self, resource: impl Into<Resource>) -> Self {
        self.fail_resource(resource);
        self
    }

    /// Sets the simulated latency per request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds a route (mutable version).
    pub fn add_sequence(&self, fragment: impl Into<String>, script: Vec<MockReply>) {
        self.routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Route {
                fragment: fragment.into(),
                script: script.into(),
            });
    }

    /// Starts failing every request through `resource`.
    pub fn fail_resource(&self, resource: impl Into<Resource>) {
        self.failing_resources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(resource.into());
    }

    /// Stops failing requests through `resource`.
    pub fn restore_resource(&self, resource: &Resource) {
        self.failing_resources
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(resource);
    }

    /// Removes every route.
    pub fn clear_routes(&self) {
        self.routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// Returns the number of requests received.
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }

    /// Returns every request received, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Returns the number of requests whose URL contains `fragment`.
    pub fn requests_matching(&self, fragment: &str) -> usize {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|r| r.url.contains(fragment))
            .count()
    }

    fn next_reply(&self, url: &str) -> MockReply {
        let mut routes = self
            .routes
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match routes.iter_mut().find(|route| url.contains(&route.fragment)) {
            Some(route) if route.script.len() > 1 => route
                .script
                .pop_front()
                .unwrap_or_else(|| self.default_reply.clone()),
            Some(route) => route
                .script
                .front()
                .cloned()
                .unwrap_or_else(|| self.default_reply.clone()),
            None => self.default_reply.clone(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(
        &self,
        request: &FetchRequest,
        resource: Option<&Resource>,
    ) -> Result<TransportResponse, FetchError> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedRequest {
                url: request.url.clone(),
                resource: resource.cloned(),
            });

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let label = resource.map_or_else(|| "direct".to_string(), Resource::label);

        let resource_failing = resource.is_some_and(|r| {
            self.failing_resources
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .contains(r)
        });
        if resource_failing {
            return Err(FetchError::transport(label, "simulated connection failure"));
        }

        match self.next_reply(&request.url) {
            MockReply::Respond(response) => Ok(response),
            MockReply::Fail(message) => Err(FetchError::transport(label, message)),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_default_reply() {
        let transport = MockTransport::new();
        let response = transport
            .send(&FetchRequest::get("https://example.com"), None)
            .await
            .unwrap();
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_route_by_fragment() {
        let transport = MockTransport::new()
            .with_body("lens.org", "WO2016162604")
            .with_response("espacenet", TransportResponse::new(503, ""));

        let lens = transport
            .send(&FetchRequest::get("https://www.lens.org/?q=x"), None)
            .await
            .unwrap();
        assert_eq!(lens.body, "WO2016162604");

        let espacenet = transport
            .send(&FetchRequest::get("https://worldwide.espacenet.com/?q=x"), None)
            .await
            .unwrap();
        assert_eq!(espacenet.status, 503);
        assert_eq!(transport.requests_matching("lens.org"), 1);
    }

    #[tokio::test]
    async fn test_mock_sequence_repeats_last() {
        let transport = MockTransport::new().with_sequence(
            "example",
            vec![MockReply::fail("reset"), MockReply::ok("done")],
        );
        let request = FetchRequest::get("https://example.com");

        assert!(transport.send(&request, None).await.is_err());
        assert_eq!(transport.send(&request, None).await.unwrap().body, "done");
        assert_eq!(transport.send(&request, None).await.unwrap().body, "done");
    }

    #[tokio::test]
    async fn test_mock_failing_resource() {
        let bad = Resource::new("http://bad:1");
        let good = Resource::new("http://good:1");
        let transport = MockTransport::new().with_failing_resource(bad.clone());
        let request = FetchRequest::get("https://example.com");

        let err = transport.send(&request, Some(&bad)).await.unwrap_err();
        assert_eq!(err.resource(), Some("http://bad:1"));
        assert!(transport.send(&request, Some(&good)).await.is_ok());

        transport.restore_resource(&bad);
        assert!(transport.send(&request, Some(&bad)).await.is_ok());

        let log = transport.requests();
        assert_eq!(log.len(), 4);
        assert_eq!(log[0].resource.as_ref(), Some(&bad));
    }

    #[tokio::test]
    async fn test_mock_rate_limited_reply() {
        let transport = MockTransport::new().with_sequence(
            "google",
            vec![MockReply::rate_limited(Some(Duration::from_secs(3)))],
        );
        let response = transport
            .send(&FetchRequest::get("https://www.google.com/search"), None)
            .await
            .unwrap();
        assert!(response.is_rate_limited());
        assert_eq!(response.retry_after, Some(Duration::from_secs(3)));
    }
}
