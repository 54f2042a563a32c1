//! Response wrapper flowing through the response-handling hook pipeline.
//!
//! The [`Response`] type pairs the decoded wire payload with metadata about
//! the HTTP transaction, making it easy for response handlers and auditing
//! hooks to access timing information, headers, and status codes.

use http::{HeaderMap, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// A response as seen by the hook chain and the converter layer.
///
/// The external transport constructs one of these per completed request.
/// Response-handling hooks transform it in pipeline order, and response body
/// converters consume its `body` to produce application-level values.
///
/// # Examples
///
/// ```
/// use tether::Response;
/// use http::{HeaderMap, StatusCode};
/// use serde_json::json;
///
/// let response = Response::new(StatusCode::OK, HeaderMap::new(), json!({"id": 1}));
/// assert_eq!(response.body["id"], 1);
/// assert!(!response.was_retried());
/// ```
#[derive(Debug, Clone)]
pub struct Response {
    /// The HTTP status code of the response.
    pub status: StatusCode,

    /// The response headers.
    pub headers: HeaderMap,

    /// The decoded wire payload.
    ///
    /// Response handlers may replace this wholesale, e.g. a decompression
    /// layer followed by a deserialization layer.
    pub body: Value,

    /// The total latency of the request, including all retry attempts.
    pub latency: Duration,

    /// The number of attempts made to complete this request.
    ///
    /// This is `1` for requests that succeeded on the first try, and higher
    /// for requests that required retries.
    pub attempts: usize,
}

impl Response {
    /// Creates a new `Response` with zero latency and a single attempt.
    ///
    /// The transport typically follows up with [`Response::with_latency`]
    /// and [`Response::with_attempts`].
    pub fn new(status: StatusCode, headers: HeaderMap, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
            latency: Duration::ZERO,
            attempts: 1,
        }
    }

    /// Records the total request latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Records the number of attempts the request took.
    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    /// Maps the response body through the provided function, preserving the
    /// transaction metadata.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::Response;
    /// use http::{HeaderMap, StatusCode};
    /// use serde_json::{json, Value};
    ///
    /// let response = Response::new(StatusCode::OK, HeaderMap::new(), json!(41));
    /// let bumped = response.map_body(|body| json!(body.as_i64().unwrap() + 1));
    /// assert_eq!(bumped.body, Value::from(42));
    /// ```
    pub fn map_body<F>(self, f: F) -> Response
    where
        F: FnOnce(Value) -> Value,
    {
        Response {
            body: f(self.body),
            ..self
        }
    }

    /// Returns `true` if the request required retries.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns a reference to a header value by name.
    ///
    /// # Examples
    ///
    /// ```
    /// use tether::Response;
    /// use http::{HeaderMap, HeaderValue, StatusCode};
    /// use serde_json::Value;
    ///
    /// let mut headers = HeaderMap::new();
    /// headers.insert("content-type", HeaderValue::from_static("application/json"));
    ///
    /// let response = Response::new(StatusCode::OK, headers, Value::Null);
    /// assert_eq!(response.header("content-type"), Some("application/json"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }
}
