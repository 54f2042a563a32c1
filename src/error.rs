//! Error types for the conversion and request-lifecycle machinery.
//!
//! This module provides error types that preserve debugging information while
//! remaining ergonomic to use. Errors originating in the transport are carried
//! here so that hook chains and retry predicates can classify them uniformly.

use http::{HeaderMap, StatusCode};

/// The main error type.
///
/// Conversion failures originate inside this crate; the transport-flavored
/// variants (`Transport`, `Timeout`, `HttpError`) are constructed by the
/// external request runtime and flow through the exception-handling hook
/// chain and retry predicates.
///
/// # Examples
///
/// ```
/// use tether::Error;
/// use http::StatusCode;
///
/// let err = Error::HttpError {
///     status: StatusCode::INTERNAL_SERVER_ERROR,
///     raw_response: "Server error".to_string(),
///     headers: http::HeaderMap::new(),
/// };
///
/// assert!(err.is_retryable());
/// assert_eq!(err.status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error occurred (connection failed, DNS lookup failed, etc.).
    ///
    /// Reported by the external transport; this crate never produces it.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The request timed out.
    #[error("Request timed out")]
    Timeout,

    /// The server returned a non-2xx HTTP status code.
    ///
    /// # Fields
    ///
    /// * `status` - The HTTP status code
    /// * `raw_response` - The raw response body
    /// * `headers` - The response headers
    #[error("HTTP error {status}: {raw_response}")]
    HttpError {
        /// The HTTP status code
        status: StatusCode,
        /// The raw response body
        raw_response: String,
        /// The response headers
        headers: HeaderMap,
    },

    /// A selected converter failed while executing.
    ///
    /// Resolution itself never fails; this error arises only when a resolved
    /// converter rejects the data it was handed, e.g. a schema converter
    /// receiving a payload that does not satisfy the target model.
    ///
    /// # Fields
    ///
    /// * `target` - Rendering of the conversion target type
    /// * `reason` - What the converter objected to
    #[error("Conversion to {target} failed: {reason}")]
    ConversionFailed {
        /// Rendering of the conversion target type
        target: String,
        /// What the converter objected to
        reason: String,
    },

    /// Invalid configuration was provided.
    ///
    /// This indicates a problem with how the consumer or a request was
    /// assembled, such as an invalid URL or invalid header values.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// An invalid URL was provided.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if this error is potentially retryable.
    ///
    /// Transport errors, timeouts, 5xx HTTP errors, and HTTP 429 are
    /// considered retryable. Conversion and configuration failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Timeout => true,
            Error::HttpError { status, .. } => {
                status.is_server_error() || status.as_u16() == 429
            }
            Error::ConversionFailed { .. } => false,
            Error::ConfigurationError(_) => false,
            Error::InvalidUrl(_) => false,
        }
    }

    /// Returns the HTTP status code if this error has one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the raw response body if this error has one.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            Error::HttpError { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }

    /// Builds a `ConversionFailed` error for the given target rendering.
    pub(crate) fn conversion(target: impl std::fmt::Display, reason: impl ToString) -> Self {
        Error::ConversionFailed {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_classification() {
        assert!(Error::Transport("connection reset".into()).is_retryable());
        assert!(Error::Timeout.is_retryable());
        assert!(Error::HttpError {
            status: StatusCode::TOO_MANY_REQUESTS,
            raw_response: String::new(),
            headers: HeaderMap::new(),
        }
        .is_retryable());
        assert!(!Error::HttpError {
            status: StatusCode::BAD_REQUEST,
            raw_response: String::new(),
            headers: HeaderMap::new(),
        }
        .is_retryable());
        assert!(!Error::conversion("User", "missing field `id`").is_retryable());
    }
}
