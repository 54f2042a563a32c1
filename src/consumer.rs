//! The consumer: application-owned assembly of the conversion registry,
//! transaction hook chain, and retry policy.
//!
//! A [`Consumer`] performs no I/O itself. The external request-dispatch
//! runtime borrows its parts around the request lifecycle: it resolves
//! converters through [`Consumer::registry`] before and after sending,
//! drives the hook chain via the delegating helpers here, and opens one
//! [`BreakerSession`](crate::retry::BreakerSession) per retry loop through
//! [`Consumer::retry_session`].

use crate::hooks::{TransactionHook, TransactionHookChain};
use crate::metadata::RequestMetadata;
use crate::registry::ConverterRegistry;
use crate::retry::{Breaker, BreakerSession, RetryOnRetryable, RetryPredicate};
use crate::{converters::ConverterFactory, Error, Response, Result};
use http::{HeaderMap, HeaderName, HeaderValue};
use std::sync::Arc;
use url::Url;

/// A configured API consumer.
///
/// The consumer is built once, before traffic begins, and is designed to be
/// cheaply cloned and shared across request-dispatch workers; all of its
/// parts are read-only after construction.
///
/// # Examples
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tether::converters::{SchemaFactory, TypeShape};
/// use tether::metadata::RequestMetadata;
/// use tether::retry::{after_attempt, after_delay};
/// use tether::Consumer;
/// use std::time::Duration;
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// # fn demo() -> Result<(), tether::Error> {
/// let consumer = Consumer::builder()
///     .base_url("https://api.example.com")?
///     .default_header("User-Agent", "my-app/1.0")?
///     .converter_factory(SchemaFactory::<User>::new())
///     .breaker(after_attempt(3) | after_delay(Duration::from_secs(30)))
///     .build()?;
///
/// let metadata = RequestMetadata::default();
/// let converter = consumer
///     .registry()
///     .resolve_response_body(&TypeShape::scalar::<User>(), &metadata);
/// assert!(converter.is_some());
/// # Ok(())
/// # }
/// # demo().unwrap();
/// ```
#[derive(Clone)]
pub struct Consumer {
    inner: Arc<ConsumerInner>,
}

struct ConsumerInner {
    base_url: Url,
    default_headers: HeaderMap,
    registry: ConverterRegistry,
    hooks: TransactionHookChain,
    breaker: Breaker,
    retry_predicate: Box<dyn RetryPredicate>,
}

impl Consumer {
    /// Creates a new `ConsumerBuilder` for configuring a consumer.
    pub fn builder() -> ConsumerBuilder {
        ConsumerBuilder::new()
    }

    /// The base URL all request paths are relative to.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Headers included in every request.
    pub fn default_headers(&self) -> &HeaderMap {
        &self.inner.default_headers
    }

    /// The converter registry assembled for this consumer.
    pub fn registry(&self) -> &ConverterRegistry {
        &self.inner.registry
    }

    /// The transaction hook chain assembled for this consumer.
    pub fn hooks(&self) -> &TransactionHookChain {
        &self.inner.hooks
    }

    /// The predicate classifying which failures are worth retrying.
    pub fn retry_predicate(&self) -> &dyn RetryPredicate {
        self.inner.retry_predicate.as_ref()
    }

    /// Opens a fresh stop-condition session for one retry loop.
    ///
    /// The request runtime opens exactly one session per request and drives
    /// it once per failed attempt.
    pub fn retry_session(&self) -> BreakerSession {
        self.inner.breaker.session()
    }

    /// Dispatches a request to the auditing hooks.
    ///
    /// # Errors
    ///
    /// The first auditor error aborts the request and propagates.
    pub fn audit_request(&self, request: &RequestMetadata) -> Result<()> {
        self.inner.hooks.audit_request(self, request)
    }

    /// Pipes a response through the response-handling hooks.
    pub fn handle_response(&self, response: Response) -> Result<Response> {
        self.inner.hooks.handle_response(self, response)
    }

    /// Dispatches an error to the exception-handling hooks.
    ///
    /// Returns `Ok(())` if some hook masked the error, otherwise hands the
    /// identical error back for the caller to re-raise.
    pub fn handle_exception(&self, error: Error) -> Result<()> {
        self.inner.hooks.handle_exception(self, error)
    }
}

/// Builder for configuring and creating a [`Consumer`].
///
/// The registry starts out with the default factories installed
/// ([`ConverterRegistry::with_defaults`]); append more with
/// [`converter_factory`](Self::converter_factory) or replace it wholesale
/// with [`registry`](Self::registry). The breaker defaults to
/// [`never`](crate::retry::never) and the retry predicate to
/// [`RetryOnRetryable`].
pub struct ConsumerBuilder {
    base_url: Option<Url>,
    default_headers: HeaderMap,
    registry: ConverterRegistry,
    hooks: Vec<Arc<dyn TransactionHook>>,
    breaker: Breaker,
    retry_predicate: Option<Box<dyn RetryPredicate>>,
}

impl ConsumerBuilder {
    /// Creates a new `ConsumerBuilder` with default settings.
    pub fn new() -> Self {
        Self {
            base_url: None,
            default_headers: HeaderMap::new(),
            registry: ConverterRegistry::with_defaults(),
            hooks: Vec::new(),
            breaker: crate::retry::never(),
            retry_predicate: None,
        }
    }

    /// Sets the base URL for all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid.
    pub fn base_url(mut self, url: impl AsRef<str>) -> Result<Self> {
        self.base_url = Some(Url::parse(url.as_ref())?);
        Ok(self)
    }

    /// Adds a default header that will be included in all requests.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn default_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = HeaderName::try_from(name.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header name: {}", e)))?;
        let value = HeaderValue::try_from(value.as_ref())
            .map_err(|e| Error::ConfigurationError(format!("Invalid header value: {}", e)))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Appends a converter factory to the registry chain.
    pub fn converter_factory<F>(mut self, factory: F) -> Self
    where
        F: ConverterFactory + 'static,
    {
        self.registry.register(factory);
        self
    }

    /// Replaces the registry wholesale.
    ///
    /// Use this to start from [`ConverterRegistry::new`] when the default
    /// factories are unwanted.
    pub fn registry(mut self, registry: ConverterRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Appends a transaction hook.
    ///
    /// Hooks dispatch in the order they were added, per capability.
    pub fn hook<H>(mut self, hook: H) -> Self
    where
        H: TransactionHook + 'static,
    {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Sets the retry stop-condition breaker.
    pub fn breaker(mut self, breaker: Breaker) -> Self {
        self.breaker = breaker;
        self
    }

    /// Sets a custom retry predicate.
    ///
    /// By default, failures are classified with [`RetryOnRetryable`].
    pub fn retry_predicate(mut self, predicate: Box<dyn RetryPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Builds the configured `Consumer`.
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL was provided.
    pub fn build(self) -> Result<Consumer> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::ConfigurationError("Base URL is required".to_string()))?;

        let retry_predicate = self
            .retry_predicate
            .unwrap_or_else(|| Box::new(RetryOnRetryable));

        tracing::debug!(
            base_url = %base_url,
            factories = self.registry.len(),
            hooks = self.hooks.len(),
            "assembled consumer"
        );

        Ok(Consumer {
            inner: Arc::new(ConsumerInner {
                base_url,
                default_headers: self.default_headers,
                registry: self.registry,
                hooks: TransactionHookChain::new(self.hooks),
                breaker: self.breaker,
                retry_predicate,
            }),
        })
    }
}

impl Default for ConsumerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_required() {
        let result = Consumer::builder().build();
        assert!(matches!(result, Err(Error::ConfigurationError(_))));
    }

    #[test]
    fn default_factories_are_installed() {
        let consumer = Consumer::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .build()
            .unwrap();
        assert!(!consumer.registry().is_empty());
    }

    #[test]
    fn registry_can_be_replaced_wholesale() {
        let consumer = Consumer::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .registry(ConverterRegistry::new())
            .build()
            .unwrap();
        assert!(consumer.registry().is_empty());
    }

    #[test]
    fn consumers_share_state_across_clones() {
        let consumer = Consumer::builder()
            .base_url("https://api.example.com")
            .unwrap()
            .default_header("Accept", "application/json")
            .unwrap()
            .build()
            .unwrap();

        let clone = consumer.clone();
        assert_eq!(clone.base_url().as_str(), consumer.base_url().as_str());
        assert_eq!(
            clone.default_headers().get("accept"),
            consumer.default_headers().get("accept")
        );
    }
}
