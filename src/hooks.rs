//! Transaction hooks: observers dispatched across the request lifecycle.
//!
//! A concrete hook implements any subset of the three lifecycle
//! capabilities (auditing, response handling, exception handling).
//! [`TransactionHook`] carries one optional slot per capability, and
//! [`TransactionHookChain`] groups hooks by the slots they fill once, at
//! construction, so each event kind is dispatched only to the hooks that
//! can handle it, in registration order.
//!
//! # Examples
//!
//! ```
//! use tether::hooks::{ResponderFn, TransactionHookChain};
//! use tether::{Consumer, Response};
//! use http::{HeaderMap, StatusCode};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # fn demo() -> Result<(), tether::Error> {
//! let consumer = Consumer::builder()
//!     .base_url("https://api.example.com")?
//!     .build()?;
//!
//! // Layered decoding: unwrap an envelope, then pick one field.
//! let chain = TransactionHookChain::new(vec![
//!     Arc::new(ResponderFn::new(|_, response: Response| {
//!         Ok(response.map_body(|body| body["data"].clone()))
//!     })),
//!     Arc::new(ResponderFn::new(|_, response: Response| {
//!         Ok(response.map_body(|body| body["items"].clone()))
//!     })),
//! ]);
//!
//! let raw = Response::new(
//!     StatusCode::OK,
//!     HeaderMap::new(),
//!     json!({"data": {"items": [1, 2, 3]}}),
//! );
//! let handled = chain.handle_response(&consumer, raw)?;
//! assert_eq!(handled.body, json!([1, 2, 3]));
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

use crate::metadata::RequestMetadata;
use crate::{Consumer, Error, Response, Result};
use std::sync::Arc;

/// Observes outgoing requests before they are sent.
pub trait RequestAuditor: Send + Sync {
    /// Called once per outgoing request, before it is sent.
    ///
    /// Purely observational; returning an error aborts the request and
    /// propagates to the caller.
    fn audit_request(&self, consumer: &Consumer, request: &RequestMetadata) -> Result<()>;
}

/// Transforms responses in pipeline order.
pub trait ResponseHandler: Send + Sync {
    /// Called with the previous handler's output; the return value feeds
    /// the next handler in the chain.
    fn handle_response(&self, consumer: &Consumer, response: Response) -> Result<Response>;
}

/// Reacts to exceptions raised during a request.
pub trait ExceptionHandler: Send + Sync {
    /// Called with the original error. Returning `true` masks the error:
    /// the chain will not re-raise it once all handlers have run.
    fn handle_exception(&self, consumer: &Consumer, error: &Error) -> bool;
}

/// A request-lifecycle observer with three independently-optional
/// capability slots.
///
/// Concrete hooks implement whichever capability traits they support and
/// surface them through the corresponding slot; the defaults leave every
/// slot empty. A hook absent from a slot is silently skipped for that
/// event kind, never an error.
pub trait TransactionHook: Send + Sync {
    /// The request-auditing capability, if this hook has one.
    fn as_request_auditor(&self) -> Option<&dyn RequestAuditor> {
        None
    }

    /// The response-handling capability, if this hook has one.
    fn as_response_handler(&self) -> Option<&dyn ResponseHandler> {
        None
    }

    /// The exception-handling capability, if this hook has one.
    fn as_exception_handler(&self) -> Option<&dyn ExceptionHandler> {
        None
    }
}

/// An ordered collection of hooks, grouped by capability at construction.
///
/// Dispatch semantics:
/// - [`audit_request`](Self::audit_request) runs every auditor once, in order.
/// - [`handle_response`](Self::handle_response) pipes the response through
///   every responder, in order.
/// - [`handle_exception`](Self::handle_exception) lets every exception
///   handler observe the original error, in order; any one of them may mask
///   it, and masking never skips the handlers after it.
pub struct TransactionHookChain {
    auditors: Vec<Arc<dyn TransactionHook>>,
    responders: Vec<Arc<dyn TransactionHook>>,
    exception_handlers: Vec<Arc<dyn TransactionHook>>,
}

impl TransactionHookChain {
    /// Groups the given hooks by capability.
    ///
    /// Grouping happens once here; dispatch later iterates only the hooks
    /// that filled the relevant slot.
    pub fn new(hooks: Vec<Arc<dyn TransactionHook>>) -> Self {
        let auditors = hooks
            .iter()
            .filter(|hook| hook.as_request_auditor().is_some())
            .cloned()
            .collect();
        let responders = hooks
            .iter()
            .filter(|hook| hook.as_response_handler().is_some())
            .cloned()
            .collect();
        let exception_handlers = hooks
            .iter()
            .filter(|hook| hook.as_exception_handler().is_some())
            .cloned()
            .collect();
        Self {
            auditors,
            responders,
            exception_handlers,
        }
    }

    /// An empty chain: every dispatch is a no-op pass-through.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Dispatches a request to every auditing hook, in registration order.
    ///
    /// # Errors
    ///
    /// The first auditor error aborts the request and propagates.
    pub fn audit_request(&self, consumer: &Consumer, request: &RequestMetadata) -> Result<()> {
        for hook in &self.auditors {
            if let Some(auditor) = hook.as_request_auditor() {
                auditor.audit_request(consumer, request)?;
            }
        }
        Ok(())
    }

    /// Pipes the response through every responding hook, in registration
    /// order. With zero responders the input is returned unchanged.
    pub fn handle_response(&self, consumer: &Consumer, mut response: Response) -> Result<Response> {
        for hook in &self.responders {
            if let Some(handler) = hook.as_response_handler() {
                response = handler.handle_response(consumer, response)?;
            }
        }
        Ok(response)
    }

    /// Dispatches an error to every exception-handling hook, in
    /// registration order.
    ///
    /// Every handler observes the original error even after one of them has
    /// masked it. If any handler masked, the error is swallowed and
    /// `Ok(())` is returned; otherwise the identical error value comes back
    /// as `Err` for the caller to re-raise.
    pub fn handle_exception(&self, consumer: &Consumer, error: Error) -> Result<()> {
        let mut masked = false;
        for hook in &self.exception_handlers {
            if let Some(handler) = hook.as_exception_handler() {
                masked |= handler.handle_exception(consumer, &error);
            }
        }
        if masked {
            tracing::debug!(error = %error, "exception masked by hook chain");
            Ok(())
        } else {
            Err(error)
        }
    }

    /// How many hooks fill each capability slot: (auditors, responders,
    /// exception handlers).
    pub fn capability_counts(&self) -> (usize, usize, usize) {
        (
            self.auditors.len(),
            self.responders.len(),
            self.exception_handlers.len(),
        )
    }
}

/// Wraps a closure as an auditing-only hook.
pub struct AuditorFn<F> {
    f: F,
}

impl<F> AuditorFn<F>
where
    F: Fn(&Consumer, &RequestMetadata) -> Result<()> + Send + Sync,
{
    /// Creates the hook from the given closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> RequestAuditor for AuditorFn<F>
where
    F: Fn(&Consumer, &RequestMetadata) -> Result<()> + Send + Sync,
{
    fn audit_request(&self, consumer: &Consumer, request: &RequestMetadata) -> Result<()> {
        (self.f)(consumer, request)
    }
}

impl<F> TransactionHook for AuditorFn<F>
where
    F: Fn(&Consumer, &RequestMetadata) -> Result<()> + Send + Sync,
{
    fn as_request_auditor(&self) -> Option<&dyn RequestAuditor> {
        Some(self)
    }
}

/// Wraps a closure as a response-handling-only hook.
pub struct ResponderFn<F> {
    f: F,
}

impl<F> ResponderFn<F>
where
    F: Fn(&Consumer, Response) -> Result<Response> + Send + Sync,
{
    /// Creates the hook from the given closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ResponseHandler for ResponderFn<F>
where
    F: Fn(&Consumer, Response) -> Result<Response> + Send + Sync,
{
    fn handle_response(&self, consumer: &Consumer, response: Response) -> Result<Response> {
        (self.f)(consumer, response)
    }
}

impl<F> TransactionHook for ResponderFn<F>
where
    F: Fn(&Consumer, Response) -> Result<Response> + Send + Sync,
{
    fn as_response_handler(&self) -> Option<&dyn ResponseHandler> {
        Some(self)
    }
}

/// Wraps a closure as an exception-handling-only hook.
pub struct ExceptionFn<F> {
    f: F,
}

impl<F> ExceptionFn<F>
where
    F: Fn(&Consumer, &Error) -> bool + Send + Sync,
{
    /// Creates the hook from the given closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ExceptionHandler for ExceptionFn<F>
where
    F: Fn(&Consumer, &Error) -> bool + Send + Sync,
{
    fn handle_exception(&self, consumer: &Consumer, error: &Error) -> bool {
        (self.f)(consumer, error)
    }
}

impl<F> TransactionHook for ExceptionFn<F>
where
    F: Fn(&Consumer, &Error) -> bool + Send + Sync,
{
    fn as_exception_handler(&self) -> Option<&dyn ExceptionHandler> {
        Some(self)
    }
}
