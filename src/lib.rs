//! # Tether - core toolkit for declarative HTTP API clients
//!
//! Tether is the conversion and request-lifecycle engine behind declarative
//! API clients: endpoint definitions carry request metadata, and the runtime
//! dispatching them uses this crate to resolve body/string converters, to
//! observe the request lifecycle through hooks, and to decide when a retry
//! loop should give up.
//!
//! The crate owns no transport. Connection handling, TLS, and socket I/O
//! belong to whatever HTTP client the surrounding runtime drives; tether
//! supplies the deterministic combinators around it.
//!
//! ## Quick Start
//!
//! ```
//! use serde::{Deserialize, Serialize};
//! use tether::converters::{Converter, SchemaFactory, TypeShape};
//! use tether::metadata::RequestMetadata;
//! use tether::retry::{after_attempt, after_delay};
//! use tether::Consumer;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn demo() -> Result<(), tether::Error> {
//! // Assemble a consumer: registry, hooks, and retry policy in one place.
//! let consumer = Consumer::builder()
//!     .base_url("https://api.example.com")?
//!     .converter_factory(SchemaFactory::<User>::new())
//!     .breaker(after_attempt(3) | after_delay(Duration::from_secs(30)))
//!     .build()?;
//!
//! // The request runtime resolves converters by target shape...
//! let metadata = RequestMetadata::default();
//! let shape = TypeShape::sequence_of(TypeShape::scalar::<User>());
//! let converter = consumer
//!     .registry()
//!     .resolve_response_body(&shape, &metadata)
//!     .expect("sequence-of-User resolves");
//!
//! // ...and runs response bodies through them.
//! let users = converter.convert(json!([{"id": 1, "name": "Alice"}]))?;
//! assert_eq!(users[0]["name"], "Alice");
//!
//! // Retry loops drive a fresh breaker session per request.
//! let mut session = consumer.retry_session();
//! session.notify_attempt();
//! assert!(!session.should_stop(Duration::from_millis(100)));
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```
//!
//! ## Features
//!
//! - **Chain-of-responsibility conversion** - An ordered factory registry
//!   resolves target type shapes into converters, with first-match-wins
//!   semantics and graceful absence (no match is not an error)
//! - **Recursive container conversion** - Sequence and mapping shapes
//!   resolve their element types through the same registry, falling back to
//!   identity for unregistered elements
//! - **Composable stop conditions** - Resumable two-phase retry sessions
//!   composed with the `|` operator, driving every child in lockstep
//! - **Partially-capable transaction hooks** - Auditors, response
//!   pipelines, and exception handlers grouped by capability, with
//!   exception-masking semantics
//! - **Explicit assembly** - Registries, hooks, and retry policy are wired
//!   by builder code owned by the application, never by import-time side
//!   effects
//!
//! ## Error Handling
//!
//! Absence of a converter is an [`Option`], never an error; a resolved
//! converter that rejects its input fails with
//! [`Error::ConversionFailed`], which propagates unchanged to the request
//! runtime. Errors reaching the exception hook chain are re-raised with
//! identical identity unless a hook masks them:
//!
//! ```
//! use tether::hooks::ExceptionFn;
//! use tether::{Consumer, Error};
//!
//! # fn demo() -> Result<(), tether::Error> {
//! let consumer = Consumer::builder()
//!     .base_url("https://api.example.com")?
//!     // Swallow timeouts, let everything else propagate.
//!     .hook(ExceptionFn::new(|_, error: &Error| {
//!         matches!(error, Error::Timeout)
//!     }))
//!     .build()?;
//!
//! assert!(consumer.handle_exception(Error::Timeout).is_ok());
//! assert!(consumer
//!     .handle_exception(Error::Transport("reset".into()))
//!     .is_err());
//! # Ok(())
//! # }
//! # demo().unwrap();
//! ```

mod consumer;
pub mod converters;
mod error;
pub mod hooks;
pub mod metadata;
pub mod registry;
mod response;
pub mod retry;

pub use consumer::{Consumer, ConsumerBuilder};
pub use error::{Error, Result};
pub use metadata::{Annotation, RequestMetadata};
pub use registry::ConverterRegistry;
pub use response::Response;
pub use retry::{Breaker, RetryPredicate};
