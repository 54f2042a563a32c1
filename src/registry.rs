//! The converter registry: an ordered chain of factories with first-match
//! resolution semantics.
//!
//! A registry is populated once, during consumer construction, and is
//! read-only afterwards: resolution methods take `&self`, registration takes
//! `&mut self`, so the populate-then-share lifecycle is enforced by the type
//! system. Once behind the consumer's `Arc` it is safe for unsynchronized
//! concurrent reads from any number of request-dispatch workers.

use crate::converters::{
    Converter, ConverterFactory, DictConverter, ListConverter, StandardFactory, TypeShape,
};
use crate::metadata::RequestMetadata;
use std::sync::Arc;

/// The resolution kind a caller is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    RequestBody,
    ResponseBody,
    String,
}

impl Kind {
    fn label(self) -> &'static str {
        match self {
            Kind::RequestBody => "request_body",
            Kind::ResponseBody => "response_body",
            Kind::String => "string",
        }
    }
}

/// An ordered, append-only chain of converter factories.
///
/// Resolution tries the recognized container shapes first (building a
/// composite converter and recursively resolving its element shapes through
/// this same registry), then falls through to the registered factories in
/// registration order, returning the first match. No match is a normal
/// outcome, not an error: the caller treats the value as already being in
/// its final form.
///
/// # Examples
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tether::converters::{Converter, SchemaFactory, TypeShape};
/// use tether::metadata::RequestMetadata;
/// use tether::registry::ConverterRegistry;
/// use serde_json::json;
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// let mut registry = ConverterRegistry::with_defaults();
/// registry.register(SchemaFactory::<User>::new());
///
/// let metadata = RequestMetadata::default();
/// let shape = TypeShape::sequence_of(TypeShape::scalar::<User>());
/// let converter = registry.resolve_response_body(&shape, &metadata).unwrap();
///
/// let users = converter
///     .convert(json!([{"id": 1, "name": "Alice"}]))
///     .unwrap();
/// assert_eq!(users[0]["name"], "Alice");
/// ```
#[derive(Default)]
pub struct ConverterRegistry {
    factories: Vec<Arc<dyn ConverterFactory>>,
}

impl ConverterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Creates a registry with the default factories installed.
    ///
    /// Currently that is the [`StandardFactory`]. Defaults are added here,
    /// by explicit initialization code, never as an import-time side effect.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(StandardFactory);
        registry
    }

    /// Appends a factory to the chain.
    ///
    /// Factories are consulted in registration order; earlier registrations
    /// win. Registration must finish before the registry is shared with
    /// request-dispatch workers.
    pub fn register<F>(&mut self, factory: F)
    where
        F: ConverterFactory + 'static,
    {
        self.factories.push(Arc::new(factory));
    }

    /// The number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether the registry has no factories.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Resolves a request-body converter for the target shape.
    ///
    /// Returns `None` when nothing matched; the caller sends the value as-is.
    pub fn resolve_request_body(
        &self,
        target: &TypeShape,
        request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        self.resolve(Kind::RequestBody, target, request)
    }

    /// Resolves a response-body converter for the target shape.
    ///
    /// Returns `None` when nothing matched; the caller returns the
    /// unprocessed response itself.
    pub fn resolve_response_body(
        &self,
        target: &TypeShape,
        request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        self.resolve(Kind::ResponseBody, target, request)
    }

    /// Resolves a string converter for the target shape.
    ///
    /// Returns `None` when nothing matched; the caller renders the value
    /// with its existing textual form.
    pub fn resolve_string(
        &self,
        target: &TypeShape,
        request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        self.resolve(Kind::String, target, request)
    }

    fn resolve(
        &self,
        kind: Kind,
        target: &TypeShape,
        request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        let mut converter = self.select(kind, target, request)?;
        // Element shapes resolve through this same registry with the same
        // kind and metadata; anything unresolved keeps its identity default.
        let chain = |shape: &TypeShape| self.resolve(kind, shape, request);
        converter.set_chain(&chain);
        Some(converter)
    }

    fn select(
        &self,
        kind: Kind,
        target: &TypeShape,
        request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        // Container shapes are handled by the composites and never reach
        // the factory chain.
        match target {
            TypeShape::Sequence(elem) => {
                tracing::debug!(kind = kind.label(), target = %target, "resolved list converter");
                return Some(Box::new(ListConverter::new((**elem).clone())));
            }
            TypeShape::Mapping(key, value) => {
                tracing::debug!(kind = kind.label(), target = %target, "resolved dict converter");
                return Some(Box::new(DictConverter::new(
                    (**key).clone(),
                    (**value).clone(),
                )));
            }
            TypeShape::Scalar(_) => {}
        }

        for factory in &self.factories {
            let converter = match kind {
                Kind::RequestBody => factory.request_body_converter(target, request),
                Kind::ResponseBody => factory.response_body_converter(target, request),
                Kind::String => factory.string_converter(target, request),
            };
            if let Some(converter) = converter {
                tracing::debug!(kind = kind.label(), target = %target, "resolved via factory");
                return Some(converter);
            }
        }

        tracing::debug!(kind = kind.label(), target = %target, "no converter matched");
        None
    }
}
