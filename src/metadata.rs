//! Request metadata and annotation types.

use http::{HeaderMap, HeaderName, HeaderValue, Method};
use std::collections::HashMap;

/// A single annotation attached to a request definition.
///
/// Annotations are opaque name/value tags carried by [`RequestMetadata`].
/// The core never interprets them; converter factories read only the
/// annotations they recognize and ignore the rest.
///
/// # Examples
///
/// ```
/// use tether::metadata::Annotation;
///
/// let json = Annotation::flag("json");
/// let field = Annotation::with_value("field", "data");
///
/// assert_eq!(json.name(), "json");
/// assert_eq!(field.value(), Some("data"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    name: String,
    value: Option<String>,
}

impl Annotation {
    /// Creates a bare annotation with no value.
    pub fn flag(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
        }
    }

    /// Creates an annotation carrying a value.
    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
        }
    }

    /// The annotation name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The annotation value, if one was attached.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Metadata for an individual HTTP request definition.
///
/// This type contains the configuration needed to describe a single request:
/// method, path, headers, query parameters, and the method-level and
/// argument-level annotation bags that converter factories consult during
/// resolution.
#[derive(Debug, Clone, Default)]
pub struct RequestMetadata {
    /// The HTTP method (GET, POST, etc.).
    pub method: Method,

    /// The request path (relative to the consumer's base URL).
    pub path: String,

    /// Additional headers for this request.
    pub headers: HeaderMap,

    /// Query parameters for this request.
    pub query_params: HashMap<String, String>,

    method_annotations: Vec<Annotation>,
    argument_annotations: Vec<Annotation>,
}

impl RequestMetadata {
    /// Creates a new `RequestMetadata` with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            query_params: HashMap::new(),
            method_annotations: Vec::new(),
            argument_annotations: Vec::new(),
        }
    }

    /// Adds a header to the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the header name or value is invalid.
    pub fn with_header(
        mut self,
        name: impl AsRef<str>,
        value: impl AsRef<str>,
    ) -> Result<Self, crate::Error> {
        let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
            crate::Error::ConfigurationError(format!("Invalid header name: {}", e))
        })?;
        let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
            crate::Error::ConfigurationError(format!("Invalid header value: {}", e))
        })?;
        self.headers.insert(name, value);
        Ok(self)
    }

    /// Adds a query parameter to the request.
    pub fn with_query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(key.into(), value.into());
        self
    }

    /// Adds a method-level annotation.
    pub fn with_method_annotation(mut self, annotation: Annotation) -> Self {
        self.method_annotations.push(annotation);
        self
    }

    /// Adds an argument-level annotation.
    pub fn with_argument_annotation(mut self, annotation: Annotation) -> Self {
        self.argument_annotations.push(annotation);
        self
    }

    /// The method-level annotations, in the order they were attached.
    pub fn method_annotations(&self) -> &[Annotation] {
        &self.method_annotations
    }

    /// The argument-level annotations, in the order they were attached.
    pub fn argument_annotations(&self) -> &[Annotation] {
        &self.argument_annotations
    }

    /// Looks up a method-level annotation by name.
    pub fn method_annotation(&self, name: &str) -> Option<&Annotation> {
        self.method_annotations.iter().find(|a| a.name == name)
    }

    /// Looks up an argument-level annotation by name.
    pub fn argument_annotation(&self, name: &str) -> Option<&Annotation> {
        self.argument_annotations.iter().find(|a| a.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn annotations_are_looked_up_by_name() {
        let metadata = RequestMetadata::new(Method::GET, "/users")
            .with_method_annotation(Annotation::flag("json"))
            .with_argument_annotation(Annotation::with_value("body", "user"));

        assert!(metadata.method_annotation("json").is_some());
        assert!(metadata.method_annotation("xml").is_none());
        assert_eq!(
            metadata.argument_annotation("body").and_then(|a| a.value()),
            Some("user")
        );
    }

    #[test]
    fn invalid_header_name_is_a_configuration_error() {
        let result = RequestMetadata::new(Method::GET, "/").with_header("bad header", "v");
        assert!(matches!(result, Err(crate::Error::ConfigurationError(_))));
    }
}
