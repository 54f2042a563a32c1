//! Converter and factory contracts, type-shape descriptors, and the
//! composite container converters.
//!
//! Converters transform values between their wire representation and an
//! application-level form. The erased value currency is [`serde_json::Value`]:
//! request body converters produce an encodable value, response body
//! converters decode one, and string converters render one as text (for
//! headers, query parameters, and path segments).
//!
//! Factories provide converters for a given target type and request context,
//! and may decline by returning `None` so that the next registered factory
//! gets a chance. See [`crate::registry::ConverterRegistry`] for the
//! resolution chain.

use crate::metadata::RequestMetadata;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::TypeId;
use std::fmt;
use std::marker::PhantomData;

/// Identifies a concrete Rust type used as a conversion target.
///
/// Built once per type via [`TypeKey::of`]; carries the `TypeId` for exact
/// matching and the type name for log and error rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key for the type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The full name of the identified type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Static shape descriptor for a conversion target.
///
/// Resolution recognizes a closed set of shapes: a scalar target type, a
/// sequence of some element shape, or a mapping between two shapes. The
/// shape is determined once, when a request definition is built, never by
/// probing values at conversion time.
///
/// # Examples
///
/// ```
/// use tether::converters::TypeShape;
///
/// // sequence-of-String
/// let shape = TypeShape::sequence_of(TypeShape::scalar::<String>());
/// assert_eq!(shape.to_string(), "sequence<alloc::string::String>");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeShape {
    /// A plain target type.
    Scalar(TypeKey),
    /// An ordered sequence of elements of the inner shape.
    Sequence(Box<TypeShape>),
    /// A mapping from keys of the first shape to values of the second.
    Mapping(Box<TypeShape>, Box<TypeShape>),
}

impl TypeShape {
    /// The scalar shape for the type `T`.
    pub fn scalar<T: 'static>() -> Self {
        TypeShape::Scalar(TypeKey::of::<T>())
    }

    /// A sequence shape over the given element shape.
    pub fn sequence_of(elem: TypeShape) -> Self {
        TypeShape::Sequence(Box::new(elem))
    }

    /// A mapping shape over the given key and value shapes.
    pub fn mapping_of(key: TypeShape, value: TypeShape) -> Self {
        TypeShape::Mapping(Box::new(key), Box::new(value))
    }
}

impl fmt::Display for TypeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeShape::Scalar(key) => f.write_str(key.name()),
            TypeShape::Sequence(elem) => write!(f, "sequence<{}>", elem),
            TypeShape::Mapping(key, value) => write!(f, "mapping<{}, {}>", key, value),
        }
    }
}

/// Resolver handed to [`Converter::set_chain`].
///
/// Composite converters call it to resolve their element shapes through the
/// same registry, resolution kind, and request metadata that selected them.
pub type ChainResolver<'a> = dyn Fn(&TypeShape) -> Option<Box<dyn Converter>> + 'a;

/// A single-purpose value transform.
///
/// Converters are stateless after construction, except for the resolved
/// sub-converters a composite caches in [`Converter::set_chain`].
pub trait Converter: Send + Sync {
    /// Transforms the value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConversionFailed`] when the value does not satisfy
    /// the converter's target, e.g. schema-invalid data.
    fn convert(&self, value: Value) -> Result<Value>;

    /// Called exactly once after this converter is selected by the registry.
    ///
    /// The default implementation does nothing. Composite converters use the
    /// resolver to recursively resolve their element shapes; an element shape
    /// the registry cannot resolve keeps its identity default.
    fn set_chain(&mut self, _chain: &ChainResolver<'_>) {}
}

/// Provides converters for a given target shape and request context.
///
/// Every method has a default implementation returning `None`, which tells
/// the registry to move on to the next factory. Implement only the methods
/// you intend to support.
///
/// # Examples
///
/// ```
/// use tether::converters::{Converter, ConverterFactory, TypeShape};
/// use tether::metadata::RequestMetadata;
/// use serde_json::Value;
///
/// struct Doubler;
///
/// impl Converter for Doubler {
///     fn convert(&self, value: Value) -> tether::Result<Value> {
///         Ok(Value::from(value.as_i64().unwrap_or(0) * 2))
///     }
/// }
///
/// struct DoubleI64;
///
/// impl ConverterFactory for DoubleI64 {
///     fn request_body_converter(
///         &self,
///         target: &TypeShape,
///         _request: &RequestMetadata,
///     ) -> Option<Box<dyn Converter>> {
///         (*target == TypeShape::scalar::<i64>()).then(|| Box::new(Doubler) as Box<dyn Converter>)
///     }
/// }
/// ```
pub trait ConverterFactory: Send + Sync {
    /// Returns a converter that turns a `target`-shaped value into an
    /// acceptable request body, or `None` to decline.
    fn request_body_converter(
        &self,
        _target: &TypeShape,
        _request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        None
    }

    /// Returns a converter that turns a response body into a
    /// `target`-shaped value, or `None` to decline.
    fn response_body_converter(
        &self,
        _target: &TypeShape,
        _request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        None
    }

    /// Returns a converter that renders a `target`-shaped value as a
    /// string, or `None` to decline.
    fn string_converter(
        &self,
        _target: &TypeShape,
        _request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        None
    }
}

/// Passes values through unchanged.
///
/// This is the fallback element converter inside composites and the fallback
/// callers use when resolution reports no match.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Converter for Identity {
    fn convert(&self, value: Value) -> Result<Value> {
        Ok(value)
    }
}

/// Converts ordered sequences element by element.
///
/// A scalar input is converted and wrapped as a single-element sequence
/// rather than rejected. Client code depends on that wrap, so it is kept
/// as documented behavior even though it can hide mistakes.
pub struct ListConverter {
    elem_shape: TypeShape,
    elem: Box<dyn Converter>,
}

impl ListConverter {
    /// Creates a list converter over the given element shape.
    ///
    /// The element converter starts as [`Identity`] and is replaced in
    /// [`Converter::set_chain`] if the registry resolves the element shape.
    pub fn new(elem_shape: TypeShape) -> Self {
        Self {
            elem_shape,
            elem: Box::new(Identity),
        }
    }
}

impl Converter for ListConverter {
    fn convert(&self, value: Value) -> Result<Value> {
        match value {
            Value::Array(items) => {
                let converted = items
                    .into_iter()
                    .map(|item| self.elem.convert(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(converted))
            }
            scalar => Ok(Value::Array(vec![self.elem.convert(scalar)?])),
        }
    }

    fn set_chain(&mut self, chain: &ChainResolver<'_>) {
        if let Some(elem) = chain(&self.elem_shape) {
            self.elem = elem;
        }
    }
}

/// Converts key/value mappings entry by entry.
///
/// Every original key is converted; none are dropped and none invented. A
/// non-mapping input is handed to the value converter alone, mirroring the
/// scalar-wrap policy of [`ListConverter`].
pub struct DictConverter {
    key_shape: TypeShape,
    value_shape: TypeShape,
    key: Box<dyn Converter>,
    value: Box<dyn Converter>,
}

impl DictConverter {
    /// Creates a dict converter over the given key and value shapes.
    ///
    /// Both inner converters start as [`Identity`] and are replaced in
    /// [`Converter::set_chain`] if the registry resolves their shapes.
    pub fn new(key_shape: TypeShape, value_shape: TypeShape) -> Self {
        Self {
            key_shape,
            value_shape,
            key: Box::new(Identity),
            value: Box::new(Identity),
        }
    }
}

impl Converter for DictConverter {
    fn convert(&self, value: Value) -> Result<Value> {
        match value {
            Value::Object(entries) => {
                let mut converted = serde_json::Map::with_capacity(entries.len());
                for (key, entry) in entries {
                    let key = match self.key.convert(Value::String(key))? {
                        Value::String(key) => key,
                        other => {
                            return Err(Error::conversion(
                                &self.key_shape,
                                format!("key converter produced a non-string key: {}", other),
                            ))
                        }
                    };
                    converted.insert(key, self.value.convert(entry)?);
                }
                Ok(Value::Object(converted))
            }
            other => self.value.convert(other),
        }
    }

    fn set_chain(&mut self, chain: &ChainResolver<'_>) {
        if let Some(key) = chain(&self.key_shape) {
            self.key = key;
        }
        if let Some(value) = chain(&self.value_shape) {
            self.value = value;
        }
    }
}

/// Default factory providing string conversion for scalar targets.
///
/// Strings pass through untouched; every other scalar renders as its JSON
/// text. Installed by [`crate::registry::ConverterRegistry::with_defaults`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardFactory;

impl ConverterFactory for StandardFactory {
    fn string_converter(
        &self,
        target: &TypeShape,
        _request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        matches!(target, TypeShape::Scalar(_))
            .then(|| Box::new(StringConverter) as Box<dyn Converter>)
    }
}

struct StringConverter;

impl Converter for StringConverter {
    fn convert(&self, value: Value) -> Result<Value> {
        let rendered = match value {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(Value::String(rendered))
    }
}

/// Factory providing schema-validating converters for a single model type.
///
/// This is the canonical example of the factory contract: it matches exactly
/// the scalar shape of `T` for the request-body and response-body kinds, and
/// its converter validates data by round-tripping it through `T`. Malformed
/// data fails with [`Error::ConversionFailed`].
///
/// # Examples
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use tether::converters::{Converter, ConverterFactory, SchemaFactory, TypeShape};
/// use tether::metadata::RequestMetadata;
/// use serde_json::json;
///
/// #[derive(Serialize, Deserialize)]
/// struct User {
///     id: u64,
///     name: String,
/// }
///
/// let factory = SchemaFactory::<User>::new();
/// let converter = factory
///     .response_body_converter(&TypeShape::scalar::<User>(), &RequestMetadata::default())
///     .unwrap();
///
/// let valid = converter.convert(json!({"id": 1, "name": "Alice"}));
/// assert!(valid.is_ok());
///
/// let invalid = converter.convert(json!({"id": "not-a-number"}));
/// assert!(invalid.is_err());
/// ```
pub struct SchemaFactory<T> {
    target: TypeKey,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SchemaFactory<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    /// Creates a factory for the model type `T`.
    pub fn new() -> Self {
        Self {
            target: TypeKey::of::<T>(),
            _marker: PhantomData,
        }
    }

    fn matches(&self, target: &TypeShape) -> bool {
        matches!(target, TypeShape::Scalar(key) if *key == self.target)
    }
}

impl<T> Default for SchemaFactory<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ConverterFactory for SchemaFactory<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn request_body_converter(
        &self,
        target: &TypeShape,
        _request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        self.matches(target)
            .then(|| Box::new(SchemaConverter::<T>::new()) as Box<dyn Converter>)
    }

    fn response_body_converter(
        &self,
        target: &TypeShape,
        _request: &RequestMetadata,
    ) -> Option<Box<dyn Converter>> {
        self.matches(target)
            .then(|| Box::new(SchemaConverter::<T>::new()) as Box<dyn Converter>)
    }
}

struct SchemaConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> SchemaConverter<T> {
    fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Converter for SchemaConverter<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn convert(&self, value: Value) -> Result<Value> {
        let name = std::any::type_name::<T>();
        let model: T =
            serde_json::from_value(value).map_err(|e| Error::conversion(name, e))?;
        serde_json::to_value(&model).map_err(|e| Error::conversion(name, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Double;

    impl Converter for Double {
        fn convert(&self, value: Value) -> Result<Value> {
            let n = value.as_i64().ok_or_else(|| {
                Error::conversion("i64", format!("not an integer: {}", value))
            })?;
            Ok(Value::from(n * 2))
        }
    }

    struct Uppercase;

    impl Converter for Uppercase {
        fn convert(&self, value: Value) -> Result<Value> {
            match value {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(Error::conversion("String", format!("not a string: {}", other))),
            }
        }
    }

    fn doubling_chain(shape: &TypeShape) -> Option<Box<dyn Converter>> {
        (*shape == TypeShape::scalar::<i64>()).then(|| Box::new(Double) as Box<dyn Converter>)
    }

    #[test]
    fn list_converter_maps_elements_in_order() {
        let mut converter = ListConverter::new(TypeShape::scalar::<i64>());
        converter.set_chain(&doubling_chain);

        let converted = converter.convert(json!([1, 2, 3])).unwrap();
        assert_eq!(converted, json!([2, 4, 6]));
    }

    #[test]
    fn list_converter_wraps_scalars() {
        let mut converter = ListConverter::new(TypeShape::scalar::<i64>());
        converter.set_chain(&doubling_chain);

        let converted = converter.convert(json!(5)).unwrap();
        assert_eq!(converted, json!([10]));
    }

    #[test]
    fn list_converter_defaults_to_identity_elements() {
        // No chain call at all: the element converter must still be usable.
        let converter = ListConverter::new(TypeShape::scalar::<i64>());
        let converted = converter.convert(json!([1, 2])).unwrap();
        assert_eq!(converted, json!([1, 2]));
    }

    #[test]
    fn list_converter_propagates_element_failures() {
        let mut converter = ListConverter::new(TypeShape::scalar::<i64>());
        converter.set_chain(&doubling_chain);

        let result = converter.convert(json!([1, "two", 3]));
        assert!(matches!(result, Err(Error::ConversionFailed { .. })));
    }

    #[test]
    fn dict_converter_converts_keys_and_values() {
        let mut converter = DictConverter::new(
            TypeShape::scalar::<String>(),
            TypeShape::scalar::<i64>(),
        );
        converter.set_chain(&|shape: &TypeShape| {
            if *shape == TypeShape::scalar::<String>() {
                Some(Box::new(Uppercase) as Box<dyn Converter>)
            } else if *shape == TypeShape::scalar::<i64>() {
                Some(Box::new(Double) as Box<dyn Converter>)
            } else {
                None
            }
        });

        let converted = converter.convert(json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(converted, json!({"A": 2, "B": 4}));
        assert_eq!(converted.as_object().unwrap().len(), 2);
    }

    #[test]
    fn dict_converter_applies_value_converter_to_non_mappings() {
        let mut converter = DictConverter::new(
            TypeShape::scalar::<String>(),
            TypeShape::scalar::<i64>(),
        );
        converter.set_chain(&|shape: &TypeShape| {
            (*shape == TypeShape::scalar::<i64>()).then(|| Box::new(Double) as Box<dyn Converter>)
        });

        let converted = converter.convert(json!(21)).unwrap();
        assert_eq!(converted, json!(42));
    }

    #[test]
    fn dict_converter_rejects_non_string_keys() {
        let mut converter = DictConverter::new(
            TypeShape::scalar::<String>(),
            TypeShape::scalar::<i64>(),
        );
        // A key converter that turns keys into numbers is a contract breach.
        converter.set_chain(&|shape: &TypeShape| {
            (*shape == TypeShape::scalar::<String>())
                .then(|| Box::new(ConstNumber) as Box<dyn Converter>)
        });

        struct ConstNumber;
        impl Converter for ConstNumber {
            fn convert(&self, _value: Value) -> Result<Value> {
                Ok(json!(7))
            }
        }

        let result = converter.convert(json!({"a": 1}));
        assert!(matches!(result, Err(Error::ConversionFailed { .. })));
    }

    #[test]
    fn standard_factory_renders_scalars_as_strings() {
        let metadata = RequestMetadata::default();
        let converter = StandardFactory
            .string_converter(&TypeShape::scalar::<i64>(), &metadata)
            .unwrap();

        assert_eq!(converter.convert(json!(42)).unwrap(), json!("42"));
        assert_eq!(converter.convert(json!("x")).unwrap(), json!("x"));
        assert_eq!(converter.convert(json!(true)).unwrap(), json!("true"));
    }

    #[test]
    fn standard_factory_declines_container_shapes() {
        let metadata = RequestMetadata::default();
        let shape = TypeShape::sequence_of(TypeShape::scalar::<i64>());
        assert!(StandardFactory.string_converter(&shape, &metadata).is_none());
    }

    #[test]
    fn type_shape_display() {
        let shape = TypeShape::mapping_of(
            TypeShape::scalar::<String>(),
            TypeShape::sequence_of(TypeShape::scalar::<i64>()),
        );
        assert_eq!(
            shape.to_string(),
            "mapping<alloc::string::String, sequence<i64>>"
        );
    }
}
