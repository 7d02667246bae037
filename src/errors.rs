//! Error types for all jsv-related operations.
//!
//! Validation failures found while evaluating an instance are described by
//! [`ValidationError`](../validator/struct.ValidationError.html). Everything
//! that stops a call before or instead of evaluation is a [`JsvError`].

use crate::validator::ValidationError;
use failure::Fail;

/// An enum of possible errors that can emerge from this crate.
#[derive(Debug, Fail, PartialEq, Clone)]
pub enum JsvError {
    /// The top-level schema was neither a boolean nor an object.
    ///
    /// The payload is the compact serialization of the rejected value.
    #[fail(display = "{} is not of types \"boolean\", \"object\"", _0)]
    InvalidSchemaType(String),

    /// An explicitly requested draft number is not one this crate knows.
    #[fail(display = "Unknown draft: {}", _0)]
    UnknownDraft(i64),

    /// A `$schema`, `$ref` or identifier could not be resolved.
    ///
    /// Referencing errors only occur while compiling, and always take
    /// priority over validation errors.
    #[fail(display = "{}", _0)]
    Referencing(#[cause] ReferencingError),

    /// A host value has no JSON counterpart.
    #[fail(display = "Unsupported type: '{}'", type_name)]
    UnsupportedType { type_name: String },

    /// A host value contains itself.
    #[fail(display = "Recursive structure detected: '{}' contains itself", type_name)]
    RecursiveStructure { type_name: String },

    /// A host value is nested deeper than the configured limit.
    #[fail(display = "Exceeded maximum nesting depth ({})", limit)]
    NestingTooDeep { limit: usize },

    /// A host mapping used a key that is not string-like.
    #[fail(display = "Mapping key must be a string, got '{}'", type_name)]
    NonStringKey { type_name: String },

    /// A host float was NaN or infinite.
    #[fail(display = "Cannot convert NaN or Infinity to JSON")]
    NonFiniteNumber,

    /// A schema source was expected to be textual.
    #[fail(display = "Expected string, got {}", got)]
    ExpectedString { got: String },

    /// A schema source could not be parsed.
    #[fail(display = "Invalid JSON: {}", message)]
    InvalidJson { message: String },

    /// A recognized keyword carried a value it cannot be compiled from.
    #[fail(display = "Invalid \"{}\" keyword at '{}': {}", keyword, pointer, reason)]
    InvalidKeyword {
        keyword: String,
        pointer: String,
        reason: String,
    },

    /// The schema failed meta-validation while compiling with
    /// `Config::validate_schema(true)`.
    #[fail(display = "Invalid schema: {}", _0)]
    InvalidSchema(Box<ValidationError>),

    /// An instance failed validation.
    #[fail(display = "{}", _0)]
    Validation(Box<ValidationError>),
}

impl From<ReferencingError> for JsvError {
    fn from(error: ReferencingError) -> Self {
        JsvError::Referencing(error)
    }
}

impl From<ValidationError> for JsvError {
    fn from(error: ValidationError) -> Self {
        JsvError::Validation(Box::new(error))
    }
}

/// Failures to resolve identifiers, references and specifications.
#[derive(Debug, Fail, PartialEq, Eq, Clone, Hash)]
pub enum ReferencingError {
    /// A `$schema` value names no known draft.
    #[fail(display = "Unknown specification: {}", uri)]
    UnknownSpecification { uri: String },

    /// A reference or identifier is not a valid URI reference.
    #[fail(display = "Invalid URI reference '{}': {}", reference, reason)]
    InvalidUri { reference: String, reason: String },

    /// A document is neither registered nor retrievable.
    #[fail(
        display = "Resource '{}' is not present in a registry and retrieving it failed: {}",
        uri, reason
    )]
    Unretrievable { uri: String, reason: String },

    /// A JSON Pointer fragment points outside of its document.
    #[fail(display = "Pointer '{}' does not exist", pointer)]
    PointerToNowhere { pointer: String },

    /// A plain-name fragment names no anchor in its resource.
    #[fail(display = "Anchor '{}' does not exist", anchor)]
    NoSuchAnchor { anchor: String },
}

pub type Result<T> = std::result::Result<T, JsvError>;
