//! `jsv` is a Rust implementation of [JSON Schema][json-schema] validation,
//! supporting Draft 4, Draft 6, Draft 7, Draft 2019-09 and Draft 2020-12.
//!
//! The documentation for this crate focuses on making JSON Schema work with
//! Rust. For information on JSON Schema in general, refer to the
//! [documentation on the JSON Schema homepage][json-schema-docs].
//!
//! # Validating data
//!
//! The most common use-case for this crate is checking that some JSON input is
//! really valid against a schema. Here's how you'd achieve that use-case:
//!
//! ```
//! use serde_json::json;
//! use jsv::{JsvError, Schema};
//!
//! fn main() -> Result<(), JsvError> {
//!     let demo_schema = json!({
//!         "properties": {
//!             "name": { "type": "string" },
//!             "age": { "type": "number" },
//!             "phones": {
//!                 "items": { "type": "string" }
//!             }
//!         },
//!         "required": ["name"]
//!     });
//!
//!     // Compiling is the expensive part. A compiled Schema can be reused
//!     // for many instances, and shared between threads.
//!     let schema = Schema::compile(&demo_schema)?;
//!
//!     let input_ok = json!({
//!         "name": "John Doe",
//!         "age": 43,
//!         "phones": [
//!             "+44 1234567",
//!             "+44 2345678"
//!         ]
//!     });
//!     assert!(schema.is_valid(&input_ok));
//!
//!     let input_bad = json!({
//!         "age": "43",
//!         "phones": [
//!             "+44 1234567",
//!             442345678
//!         ]
//!     });
//!
//!     // Each ValidationError holds paths to the bad part of the input, as
//!     // well as the part of the schema which rejected it. Errors come out in
//!     // a deterministic order.
//!     let errors = schema.iter_errors(&input_bad).collect::<Vec<_>>();
//!     assert_eq!(errors.len(), 3);
//!
//!     // "name" is required
//!     assert_eq!(errors[0].instance_path().to_string(), "");
//!     assert_eq!(errors[0].schema_path().to_string(), "/required");
//!
//!     // "age" has the wrong type
//!     assert_eq!(errors[1].instance_path().to_string(), "/age");
//!     assert_eq!(errors[1].schema_path().to_string(), "/properties/age/type");
//!
//!     // "phones[1]" has the wrong type
//!     assert_eq!(errors[2].instance_path().to_string(), "/phones/1");
//!     assert_eq!(errors[2].schema_path().to_string(), "/properties/phones/items/type");
//!     assert_eq!(errors[2].message(), r#"442345678 is not of type "string""#);
//!
//!     Ok(())
//! }
//! ```
//!
//! The [`ValidationError`](validator/struct.ValidationError.html) type holds
//! two [`Path`s](paths/struct.Path.html), which render as JSON Pointers or as
//! bracketed subscript chains.
//!
//! # Configuration
//!
//! [`Validator`](validator/struct.Validator.html) compiles schemas with a
//! [`Config`](validator/struct.Config.html): a fixed draft, format
//! assertions, meta-validation of the schema itself, extra documents that
//! references may point into, and a [`Retrieve`](resolver/trait.Retrieve.html)
//! implementation for everything else.
//!
//! # Schemas as data
//!
//! The [`meta`](meta/index.html) module checks schema documents against their
//! draft's meta-schema.
//!
//! [json-schema]: https://json-schema.org
//!
//! [json-schema-docs]: https://json-schema.org/specification

mod compiler;
mod ecma;
mod formats;
mod vm;

pub mod draft;
pub mod errors;
pub mod meta;
pub mod paths;
pub mod resolver;
pub mod schema;
pub mod validator;
pub mod value;

pub use crate::draft::Draft;
pub use crate::errors::{JsvError, ReferencingError};
pub use crate::paths::{Path, PathChunk};
pub use crate::resolver::Retrieve;
pub use crate::schema::Schema;
pub use crate::validator::{Config, TypeKind, ValidationError, ValidationErrorKind, Validator};
pub use crate::value::{HostValue, JsonType, MapKey, Shape};
pub use crate::vm::ErrorIter;

use serde_json::Value;

/// Compile a schema document, optionally under an explicitly numbered draft
/// (see [`Draft::from_number`](draft/enum.Draft.html#method.from_number)).
pub fn compile(schema: &Value, draft: Option<i64>) -> errors::Result<Schema> {
    let mut config = Config::new();
    if let Some(number) = draft {
        config.draft_number(number)?;
    }
    Validator::new_with_config(config).compile(schema)
}

/// Compile `schema` and check `instance` against it.
pub fn is_valid(schema: &Value, instance: &Value) -> errors::Result<bool> {
    Ok(Schema::compile(schema)?.is_valid(instance))
}

/// Compile `schema` and report the first violation of `instance` as a
/// `JsvError::Validation`.
pub fn validate(schema: &Value, instance: &Value) -> errors::Result<()> {
    Schema::compile(schema)?
        .validate(instance)
        .map_err(JsvError::from)
}

/// Compile `schema` and lazily produce every violation of `instance`.
pub fn iter_errors<'i>(schema: &Value, instance: &'i Value) -> errors::Result<ErrorIter<'i>> {
    Ok(Schema::compile(schema)?.iter_errors(instance))
}
