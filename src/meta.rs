//! Validate schema documents against their draft's meta-schema.
//!
//! ```
//! use serde_json::json;
//!
//! assert!(jsv::meta::is_valid(&json!({"type": "string"})).unwrap());
//! assert!(!jsv::meta::is_valid(&json!({"type": "invalid_type"})).unwrap());
//! assert!(jsv::meta::is_valid(&json!({"$schema": "invalid-uri"})).is_err());
//! ```

use crate::draft::{self, Draft};
use crate::errors::{JsvError, Result};
use crate::schema::Schema;
use crate::validator::{Config, Validator};
use crate::value::{self, HostValue};
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Is `schema` a valid schema document under the draft it declares?
///
/// Fails only when the draft itself cannot be determined: an unknown
/// `$schema` is a referencing error, never a `false`.
pub fn is_valid(schema: &Value) -> Result<bool> {
    let draft = match Draft::detect(schema)? {
        Some(draft) => draft,
        None if schema.is_boolean() => return Ok(true),
        None => Draft::default(),
    };
    Ok(meta_schema(draft).is_valid(schema))
}

/// Like [`is_valid`](fn.is_valid.html), reporting the first violation as a
/// `JsvError::Validation`.
pub fn validate(schema: &Value) -> Result<()> {
    check(schema, None)
}

/// Convert a host value, then check it like [`is_valid`](fn.is_valid.html).
pub fn is_valid_host<H: HostValue>(schema: &H) -> Result<bool> {
    is_valid(&value::to_internal(schema, value::DEFAULT_MAX_NESTING)?)
}

/// Convert a host value, then check it like [`validate`](fn.validate.html).
pub fn validate_host<H: HostValue>(schema: &H) -> Result<()> {
    validate(&value::to_internal(schema, value::DEFAULT_MAX_NESTING)?)
}

/// Check `schema` against the meta-schema of `fallback`, unless the schema
/// names its own draft.
pub(crate) fn check(schema: &Value, fallback: Option<Draft>) -> Result<()> {
    let draft = match Draft::detect(schema)? {
        Some(draft) => draft,
        None if schema.is_boolean() => return Ok(()),
        None => fallback.unwrap_or_default(),
    };
    meta_schema(draft).validate(schema).map_err(JsvError::from)
}

/// The compiled meta-schema of a draft, built on first use.
fn meta_schema(draft: Draft) -> &'static Schema {
    static META_SCHEMAS: [OnceLock<Schema>; 5] = [
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
        OnceLock::new(),
    ];
    let slot = match draft {
        Draft::Draft4 => 0,
        Draft::Draft6 => 1,
        Draft::Draft7 => 2,
        Draft::Draft201909 => 3,
        Draft::Draft202012 => 4,
    };
    META_SCHEMAS[slot].get_or_init(|| {
        debug!(draft = %draft, "compiling meta-schema");
        let builtin = draft::builtin(draft.meta_schema_uri())
            .expect("unreachable: every draft bundles its meta-schema");
        let mut config = Config::new();
        config.draft(draft).validate_formats(true);
        Validator::new_with_config(config)
            .compile(&builtin.contents)
            .expect("unreachable: bundled meta-schemas compile")
    })
}
