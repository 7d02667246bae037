//! Compiling schemas, and the errors found when evaluating instances.
//!
//! A [`Validator`](struct.Validator.html) turns schema documents into
//! [`Schema`](../schema/struct.Schema.html) graphs according to its
//! [`Config`](struct.Config.html). Every violation an instance commits is
//! described by a [`ValidationError`](struct.ValidationError.html).

use crate::compiler;
use crate::draft::Draft;
use crate::errors::{JsvError, Result};
use crate::meta;
use crate::paths::{Path, PathChunk};
use crate::resolver::Retrieve;
use crate::schema::Schema;
use crate::value::{self, HostValue, JsonType};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Compiles schemas with a given configuration.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    config: Config,
}

impl Validator {
    /// A validator that detects drafts from `$schema` and resolves only
    /// references into the compiled document and the bundled meta-schemas.
    pub fn new() -> Self {
        Self::new_with_config(Config::default())
    }

    /// A validator compiling every schema under `config`.
    pub fn new_with_config(config: Config) -> Self {
        Self { config }
    }

    /// Compile a schema document.
    ///
    /// Fails with `InvalidSchemaType` if the document is neither a boolean
    /// nor an object, and with a referencing error if an identifier or
    /// reference cannot be resolved. No partially compiled schema is ever
    /// returned.
    pub fn compile(&self, schema: &Value) -> Result<Schema> {
        if self.config.validate_schema {
            meta::check(schema, self.config.draft).map_err(|error| match error {
                JsvError::Validation(error) => JsvError::InvalidSchema(error),
                other => other,
            })?;
        }
        compiler::compile(Arc::new(schema.clone()), &self.config).map(Schema::new)
    }

    /// Convert a schema handed over by a host binding, then compile it.
    pub fn compile_host<H: HostValue>(&self, schema: &H) -> Result<Schema> {
        let schema = value::to_internal(schema, self.config.max_nesting)?;
        self.compile(&schema)
    }

    /// Parse a schema document from JSON text, then compile it.
    pub fn compile_source(&self, source: &str) -> Result<Schema> {
        let schema: Value = serde_json::from_str(source).map_err(|error| JsvError::InvalidJson {
            message: error.to_string(),
        })?;
        self.compile(&schema)
    }
}

/// Draft selection, format and meta-schema assertions, evaluation limits,
/// and the documents `$ref` may reach outside the compiled schema.
#[derive(Clone)]
pub struct Config {
    pub(crate) draft: Option<Draft>,
    pub(crate) validate_formats: Option<bool>,
    pub(crate) validate_schema: bool,
    pub(crate) max_depth: usize,
    pub(crate) max_nesting: usize,
    pub(crate) resources: Vec<(String, Arc<Value>)>,
    pub(crate) retriever: Option<Arc<dyn Retrieve>>,
}

impl Config {
    /// Same as `Config::default()`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile under a specific draft instead of detecting it from
    /// `$schema`. By default, schemas without `$schema` use Draft 2020-12.
    pub fn draft(&mut self, draft: Draft) -> &mut Self {
        self.draft = Some(draft);
        self
    }

    /// Like [`draft`](#method.draft), naming the draft by number. Fails
    /// with `UnknownDraft` for numbers that name no draft.
    pub fn draft_number(&mut self, number: i64) -> Result<&mut Self> {
        let draft = Draft::from_number(number)?;
        Ok(self.draft(draft))
    }

    /// Sets whether `format` is an assertion. By default it is for Draft 4,
    /// 6 and 7, and only an annotation for later drafts.
    pub fn validate_formats(&mut self, validate_formats: bool) -> &mut Self {
        self.validate_formats = Some(validate_formats);
        self
    }

    /// Sets whether schemas are checked against their meta-schema before
    /// being compiled. Off by default.
    pub fn validate_schema(&mut self, validate_schema: bool) -> &mut Self {
        self.validate_schema = validate_schema;
        self
    }

    /// Sets how many `$ref`, `$recursiveRef` or `$dynamicRef` hops may be
    /// taken in a row at the same instance location. Defaults to 32.
    ///
    /// Nesting of in-place applicators such as `allOf` or `not` is not
    /// counted. Going past the limit produces a single
    /// `MaxDepthExceeded` error, so reference cycles that never consume
    /// the instance make it invalid instead of looping.
    pub fn max_depth(&mut self, max_depth: usize) -> &mut Self {
        self.max_depth = max_depth;
        self
    }

    /// Sets how deeply host values may nest before conversion fails. The
    /// default value is 255.
    pub fn max_nesting(&mut self, max_nesting: usize) -> &mut Self {
        self.max_nesting = max_nesting;
        self
    }

    /// Make a document available to references under `uri`.
    pub fn resource(&mut self, uri: impl Into<String>, document: Value) -> &mut Self {
        self.resources.push((uri.into(), Arc::new(document)));
        self
    }

    /// Sets how documents that are neither bundled nor registered with
    /// [`resource`](#method.resource) are fetched.
    pub fn retriever(&mut self, retriever: impl Retrieve + 'static) -> &mut Self {
        self.retriever = Some(Arc::new(retriever));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            draft: None,
            validate_formats: None,
            validate_schema: false,
            max_depth: 32,
            max_nesting: value::DEFAULT_MAX_NESTING,
            resources: Vec::new(),
            retriever: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("draft", &self.draft)
            .field("validate_formats", &self.validate_formats)
            .field("validate_schema", &self.validate_schema)
            .field("max_depth", &self.max_depth)
            .field("max_nesting", &self.max_nesting)
            .field(
                "resources",
                &self.resources.iter().map(|(uri, _)| uri).collect::<Vec<_>>(),
            )
            .field("retriever", &self.retriever.is_some())
            .finish()
    }
}

/// The `type` keyword's expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Single(JsonType),
    Multiple(Vec<JsonType>),
}

/// What went wrong, by keyword.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationErrorKind {
    /// Items beyond a positional prefix were forbidden.
    AdditionalItems { limit: usize },
    AdditionalProperties { unexpected: Vec<String> },
    AnyOf,
    Constant { expected_value: Value },
    /// No item matched `contains`.
    Contains,
    MinContains { limit: u64 },
    MaxContains { limit: u64 },
    Enum { options: Value },
    ExclusiveMaximum { limit: Value },
    ExclusiveMinimum { limit: Value },
    FalseSchema,
    Format { format: String },
    MaxItems { limit: u64 },
    MaxLength { limit: u64 },
    MaxProperties { limit: u64 },
    Maximum { limit: Value },
    MinItems { limit: u64 },
    MinLength { limit: u64 },
    MinProperties { limit: u64 },
    Minimum { limit: Value },
    MultipleOf { multiple_of: Value },
    Not { schema: Value },
    OneOfMultipleValid,
    OneOfNotValid,
    Pattern { pattern: String },
    Required { property: Value },
    Type { kind: TypeKind },
    UnevaluatedItems { unexpected: Vec<String> },
    UnevaluatedProperties { unexpected: Vec<String> },
    UniqueItems,
    /// Too many references were followed without consuming the instance.
    MaxDepthExceeded { limit: usize },
}

/// Contains a single problem with an instance when evaluated against a schema.
///
/// Note that, despite its name, `ValidationError` is not an error in the usual
/// Rust sense during iteration. It is an ordinary struct, which happens to
/// contain information about why some data was unsatisfactory against a given
/// schema.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationError {
    instance: Value,
    kind: ValidationErrorKind,
    instance_path: Path,
    schema_path: Path,
}

impl ValidationError {
    pub fn new(
        instance: Value,
        kind: ValidationErrorKind,
        instance_path: Path,
        schema_path: Path,
    ) -> ValidationError {
        ValidationError {
            instance,
            kind,
            instance_path,
            schema_path,
        }
    }

    /// The part of the instance (input) which was rejected.
    pub fn instance(&self) -> &Value {
        &self.instance
    }

    pub fn kind(&self) -> &ValidationErrorKind {
        &self.kind
    }

    /// A path into the part of the instance (input) which was rejected.
    pub fn instance_path(&self) -> &Path {
        &self.instance_path
    }

    /// A path into the part of the schema which rejected the instance.
    pub fn schema_path(&self) -> &Path {
        &self.schema_path
    }

    /// The short, single-line description of the problem.
    pub fn message(&self) -> String {
        let instance = &self.instance;
        match &self.kind {
            ValidationErrorKind::AdditionalItems { limit } => {
                let extras: Vec<String> = instance
                    .as_array()
                    .map(|items| items.iter().skip(*limit).map(Value::to_string).collect())
                    .unwrap_or_default();
                unexpected("Additional items", &extras)
            }
            ValidationErrorKind::AdditionalProperties { unexpected: names } => {
                unexpected("Additional properties", &quoted(names))
            }
            ValidationErrorKind::AnyOf => format!(
                "{} is not valid under any of the schemas listed in the 'anyOf' keyword",
                instance
            ),
            ValidationErrorKind::Constant { expected_value } => {
                format!("{} was expected", expected_value)
            }
            ValidationErrorKind::Contains => {
                format!("None of {} are valid under the given schema", instance)
            }
            ValidationErrorKind::MinContains { limit } => format!(
                "{} has less than {} item{} valid under the given schema",
                instance,
                limit,
                plural(*limit, "", "s")
            ),
            ValidationErrorKind::MaxContains { limit } => format!(
                "{} has more than {} item{} valid under the given schema",
                instance,
                limit,
                plural(*limit, "", "s")
            ),
            ValidationErrorKind::Enum { options } => {
                format!("{} is not one of {}", instance, options)
            }
            ValidationErrorKind::ExclusiveMaximum { limit } => format!(
                "{} is greater than or equal to the maximum of {}",
                instance, limit
            ),
            ValidationErrorKind::ExclusiveMinimum { limit } => format!(
                "{} is less than or equal to the minimum of {}",
                instance, limit
            ),
            ValidationErrorKind::FalseSchema => format!("False schema does not allow {}", instance),
            ValidationErrorKind::Format { format } => {
                format!("{} is not a \"{}\"", instance, format)
            }
            ValidationErrorKind::MaxItems { limit } => format!(
                "{} has more than {} item{}",
                instance,
                limit,
                plural(*limit, "", "s")
            ),
            ValidationErrorKind::MinItems { limit } => format!(
                "{} has less than {} item{}",
                instance,
                limit,
                plural(*limit, "", "s")
            ),
            ValidationErrorKind::MaxLength { limit } => format!(
                "{} is longer than {} character{}",
                instance,
                limit,
                plural(*limit, "", "s")
            ),
            ValidationErrorKind::MinLength { limit } => format!(
                "{} is shorter than {} character{}",
                instance,
                limit,
                plural(*limit, "", "s")
            ),
            ValidationErrorKind::MaxProperties { limit } => format!(
                "{} has more than {} propert{}",
                instance,
                limit,
                plural(*limit, "y", "ies")
            ),
            ValidationErrorKind::MinProperties { limit } => format!(
                "{} has less than {} propert{}",
                instance,
                limit,
                plural(*limit, "y", "ies")
            ),
            ValidationErrorKind::Maximum { limit } => {
                format!("{} is greater than the maximum of {}", instance, limit)
            }
            ValidationErrorKind::Minimum { limit } => {
                format!("{} is less than the minimum of {}", instance, limit)
            }
            ValidationErrorKind::MultipleOf { multiple_of } => {
                format!("{} is not a multiple of {}", instance, multiple_of)
            }
            ValidationErrorKind::Not { schema } => {
                format!("{} is not allowed for {}", schema, instance)
            }
            ValidationErrorKind::OneOfMultipleValid => format!(
                "{} is valid under more than one of the schemas listed in the 'oneOf' keyword",
                instance
            ),
            ValidationErrorKind::OneOfNotValid => format!(
                "{} is not valid under any of the schemas listed in the 'oneOf' keyword",
                instance
            ),
            ValidationErrorKind::Pattern { pattern } => {
                format!("{} does not match \"{}\"", instance, pattern)
            }
            ValidationErrorKind::Required { property } => {
                format!("{} is a required property", property)
            }
            ValidationErrorKind::Type {
                kind: TypeKind::Single(json_type),
            } => format!("{} is not of type \"{}\"", instance, json_type),
            ValidationErrorKind::Type {
                kind: TypeKind::Multiple(types),
            } => format!(
                "{} is not of types {}",
                instance,
                types
                    .iter()
                    .map(|t| format!("\"{}\"", t))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            ValidationErrorKind::UnevaluatedItems { unexpected: items } => {
                unexpected("Unevaluated items", items)
            }
            ValidationErrorKind::UnevaluatedProperties { unexpected: names } => {
                unexpected("Unevaluated properties", &quoted(names))
            }
            ValidationErrorKind::UniqueItems => format!("{} has non-unique elements", instance),
            ValidationErrorKind::MaxDepthExceeded { limit } => {
                format!("Maximum reference depth exceeded ({})", limit)
            }
        }
    }

    /// The keyword that rejected the instance: the last segment of the
    /// schema path. `false` schemas have none.
    pub fn keyword(&self) -> Option<&str> {
        if self.kind == ValidationErrorKind::FalseSchema {
            return None;
        }
        match self.schema_path.last() {
            Some(PathChunk::Key(keyword)) => Some(keyword.as_ref()),
            _ => None,
        }
    }
}

fn plural(count: u64, one: &'static str, many: &'static str) -> &'static str {
    if count == 1 {
        one
    } else {
        many
    }
}

fn quoted(names: &[String]) -> Vec<String> {
    names.iter().map(|name| format!("'{}'", name)).collect()
}

fn unexpected(what: &str, extras: &[String]) -> String {
    format!(
        "{} are not allowed ({} {} unexpected)",
        what,
        extras.join(", "),
        if extras.len() == 1 { "was" } else { "were" }
    )
}

impl fmt::Display for ValidationError {
    /// The multi-line report: message, failing keyword with its schema
    /// location, and the offending part of the instance.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chunks = self.schema_path.chunks();
        let (keyword, location) = match self.keyword() {
            Some(keyword) => (keyword, &chunks[..chunks.len() - 1]),
            None => ("false", chunks),
        };
        let pretty = serde_json::to_string_pretty(&self.instance).map_err(|_| fmt::Error)?;
        write!(
            f,
            "{}\n\nFailed validating \"{}\" in schema{}\n\nOn instance{}:\n",
            self.message(),
            keyword,
            crate::paths::brackets(location),
            self.instance_path.to_brackets(),
        )?;
        let lines = pretty
            .lines()
            .map(|line| format!("    {}", line))
            .collect::<Vec<_>>();
        f.write_str(&lines.join("\n"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn infinite_loop() -> Result<()> {
        let validator = Validator::new();
        let schema = validator.compile(&json!({
            "$defs": {
                "a": { "$ref": "#/$defs/a" },
            },
            "$ref": "#/$defs/a",
        }))?;
        let errors = schema.iter_errors(&json!({})).collect::<Vec<_>>();
        assert_eq!(errors.len(), 1);
        assert_eq!(
            errors[0].kind(),
            &ValidationErrorKind::MaxDepthExceeded { limit: 32 }
        );

        Ok(())
    }

    #[test]
    fn max_depth() -> Result<()> {
        let schema = json!({
            "$defs": {
                "a": { "$ref": "#/$defs/b" },
                "b": { "$ref": "#/$defs/c" },
                "c": { "type": "string" },
            },
            "$ref": "#/$defs/a",
        });

        let mut config = Config::new();
        config.max_depth(2);
        let shallow = Validator::new_with_config(config.clone()).compile(&schema)?;
        assert!(!shallow.is_valid(&json!("ok")));

        let deep = Validator::new().compile(&schema)?;
        assert!(deep.is_valid(&json!("ok")));

        let nested = (0..10).fold(json!({ "type": "string" }), |schema, _| {
            json!({ "allOf": [schema] })
        });
        let nested = Validator::new_with_config(config).compile(&nested)?;
        assert!(nested.is_valid(&json!("ok")));
        assert!(!nested.is_valid(&json!(1)));

        Ok(())
    }

    #[test]
    fn display() -> Result<()> {
        let schema = Validator::new().compile(&json!({
            "properties": {"foo": {"type": "integer"}}
        }))?;
        let error = schema.validate(&json!({"foo": null})).unwrap_err();
        assert_eq!(
            error.to_string(),
            "null is not of type \"integer\"\n\n\
             Failed validating \"type\" in schema[\"properties\"][\"foo\"]\n\n\
             On instance[\"foo\"]:\n    null"
        );

        let error = schema.validate(&json!({"foo": [1, 2]})).unwrap_err();
        assert!(error.to_string().ends_with("On instance[\"foo\"]:\n    [\n      1,\n      2\n    ]"));

        Ok(())
    }

    #[test]
    fn messages() {
        let error = |instance: Value, kind| {
            ValidationError::new(instance, kind, Path::default(), Path::default()).message()
        };
        assert_eq!(
            error(
                json!({"a": 1, "b": 2}),
                ValidationErrorKind::AdditionalProperties {
                    unexpected: vec!["a".to_owned(), "b".to_owned()]
                }
            ),
            "Additional properties are not allowed ('a', 'b' were unexpected)"
        );
        assert_eq!(
            error(json!([1, 2, 3]), ValidationErrorKind::AdditionalItems { limit: 2 }),
            "Additional items are not allowed (3 was unexpected)"
        );
        assert_eq!(
            error(
                json!([]),
                ValidationErrorKind::Type {
                    kind: TypeKind::Multiple(vec![JsonType::Boolean, JsonType::Object])
                }
            ),
            r#"[] is not of types "boolean", "object""#
        );
        assert_eq!(
            error(json!("ab"), ValidationErrorKind::MinLength { limit: 3 }),
            r#""ab" is shorter than 3 characters"#
        );
        assert_eq!(
            error(json!({}), ValidationErrorKind::MinProperties { limit: 1 }),
            "{} has less than 1 property"
        );
    }

    #[test]
    fn draft_numbers() {
        assert_eq!(
            Config::new().draft_number(5).unwrap_err(),
            JsvError::UnknownDraft(5)
        );
        assert!(Config::new().draft_number(4).is_ok());
    }
}
