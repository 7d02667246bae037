//! Compiled schemas.
//!
//! Compiling a schema document produces a [`Schema`](struct.Schema.html): an
//! immutable graph of nodes stored in an arena and addressed by index.
//! References between nodes are plain indices, so schemas that refer to
//! themselves (directly or through other documents) compile to a finite
//! graph. A `Schema` is cheap to clone and can be shared between threads.

use crate::draft::Draft;
use crate::ecma::EcmaRegex;
use crate::errors::{JsvError, Result};
use crate::formats::FormatCheck;
use crate::validator::{ValidationError, Validator};
use crate::value::{self, HostValue, JsonType, Shape};
use crate::vm::{self, ErrorIter};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub(crate) type NodeId = usize;
pub(crate) type ResourceId = usize;

/// A single compiled subschema.
#[derive(Debug)]
pub(crate) enum Node {
    /// `true` accepts everything, `false` nothing.
    Bool(bool),
    Keywords {
        keywords: Vec<Keyword>,
        /// The schema resource this node belongs to.
        resource: ResourceId,
    },
}

/// A schema resource: a subschema carrying its own base URI.
#[derive(Debug)]
pub(crate) struct Resource {
    pub(crate) root: NodeId,
    pub(crate) dynamic_anchors: HashMap<String, NodeId>,
    pub(crate) recursive_anchor: bool,
}

/// A compiled keyword, in the order the schema declares it.
#[derive(Debug)]
pub(crate) enum Keyword {
    Type {
        types: Vec<JsonType>,
        integral_floats: bool,
    },
    Enum(Value),
    Const(Value),
    Minimum {
        limit: Number,
        /// Draft 4's boolean `exclusiveMinimum` modifier.
        exclusive: bool,
    },
    Maximum {
        limit: Number,
        exclusive: bool,
    },
    ExclusiveMinimum(Number),
    ExclusiveMaximum(Number),
    MultipleOf(Number),
    MinLength(u64),
    MaxLength(u64),
    Pattern(EcmaRegex),
    Format {
        name: String,
        check: FormatCheck,
    },

    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    Contains {
        node: NodeId,
        min: u64,
        max: Option<u64>,
    },
    /// Applies to every item.
    Items(NodeId),
    /// Applies positionally to the leading items.
    Prefix {
        keyword: &'static str,
        nodes: Vec<NodeId>,
    },
    /// Applies to the items after a positional prefix.
    ItemsAfter {
        keyword: &'static str,
        node: NodeId,
        skip: usize,
    },

    MinProperties(u64),
    MaxProperties(u64),
    Required(Vec<String>),
    Properties(Vec<(String, NodeId)>),
    PatternProperties(Vec<(EcmaRegex, NodeId)>),
    AdditionalProperties {
        node: NodeId,
        properties: Vec<String>,
        patterns: Vec<EcmaRegex>,
    },
    PropertyNames(NodeId),
    DependentRequired {
        keyword: &'static str,
        entries: Vec<(String, Vec<String>)>,
    },
    DependentSchemas {
        keyword: &'static str,
        entries: Vec<(String, NodeId)>,
    },

    AllOf(Vec<NodeId>),
    AnyOf(Vec<NodeId>),
    OneOf(Vec<NodeId>),
    Not {
        node: NodeId,
        schema: Value,
    },
    IfThenElse {
        condition: NodeId,
        then: Option<NodeId>,
        otherwise: Option<NodeId>,
    },

    Ref(NodeId),
    /// `$recursiveRef`; `dynamic` is set when its static target carries
    /// `"$recursiveAnchor": true`.
    RecursiveRef {
        node: NodeId,
        dynamic: bool,
    },
    /// `$dynamicRef`; `anchor` is set when its static target carries a
    /// matching `$dynamicAnchor`.
    DynamicRef {
        node: NodeId,
        anchor: Option<String>,
    },

    UnevaluatedProperties(NodeId),
    UnevaluatedItems(NodeId),
}

/// The arena every node of one compiled schema lives in.
#[derive(Debug)]
pub(crate) struct Graph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) resources: Vec<Resource>,
    pub(crate) root: NodeId,
    pub(crate) draft: Draft,
    pub(crate) max_depth: usize,
    pub(crate) max_nesting: usize,
    pub(crate) source: Arc<Value>,
}

/// A compiled, reusable schema.
///
/// ```
/// use jsv::Schema;
/// use serde_json::json;
///
/// let schema = Schema::compile(&json!({"minimum": 5})).unwrap();
/// assert!(schema.is_valid(&json!(5)));
/// assert_eq!(
///     schema.validate(&json!(2)).unwrap_err().message(),
///     "2 is less than the minimum of 5"
/// );
/// assert_eq!(schema.to_string(), r#"<JSONSchema: {"minimum":5}>"#);
/// ```
#[derive(Clone)]
pub struct Schema {
    graph: Arc<Graph>,
}

impl Schema {
    pub(crate) fn new(graph: Graph) -> Schema {
        Schema {
            graph: Arc::new(graph),
        }
    }

    /// Compile a schema document with the default configuration.
    pub fn compile(schema: &Value) -> Result<Schema> {
        Validator::new().compile(schema)
    }

    /// Parse and compile a schema document from its JSON text.
    pub fn from_source(source: &str) -> Result<Schema> {
        Validator::new().compile_source(source)
    }

    /// Like [`from_source`](#method.from_source), for a text handed over by
    /// a host binding. Fails with `ExpectedString` for anything but strings.
    pub fn from_host_source<H: HostValue>(source: &H) -> Result<Schema> {
        match source.shape() {
            Shape::String(text) => Schema::from_source(&text),
            _ => Err(JsvError::ExpectedString {
                got: source.type_name().into_owned(),
            }),
        }
    }

    /// The draft the schema was compiled under.
    pub fn draft(&self) -> Draft {
        self.graph.draft
    }

    /// The schema document this schema was compiled from.
    pub fn source(&self) -> &Value {
        &self.graph.source
    }

    /// Check an instance, stopping at the first violation.
    pub fn is_valid(&self, instance: &Value) -> bool {
        vm::is_valid(&self.graph, instance)
    }

    /// Check an instance and return its first violation, if any.
    pub fn validate(&self, instance: &Value) -> std::result::Result<(), ValidationError> {
        match self.iter_errors(instance).next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Lazily produce every violation of an instance.
    ///
    /// The iterator owns its traversal state; dropping it early stops
    /// validation.
    pub fn iter_errors<'i>(&self, instance: &'i Value) -> ErrorIter<'i> {
        ErrorIter::new(self.graph.clone(), instance)
    }

    /// Convert a host value and check it.
    pub fn is_valid_host<H: HostValue>(&self, instance: &H) -> Result<bool> {
        let instance = value::to_internal(instance, self.graph.max_nesting)?;
        Ok(self.is_valid(&instance))
    }

    /// Convert a host value and return its first violation as an error.
    ///
    /// Conversion failures (`UnsupportedType`, `RecursiveStructure`, ...)
    /// abort the call before any validation happens.
    pub fn validate_host<H: HostValue>(&self, instance: &H) -> Result<()> {
        let instance = value::to_internal(instance, self.graph.max_nesting)?;
        self.validate(&instance).map_err(JsvError::from)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("draft", &self.graph.draft)
            .field("nodes", &self.graph.nodes.len())
            .field("source", &self.graph.source)
            .finish()
    }
}

/// Renders as `<JSONSchema: ...>` around the compact source document.
/// Object keys come out sorted, whatever order the document declared them
/// in.
impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<JSONSchema: {}>", self.graph.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn display_is_compact() {
        let schema = Schema::from_source(r#"{ "minimum" : 5 }"#).unwrap();
        assert_eq!(schema.to_string(), r#"<JSONSchema: {"minimum":5}>"#);
        let schema = Schema::from_source(r#"{"type": "string", "minLength": 1}"#).unwrap();
        assert_eq!(
            schema.to_string(),
            r#"<JSONSchema: {"minLength":1,"type":"string"}>"#
        );
    }

    #[test]
    fn from_source_errors() {
        assert!(matches!(
            Schema::from_source("{"),
            Err(JsvError::InvalidJson { .. })
        ));
        assert_eq!(
            Schema::from_host_source(&&json!(1)).unwrap_err().to_string(),
            "Expected string, got integer"
        );
        assert!(Schema::from_host_source(&&json!(r#"{"type": "string"}"#)).is_ok());
    }

    #[test]
    fn shared_between_threads() {
        let schema = Schema::compile(&json!({"items": {"type": "integer"}})).unwrap();
        let instances = vec![json!([1, 2]), json!([1, "2"]), json!([])];
        std::thread::scope(|scope| {
            for instance in &instances {
                let schema = schema.clone();
                scope.spawn(move || {
                    let expected = !instance.to_string().contains('"');
                    assert_eq!(schema.is_valid(instance), expected);
                });
            }
        });
    }

    #[test]
    fn cyclic_references_compile_to_a_finite_graph() {
        let schema = Schema::compile(&json!({
            "$defs": {
                "a": {"type": "array", "items": {"$ref": "#/$defs/b"}},
                "b": {"type": "array", "items": {"$ref": "#/$defs/a"}}
            },
            "$ref": "#/$defs/a"
        }))
        .unwrap();
        assert!(schema.is_valid(&json!([[[[]]]])));
        assert!(!schema.is_valid(&json!([[1]])));
        assert!(schema.graph.nodes.len() < 16);
    }
}
