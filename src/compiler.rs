use crate::draft::Draft;
use crate::ecma::EcmaRegex;
use crate::errors::{JsvError, ReferencingError, Result};
use crate::formats;
use crate::resolver::{Location, Registry, Scope};
use crate::schema::{Graph, Keyword, Node, NodeId, Resource, ResourceId};
use crate::validator::Config;
use crate::value::JsonType;
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

/// Compile a schema document into a node graph.
///
/// Subschemas are compiled from a work list rather than by recursion: a
/// reference to a location that is already being compiled just reuses its
/// node index, which is how cyclic references become cycles in the graph.
pub(crate) fn compile(schema: Arc<Value>, config: &Config) -> Result<Graph> {
    if !schema.is_object() && !schema.is_boolean() {
        return Err(JsvError::InvalidSchemaType(schema.to_string()));
    }

    let draft = match config.draft {
        Some(draft) => draft,
        None => Draft::detect(&schema)?.unwrap_or_default(),
    };
    debug!(draft = %draft, "selected draft");

    let registry = Registry::new(
        schema.clone(),
        draft,
        &config.resources,
        config.retriever.clone(),
    )?;
    let validate_formats = config
        .validate_formats
        .unwrap_or_else(|| draft.asserts_formats());

    let mut compiler = Compiler {
        registry,
        validate_formats,
        nodes: Vec::new(),
        compiled: HashMap::new(),
        tasks: Vec::new(),
        resources: Vec::new(),
        resource_ids: HashMap::new(),
    };

    let root_location = compiler.registry.root();
    let root = compiler.node_for(root_location)?;
    while let Some((location, id)) = compiler.tasks.pop() {
        let node = compiler.build(&location)?;
        compiler.nodes[id] = Some(node);
    }

    let nodes = compiler
        .nodes
        .into_iter()
        .map(|node| node.expect("unreachable: every scheduled node is built"))
        .collect::<Vec<_>>();
    debug!(
        draft = %draft,
        nodes = nodes.len(),
        resources = compiler.resources.len(),
        "compiled schema"
    );

    Ok(Graph {
        nodes,
        resources: compiler.resources,
        root,
        draft,
        max_depth: config.max_depth,
        max_nesting: config.max_nesting,
        source: schema,
    })
}

struct Compiler {
    registry: Registry,
    validate_formats: bool,
    nodes: Vec<Option<Node>>,
    compiled: HashMap<Location, NodeId>,
    tasks: Vec<(Location, NodeId)>,
    resources: Vec<Resource>,
    resource_ids: HashMap<Url, ResourceId>,
}

impl Compiler {
    /// The node for a location, scheduling its compilation if needed.
    fn node_for(&mut self, location: Location) -> Result<NodeId> {
        if let Some(&id) = self.compiled.get(&location) {
            return Ok(id);
        }
        let id = self.nodes.len();
        self.nodes.push(None);
        self.compiled.insert(location.clone(), id);
        self.tasks.push((location, id));
        Ok(id)
    }

    fn resource_for(&mut self, base: &Url) -> Result<ResourceId> {
        if let Some(&id) = self.resource_ids.get(base) {
            return Ok(id);
        }

        let root = self
            .registry
            .resource(base)
            .cloned()
            .ok_or_else(|| ReferencingError::Unretrievable {
                uri: base.to_string(),
                reason: "the resource is not indexed".to_owned(),
            })?;
        let id = self.resources.len();
        self.resource_ids.insert(base.clone(), id);
        let root = self.node_for(root)?;
        let recursive_anchor = self.registry.has_recursive_anchor(base);
        let anchors = self.registry.dynamic_anchors(base).to_vec();
        let mut dynamic_anchors = HashMap::new();
        for (name, location) in anchors {
            dynamic_anchors.insert(name, self.node_for(location)?);
        }
        self.resources.push(Resource {
            root,
            dynamic_anchors,
            recursive_anchor,
        });
        Ok(id)
    }

    fn build(&mut self, location: &Location) -> Result<Node> {
        let document = self.registry.document(location.doc);
        let value = document.pointer(&location.pointer).ok_or_else(|| {
            ReferencingError::PointerToNowhere {
                pointer: location.pointer.clone(),
            }
        })?;

        let object = match value {
            Value::Bool(b) => return Ok(Node::Bool(*b)),
            Value::Object(object) => object,
            other => {
                return Err(JsvError::InvalidKeyword {
                    keyword: last_token(&location.pointer),
                    pointer: location.pointer.clone(),
                    reason: format!("{} is not of types \"boolean\", \"object\"", other),
                })
            }
        };

        let scope = self.registry.scope(location);
        let resource = self.resource_for(&scope.base)?;
        let mut cx = Context {
            compiler: self,
            location,
            object,
            scope: &scope,
        };
        let keywords = cx.keywords()?;

        Ok(Node::Keywords {
            keywords,
            resource,
        })
    }
}

/// Compiles the keywords of a single schema object.
struct Context<'a> {
    compiler: &'a mut Compiler,
    location: &'a Location,
    object: &'a Map<String, Value>,
    scope: &'a Scope,
}

impl<'a> Context<'a> {
    fn draft(&self) -> Draft {
        self.scope.draft
    }

    fn keywords(&mut self) -> Result<Vec<Keyword>> {
        let draft = self.draft();
        if draft.ref_overrides_siblings() {
            if let Some(reference) = self.object.get("$ref") {
                return Ok(vec![Keyword::Ref(self.reference("$ref", reference)?)]);
            }
        }

        let mut keywords = Vec::new();
        for (name, value) in self.object {
            if name == "dependencies" && draft <= Draft::Draft7 {
                keywords.extend(self.dependencies(value)?);
                continue;
            }
            if let Some(keyword) = self.keyword(name, value)? {
                keywords.push(keyword);
            }
        }
        Ok(keywords)
    }

    fn keyword(&mut self, name: &str, value: &Value) -> Result<Option<Keyword>> {
        let draft = self.draft();
        let keyword = match name {
            "type" => self.types(value)?,
            "enum" => match value {
                Value::Array(_) => Keyword::Enum(value.clone()),
                _ => return Err(self.invalid(name, "expected an array")),
            },
            "const" if draft >= Draft::Draft6 => Keyword::Const(value.clone()),

            "minimum" => Keyword::Minimum {
                limit: self.number(name, value)?,
                exclusive: draft == Draft::Draft4
                    && self.object.get("exclusiveMinimum") == Some(&Value::Bool(true)),
            },
            "maximum" => Keyword::Maximum {
                limit: self.number(name, value)?,
                exclusive: draft == Draft::Draft4
                    && self.object.get("exclusiveMaximum") == Some(&Value::Bool(true)),
            },
            "exclusiveMinimum" if draft >= Draft::Draft6 => {
                Keyword::ExclusiveMinimum(self.number(name, value)?)
            }
            "exclusiveMaximum" if draft >= Draft::Draft6 => {
                Keyword::ExclusiveMaximum(self.number(name, value)?)
            }
            "multipleOf" => {
                let divisor = self.number(name, value)?;
                if divisor.as_f64().map_or(true, |d| d <= 0.0) {
                    return Err(self.invalid(name, "expected a number greater than 0"));
                }
                Keyword::MultipleOf(divisor)
            }

            "minLength" => Keyword::MinLength(self.count(name, value)?),
            "maxLength" => Keyword::MaxLength(self.count(name, value)?),
            "pattern" => Keyword::Pattern(self.regex(name, value)?),
            "format" => match self.format(name, value)? {
                Some(keyword) => keyword,
                None => return Ok(None),
            },

            "minItems" => Keyword::MinItems(self.count(name, value)?),
            "maxItems" => Keyword::MaxItems(self.count(name, value)?),
            "uniqueItems" => match value {
                Value::Bool(true) => Keyword::UniqueItems,
                Value::Bool(false) => return Ok(None),
                _ => return Err(self.invalid(name, "expected a boolean")),
            },
            "contains" if draft >= Draft::Draft6 => {
                let (min, max) = if draft >= Draft::Draft201909 {
                    let min = match self.object.get("minContains") {
                        Some(min) => self.count("minContains", min)?,
                        None => 1,
                    };
                    let max = match self.object.get("maxContains") {
                        Some(max) => Some(self.count("maxContains", max)?),
                        None => None,
                    };
                    (min, max)
                } else {
                    (1, None)
                };
                Keyword::Contains {
                    node: self.subschema(name)?,
                    min,
                    max,
                }
            }
            "items" => self.items(value)?,
            "prefixItems" if draft >= Draft::Draft202012 => Keyword::Prefix {
                keyword: "prefixItems",
                nodes: self.subschemas(name, value)?,
            },
            "additionalItems" if draft <= Draft::Draft201909 || !self.object.contains_key("prefixItems") => {
                match self.object.get("items") {
                    Some(Value::Array(prefix)) => Keyword::ItemsAfter {
                        keyword: "additionalItems",
                        node: self.subschema(name)?,
                        skip: prefix.len(),
                    },
                    _ => return Ok(None),
                }
            }

            "minProperties" => Keyword::MinProperties(self.count(name, value)?),
            "maxProperties" => Keyword::MaxProperties(self.count(name, value)?),
            "required" => Keyword::Required(self.strings(name, value)?),
            "properties" => Keyword::Properties(self.subschema_map(name, value)?),
            "patternProperties" => {
                let entries = self.subschema_map(name, value)?;
                let mut compiled = Vec::with_capacity(entries.len());
                for (pattern, node) in entries {
                    compiled.push((self.regex(name, &Value::String(pattern))?, node));
                }
                Keyword::PatternProperties(compiled)
            }
            "additionalProperties" => {
                let properties = self
                    .object
                    .get("properties")
                    .and_then(Value::as_object)
                    .map(|properties| properties.keys().cloned().collect())
                    .unwrap_or_default();
                let mut patterns = Vec::new();
                if let Some(Value::Object(entries)) = self.object.get("patternProperties") {
                    for pattern in entries.keys() {
                        patterns.push(self.regex("patternProperties", &Value::String(pattern.clone()))?);
                    }
                }
                Keyword::AdditionalProperties {
                    node: self.subschema(name)?,
                    properties,
                    patterns,
                }
            }
            "propertyNames" if draft >= Draft::Draft6 => {
                Keyword::PropertyNames(self.subschema(name)?)
            }
            "dependentRequired" if draft >= Draft::Draft201909 => {
                let entries = match value {
                    Value::Object(entries) => entries,
                    _ => return Err(self.invalid(name, "expected an object")),
                };
                let mut required = Vec::with_capacity(entries.len());
                for (property, names) in entries {
                    required.push((property.clone(), self.strings(name, names)?));
                }
                Keyword::DependentRequired {
                    keyword: "dependentRequired",
                    entries: required,
                }
            }
            "dependentSchemas" if draft >= Draft::Draft201909 => Keyword::DependentSchemas {
                keyword: "dependentSchemas",
                entries: self.subschema_map(name, value)?,
            },

            "allOf" => Keyword::AllOf(self.subschemas(name, value)?),
            "anyOf" => Keyword::AnyOf(self.subschemas(name, value)?),
            "oneOf" => Keyword::OneOf(self.subschemas(name, value)?),
            "not" => Keyword::Not {
                node: self.subschema(name)?,
                schema: value.clone(),
            },
            "if" if draft >= Draft::Draft7 => Keyword::IfThenElse {
                condition: self.subschema(name)?,
                then: self.optional_subschema("then")?,
                otherwise: self.optional_subschema("else")?,
            },

            "$ref" => Keyword::Ref(self.reference(name, value)?),
            "$recursiveRef" if draft == Draft::Draft201909 => {
                let target = self.resolve(name, value)?;
                let scope = self.compiler.registry.scope(&target);
                let dynamic = self.compiler.registry.has_recursive_anchor(&scope.base)
                    && self.compiler.registry.resource(&scope.base) == Some(&target);
                Keyword::RecursiveRef {
                    node: self.compiler.node_for(target)?,
                    dynamic,
                }
            }
            "$dynamicRef" if draft >= Draft::Draft202012 => {
                let target = self.resolve(name, value)?;
                let fragment = value
                    .as_str()
                    .and_then(|reference| reference.split_once('#'))
                    .map(|(_, fragment)| fragment)
                    .filter(|fragment| !fragment.is_empty() && !fragment.starts_with('/'));
                let document = self.compiler.registry.document(target.doc);
                let declared = document
                    .pointer(&target.pointer)
                    .and_then(|target| target.get("$dynamicAnchor"))
                    .and_then(Value::as_str);
                let anchor = match (fragment, declared) {
                    (Some(fragment), Some(declared)) if fragment == declared => {
                        Some(fragment.to_owned())
                    }
                    _ => None,
                };
                Keyword::DynamicRef {
                    node: self.compiler.node_for(target)?,
                    anchor,
                }
            }

            "unevaluatedProperties" if draft >= Draft::Draft201909 => {
                Keyword::UnevaluatedProperties(self.subschema(name)?)
            }
            "unevaluatedItems" if draft >= Draft::Draft201909 => {
                Keyword::UnevaluatedItems(self.subschema(name)?)
            }

            _ => {
                trace!(keyword = name, pointer = %self.location.pointer, "ignoring keyword");
                return Ok(None);
            }
        };
        Ok(Some(keyword))
    }

    fn types(&self, value: &Value) -> Result<Keyword> {
        let names = match value {
            Value::String(name) => vec![name.as_str()],
            Value::Array(names) => {
                let mut collected = Vec::with_capacity(names.len());
                for name in names {
                    match name.as_str() {
                        Some(name) => collected.push(name),
                        None => return Err(self.invalid("type", "expected type names")),
                    }
                }
                collected
            }
            _ => return Err(self.invalid("type", "expected a string or an array")),
        };
        let mut types = Vec::with_capacity(names.len());
        for name in names {
            match JsonType::from_name(name) {
                Some(json_type) => types.push(json_type),
                None => return Err(self.invalid("type", &format!("unknown type '{}'", name))),
            }
        }
        Ok(Keyword::Type {
            types,
            integral_floats: self.draft().integral_floats(),
        })
    }

    fn items(&mut self, value: &Value) -> Result<Keyword> {
        match value {
            Value::Array(_) => Ok(Keyword::Prefix {
                keyword: "items",
                nodes: self.subschemas("items", value)?,
            }),
            _ if self.draft() >= Draft::Draft202012 => {
                match self.object.get("prefixItems").and_then(Value::as_array) {
                    Some(prefix) => Ok(Keyword::ItemsAfter {
                        keyword: "items",
                        node: self.subschema("items")?,
                        skip: prefix.len(),
                    }),
                    None => Ok(Keyword::Items(self.subschema("items")?)),
                }
            }
            _ => Ok(Keyword::Items(self.subschema("items")?)),
        }
    }

    fn format(&self, name: &str, value: &Value) -> Result<Option<Keyword>> {
        let format = match value.as_str() {
            Some(format) => format,
            None => return Err(self.invalid(name, "expected a string")),
        };
        if !self.compiler.validate_formats {
            return Ok(None);
        }
        match formats::checker(format) {
            Some(check) => Ok(Some(Keyword::Format {
                name: format.to_owned(),
                check,
            })),
            None => {
                trace!(format, "ignoring unknown format");
                Ok(None)
            }
        }
    }

    /// Legacy `dependencies`: array values require properties, anything
    /// else is a schema.
    fn dependencies(&mut self, value: &Value) -> Result<Vec<Keyword>> {
        let entries = match value {
            Value::Object(entries) => entries,
            _ => return Err(self.invalid("dependencies", "expected an object")),
        };
        let mut required = Vec::new();
        let mut schemas = Vec::new();
        for (property, dependency) in entries {
            if dependency.is_array() {
                required.push((property.clone(), self.strings("dependencies", dependency)?));
            } else {
                let location = self.location.entry("dependencies", property);
                schemas.push((property.clone(), self.compiler.node_for(location)?));
            }
        }
        let mut keywords = Vec::new();
        if !required.is_empty() {
            keywords.push(Keyword::DependentRequired {
                keyword: "dependencies",
                entries: required,
            });
        }
        if !schemas.is_empty() {
            keywords.push(Keyword::DependentSchemas {
                keyword: "dependencies",
                entries: schemas,
            });
        }
        Ok(keywords)
    }

    fn reference(&mut self, keyword: &str, value: &Value) -> Result<NodeId> {
        let target = self.resolve(keyword, value)?;
        self.compiler.node_for(target)
    }

    fn resolve(&mut self, keyword: &str, value: &Value) -> Result<Location> {
        match value.as_str() {
            Some(reference) => self.compiler.registry.resolve(&self.scope.base, reference),
            None => Err(self.invalid(keyword, "expected a string")),
        }
    }

    fn subschema(&mut self, keyword: &str) -> Result<NodeId> {
        let location = self.location.child(keyword);
        self.compiler.node_for(location)
    }

    fn optional_subschema(&mut self, keyword: &str) -> Result<Option<NodeId>> {
        if self.object.contains_key(keyword) {
            self.subschema(keyword).map(Some)
        } else {
            Ok(None)
        }
    }

    fn subschemas(&mut self, keyword: &str, value: &Value) -> Result<Vec<NodeId>> {
        let items = match value {
            Value::Array(items) if !items.is_empty() => items,
            _ => return Err(self.invalid(keyword, "expected a non-empty array")),
        };
        (0..items.len())
            .map(|index| {
                let location = self.location.item(keyword, index);
                self.compiler.node_for(location)
            })
            .collect()
    }

    fn subschema_map(&mut self, keyword: &str, value: &Value) -> Result<Vec<(String, NodeId)>> {
        let entries = match value {
            Value::Object(entries) => entries,
            _ => return Err(self.invalid(keyword, "expected an object")),
        };
        let mut nodes = Vec::with_capacity(entries.len());
        for key in entries.keys() {
            let location = self.location.entry(keyword, key);
            nodes.push((key.clone(), self.compiler.node_for(location)?));
        }
        Ok(nodes)
    }

    fn number(&self, keyword: &str, value: &Value) -> Result<Number> {
        match value {
            Value::Number(number) => Ok(number.clone()),
            _ => Err(self.invalid(keyword, "expected a number")),
        }
    }

    fn count(&self, keyword: &str, value: &Value) -> Result<u64> {
        let count = match value {
            Value::Number(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            _ => None,
        };
        count.ok_or_else(|| self.invalid(keyword, "expected a non-negative integer"))
    }

    fn strings(&self, keyword: &str, value: &Value) -> Result<Vec<String>> {
        let items = match value {
            Value::Array(items) => items,
            _ => return Err(self.invalid(keyword, "expected an array of strings")),
        };
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| self.invalid(keyword, "expected an array of strings"))
            })
            .collect()
    }

    fn regex(&self, keyword: &str, value: &Value) -> Result<EcmaRegex> {
        let pattern = match value.as_str() {
            Some(pattern) => pattern,
            None => return Err(self.invalid(keyword, "expected a string")),
        };
        EcmaRegex::new(pattern).map_err(|reason| self.invalid(keyword, &reason))
    }

    fn invalid(&self, keyword: &str, reason: &str) -> JsvError {
        JsvError::InvalidKeyword {
            keyword: keyword.to_owned(),
            pointer: self.location.pointer.clone(),
            reason: reason.to_owned(),
        }
    }
}

fn last_token(pointer: &str) -> String {
    pointer
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .replace("~1", "/")
        .replace("~0", "~")
}
