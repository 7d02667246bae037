//! Identifier and reference resolution.
//!
//! A [`Registry`](struct.Registry.html) is built for every compilation. It
//! knows every document involved (the schema itself, resources from the
//! [`Config`](../validator/struct.Config.html), bundled meta-schemas and
//! anything fetched through a [`Retrieve`](trait.Retrieve.html)) and indexes
//! their embedded resources and anchors. References resolve to a
//! [`Location`](struct.Location.html): a document plus a JSON Pointer into it.

use crate::draft::{self, Draft};
use crate::errors::{ReferencingError, Result};
use json_pointer::JsonPointer;
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// The base URI of schemas that declare no identifier of their own.
pub const DEFAULT_BASE_URI: &str = "json-schema:///";

/// Fetches documents that are referenced but not otherwise known.
///
/// Implementations may block; they are only called while compiling.
pub trait Retrieve: Send + Sync {
    fn retrieve(&self, uri: &Url) -> std::result::Result<Value, Box<dyn Error + Send + Sync>>;
}

impl<F> Retrieve for F
where
    F: Fn(&Url) -> std::result::Result<Value, Box<dyn Error + Send + Sync>> + Send + Sync,
{
    fn retrieve(&self, uri: &Url) -> std::result::Result<Value, Box<dyn Error + Send + Sync>> {
        self(uri)
    }
}

pub(crate) type DocId = usize;

/// A schema position: a document and an escaped JSON Pointer into it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Location {
    pub(crate) doc: DocId,
    pub(crate) pointer: String,
}

impl Location {
    pub(crate) fn child(&self, token: &str) -> Location {
        Location {
            doc: self.doc,
            pointer: format!("{}/{}", self.pointer, escape(token)),
        }
    }

    pub(crate) fn item(&self, keyword: &str, index: usize) -> Location {
        Location {
            doc: self.doc,
            pointer: format!("{}/{}/{}", self.pointer, escape(keyword), index),
        }
    }

    pub(crate) fn entry(&self, keyword: &str, key: &str) -> Location {
        Location {
            doc: self.doc,
            pointer: format!("{}/{}/{}", self.pointer, escape(keyword), escape(key)),
        }
    }
}

/// The resolution scope in effect at a location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Scope {
    /// The base URI, without a fragment.
    pub(crate) base: Url,
    pub(crate) draft: Draft,
}

struct Document {
    uri: Url,
    contents: Arc<Value>,
}

/// All documents, resources and anchors known to one compilation.
pub(crate) struct Registry {
    documents: Vec<Document>,
    /// Resource URIs (without fragment) to the resource root.
    resources: HashMap<Url, Location>,
    anchors: HashMap<(Url, String), Location>,
    dynamic_anchors: HashMap<Url, Vec<(String, Location)>>,
    recursive_anchors: HashMap<Url, bool>,
    scopes: HashMap<Location, Scope>,
    retriever: Option<Arc<dyn Retrieve>>,
    default_draft: Draft,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "documents",
                &self.documents.iter().map(|d| d.uri.as_str()).collect::<Vec<_>>(),
            )
            .field("resources", &self.resources.len())
            .field("anchors", &self.anchors.len())
            .finish()
    }
}

impl Registry {
    /// Create a registry holding the root schema and any preloaded
    /// resources. The root document is always document `0`.
    pub(crate) fn new(
        root: Arc<Value>,
        draft: Draft,
        resources: &[(String, Arc<Value>)],
        retriever: Option<Arc<dyn Retrieve>>,
    ) -> Result<Registry> {
        let mut registry = Registry {
            documents: Vec::new(),
            resources: HashMap::new(),
            anchors: HashMap::new(),
            dynamic_anchors: HashMap::new(),
            recursive_anchors: HashMap::new(),
            scopes: HashMap::new(),
            retriever,
            default_draft: draft,
        };

        let base = parse_uri(DEFAULT_BASE_URI)?;
        registry.add(base, root, draft)?;

        for (uri, contents) in resources {
            let uri = without_fragment(parse_uri(uri)?);
            let draft = Draft::detect(contents)?.unwrap_or(draft);
            registry.add(uri, contents.clone(), draft)?;
        }

        Ok(registry)
    }

    pub(crate) fn root(&self) -> Location {
        Location {
            doc: 0,
            pointer: String::new(),
        }
    }

    pub(crate) fn document(&self, doc: DocId) -> Arc<Value> {
        self.documents[doc].contents.clone()
    }

    /// The scope in effect at `location`.
    ///
    /// Locations the indexer never visited (for example, a pointer into an
    /// `enum` value) inherit the scope of their nearest indexed ancestor.
    pub(crate) fn scope(&self, location: &Location) -> Scope {
        let mut pointer = location.pointer.as_str();
        loop {
            let key = Location {
                doc: location.doc,
                pointer: pointer.to_owned(),
            };
            if let Some(scope) = self.scopes.get(&key) {
                return scope.clone();
            }
            match pointer.rfind('/') {
                Some(at) => pointer = &pointer[..at],
                None => break,
            }
        }
        Scope {
            base: self.documents[location.doc].uri.clone(),
            draft: self.default_draft,
        }
    }

    /// The root location of the resource identified by `uri`.
    pub(crate) fn resource(&self, uri: &Url) -> Option<&Location> {
        self.resources.get(uri)
    }

    pub(crate) fn dynamic_anchors(&self, resource: &Url) -> &[(String, Location)] {
        self.dynamic_anchors
            .get(resource)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub(crate) fn has_recursive_anchor(&self, resource: &Url) -> bool {
        self.recursive_anchors.get(resource).copied().unwrap_or(false)
    }

    /// Resolve a reference found in a schema whose base URI is `base`.
    pub(crate) fn resolve(&mut self, base: &Url, reference: &str) -> Result<Location> {
        let target = base
            .join(reference)
            .map_err(|error| ReferencingError::InvalidUri {
                reference: reference.to_owned(),
                reason: error.to_string(),
            })?;
        let fragment = decoded_fragment(&target);
        let resource = without_fragment(target);

        let root = match self.resources.get(&resource) {
            Some(location) => location.clone(),
            None => self.load(&resource)?,
        };

        if fragment.is_empty() {
            return Ok(root);
        }

        if fragment.starts_with('/') {
            let parsed: JsonPointer<String, Vec<String>> =
                fragment
                    .parse()
                    .map_err(|_| ReferencingError::PointerToNowhere {
                        pointer: fragment.clone(),
                    })?;
            let location = Location {
                doc: root.doc,
                pointer: format!("{}{}", root.pointer, parsed),
            };
            return match self.documents[root.doc]
                .contents
                .pointer(&location.pointer)
            {
                Some(_) => Ok(location),
                None => Err(ReferencingError::PointerToNowhere { pointer: fragment }.into()),
            };
        }

        self.anchors
            .get(&(resource, fragment.clone()))
            .cloned()
            .ok_or_else(|| ReferencingError::NoSuchAnchor { anchor: fragment }.into())
    }

    /// Make an unknown resource available, from the bundled meta-schemas or
    /// through the retriever.
    fn load(&mut self, uri: &Url) -> Result<Location> {
        let (contents, draft) = if let Some(builtin) = draft::builtin(uri.as_str()) {
            (builtin.contents.clone(), builtin.draft)
        } else {
            let retriever =
                self.retriever
                    .as_ref()
                    .ok_or_else(|| ReferencingError::Unretrievable {
                        uri: uri.to_string(),
                        reason: "no retriever is configured".to_owned(),
                    })?;
            let contents = retriever
                .retrieve(uri)
                .map_err(|error| ReferencingError::Unretrievable {
                    uri: uri.to_string(),
                    reason: error.to_string(),
                })?;
            debug!(uri = %uri, "retrieved external resource");
            let draft = Draft::detect(&contents)?.unwrap_or(self.default_draft);
            (Arc::new(contents), draft)
        };

        self.add(uri.clone(), contents, draft)?;
        self.resources
            .get(uri)
            .cloned()
            .ok_or_else(|| {
                ReferencingError::Unretrievable {
                    uri: uri.to_string(),
                    reason: "the retrieved document does not declare this resource".to_owned(),
                }
                .into()
            })
    }

    fn add(&mut self, uri: Url, contents: Arc<Value>, draft: Draft) -> Result<DocId> {
        let doc = self.documents.len();
        self.documents.push(Document {
            uri: uri.clone(),
            contents: contents.clone(),
        });
        self.resources.entry(uri.clone()).or_insert(Location {
            doc,
            pointer: String::new(),
        });
        self.index(doc, &contents, uri, draft)?;
        Ok(doc)
    }

    /// Walk every subschema of a document, recording resources, anchors and
    /// the scope in effect at each of them.
    fn index(&mut self, doc: DocId, contents: &Value, base: Url, draft: Draft) -> Result<()> {
        let mut stack = vec![(
            Location {
                doc,
                pointer: String::new(),
            },
            contents,
            base,
            draft,
        )];

        while let Some((location, value, mut base, mut draft)) = stack.pop() {
            let object = match value {
                Value::Object(object) => object,
                _ => {
                    self.scopes.insert(location, Scope { base, draft });
                    continue;
                }
            };

            let is_resource_root = location.pointer.is_empty()
                || object.contains_key("$id")
                || (draft == Draft::Draft4 && object.contains_key("id"));
            // The enclosing dialect decides what identifies the resource; its
            // own `$schema` applies from there on.
            let enclosing = draft;
            if is_resource_root {
                if let Some(declared) = Draft::detect(value)? {
                    draft = declared;
                }
            }

            let id = [enclosing, draft]
                .iter()
                .find_map(|dialect| object.get(dialect.id_keyword()).and_then(Value::as_str))
                .filter(|_| !(enclosing.ref_overrides_siblings() && object.contains_key("$ref")));
            if let Some(id) = id {
                let joined = base.join(id).map_err(|error| ReferencingError::InvalidUri {
                    reference: id.to_owned(),
                    reason: error.to_string(),
                })?;
                let fragment = decoded_fragment(&joined);
                if !id.starts_with('#') {
                    base = without_fragment(joined);
                    self.resources
                        .entry(base.clone())
                        .or_insert_with(|| location.clone());
                }
                if !draft.has_anchor_keyword() && !fragment.is_empty() && !fragment.starts_with('/')
                {
                    self.anchors
                        .insert((base.clone(), fragment), location.clone());
                }
            }

            if draft.has_anchor_keyword() {
                if let Some(anchor) = object.get("$anchor").and_then(Value::as_str) {
                    self.anchors
                        .insert((base.clone(), anchor.to_owned()), location.clone());
                }
            }
            if draft == Draft::Draft202012 {
                if let Some(anchor) = object.get("$dynamicAnchor").and_then(Value::as_str) {
                    self.anchors
                        .insert((base.clone(), anchor.to_owned()), location.clone());
                    self.dynamic_anchors
                        .entry(base.clone())
                        .or_default()
                        .push((anchor.to_owned(), location.clone()));
                }
            }
            if draft == Draft::Draft201909 && object.get("$recursiveAnchor") == Some(&Value::Bool(true))
            {
                if self.resources.get(&base) == Some(&location) {
                    self.recursive_anchors.insert(base.clone(), true);
                }
            }

            self.scopes.insert(
                location.clone(),
                Scope {
                    base: base.clone(),
                    draft,
                },
            );

            for (keyword, child) in object {
                match (keyword.as_str(), child) {
                    (
                        "additionalItems" | "additionalProperties" | "contains" | "not"
                        | "propertyNames" | "if" | "then" | "else" | "items" | "unevaluatedItems"
                        | "unevaluatedProperties" | "contentSchema",
                        Value::Object(_) | Value::Bool(_),
                    ) => stack.push((location.child(keyword), child, base.clone(), draft)),
                    (
                        "allOf" | "anyOf" | "oneOf" | "items" | "prefixItems",
                        Value::Array(items),
                    ) => {
                        for (index, item) in items.iter().enumerate() {
                            stack.push((location.item(keyword, index), item, base.clone(), draft));
                        }
                    }
                    (
                        "properties" | "patternProperties" | "definitions" | "$defs"
                        | "dependentSchemas" | "dependencies",
                        Value::Object(entries),
                    ) => {
                        for (key, entry) in entries {
                            if entry.is_object() || entry.is_boolean() {
                                stack.push((location.entry(keyword, key), entry, base.clone(), draft));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

pub(crate) fn parse_uri(uri: &str) -> Result<Url> {
    Url::parse(uri).map_err(|error| {
        ReferencingError::InvalidUri {
            reference: uri.to_owned(),
            reason: error.to_string(),
        }
        .into()
    })
}

fn without_fragment(mut uri: Url) -> Url {
    uri.set_fragment(None);
    uri
}

/// Escape a single JSON Pointer reference token.
pub(crate) fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Decode the percent escapes of a URI fragment.
fn decoded_fragment(target: &Url) -> String {
    target
        .fragment()
        .map(|fragment| percent_decode_str(fragment).decode_utf8_lossy().into_owned())
        .unwrap_or_default()
}
