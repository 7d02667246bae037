//! JSON Schema specification versions.

use crate::errors::{JsvError, ReferencingError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// A JSON Schema draft.
///
/// The draft decides which keywords a schema may use, what some of them
/// mean, and which meta-schema describes valid schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Draft {
    Draft4,
    Draft6,
    Draft7,
    Draft201909,
    Draft202012,
}

impl Default for Draft {
    fn default() -> Self {
        Draft::Draft202012
    }
}

impl Draft {
    /// Look up a draft by the number a caller would use to name it:
    /// `4`, `6`, `7`, `19` (2019-09) or `20` (2020-12).
    pub fn from_number(number: i64) -> Result<Draft> {
        match number {
            4 => Ok(Draft::Draft4),
            6 => Ok(Draft::Draft6),
            7 => Ok(Draft::Draft7),
            19 => Ok(Draft::Draft201909),
            20 => Ok(Draft::Draft202012),
            _ => Err(JsvError::UnknownDraft(number)),
        }
    }

    /// Match a `$schema` value against the known meta-schema URIs.
    pub fn from_uri(uri: &str) -> Option<Draft> {
        match uri.trim_end_matches('#') {
            "http://json-schema.org/draft-04/schema" => Some(Draft::Draft4),
            "http://json-schema.org/draft-06/schema" => Some(Draft::Draft6),
            "http://json-schema.org/draft-07/schema" => Some(Draft::Draft7),
            "https://json-schema.org/draft/2019-09/schema" => Some(Draft::Draft201909),
            "https://json-schema.org/draft/2020-12/schema" => Some(Draft::Draft202012),
            _ => None,
        }
    }

    /// Inspect a schema's `$schema` keyword.
    ///
    /// Returns `Ok(None)` when the schema declares nothing (or is a boolean),
    /// and a referencing error when it declares an unknown specification.
    pub fn detect(schema: &Value) -> Result<Option<Draft>> {
        match schema.get("$schema").and_then(Value::as_str) {
            Some(uri) => Draft::from_uri(uri).map(Some).ok_or_else(|| {
                ReferencingError::UnknownSpecification {
                    uri: uri.to_owned(),
                }
                .into()
            }),
            None => Ok(None),
        }
    }

    /// The canonical URI of this draft's meta-schema.
    pub fn meta_schema_uri(self) -> &'static str {
        match self {
            Draft::Draft4 => "http://json-schema.org/draft-04/schema",
            Draft::Draft6 => "http://json-schema.org/draft-06/schema",
            Draft::Draft7 => "http://json-schema.org/draft-07/schema",
            Draft::Draft201909 => "https://json-schema.org/draft/2019-09/schema",
            Draft::Draft202012 => "https://json-schema.org/draft/2020-12/schema",
        }
    }

    pub(crate) fn id_keyword(self) -> &'static str {
        match self {
            Draft::Draft4 => "id",
            _ => "$id",
        }
    }

    /// Up to Draft 7, `$ref` replaces every sibling keyword.
    pub(crate) fn ref_overrides_siblings(self) -> bool {
        self <= Draft::Draft7
    }

    /// From Draft 6 on, `1.0` is an integer.
    pub(crate) fn integral_floats(self) -> bool {
        self >= Draft::Draft6
    }

    pub(crate) fn asserts_formats(self) -> bool {
        self <= Draft::Draft7
    }

    /// Whether `$anchor` and plain-name `$id` fragments create anchors.
    pub(crate) fn has_anchor_keyword(self) -> bool {
        self >= Draft::Draft201909
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Draft::Draft4 => "Draft 4",
            Draft::Draft6 => "Draft 6",
            Draft::Draft7 => "Draft 7",
            Draft::Draft201909 => "Draft 2019-09",
            Draft::Draft202012 => "Draft 2020-12",
        })
    }
}

/// A meta-schema bundled with the crate.
pub(crate) struct Builtin {
    pub(crate) uri: &'static str,
    pub(crate) draft: Draft,
    pub(crate) contents: Arc<Value>,
}

const SOURCES: &[(&str, Draft, &str)] = &[
    (
        "http://json-schema.org/draft-04/schema",
        Draft::Draft4,
        include_str!("metaschemas/draft4.json"),
    ),
    (
        "http://json-schema.org/draft-06/schema",
        Draft::Draft6,
        include_str!("metaschemas/draft6.json"),
    ),
    (
        "http://json-schema.org/draft-07/schema",
        Draft::Draft7,
        include_str!("metaschemas/draft7.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/schema",
        Draft::Draft201909,
        include_str!("metaschemas/draft2019-09/schema.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/core",
        Draft::Draft201909,
        include_str!("metaschemas/draft2019-09/meta/core.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/applicator",
        Draft::Draft201909,
        include_str!("metaschemas/draft2019-09/meta/applicator.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/validation",
        Draft::Draft201909,
        include_str!("metaschemas/draft2019-09/meta/validation.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/meta-data",
        Draft::Draft201909,
        include_str!("metaschemas/draft2019-09/meta/meta-data.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/format",
        Draft::Draft201909,
        include_str!("metaschemas/draft2019-09/meta/format.json"),
    ),
    (
        "https://json-schema.org/draft/2019-09/meta/content",
        Draft::Draft201909,
        include_str!("metaschemas/draft2019-09/meta/content.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/schema",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/schema.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/core",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/meta/core.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/applicator",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/meta/applicator.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/unevaluated",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/meta/unevaluated.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/validation",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/meta/validation.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/meta-data",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/meta/meta-data.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/format-annotation",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/meta/format-annotation.json"),
    ),
    (
        "https://json-schema.org/draft/2020-12/meta/content",
        Draft::Draft202012,
        include_str!("metaschemas/draft2020-12/meta/content.json"),
    ),
];

/// All bundled meta-schema documents, parsed once per process.
pub(crate) fn builtins() -> &'static [Builtin] {
    static BUILTINS: OnceLock<Vec<Builtin>> = OnceLock::new();
    BUILTINS.get_or_init(|| {
        SOURCES
            .iter()
            .map(|&(uri, draft, source)| Builtin {
                uri,
                draft,
                contents: Arc::new(
                    serde_json::from_str(source)
                        .expect("unreachable: bundled meta-schemas are valid JSON"),
                ),
            })
            .collect()
    })
}

pub(crate) fn builtin(uri: &str) -> Option<&'static Builtin> {
    let uri = uri.trim_end_matches('#');
    builtins().iter().find(|builtin| builtin.uri == uri)
}
