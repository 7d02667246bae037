//! Locations within instances and schemas.
//!
//! A [`Path`](struct.Path.html) is the materialized, root-to-leaf sequence of
//! segments attached to each validation error. While evaluating, the executor
//! only extends a cheap shared [`Trail`](struct.Trail.html) and materializes
//! it when an error is actually produced.

use json_pointer::JsonPointer;
use serde::Serialize;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// A single segment of a [`Path`](struct.Path.html).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathChunk {
    /// An object key or a schema keyword.
    Key(Cow<'static, str>),
    /// An array index.
    Index(usize),
}

impl PathChunk {
    fn token(&self) -> String {
        match self {
            PathChunk::Key(key) => key.to_string(),
            PathChunk::Index(index) => index.to_string(),
        }
    }
}

impl From<&'static str> for PathChunk {
    fn from(key: &'static str) -> Self {
        PathChunk::Key(Cow::Borrowed(key))
    }
}

impl From<String> for PathChunk {
    fn from(key: String) -> Self {
        PathChunk::Key(Cow::Owned(key))
    }
}

impl From<usize> for PathChunk {
    fn from(index: usize) -> Self {
        PathChunk::Index(index)
    }
}

impl fmt::Display for PathChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathChunk::Key(key) => f.write_str(key),
            PathChunk::Index(index) => write!(f, "{}", index),
        }
    }
}

/// An ordered sequence of segments from a document root to a node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Path(Vec<PathChunk>);

impl Path {
    pub fn new(chunks: Vec<PathChunk>) -> Self {
        Path(chunks)
    }

    pub fn chunks(&self) -> &[PathChunk] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PathChunk> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&PathChunk> {
        self.0.last()
    }

    /// This path as a JSON Pointer.
    pub fn to_pointer(&self) -> JsonPointer<String, Vec<String>> {
        JsonPointer::new(self.0.iter().map(PathChunk::token).collect())
    }

    /// Render as a chain of subscripts, e.g. `["items"][0]["type"]`.
    pub fn to_brackets(&self) -> String {
        brackets(&self.0)
    }
}

pub(crate) fn brackets(chunks: &[PathChunk]) -> String {
    let mut out = String::new();
    for chunk in chunks {
        match chunk {
            PathChunk::Key(key) => {
                out.push('[');
                out.push_str(&serde_json::Value::String(key.to_string()).to_string());
                out.push(']');
            }
            PathChunk::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_pointer())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathChunk;
    type IntoIter = std::slice::Iter<'a, PathChunk>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<PathChunk>> for Path {
    fn from(chunks: Vec<PathChunk>) -> Self {
        Path(chunks)
    }
}

/// A persistent, shareable path under construction.
///
/// Extending a trail never copies its prefix, so sibling frames on the
/// executor's work stack share their common ancestry.
#[derive(Clone, Debug, Default)]
pub(crate) struct Trail(Option<Arc<Link>>);

#[derive(Debug)]
struct Link {
    chunk: PathChunk,
    parent: Trail,
}

impl Trail {
    pub(crate) fn push<C: Into<PathChunk>>(&self, chunk: C) -> Trail {
        Trail(Some(Arc::new(Link {
            chunk: chunk.into(),
            parent: self.clone(),
        })))
    }

    pub(crate) fn to_path(&self) -> Path {
        let mut chunks = Vec::new();
        let mut current = &self.0;
        while let Some(link) = current {
            chunks.push(link.chunk.clone());
            current = &link.parent.0;
        }
        chunks.reverse();
        Path(chunks)
    }
}
