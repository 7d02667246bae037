//! A stand-in for a dynamically typed host environment: shared, mutable
//! containers with reference identity.

#![allow(dead_code)]

use jsv::{HostValue, MapKey, Shape};
use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone)]
pub enum Host {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Rc<RefCell<Vec<Host>>>),
    Tuple(Rc<Vec<Host>>),
    Dict(Rc<RefCell<Vec<(Host, Host)>>>),
    /// An enumeration member wrapping a scalar.
    Enum(Rc<Host>),
    Set(Vec<Host>),
    /// An arbitrary object of the named class.
    Object(&'static str),
}

impl Host {
    pub fn str(s: &str) -> Host {
        Host::Str(s.to_owned())
    }

    pub fn list(items: Vec<Host>) -> Host {
        Host::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Host>) -> Host {
        Host::Tuple(Rc::new(items))
    }

    pub fn dict(entries: Vec<(&str, Host)>) -> Host {
        Host::Dict(Rc::new(RefCell::new(
            entries
                .into_iter()
                .map(|(key, value)| (Host::str(key), value))
                .collect(),
        )))
    }

    pub fn member(value: Host) -> Host {
        Host::Enum(Rc::new(value))
    }

    /// Append to a list, or insert into a dict under `key`.
    pub fn push(&self, key: Option<Host>, value: Host) {
        match (self, key) {
            (Host::List(items), None) => items.borrow_mut().push(value),
            (Host::Dict(entries), Some(key)) => entries.borrow_mut().push((key, value)),
            _ => panic!("not a container"),
        }
    }
}

impl HostValue for Host {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            Host::None => "NoneType",
            Host::Bool(_) => "bool",
            Host::Int(_) => "int",
            Host::Float(_) => "float",
            Host::Str(_) => "str",
            Host::List(_) => "list",
            Host::Tuple(_) => "tuple",
            Host::Dict(_) => "dict",
            Host::Enum(_) => "Color",
            Host::Set(_) => "set",
            Host::Object(name) => *name,
        })
    }

    fn identity(&self) -> Option<usize> {
        match self {
            Host::List(items) => Some(Rc::as_ptr(items) as *const () as usize),
            Host::Tuple(items) => Some(Rc::as_ptr(items) as *const () as usize),
            Host::Dict(entries) => Some(Rc::as_ptr(entries) as *const () as usize),
            _ => None,
        }
    }

    fn shape(&self) -> Shape<Host> {
        match self {
            Host::None => Shape::Null,
            Host::Bool(b) => Shape::Bool(*b),
            Host::Int(n) => Shape::Int(*n),
            Host::Float(f) => Shape::Float(*f),
            Host::Str(s) => Shape::String(s.clone()),
            Host::List(items) => Shape::Sequence(items.borrow().clone()),
            Host::Tuple(items) => Shape::Sequence(items.to_vec()),
            Host::Dict(entries) => Shape::Mapping(
                entries
                    .borrow()
                    .iter()
                    .map(|(key, value)| (MapKey::Host(key.clone()), value.clone()))
                    .collect(),
            ),
            Host::Enum(value) => Shape::Wrapped((**value).clone()),
            Host::Set(_) | Host::Object(_) => Shape::Unsupported,
        }
    }
}
