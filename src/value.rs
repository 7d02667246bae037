//! The value model.
//!
//! Instances and schemas are represented as [`serde_json::Value`]: maps are
//! key-ordered and integers stay distinct from floats. Host environments hand
//! their native data over through the [`HostValue`](trait.HostValue.html)
//! capability trait, which [`to_internal`](fn.to_internal.html) converts
//! without recursion and with cycle detection.

use crate::errors::{JsvError, Result};
use serde_json::{Map, Number, Value};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;

/// The default bound on how deeply host values may nest.
pub const DEFAULT_MAX_NESTING: usize = 255;

/// What a host value looks like from the point of view of JSON.
///
/// Containers hand out their children as owned handles; for reference-counted
/// host objects these are cheap clones.
pub enum Shape<H> {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    /// Anything exposing ordered iteration of items.
    Sequence(Vec<H>),
    /// Anything exposing key/value iteration. Keys must be string-like.
    Mapping(Vec<(MapKey<H>, H)>),
    /// An enumerated or wrapped scalar, converted as its underlying value.
    Wrapped(H),
    /// No JSON mapping exists.
    Unsupported,
}

/// A mapping key as handed out by a host.
pub enum MapKey<H> {
    /// Already a string.
    String(String),
    /// A host value that must convert to a string.
    Host(H),
}

/// The capability contract a host binding implements for its values.
pub trait HostValue: Clone {
    /// A human-readable type name, used in error messages.
    fn type_name(&self) -> Cow<'_, str>;

    /// A stable identity for containers, used to detect values that contain
    /// themselves. Values that can never be cyclic may return `None`.
    fn identity(&self) -> Option<usize> {
        None
    }

    fn shape(&self) -> Shape<Self>;
}

impl<'a> HostValue for &'a Value {
    fn type_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(JsonType::of(self).as_str())
    }

    fn shape(&self) -> Shape<Self> {
        match self {
            Value::Null => Shape::Null,
            Value::Bool(b) => Shape::Bool(*b),
            Value::Number(n) => {
                if let Some(n) = n.as_i64() {
                    Shape::Int(n)
                } else if let Some(n) = n.as_u64() {
                    Shape::UInt(n)
                } else {
                    Shape::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Shape::String(s.clone()),
            Value::Array(items) => Shape::Sequence(items.iter().collect()),
            Value::Object(object) => Shape::Mapping(
                object
                    .iter()
                    .map(|(key, value)| (MapKey::String(key.clone()), value))
                    .collect(),
            ),
        }
    }
}

enum Frame<H> {
    Sequence {
        identity: Option<usize>,
        pending: std::vec::IntoIter<H>,
        items: Vec<Value>,
    },
    Mapping {
        identity: Option<usize>,
        pending: std::vec::IntoIter<(MapKey<H>, H)>,
        key: Option<String>,
        object: Map<String, Value>,
    },
}

impl<H> Frame<H> {
    fn identity(&self) -> Option<usize> {
        match self {
            Frame::Sequence { identity, .. } | Frame::Mapping { identity, .. } => *identity,
        }
    }

    fn accept(&mut self, value: Value) {
        match self {
            Frame::Sequence { items, .. } => items.push(value),
            Frame::Mapping { key, object, .. } => {
                if let Some(key) = key.take() {
                    object.insert(key, value);
                }
            }
        }
    }

    fn finish(self) -> Value {
        match self {
            Frame::Sequence { items, .. } => Value::Array(items),
            Frame::Mapping { object, .. } => Value::Object(object),
        }
    }
}

enum Opened<H> {
    Leaf(Value),
    Container(Frame<H>),
}

/// Convert a host value into the internal value model.
///
/// The traversal keeps its own stack, so arbitrarily deep input cannot
/// overflow the call stack; it is bounded by `max_nesting` instead. A
/// container that is its own ancestor fails with `RecursiveStructure`.
pub fn to_internal<H: HostValue>(host: &H, max_nesting: usize) -> Result<Value> {
    let mut stack: Vec<Frame<H>> = Vec::new();
    let mut ancestors: HashSet<usize> = HashSet::new();
    let mut pending = Some(host.clone());
    let mut delivered: Option<Value> = None;

    loop {
        if let Some(host) = pending.take() {
            match open(host, &ancestors)? {
                Opened::Leaf(value) => delivered = Some(value),
                Opened::Container(frame) => {
                    if stack.len() >= max_nesting {
                        return Err(JsvError::NestingTooDeep { limit: max_nesting });
                    }
                    if let Some(identity) = frame.identity() {
                        ancestors.insert(identity);
                    }
                    stack.push(frame);
                }
            }
        }

        if let Some(value) = delivered.take() {
            match stack.last_mut() {
                Some(frame) => frame.accept(value),
                None => return Ok(value),
            }
        }

        let top = stack
            .last_mut()
            .expect("unreachable: empty conversion stack");
        match next_child(top)? {
            Some(child) => pending = Some(child),
            None => {
                let frame = stack
                    .pop()
                    .expect("unreachable: empty conversion stack");
                if let Some(identity) = frame.identity() {
                    ancestors.remove(&identity);
                }
                delivered = Some(frame.finish());
            }
        }
    }
}

fn open<H: HostValue>(host: H, ancestors: &HashSet<usize>) -> Result<Opened<H>> {
    let mut host = host;
    // Wrapped scalars may wrap other wrappers; bound the unwrapping by the
    // identities seen so far.
    let mut unwrapped: HashSet<usize> = HashSet::new();
    loop {
        let identity = host.identity();
        if let Some(identity) = identity {
            if ancestors.contains(&identity) || unwrapped.contains(&identity) {
                return Err(JsvError::RecursiveStructure {
                    type_name: host.type_name().into_owned(),
                });
            }
        }
        return Ok(match host.shape() {
            Shape::Null => Opened::Leaf(Value::Null),
            Shape::Bool(b) => Opened::Leaf(Value::Bool(b)),
            Shape::Int(n) => Opened::Leaf(Value::Number(n.into())),
            Shape::UInt(n) => Opened::Leaf(Value::Number(n.into())),
            Shape::Float(f) => Opened::Leaf(Value::Number(
                Number::from_f64(f).ok_or(JsvError::NonFiniteNumber)?,
            )),
            Shape::String(s) => Opened::Leaf(Value::String(s)),
            Shape::Sequence(items) => Opened::Container(Frame::Sequence {
                identity,
                items: Vec::with_capacity(items.len()),
                pending: items.into_iter(),
            }),
            Shape::Mapping(entries) => Opened::Container(Frame::Mapping {
                identity,
                pending: entries.into_iter(),
                key: None,
                object: Map::new(),
            }),
            Shape::Wrapped(inner) => {
                if let Some(identity) = identity {
                    unwrapped.insert(identity);
                }
                host = inner;
                continue;
            }
            Shape::Unsupported => {
                return Err(JsvError::UnsupportedType {
                    type_name: host.type_name().into_owned(),
                })
            }
        });
    }
}

fn next_child<H: HostValue>(frame: &mut Frame<H>) -> Result<Option<H>> {
    match frame {
        Frame::Sequence { pending, .. } => Ok(pending.next()),
        Frame::Mapping { pending, key, .. } => match pending.next() {
            Some((host_key, value)) => {
                *key = Some(key_string(&host_key)?);
                Ok(Some(value))
            }
            None => Ok(None),
        },
    }
}

fn key_string<H: HostValue>(key: &MapKey<H>) -> Result<String> {
    let key = match key {
        MapKey::String(key) => return Ok(key.clone()),
        MapKey::Host(key) => key,
    };
    let mut current = key.clone();
    for _ in 0..DEFAULT_MAX_NESTING {
        match current.shape() {
            Shape::String(s) => return Ok(s),
            Shape::Wrapped(inner) => current = inner,
            _ => break,
        }
    }
    Err(JsvError::NonStringKey {
        type_name: key.type_name().into_owned(),
    })
}

/// The seven JSON Schema primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JsonType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl JsonType {
    /// The most specific type of a value. Integral numbers are `Integer`.
    pub fn of(value: &Value) -> JsonType {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if n.is_f64() => JsonType::Number,
            Value::Number(_) => JsonType::Integer,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    pub fn from_name(name: &str) -> Option<JsonType> {
        Some(match name {
            "array" => JsonType::Array,
            "boolean" => JsonType::Boolean,
            "integer" => JsonType::Integer,
            "null" => JsonType::Null,
            "number" => JsonType::Number,
            "object" => JsonType::Object,
            "string" => JsonType::String,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JsonType::Array => "array",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Null => "null",
            JsonType::Number => "number",
            JsonType::Object => "object",
            JsonType::String => "string",
        }
    }

    /// Does `value` belong to this type?
    ///
    /// With `integral_floats`, floats without a fractional part count as
    /// integers (Draft 6 onwards).
    pub fn matches(self, value: &Value, integral_floats: bool) -> bool {
        match (self, value) {
            (JsonType::Null, Value::Null)
            | (JsonType::Boolean, Value::Bool(_))
            | (JsonType::Number, Value::Number(_))
            | (JsonType::String, Value::String(_))
            | (JsonType::Array, Value::Array(_))
            | (JsonType::Object, Value::Object(_)) => true,
            (JsonType::Integer, Value::Number(n)) => {
                !n.is_f64() || (integral_floats && n.as_f64().map_or(false, |f| f.fract() == 0.0))
            }
            _ => false,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compare two numbers exactly, whatever their kinds.
pub fn compare(left: &Number, right: &Number) -> Ordering {
    match (integer(left), integer(right)) {
        (Some(l), Some(r)) => l.cmp(&r),
        (Some(l), None) => compare_int_float(l, float(right)),
        (None, Some(r)) => compare_int_float(r, float(left)).reverse(),
        (None, None) => float(left)
            .partial_cmp(&float(right))
            .unwrap_or(Ordering::Equal),
    }
}

fn integer(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

fn float(n: &Number) -> f64 {
    n.as_f64().unwrap_or(0.0)
}

fn compare_int_float(int: i128, float: f64) -> Ordering {
    // Every i64/u64 lies strictly within these bounds, and every float within
    // them truncates to an exactly representable i128.
    if float >= 1.9e19 {
        return Ordering::Less;
    }
    if float <= -1.0e19 {
        return Ordering::Greater;
    }
    let whole = float.trunc();
    match int.cmp(&(whole as i128)) {
        Ordering::Equal => 0.0_f64
            .partial_cmp(&(float - whole))
            .unwrap_or(Ordering::Equal),
        other => other,
    }
}

/// Is `value` an exact multiple of `divisor`?
///
/// Both numbers are taken at their shortest decimal representation, so
/// `0.0075` is a multiple of `0.0001` even though their binary floating
/// point quotient is not integral.
pub fn is_multiple_of(value: &Number, divisor: &Number) -> bool {
    if let (Some(v), Some(d)) = (integer(value), integer(divisor)) {
        return d != 0 && v % d == 0;
    }
    if let (Some((v_digits, v_scale)), Some((d_digits, d_scale))) =
        (decimal(value), decimal(divisor))
    {
        let scale = v_scale.max(d_scale);
        let scaled = |digits: i128, from: u32| {
            10_i128
                .checked_pow(scale - from)
                .and_then(|factor| digits.checked_mul(factor))
        };
        if let (Some(v), Some(d)) = (scaled(v_digits, v_scale), scaled(d_digits, d_scale)) {
            return d != 0 && v % d == 0;
        }
    }
    let quotient = float(value) / float(divisor);
    quotient.is_finite() && quotient.fract() == 0.0
}

/// Split a number into integral digits and a power-of-ten scale.
fn decimal(n: &Number) -> Option<(i128, u32)> {
    if let Some(i) = integer(n) {
        return Some((i, 0));
    }
    let text = n.to_string();
    let (mantissa, exponent) = match text.find(|c| c == 'e' || c == 'E') {
        Some(at) => (&text[..at], text[at + 1..].parse::<i32>().ok()?),
        None => (text.as_str(), 0),
    };
    let (whole, fraction) = match mantissa.find('.') {
        Some(at) => (&mantissa[..at], &mantissa[at + 1..]),
        None => (mantissa, ""),
    };
    let digits: i128 = format!("{}{}", whole, fraction).parse().ok()?;
    let scale = fraction.len() as i32 - exponent;
    if scale >= 0 {
        Some((digits, u32::try_from(scale).ok()?))
    } else {
        let factor = 10_i128.checked_pow(u32::try_from(-scale).ok()?)?;
        Some((digits.checked_mul(factor)?, 0))
    }
}

/// JSON equality: numbers compare by value, containers structurally.
pub fn equal(left: &Value, right: &Value) -> bool {
    let mut pairs = vec![(left, right)];
    while let Some((left, right)) = pairs.pop() {
        match (left, right) {
            (Value::Number(l), Value::Number(r)) => {
                if compare(l, r) != Ordering::Equal {
                    return false;
                }
            }
            (Value::Array(l), Value::Array(r)) => {
                if l.len() != r.len() {
                    return false;
                }
                pairs.extend(l.iter().zip(r.iter()));
            }
            (Value::Object(l), Value::Object(r)) => {
                if l.len() != r.len() {
                    return false;
                }
                for (key, l) in l {
                    match r.get(key) {
                        Some(r) => pairs.push((l, r)),
                        None => return false,
                    }
                }
            }
            (l, r) => {
                if l != r {
                    return false;
                }
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn number(value: Value) -> Number {
        match value {
            Value::Number(n) => n,
            other => panic!("not a number: {}", other),
        }
    }

    #[test]
    fn compares_across_kinds() {
        assert_eq!(compare(&number(json!(5)), &number(json!(5.0))), Ordering::Equal);
        assert_eq!(compare(&number(json!(5)), &number(json!(5.5))), Ordering::Less);
        assert_eq!(compare(&number(json!(-5)), &number(json!(-5.5))), Ordering::Greater);
        assert_eq!(
            compare(&number(json!(u64::MAX)), &number(json!(i64::MIN))),
            Ordering::Greater
        );
        assert_eq!(
            compare(&number(json!(9_007_199_254_740_993_i64)), &number(json!(9_007_199_254_740_992.0))),
            Ordering::Greater
        );
    }

    #[test]
    fn multiples_are_exact() {
        assert!(is_multiple_of(&number(json!(10)), &number(json!(5))));
        assert!(!is_multiple_of(&number(json!(7)), &number(json!(2))));
        assert!(is_multiple_of(&number(json!(0.0075)), &number(json!(0.0001))));
        assert!(!is_multiple_of(&number(json!(0.00751)), &number(json!(0.0001))));
        assert!(is_multiple_of(&number(json!(4)), &number(json!(0.5))));
        assert!(is_multiple_of(&number(json!(4.0)), &number(json!(2))));
        assert!(!is_multiple_of(&number(json!(1e308)), &number(json!(0.123456789))));
    }

    #[test]
    fn equality_ignores_number_kind() {
        assert!(equal(&json!([1, {"a": 2.0}]), &json!([1.0, {"a": 2}])));
        assert!(!equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!equal(&json!(true), &json!(1)));
    }

    #[test]
    fn integer_type() {
        assert!(JsonType::Integer.matches(&json!(1), false));
        assert!(!JsonType::Integer.matches(&json!(1.0), false));
        assert!(JsonType::Integer.matches(&json!(1.0), true));
        assert!(JsonType::Number.matches(&json!(1), true));
        assert_eq!(JsonType::of(&json!(1.5)), JsonType::Number);
    }

    #[test]
    fn converts_serde_values() {
        let value = json!({"a": [1, 2.5, null, {"b": "c"}], "d": true});
        assert_eq!(to_internal(&&value, DEFAULT_MAX_NESTING).unwrap(), value);
    }

    #[test]
    fn nesting_is_bounded() {
        let mut value = json!(1);
        for _ in 0..10 {
            value = json!([value]);
        }
        assert_eq!(
            to_internal(&&value, 5),
            Err(JsvError::NestingTooDeep { limit: 5 })
        );
        assert!(to_internal(&&value, 10).is_ok());
    }
}
