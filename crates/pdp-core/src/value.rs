//! Attribute values and expression results.

use crate::bag::Bag;
use crate::datatype::{AttributeType, Datatype};
use crate::function::Function;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// `anyURI` value. Kept apart from `String` so the two attribute types have
/// distinct Rust representations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnyUri(String);

impl AnyUri {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Atomic attribute value.
///
/// Equality is identity of the value within its type: doubles compare by
/// bit pattern here (so bags of doubles hash consistently), dateTimes by
/// instant. The numeric `double-equal` function lives in the function
/// library.
#[derive(Debug, Clone)]
pub enum AttributeValue {
    String(String),
    Boolean(bool),
    Integer(i64),
    Double(f64),
    AnyUri(AnyUri),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Time(NaiveTime),
    HexBinary(Vec<u8>),
}

impl AttributeValue {
    pub fn attribute_type(&self) -> AttributeType {
        match self {
            AttributeValue::String(_) => AttributeType::String,
            AttributeValue::Boolean(_) => AttributeType::Boolean,
            AttributeValue::Integer(_) => AttributeType::Integer,
            AttributeValue::Double(_) => AttributeType::Double,
            AttributeValue::AnyUri(_) => AttributeType::AnyUri,
            AttributeValue::Date(_) => AttributeType::Date,
            AttributeValue::DateTime(_) => AttributeType::DateTime,
            AttributeValue::Time(_) => AttributeType::Time,
            AttributeValue::HexBinary(_) => AttributeType::HexBinary,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        AttributeValue::String(s.into())
    }

    pub fn any_uri(s: impl Into<String>) -> Self {
        AttributeValue::AnyUri(AnyUri::new(s))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Total order within one type; `None` across types or for types
    /// without an order (boolean, anyURI, hexBinary) and NaN.
    pub fn compare(&self, other: &AttributeValue) -> Option<Ordering> {
        match (self, other) {
            (AttributeValue::String(a), AttributeValue::String(b)) => Some(a.cmp(b)),
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => Some(a.cmp(b)),
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a.partial_cmp(b),
            (AttributeValue::Date(a), AttributeValue::Date(b)) => Some(a.cmp(b)),
            (AttributeValue::DateTime(a), AttributeValue::DateTime(b)) => Some(a.cmp(b)),
            (AttributeValue::Time(a), AttributeValue::Time(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (AttributeValue::String(a), AttributeValue::String(b)) => a == b,
            (AttributeValue::Boolean(a), AttributeValue::Boolean(b)) => a == b,
            (AttributeValue::Integer(a), AttributeValue::Integer(b)) => a == b,
            (AttributeValue::Double(a), AttributeValue::Double(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::AnyUri(a), AttributeValue::AnyUri(b)) => a == b,
            (AttributeValue::Date(a), AttributeValue::Date(b)) => a == b,
            (AttributeValue::DateTime(a), AttributeValue::DateTime(b)) => a == b,
            (AttributeValue::Time(a), AttributeValue::Time(b)) => a == b,
            (AttributeValue::HexBinary(a), AttributeValue::HexBinary(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.attribute_type().hash(state);
        match self {
            AttributeValue::String(s) => s.hash(state),
            AttributeValue::Boolean(b) => b.hash(state),
            AttributeValue::Integer(i) => i.hash(state),
            AttributeValue::Double(d) => d.to_bits().hash(state),
            AttributeValue::AnyUri(u) => u.hash(state),
            AttributeValue::Date(d) => d.hash(state),
            // instant, consistent with DateTime equality across offsets
            AttributeValue::DateTime(dt) => dt.naive_utc().hash(state),
            AttributeValue::Time(t) => t.hash(state),
            AttributeValue::HexBinary(b) => b.hash(state),
        }
    }
}

/// Canonical lexical form.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Boolean(b) => write!(f, "{b}"),
            AttributeValue::Integer(i) => write!(f, "{i}"),
            AttributeValue::Double(d) if d.is_nan() => f.write_str("NaN"),
            AttributeValue::Double(d) if d.is_infinite() => {
                f.write_str(if *d > 0.0 { "INF" } else { "-INF" })
            }
            AttributeValue::Double(d) => write!(f, "{d:?}"),
            AttributeValue::AnyUri(u) => write!(f, "{u}"),
            AttributeValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            AttributeValue::DateTime(dt) => {
                f.write_str(&dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            AttributeValue::Time(t) => write!(f, "{}", t.format("%H:%M:%S%.f")),
            AttributeValue::HexBinary(b) => f.write_str(&hex::encode_upper(b)),
        }
    }
}

impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("AttributeValue", 2)?;
        state.serialize_field("datatype", &self.attribute_type().id())?;
        state.serialize_field("value", &self.to_string())?;
        state.end()
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> Self {
        AttributeValue::Boolean(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Integer(i)
    }
}

impl From<f64> for AttributeValue {
    fn from(d: f64) -> Self {
        AttributeValue::Double(d)
    }
}

/// Result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Attribute(AttributeValue),
    Bag(Bag),
    Function(Function),
}

impl Value {
    pub fn datatype(&self) -> Datatype {
        match self {
            Value::Attribute(v) => Datatype::Attribute(v.attribute_type()),
            Value::Bag(b) => Datatype::Bag(b.element_type()),
            Value::Function(_) => Datatype::Function,
        }
    }

    pub fn as_attribute(&self) -> Option<&AttributeValue> {
        match self {
            Value::Attribute(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bag(&self) -> Option<&Bag> {
        match self {
            Value::Bag(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_attribute().and_then(AttributeValue::as_bool)
    }
}

impl From<AttributeValue> for Value {
    fn from(v: AttributeValue) -> Self {
        Value::Attribute(v)
    }
}

impl From<Bag> for Value {
    fn from(b: Bag) -> Self {
        Value::Bag(b)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Attribute(AttributeValue::Boolean(b))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Attribute(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Attribute(s.into())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Attribute(AttributeValue::Integer(i))
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Attribute(AttributeValue::Double(d))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Attribute(v) => write!(f, "{v}"),
            Value::Bag(b) => write!(f, "{b}"),
            Value::Function(func) => write!(f, "{}", func.id()),
        }
    }
}
