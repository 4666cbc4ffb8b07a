//! Datatype descriptors.
//!
//! [`AttributeType`] names the atomic attribute types a bag may hold.
//! [`Datatype`] is what an expression declares: an attribute type, a bag
//! of one, or a function. Descriptors are `Copy` tags compared by identity;
//! `bag<string>` and `bag<boolean>` never compare equal.

use crate::error::{EvalResult, Indeterminate, PolicyError, Result};
use crate::value::{AnyUri, AttributeValue, Value};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;

const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
const FUNCTION_PREFIX_1_0: &str = "urn:oasis:names:tc:xacml:1.0:function:";

/// Identifier of the function datatype, used when a function is passed as
/// an argument to a higher-order function.
pub const FUNCTION_DATATYPE_ID: &str = "urn:oasis:names:tc:xacml:3.0:data-type:function";

/// Atomic attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AttributeType {
    String,
    Boolean,
    Integer,
    Double,
    #[serde(rename = "anyURI")]
    AnyUri,
    Date,
    DateTime,
    Time,
    HexBinary,
}

impl AttributeType {
    /// Every attribute type, in registration order.
    pub const ALL: [AttributeType; 9] = [
        AttributeType::String,
        AttributeType::Boolean,
        AttributeType::Integer,
        AttributeType::Double,
        AttributeType::AnyUri,
        AttributeType::Date,
        AttributeType::DateTime,
        AttributeType::Time,
        AttributeType::HexBinary,
    ];

    /// XML Schema local name.
    pub fn local_name(&self) -> &'static str {
        match self {
            AttributeType::String => "string",
            AttributeType::Boolean => "boolean",
            AttributeType::Integer => "integer",
            AttributeType::Double => "double",
            AttributeType::AnyUri => "anyURI",
            AttributeType::Date => "date",
            AttributeType::DateTime => "dateTime",
            AttributeType::Time => "time",
            AttributeType::HexBinary => "hexBinary",
        }
    }

    /// Full datatype identifier, e.g. `http://www.w3.org/2001/XMLSchema#string`.
    pub fn id(&self) -> String {
        format!("{XSD}{}", self.local_name())
    }

    /// Prefix of the identifiers of functions specific to this type, e.g.
    /// `urn:oasis:names:tc:xacml:1.0:function:string` for `string-equal`.
    pub fn function_id_prefix(&self) -> String {
        format!("{FUNCTION_PREFIX_1_0}{}", self.local_name())
    }

    /// Resolves a datatype identifier, full or local.
    pub fn from_id(id: &str) -> Option<Self> {
        let local = id.strip_prefix(XSD).unwrap_or(id);
        Self::ALL.into_iter().find(|t| t.local_name() == local)
    }

    /// Datatype of a bag of this type.
    pub fn bag(self) -> Datatype {
        Datatype::Bag(self)
    }

    /// Datatype of a single value of this type.
    pub fn datatype(self) -> Datatype {
        Datatype::Attribute(self)
    }

    /// Whether `value` belongs to this type.
    pub fn is_instance(&self, value: &AttributeValue) -> bool {
        value.attribute_type() == *self
    }

    /// Checked cast to the typed representation.
    pub fn cast<'v, T: TypedValue>(&self, value: &'v AttributeValue) -> EvalResult<&'v T> {
        if T::TYPE != *self {
            return Err(Indeterminate::processing_error(format!(
                "invalid cast: {} is not represented by the requested type ({})",
                self.local_name(),
                T::TYPE.local_name()
            )));
        }
        cast(value)
    }

    /// Parses a lexical representation.
    pub fn parse(&self, lexical: &str) -> Result<AttributeValue> {
        parse_lexical(*self, lexical).map_err(|reason| PolicyError::InvalidLiteral {
            datatype: self.datatype(),
            value: lexical.to_string(),
            reason,
        })
    }

    /// Parses a lexical representation found at evaluation time (request
    /// content, string conversion functions): failure is a syntax error.
    pub fn parse_runtime(&self, lexical: &str) -> EvalResult<AttributeValue> {
        parse_lexical(*self, lexical).map_err(|reason| {
            Indeterminate::syntax_error(format!(
                "invalid {} value '{lexical}': {reason}",
                self.local_name()
            ))
        })
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.local_name())
    }
}

/// Datatype declared by an expression or a function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    /// Single attribute value.
    Attribute(AttributeType),
    /// Bag of attribute values; the type parameter is the element type.
    Bag(AttributeType),
    /// Function passed as a value.
    Function,
}

impl Datatype {
    pub const STRING: Datatype = Datatype::Attribute(AttributeType::String);
    pub const BOOLEAN: Datatype = Datatype::Attribute(AttributeType::Boolean);
    pub const INTEGER: Datatype = Datatype::Attribute(AttributeType::Integer);
    pub const DOUBLE: Datatype = Datatype::Attribute(AttributeType::Double);

    /// Identifier; bag datatypes render as `bag<element-id>`.
    pub fn id(&self) -> String {
        match self {
            Datatype::Attribute(t) => t.id(),
            Datatype::Bag(t) => format!("bag<{}>", t.id()),
            Datatype::Function => FUNCTION_DATATYPE_ID.to_string(),
        }
    }

    /// Element type of a bag datatype.
    pub fn type_parameter(&self) -> Option<AttributeType> {
        match self {
            Datatype::Bag(t) => Some(*t),
            _ => None,
        }
    }

    /// Attribute type of a single-value datatype.
    pub fn attribute_type(&self) -> Option<AttributeType> {
        match self {
            Datatype::Attribute(t) => Some(*t),
            _ => None,
        }
    }

    pub fn is_bag(&self) -> bool {
        matches!(self, Datatype::Bag(_))
    }

    /// Anything that is not a bag, functions included.
    pub fn is_primitive(&self) -> bool {
        !self.is_bag()
    }

    pub fn is_instance(&self, value: &Value) -> bool {
        value.datatype() == *self
    }

    /// Checked identity cast: returns `value` if it is an instance of this
    /// datatype, never coerces.
    pub fn cast<'v>(&self, value: &'v Value) -> EvalResult<&'v Value> {
        if self.is_instance(value) {
            Ok(value)
        } else {
            Err(Indeterminate::processing_error(format!(
                "invalid value type: expected {self}, got {}",
                value.datatype()
            )))
        }
    }

    /// Empty value sequence sized for `capacity` values of this datatype.
    pub fn new_array(&self, capacity: usize) -> Vec<Value> {
        Vec::with_capacity(capacity)
    }
}

impl fmt::Display for Datatype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datatype::Attribute(t) => write!(f, "{t}"),
            Datatype::Bag(t) => write!(f, "bag<{t}>"),
            Datatype::Function => f.write_str("function"),
        }
    }
}

impl From<AttributeType> for Datatype {
    fn from(t: AttributeType) -> Self {
        Datatype::Attribute(t)
    }
}

/// Rust representation of one attribute type, for typed access from
/// function implementations.
pub trait TypedValue: Sized {
    const TYPE: AttributeType;

    fn from_attribute(value: &AttributeValue) -> Option<&Self>;

    fn into_attribute(self) -> AttributeValue;
}

/// Typed view of `value`; a mismatch is a processing error, never a
/// default value.
pub fn cast<T: TypedValue>(value: &AttributeValue) -> EvalResult<&T> {
    T::from_attribute(value).ok_or_else(|| {
        Indeterminate::processing_error(format!(
            "invalid value type: expected {}, got {}",
            T::TYPE,
            value.attribute_type()
        ))
    })
}

macro_rules! typed_value {
    ($ty:ty, $variant:ident) => {
        impl TypedValue for $ty {
            const TYPE: AttributeType = AttributeType::$variant;

            fn from_attribute(value: &AttributeValue) -> Option<&Self> {
                match value {
                    AttributeValue::$variant(v) => Some(v),
                    _ => None,
                }
            }

            fn into_attribute(self) -> AttributeValue {
                AttributeValue::$variant(self)
            }
        }
    };
}

typed_value!(String, String);
typed_value!(bool, Boolean);
typed_value!(i64, Integer);
typed_value!(f64, Double);
typed_value!(AnyUri, AnyUri);
typed_value!(NaiveDate, Date);
typed_value!(DateTime<FixedOffset>, DateTime);
typed_value!(NaiveTime, Time);
typed_value!(Vec<u8>, HexBinary);

fn parse_lexical(t: AttributeType, lexical: &str) -> std::result::Result<AttributeValue, String> {
    let trimmed = lexical.trim();
    let value = match t {
        AttributeType::String => AttributeValue::String(lexical.to_string()),
        AttributeType::Boolean => match trimmed {
            "true" | "1" => AttributeValue::Boolean(true),
            "false" | "0" => AttributeValue::Boolean(false),
            _ => return Err("not a boolean".to_string()),
        },
        AttributeType::Integer => AttributeValue::Integer(
            trimmed
                .strip_prefix('+')
                .unwrap_or(trimmed)
                .parse::<i64>()
                .map_err(|e| e.to_string())?,
        ),
        AttributeType::Double => AttributeValue::Double(match trimmed {
            "INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            // Rust accepts "inf"/"infinity"/"nan" which XML Schema does not
            other if other.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => {
                return Err("not a double".to_string())
            }
            other => other.parse::<f64>().map_err(|e| e.to_string())?,
        }),
        AttributeType::AnyUri => AttributeValue::AnyUri(AnyUri::new(trimmed)),
        AttributeType::Date => AttributeValue::Date(parse_date(trimmed)?),
        AttributeType::DateTime => AttributeValue::DateTime(parse_date_time(trimmed)?),
        AttributeType::Time => AttributeValue::Time(parse_time(trimmed)?),
        AttributeType::HexBinary => {
            AttributeValue::HexBinary(hex::decode(trimmed).map_err(|e| e.to_string())?)
        }
    };
    Ok(value)
}

/// Splits a trailing `Z` or `+hh:mm`/`-hh:mm` timezone off a date or time.
fn strip_timezone(s: &str) -> &str {
    if let Some(rest) = s.strip_suffix('Z') {
        return rest;
    }
    let Some(split) = s.len().checked_sub(6) else {
        return s;
    };
    // non-ASCII input: no char boundary, no timezone
    let (Some(head), Some(tail)) = (s.get(..split), s.get(split..)) else {
        return s;
    };
    let bytes = tail.as_bytes();
    if (bytes[0] == b'+' || bytes[0] == b'-') && bytes[3] == b':' && head.len() >= 8 {
        return head;
    }
    s
}

fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(strip_timezone(s), "%Y-%m-%d").map_err(|e| e.to_string())
}

fn parse_time(s: &str) -> std::result::Result<NaiveTime, String> {
    NaiveTime::parse_from_str(strip_timezone(s), "%H:%M:%S%.f").map_err(|e| e.to_string())
}

/// `dateTime` without a timezone is taken as UTC.
fn parse_date_time(s: &str) -> std::result::Result<DateTime<FixedOffset>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc().fixed_offset())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bag_datatypes_differ_by_parameter() {
        assert_ne!(AttributeType::String.bag(), AttributeType::Boolean.bag());
        assert_eq!(AttributeType::String.bag(), Datatype::Bag(AttributeType::String));
        assert_ne!(Datatype::STRING, AttributeType::String.bag());
        assert_eq!(
            AttributeType::Integer.bag().type_parameter(),
            Some(AttributeType::Integer)
        );
        assert_eq!(Datatype::INTEGER.type_parameter(), None);
    }

    #[test]
    fn test_ids() {
        assert_eq!(
            AttributeType::AnyUri.id(),
            "http://www.w3.org/2001/XMLSchema#anyURI"
        );
        assert_eq!(
            AttributeType::DateTime.function_id_prefix(),
            "urn:oasis:names:tc:xacml:1.0:function:dateTime"
        );
        assert_eq!(
            AttributeType::from_id("http://www.w3.org/2001/XMLSchema#hexBinary"),
            Some(AttributeType::HexBinary)
        );
        assert_eq!(AttributeType::from_id("boolean"), Some(AttributeType::Boolean));
        assert_eq!(AttributeType::from_id("duration"), None);
    }

    #[test]
    fn test_cast_never_coerces() {
        let value = AttributeValue::Integer(42);
        assert!(AttributeType::Integer.is_instance(&value));
        assert!(!AttributeType::Double.is_instance(&value));
        assert_eq!(cast::<i64>(&value).unwrap(), &42);
        assert!(cast::<f64>(&value).is_err());
        assert!(AttributeType::Double.cast::<i64>(&value).is_err());

        let v = Value::from(AttributeValue::Boolean(true));
        assert!(Datatype::BOOLEAN.cast(&v).is_ok());
        assert!(Datatype::STRING.cast(&v).is_err());
        assert!(Datatype::Function.new_array(4).capacity() >= 4);
    }

    #[test]
    fn test_parse_lexical() {
        assert_eq!(
            AttributeType::Boolean.parse("1").unwrap(),
            AttributeValue::Boolean(true)
        );
        assert_eq!(
            AttributeType::Integer.parse("+17").unwrap(),
            AttributeValue::Integer(17)
        );
        assert!(AttributeType::Integer.parse("1.5").is_err());
        assert_eq!(
            AttributeType::Double.parse("-INF").unwrap(),
            AttributeValue::Double(f64::NEG_INFINITY)
        );
        assert!(AttributeType::Double.parse("inf").is_err());
        assert_eq!(
            AttributeType::Date.parse("2002-10-10+02:00").unwrap(),
            AttributeValue::Date(NaiveDate::from_ymd_opt(2002, 10, 10).unwrap())
        );
        assert!(AttributeType::Time.parse("09:30:10Z").is_ok());
        assert!(AttributeType::HexBinary.parse("0fA0").is_ok());
        assert!(AttributeType::HexBinary.parse("zz").is_err());
    }

    #[test]
    fn test_non_ascii_dates_are_syntax_errors() {
        for t in [AttributeType::Date, AttributeType::Time, AttributeType::DateTime] {
            for lexical in ["€a€", "2002-10-1€", "€€€", "09:30:1€+02:00"] {
                let err = t.parse_runtime(lexical).unwrap_err();
                assert_eq!(err.status(), crate::error::StatusCode::SyntaxError);
                assert!(t.parse(lexical).is_err());
            }
        }
    }

    #[test]
    fn test_date_time_without_timezone_is_utc() {
        let with = AttributeType::DateTime.parse("2020-01-01T10:00:00Z").unwrap();
        let without = AttributeType::DateTime.parse("2020-01-01T10:00:00").unwrap();
        assert_eq!(with, without);
    }

    #[test]
    fn test_runtime_parse_is_syntax_error() {
        let err = AttributeType::Integer.parse_runtime("abc").unwrap_err();
        assert_eq!(err.status(), crate::error::StatusCode::SyntaxError);
    }
}
