//! String functions.

use super::first_order::{FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::{FunctionRegistry, FUNCTION_PREFIX_1_0, FUNCTION_PREFIX_2_0, FUNCTION_PREFIX_3_0};
use crate::datatype::{cast, AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::value::{AnyUri, AttributeValue, Value};

/// Text of a string or anyURI value.
fn text(value: &AttributeValue) -> EvalResult<&str> {
    match value {
        AttributeValue::String(s) => Ok(s),
        AttributeValue::AnyUri(u) => Ok(u.as_str()),
        other => Err(Indeterminate::processing_error(format!(
            "expected a string or anyURI, got {}",
            other.attribute_type()
        ))),
    }
}

fn string(s: impl Into<String>) -> Value {
    AttributeValue::String(s.into()).into()
}

fn concatenate(values: &[AttributeValue]) -> EvalResult<Value> {
    let mut result = String::new();
    for v in values {
        result.push_str(cast::<String>(v)?);
    }
    Ok(string(result))
}

// (prefix, string)
fn starts_with(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(text(&values[1])?.starts_with(text(&values[0])?)))
}

fn ends_with(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(text(&values[1])?.ends_with(text(&values[0])?)))
}

fn contains(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(text(&values[1])?.contains(text(&values[0])?)))
}

/// Characters from `begin` (inclusive) to `end` (exclusive); `end` -1
/// means the end of the string.
fn substring(values: &[AttributeValue]) -> EvalResult<Value> {
    let source = text(&values[0])?;
    let begin = *cast::<i64>(&values[1])?;
    let end = *cast::<i64>(&values[2])?;
    let length = source.chars().count() as i64;
    let end = if end == -1 { length } else { end };
    if begin < 0 || begin > end || end > length {
        return Err(Indeterminate::processing_error(format!(
            "substring: invalid range [{begin}, {end}) for a string of {length} characters"
        )));
    }
    // both bounds checked within [0, length]
    let (begin, end) = (begin as usize, end as usize);
    Ok(string(
        source.chars().skip(begin).take(end - begin).collect::<String>(),
    ))
}

fn normalize_space(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(string(cast::<String>(&values[0])?.trim()))
}

fn normalize_to_lower_case(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(string(cast::<String>(&values[0])?.to_lowercase()))
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    type Kernel = fn(&[AttributeValue]) -> EvalResult<Value>;
    let s = Datatype::STRING;
    let uri = AttributeType::AnyUri.datatype();

    registry.register(FirstOrderFunction::new(
        format!("{FUNCTION_PREFIX_2_0}string-concatenate"),
        s,
        FunctionSignature::varargs([s; 3]),
        Implementation::single_primitive(concatenate),
    )?)?;

    let tests: [(&str, Kernel); 3] = [
        ("starts-with", starts_with),
        ("ends-with", ends_with),
        ("contains", contains),
    ];
    for (name, kernel) in tests {
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_3_0}string-{name}"),
            Datatype::BOOLEAN,
            FunctionSignature::fixed([s, s]),
            Implementation::single_primitive(kernel),
        )?)?;
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_3_0}anyURI-{name}"),
            Datatype::BOOLEAN,
            FunctionSignature::fixed([s, uri]),
            Implementation::multi_primitive(kernel),
        )?)?;
    }

    for (name, source) in [("string-substring", s), ("anyURI-substring", uri)] {
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_3_0}{name}"),
            s,
            FunctionSignature::fixed([source, Datatype::INTEGER, Datatype::INTEGER]),
            Implementation::multi_primitive(substring),
        )?)?;
    }

    let normalizers: [(&str, Kernel); 2] = [
        ("string-normalize-space", normalize_space),
        ("string-normalize-to-lower-case", normalize_to_lower_case),
    ];
    for (name, kernel) in normalizers {
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_1_0}{name}"),
            s,
            FunctionSignature::fixed([s]),
            Implementation::single_primitive(kernel),
        )?)?;
    }
    Ok(())
}
