//! Type conversion functions.

use super::first_order::{FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::{FunctionRegistry, FUNCTION_PREFIX_1_0, FUNCTION_PREFIX_3_0};
use crate::datatype::{cast, AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::value::{AttributeValue, Value};

/// Types with `<type>-from-string` and `string-from-<type>` functions.
const STRING_CONVERTIBLE: [AttributeType; 7] = [
    AttributeType::Boolean,
    AttributeType::Integer,
    AttributeType::Double,
    AttributeType::AnyUri,
    AttributeType::Date,
    AttributeType::DateTime,
    AttributeType::Time,
];

fn double_to_integer(values: &[AttributeValue]) -> EvalResult<Value> {
    let d = cast::<f64>(&values[0])?.trunc();
    // i64::MAX as f64 rounds up to 2^63, itself out of range
    if !d.is_finite() || d < i64::MIN as f64 || d >= i64::MAX as f64 {
        return Err(Indeterminate::processing_error(format!(
            "double-to-integer: {d} is out of the integer range"
        )));
    }
    Ok(AttributeValue::Integer(d as i64).into())
}

fn integer_to_double(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(AttributeValue::Double(*cast::<i64>(&values[0])? as f64).into())
}

fn string_from(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(AttributeValue::String(values[0].to_string()).into())
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    registry.register(FirstOrderFunction::new(
        format!("{FUNCTION_PREFIX_1_0}double-to-integer"),
        Datatype::INTEGER,
        FunctionSignature::fixed([Datatype::DOUBLE]),
        Implementation::single_primitive(double_to_integer),
    )?)?;
    registry.register(FirstOrderFunction::new(
        format!("{FUNCTION_PREFIX_1_0}integer-to-double"),
        Datatype::DOUBLE,
        FunctionSignature::fixed([Datatype::INTEGER]),
        Implementation::single_primitive(integer_to_double),
    )?)?;

    for t in STRING_CONVERTIBLE {
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_3_0}{}-from-string", t.local_name()),
            t.datatype(),
            FunctionSignature::fixed([Datatype::STRING]),
            Implementation::single_primitive(move |values| {
                Ok(t.parse_runtime(cast::<String>(&values[0])?)?.into())
            }),
        )?)?;
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_3_0}string-from-{}", t.local_name()),
            Datatype::STRING,
            FunctionSignature::fixed([t.datatype()]),
            Implementation::single_primitive(string_from),
        )?)?;
    }
    Ok(())
}
