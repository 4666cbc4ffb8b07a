//! `<type>-equal` for every attribute type, and `string-equal-ignore-case`.

use super::first_order::{FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::{FunctionRegistry, FUNCTION_PREFIX_3_0};
use crate::datatype::{cast, AttributeType, Datatype};
use crate::error::{EvalResult, Result};
use crate::value::{AttributeValue, Value};

fn same_value(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(values[0] == values[1]))
}

// IEEE equality: NaN differs from itself, 0.0 equals -0.0
fn double_equal(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(cast::<f64>(&values[0])? == cast::<f64>(&values[1])?))
}

fn string_equal_ignore_case(values: &[AttributeValue]) -> EvalResult<Value> {
    let a = cast::<String>(&values[0])?;
    let b = cast::<String>(&values[1])?;
    Ok(Value::from(a.to_lowercase() == b.to_lowercase()))
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    for t in AttributeType::ALL {
        let kernel = match t {
            AttributeType::Double => double_equal,
            _ => same_value,
        };
        registry.register(FirstOrderFunction::new(
            format!("{}-equal", t.function_id_prefix()),
            Datatype::BOOLEAN,
            FunctionSignature::fixed([t.datatype(); 2]),
            Implementation::single_primitive(kernel),
        )?)?;
    }
    registry.register(FirstOrderFunction::new(
        format!("{FUNCTION_PREFIX_3_0}string-equal-ignore-case"),
        Datatype::BOOLEAN,
        FunctionSignature::fixed([Datatype::STRING; 2]),
        Implementation::single_primitive(string_equal_ignore_case),
    )?)?;
    Ok(())
}
