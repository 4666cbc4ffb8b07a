//! Integer and double arithmetic. Integer overflow and division by zero
//! are processing errors.

use super::first_order::{FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::{FunctionRegistry, FUNCTION_PREFIX_1_0};
use crate::datatype::{cast, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::value::{AttributeValue, Value};

fn overflow(operation: &str) -> Indeterminate {
    Indeterminate::processing_error(format!("integer overflow in {operation}"))
}

fn integer(v: i64) -> Value {
    AttributeValue::Integer(v).into()
}

fn double(v: f64) -> Value {
    AttributeValue::Double(v).into()
}

fn integers(values: &[AttributeValue]) -> EvalResult<Vec<i64>> {
    values.iter().map(|v| cast::<i64>(v).copied()).collect()
}

fn doubles(values: &[AttributeValue]) -> EvalResult<Vec<f64>> {
    values.iter().map(|v| cast::<f64>(v).copied()).collect()
}

fn integer_add(values: &[AttributeValue]) -> EvalResult<Value> {
    integers(values)?
        .into_iter()
        .try_fold(0i64, |acc, v| acc.checked_add(v))
        .map(integer)
        .ok_or_else(|| overflow("integer-add"))
}

fn integer_multiply(values: &[AttributeValue]) -> EvalResult<Value> {
    integers(values)?
        .into_iter()
        .try_fold(1i64, |acc, v| acc.checked_mul(v))
        .map(integer)
        .ok_or_else(|| overflow("integer-multiply"))
}

fn integer_subtract(values: &[AttributeValue]) -> EvalResult<Value> {
    let (a, b) = (cast::<i64>(&values[0])?, cast::<i64>(&values[1])?);
    a.checked_sub(*b)
        .map(integer)
        .ok_or_else(|| overflow("integer-subtract"))
}

fn integer_divide(values: &[AttributeValue]) -> EvalResult<Value> {
    let (a, b) = (cast::<i64>(&values[0])?, cast::<i64>(&values[1])?);
    if *b == 0 {
        return Err(Indeterminate::processing_error("integer-divide: division by zero"));
    }
    a.checked_div(*b)
        .map(integer)
        .ok_or_else(|| overflow("integer-divide"))
}

fn integer_mod(values: &[AttributeValue]) -> EvalResult<Value> {
    let (a, b) = (cast::<i64>(&values[0])?, cast::<i64>(&values[1])?);
    if *b == 0 {
        return Err(Indeterminate::processing_error("integer-mod: division by zero"));
    }
    a.checked_rem(*b)
        .map(integer)
        .ok_or_else(|| overflow("integer-mod"))
}

fn integer_abs(values: &[AttributeValue]) -> EvalResult<Value> {
    cast::<i64>(&values[0])?
        .checked_abs()
        .map(integer)
        .ok_or_else(|| overflow("integer-abs"))
}

fn double_add(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(double(doubles(values)?.into_iter().sum()))
}

fn double_multiply(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(double(doubles(values)?.into_iter().product()))
}

fn double_subtract(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(double(cast::<f64>(&values[0])? - cast::<f64>(&values[1])?))
}

fn double_divide(values: &[AttributeValue]) -> EvalResult<Value> {
    let (a, b) = (cast::<f64>(&values[0])?, cast::<f64>(&values[1])?);
    if *b == 0.0 {
        return Err(Indeterminate::processing_error("double-divide: division by zero"));
    }
    Ok(double(a / b))
}

fn double_abs(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(double(cast::<f64>(&values[0])?.abs()))
}

fn round(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(double(cast::<f64>(&values[0])?.round_ties_even()))
}

fn floor(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(double(cast::<f64>(&values[0])?.floor()))
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    type Kernel = fn(&[AttributeValue]) -> EvalResult<Value>;
    let int = Datatype::INTEGER;
    let dbl = Datatype::DOUBLE;

    // n-ary, at least two args
    let variadic: [(&str, Datatype, Kernel); 4] = [
        ("integer-add", int, integer_add),
        ("integer-multiply", int, integer_multiply),
        ("double-add", dbl, double_add),
        ("double-multiply", dbl, double_multiply),
    ];
    for (name, t, kernel) in variadic {
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_1_0}{name}"),
            t,
            FunctionSignature::varargs([t; 3]),
            Implementation::single_primitive(kernel),
        )?)?;
    }

    let binary: [(&str, Datatype, Kernel); 5] = [
        ("integer-subtract", int, integer_subtract),
        ("integer-divide", int, integer_divide),
        ("integer-mod", int, integer_mod),
        ("double-subtract", dbl, double_subtract),
        ("double-divide", dbl, double_divide),
    ];
    for (name, t, kernel) in binary {
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_1_0}{name}"),
            t,
            FunctionSignature::fixed([t; 2]),
            Implementation::single_primitive(kernel),
        )?)?;
    }

    let unary: [(&str, Datatype, Kernel); 4] = [
        ("integer-abs", int, integer_abs),
        ("double-abs", dbl, double_abs),
        ("round", dbl, round),
        ("floor", dbl, floor),
    ];
    for (name, t, kernel) in unary {
        registry.register(FirstOrderFunction::new(
            format!("{FUNCTION_PREFIX_1_0}{name}"),
            t,
            FunctionSignature::fixed([t]),
            Implementation::single_primitive(kernel),
        )?)?;
    }
    Ok(())
}
