//! First-order bag functions, registered for every attribute type:
//! `<type>-one-and-only`, `<type>-bag-size`, `<type>-is-in`, `<type>-bag`.

use super::first_order::{FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::FunctionRegistry;
use crate::bag::Bag;
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::value::{AttributeValue, Value};

fn one_and_only(bags: &[Bag]) -> EvalResult<Value> {
    let bag = &bags[0];
    match bag.single_element()? {
        Some(value) => Ok(Value::Attribute(value.clone())),
        None => Err(Indeterminate::processing_error(format!(
            "bag<{}> is empty, expected exactly one element",
            bag.element_type()
        ))),
    }
}

fn bag_size(bags: &[Bag]) -> EvalResult<Value> {
    let size = i64::try_from(bags[0].size())
        .map_err(|_| Indeterminate::processing_error("bag size out of integer range"))?;
    Ok(AttributeValue::Integer(size).into())
}

fn is_in(values: &[Value]) -> EvalResult<Value> {
    match (&values[0], &values[1]) {
        (Value::Attribute(v), Value::Bag(bag)) => Ok(Value::from(bag.contains(v))),
        (a, b) => Err(Indeterminate::processing_error(format!(
            "is-in: expected a value and a bag, got {} and {}",
            a.datatype(),
            b.datatype()
        ))),
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    for t in AttributeType::ALL {
        let prefix = t.function_id_prefix();
        registry.register(FirstOrderFunction::new(
            format!("{prefix}-one-and-only"),
            t.datatype(),
            FunctionSignature::fixed([t.bag()]),
            Implementation::bags(one_and_only),
        )?)?;
        registry.register(FirstOrderFunction::new(
            format!("{prefix}-bag-size"),
            Datatype::INTEGER,
            FunctionSignature::fixed([t.bag()]),
            Implementation::bags(bag_size),
        )?)?;
        registry.register(FirstOrderFunction::new(
            format!("{prefix}-is-in"),
            Datatype::BOOLEAN,
            FunctionSignature::fixed([t.datatype(), t.bag()]),
            Implementation::partly_bag(is_in),
        )?)?;
        registry.register(FirstOrderFunction::new(
            format!("{prefix}-bag"),
            t.bag(),
            FunctionSignature::varargs([t.datatype()]),
            Implementation::single_primitive(move |values| {
                Bag::try_new(t, values.to_vec()).map(Value::Bag)
            }),
        )?)?;
    }
    Ok(())
}
