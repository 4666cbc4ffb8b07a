//! Ordering functions for the totally ordered types.

use super::first_order::{FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::FunctionRegistry;
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::value::{AttributeValue, Value};
use std::cmp::Ordering;

const ORDERED_TYPES: [AttributeType; 6] = [
    AttributeType::Integer,
    AttributeType::Double,
    AttributeType::String,
    AttributeType::Date,
    AttributeType::DateTime,
    AttributeType::Time,
];

fn compare(values: &[AttributeValue]) -> EvalResult<Option<Ordering>> {
    let (a, b) = (&values[0], &values[1]);
    if a.attribute_type() != b.attribute_type() {
        return Err(Indeterminate::processing_error(format!(
            "cannot compare {} with {}",
            a.attribute_type(),
            b.attribute_type()
        )));
    }
    // None only for NaN, which compares false with everything
    Ok(a.compare(b))
}

fn greater_than(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(compare(values)? == Some(Ordering::Greater)))
}

fn greater_than_or_equal(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(matches!(
        compare(values)?,
        Some(Ordering::Greater | Ordering::Equal)
    )))
}

fn less_than(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(compare(values)? == Some(Ordering::Less)))
}

fn less_than_or_equal(values: &[AttributeValue]) -> EvalResult<Value> {
    Ok(Value::from(matches!(
        compare(values)?,
        Some(Ordering::Less | Ordering::Equal)
    )))
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    type Kernel = fn(&[AttributeValue]) -> EvalResult<Value>;
    let operators: [(&str, Kernel); 4] = [
        ("greater-than", greater_than),
        ("greater-than-or-equal", greater_than_or_equal),
        ("less-than", less_than),
        ("less-than-or-equal", less_than_or_equal),
    ];
    for t in ORDERED_TYPES {
        for (name, kernel) in operators {
            registry.register(FirstOrderFunction::new(
                format!("{}-{name}", t.function_id_prefix()),
                Datatype::BOOLEAN,
                FunctionSignature::fixed([t.datatype(); 2]),
                Implementation::single_primitive(kernel),
            )?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators() {
        let one = AttributeValue::Integer(1);
        let two = AttributeValue::Integer(2);
        assert_eq!(
            greater_than(&[two.clone(), one.clone()]).unwrap(),
            Value::from(true)
        );
        assert_eq!(
            less_than_or_equal(&[one.clone(), one.clone()]).unwrap(),
            Value::from(true)
        );
        assert_eq!(less_than(&[two, one]).unwrap(), Value::from(false));
    }

    #[test]
    fn test_nan_compares_false() {
        let nan = AttributeValue::Double(f64::NAN);
        let one = AttributeValue::Double(1.0);
        for kernel in [greater_than, greater_than_or_equal, less_than, less_than_or_equal] {
            assert_eq!(kernel(&[nan.clone(), one.clone()]).unwrap(), Value::from(false));
        }
    }

    #[test]
    fn test_dates_and_registration() {
        let a = AttributeType::Date.parse("2020-01-01").unwrap();
        let b = AttributeType::Date.parse("2021-01-01").unwrap();
        assert_eq!(less_than(&[a, b]).unwrap(), Value::from(true));

        let registry = FunctionRegistry::standard(0).unwrap();
        assert!(registry.contains("urn:oasis:names:tc:xacml:1.0:function:time-less-than-or-equal"));
        assert!(!registry.contains("urn:oasis:names:tc:xacml:1.0:function:boolean-greater-than"));
    }
}
