//! Set functions over bags, registered for every attribute type. They see
//! bags as sets: duplicates are collapsed before anything else.

use super::first_order::{FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::FunctionRegistry;
use crate::bag::Bag;
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Result};
use crate::value::{AttributeValue, Value};
use std::collections::HashSet;

fn set(bag: &Bag) -> HashSet<&AttributeValue> {
    bag.iter().collect()
}

/// Distinct elements of the first bag also in the second, in order of
/// first occurrence.
pub fn intersection(a: &Bag, b: &Bag) -> Bag {
    let other = set(b);
    let values = a
        .distinct()
        .into_iter()
        .filter(|v| other.contains(*v))
        .cloned()
        .collect();
    Bag::new(a.element_type(), values)
}

/// Distinct elements of all bags, in order of first occurrence.
pub fn union(element_type: AttributeType, bags: &[Bag]) -> Bag {
    let mut seen = HashSet::new();
    let values = bags
        .iter()
        .flat_map(Bag::iter)
        .filter(|v| seen.insert(*v))
        .cloned()
        .collect();
    Bag::new(element_type, values)
}

pub fn at_least_one_member_of(a: &Bag, b: &Bag) -> bool {
    let other = set(b);
    a.iter().any(|v| other.contains(v))
}

pub fn subset(a: &Bag, b: &Bag) -> bool {
    let other = set(b);
    a.iter().all(|v| other.contains(v))
}

pub fn set_equals(a: &Bag, b: &Bag) -> bool {
    set(a) == set(b)
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    type Kernel = fn(&[Bag]) -> EvalResult<Value>;
    let predicates: [(&str, Kernel); 3] = [
        ("at-least-one-member-of", |b| {
            Ok(Value::from(at_least_one_member_of(&b[0], &b[1])))
        }),
        ("subset", |b| Ok(Value::from(subset(&b[0], &b[1])))),
        ("set-equals", |b| Ok(Value::from(set_equals(&b[0], &b[1])))),
    ];

    for t in AttributeType::ALL {
        let prefix = t.function_id_prefix();
        registry.register(FirstOrderFunction::new(
            format!("{prefix}-intersection"),
            t.bag(),
            FunctionSignature::fixed([t.bag(); 2]),
            Implementation::bags(|b| Ok(Value::Bag(intersection(&b[0], &b[1])))),
        )?)?;
        registry.register(FirstOrderFunction::new(
            format!("{prefix}-union"),
            t.bag(),
            FunctionSignature::varargs([t.bag(); 3]),
            Implementation::bags(move |b| Ok(Value::Bag(union(t, b)))),
        )?)?;
        for (name, kernel) in predicates {
            registry.register(FirstOrderFunction::new(
                format!("{prefix}-{name}"),
                Datatype::BOOLEAN,
                FunctionSignature::fixed([t.bag(); 2]),
                Implementation::bags(kernel),
            )?)?;
        }
    }
    Ok(())
}
