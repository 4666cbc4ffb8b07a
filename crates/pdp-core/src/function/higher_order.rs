//! Higher-order bag functions: a statically known first-order
//! sub-function applied across the elements of bags.

use super::first_order::FirstOrderFunction;
use super::{ids, FunctionCall, FunctionRegistry};
use crate::bag::Bag;
use crate::context::EvaluationContext;
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, PolicyError, Result};
use crate::expression::ExpressionRef;
use crate::value::{AttributeValue, Value};
use std::sync::Arc;
use tracing::debug;

/// The combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HigherOrderKind {
    /// True if the sub-function is true for some element of the bag.
    AnyOf,
    /// True if the sub-function is true for every element of the bag.
    AllOf,
    /// True if the sub-function is true for some combination of values.
    AnyOfAny,
    /// True if every element of the first bag matches some element of the
    /// second.
    AllOfAny,
    /// True if some element of the first bag matches every element of the
    /// second.
    AnyOfAll,
    /// True if every element of the first bag matches every element of the
    /// second.
    AllOfAll,
    /// Bag of the sub-function results, one per element of the bag.
    Map,
}

impl HigherOrderKind {
    pub const ALL: [HigherOrderKind; 7] = [
        HigherOrderKind::AnyOf,
        HigherOrderKind::AllOf,
        HigherOrderKind::AnyOfAny,
        HigherOrderKind::AllOfAny,
        HigherOrderKind::AnyOfAll,
        HigherOrderKind::AllOfAll,
        HigherOrderKind::Map,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            HigherOrderKind::AnyOf => ids::ANY_OF,
            HigherOrderKind::AllOf => ids::ALL_OF,
            HigherOrderKind::AnyOfAny => ids::ANY_OF_ANY,
            HigherOrderKind::AllOfAny => ids::ALL_OF_ANY,
            HigherOrderKind::AnyOfAll => ids::ANY_OF_ALL,
            HigherOrderKind::AllOfAll => ids::ALL_OF_ALL,
            HigherOrderKind::Map => ids::MAP,
        }
    }

    /// Boolean for every combinator but `map`, whose result type depends on
    /// the sub-function.
    pub fn return_type(&self) -> Option<Datatype> {
        match self {
            HigherOrderKind::Map => None,
            _ => Some(Datatype::BOOLEAN),
        }
    }
}

#[derive(Debug)]
pub struct HigherOrderBagFunction {
    kind: HigherOrderKind,
}

impl HigherOrderBagFunction {
    pub fn new(kind: HigherOrderKind) -> Self {
        Self { kind }
    }

    pub fn id(&self) -> &str {
        self.kind.id()
    }

    pub fn kind(&self) -> HigherOrderKind {
        self.kind
    }

    pub fn new_call(&self, args: Vec<ExpressionRef>) -> Result<Box<dyn FunctionCall>> {
        let id = self.id();
        let min_args = match self.kind {
            HigherOrderKind::AllOfAny | HigherOrderKind::AnyOfAll | HigherOrderKind::AllOfAll => 3,
            _ => 2,
        };
        let fixed = min_args == 3;
        if args.len() < min_args || (fixed && args.len() != min_args) {
            return Err(PolicyError::InvalidArity {
                function: id.to_string(),
                expected: if fixed {
                    "3".to_string()
                } else {
                    "at least 2".to_string()
                },
                actual: args.len(),
            });
        }

        let sub_function = static_sub_function(id, &args[0])?;
        let invalid_sub = |reason: String| PolicyError::InvalidSubFunction {
            function: id.to_string(),
            sub_function: sub_function.id().to_string(),
            reason,
        };
        let sub_return = sub_function.return_type();
        let return_type = match self.kind {
            HigherOrderKind::Map => match sub_return {
                Datatype::Attribute(t) => t.bag(),
                other => {
                    return Err(invalid_sub(format!(
                        "must return a single value, returns {other}"
                    )))
                }
            },
            _ if sub_return != Datatype::BOOLEAN => {
                return Err(invalid_sub(format!(
                    "must return a boolean, returns {sub_return}"
                )))
            }
            _ => Datatype::BOOLEAN,
        };

        for (index, arg) in args.iter().enumerate().skip(1) {
            if arg.datatype() == Datatype::Function {
                return Err(PolicyError::InvalidArguments {
                    function: id.to_string(),
                    reason: format!("arg #{index} is a function"),
                });
            }
        }

        debug!(function = %id, sub_function = %sub_function.id(), args = args.len(), "new higher-order call");
        match self.kind {
            HigherOrderKind::AnyOf | HigherOrderKind::AllOf | HigherOrderKind::Map => {
                OneBagCall::new(self.kind, &sub_function, args, return_type)
                    .map(|c| Box::new(c) as Box<dyn FunctionCall>)
            }
            HigherOrderKind::AnyOfAny => {
                AnyOfAnyCall::new(&sub_function, args).map(|c| Box::new(c) as Box<dyn FunctionCall>)
            }
            HigherOrderKind::AllOfAny | HigherOrderKind::AnyOfAll | HigherOrderKind::AllOfAll => {
                TwoBagCall::new(self.kind, &sub_function, args)
                    .map(|c| Box::new(c) as Box<dyn FunctionCall>)
            }
        }
    }
}

/// Resolves argument #0 to a first-order function without evaluating
/// anything: it must be a constant function value.
fn static_sub_function(function: &str, arg: &ExpressionRef) -> Result<Arc<FirstOrderFunction>> {
    let Some(Value::Function(sub_function)) = arg.value() else {
        return Err(PolicyError::NonConstantFunctionArgument {
            function: function.to_string(),
        });
    };
    sub_function
        .as_first_order()
        .cloned()
        .ok_or_else(|| PolicyError::InvalidSubFunction {
            function: function.to_string(),
            sub_function: sub_function.id().to_string(),
            reason: "not a first-order function".to_string(),
        })
}

fn element_type(function: &str, index: usize, arg: &ExpressionRef) -> Result<AttributeType> {
    match arg.datatype() {
        Datatype::Attribute(t) | Datatype::Bag(t) => Ok(t),
        Datatype::Function => Err(PolicyError::InvalidArguments {
            function: function.to_string(),
            reason: format!("arg #{index} is a function"),
        }),
    }
}

fn evaluate_arg(
    function: &str,
    index: usize,
    arg: &ExpressionRef,
    ctx: Option<&dyn EvaluationContext>,
) -> EvalResult<Value> {
    arg.evaluate(ctx)
        .map_err(|e| Indeterminate::for_arg(function, index, e))
}

fn as_bool(function: &str, value: Value) -> EvalResult<bool> {
    value.as_bool().ok_or_else(|| {
        Indeterminate::processing_error(format!(
            "{function}: sub-function returned {}, expected a boolean",
            value.datatype()
        ))
    })
}

/// any-of, all-of and map: exactly one bag among the arguments after the
/// function.
///
/// Leading constant args are bound into the sub-function call, so that it
/// can prepare them once (e.g. compile a regex). Every other arg is
/// evaluated once per call, left to right, before the bag is iterated, and
/// reaches each sub-call as a runtime arg next to the bag element.
#[derive(Debug)]
struct OneBagCall {
    kind: HigherOrderKind,
    return_type: Datatype,
    args: Vec<ExpressionRef>,
    // first arg not bound into `sub_call`
    first_runtime: usize,
    // index of the bag in `args`
    bag_index: usize,
    sub_call: Box<dyn FunctionCall>,
}

impl OneBagCall {
    fn new(
        kind: HigherOrderKind,
        sub_function: &FirstOrderFunction,
        args: Vec<ExpressionRef>,
        return_type: Datatype,
    ) -> Result<Self> {
        let id = kind.id();
        let bags: Vec<usize> = (1..args.len())
            .filter(|i| args[*i].datatype().is_bag())
            .collect();
        let &[bag_index] = bags.as_slice() else {
            return Err(PolicyError::InvalidArguments {
                function: id.to_string(),
                reason: format!("expected exactly one bag arg, got {}", bags.len()),
            });
        };

        let first_runtime = (1..bag_index)
            .find(|i| args[*i].value().is_none())
            .unwrap_or(bag_index);
        let mut remaining = Vec::with_capacity(args.len() - first_runtime);
        for (index, arg) in args.iter().enumerate().skip(first_runtime) {
            remaining.push(element_type(id, index, arg)?);
        }
        let sub_call = sub_function.new_call(args[1..first_runtime].to_vec(), &remaining)?;
        Ok(Self {
            kind,
            return_type,
            args,
            first_runtime,
            bag_index,
            sub_call,
        })
    }
}

impl FunctionCall for OneBagCall {
    fn return_type(&self) -> Datatype {
        self.return_type
    }

    fn arguments(&self) -> &[ExpressionRef] {
        &self.args
    }

    fn evaluate(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        _remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        let id = self.kind.id();
        let mut bag = None;
        let mut sub_args = Vec::with_capacity(self.args.len() - self.first_runtime);
        for (index, arg) in self.args.iter().enumerate().skip(self.first_runtime) {
            match evaluate_arg(id, index, arg, ctx)? {
                Value::Bag(b) if index == self.bag_index => {
                    bag = Some(b);
                    // placeholder for the bag element
                    sub_args.push(AttributeValue::Boolean(false));
                }
                Value::Attribute(v) if index != self.bag_index => sub_args.push(v),
                other => {
                    return Err(Indeterminate::processing_error(format!(
                        "{id}: arg #{index} is a {}",
                        other.datatype()
                    )))
                }
            }
        }
        let bag = bag.ok_or_else(|| {
            Indeterminate::processing_error(format!("{id}: arg #{} is not a bag", self.bag_index))
        })?;
        let slot = self.bag_index - self.first_runtime;

        match self.kind {
            HigherOrderKind::Map => {
                let mut results = Vec::with_capacity(bag.size());
                for element in &bag {
                    sub_args[slot] = element.clone();
                    match self.sub_call.evaluate(ctx, &sub_args)? {
                        Value::Attribute(v) => results.push(v),
                        other => {
                            return Err(Indeterminate::processing_error(format!(
                                "{id}: sub-function returned {}",
                                other.datatype()
                            )))
                        }
                    }
                }
                let element_type = self.return_type.type_parameter().ok_or_else(|| {
                    Indeterminate::processing_error(format!("{id}: invalid return type"))
                })?;
                Bag::try_new(element_type, results).map(Value::Bag)
            }
            // any-of stops at the first true, all-of at the first false
            _ => {
                let wanted = self.kind == HigherOrderKind::AnyOf;
                for element in &bag {
                    sub_args[slot] = element.clone();
                    if as_bool(id, self.sub_call.evaluate(ctx, &sub_args)?)? == wanted {
                        return Ok(Value::from(wanted));
                    }
                }
                Ok(Value::from(!wanted))
            }
        }
    }
}

/// any-of-any: every argument after the function is a single value or a
/// bag; all of them are passed to the sub-function at runtime.
#[derive(Debug)]
struct AnyOfAnyCall {
    args: Vec<ExpressionRef>,
    sub_call: Box<dyn FunctionCall>,
}

impl AnyOfAnyCall {
    fn new(sub_function: &FirstOrderFunction, args: Vec<ExpressionRef>) -> Result<Self> {
        let id = HigherOrderKind::AnyOfAny.id();
        let mut remaining = Vec::with_capacity(args.len() - 1);
        for (index, arg) in args.iter().enumerate().skip(1) {
            remaining.push(element_type(id, index, arg)?);
        }
        let sub_call = sub_function.new_call(Vec::new(), &remaining)?;
        Ok(Self { args, sub_call })
    }
}

impl FunctionCall for AnyOfAnyCall {
    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn arguments(&self) -> &[ExpressionRef] {
        &self.args
    }

    fn evaluate(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        _remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        let id = HigherOrderKind::AnyOfAny.id();
        let mut domains: Vec<Vec<AttributeValue>> = Vec::with_capacity(self.args.len() - 1);
        for (index, arg) in self.args.iter().enumerate().skip(1) {
            let domain = match evaluate_arg(id, index, arg, ctx)? {
                Value::Attribute(v) => vec![v],
                Value::Bag(b) => b.values().to_vec(),
                Value::Function(_) => {
                    return Err(Indeterminate::processing_error(format!(
                        "{id}: arg #{index} is a function"
                    )))
                }
            };
            domains.push(domain);
        }
        // every arg is evaluated, even after an empty bag
        if domains.iter().any(Vec::is_empty) {
            return Ok(Value::from(false));
        }

        // odometer over the cartesian product, last position fastest
        let mut positions = vec![0usize; domains.len()];
        let mut sub_args: Vec<AttributeValue> =
            domains.iter().map(|d| d[0].clone()).collect();
        loop {
            if as_bool(id, self.sub_call.evaluate(ctx, &sub_args)?)? {
                return Ok(Value::from(true));
            }
            let mut slot = domains.len();
            loop {
                if slot == 0 {
                    return Ok(Value::from(false));
                }
                slot -= 1;
                positions[slot] += 1;
                if positions[slot] < domains[slot].len() {
                    sub_args[slot] = domains[slot][positions[slot]].clone();
                    break;
                }
                positions[slot] = 0;
                sub_args[slot] = domains[slot][0].clone();
            }
        }
    }
}

/// all-of-any, any-of-all and all-of-all: a function and two bags.
#[derive(Debug)]
struct TwoBagCall {
    kind: HigherOrderKind,
    args: Vec<ExpressionRef>,
    sub_call: Box<dyn FunctionCall>,
}

impl TwoBagCall {
    fn new(
        kind: HigherOrderKind,
        sub_function: &FirstOrderFunction,
        args: Vec<ExpressionRef>,
    ) -> Result<Self> {
        let id = kind.id();
        let mut remaining = Vec::with_capacity(2);
        for (index, arg) in args.iter().enumerate().skip(1) {
            let Datatype::Bag(t) = arg.datatype() else {
                return Err(PolicyError::InvalidArguments {
                    function: id.to_string(),
                    reason: format!("arg #{index} must be a bag, got {}", arg.datatype()),
                });
            };
            remaining.push(t);
        }
        let sub_call = sub_function.new_call(Vec::new(), &remaining)?;
        Ok(Self {
            kind,
            args,
            sub_call,
        })
    }

    fn matches(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        x: &AttributeValue,
        y: &AttributeValue,
    ) -> EvalResult<bool> {
        let args = [x.clone(), y.clone()];
        as_bool(self.kind.id(), self.sub_call.evaluate(ctx, &args)?)
    }
}

impl FunctionCall for TwoBagCall {
    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn arguments(&self) -> &[ExpressionRef] {
        &self.args
    }

    fn evaluate(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        _remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        let id = self.kind.id();
        let first = evaluate_arg(id, 1, &self.args[1], ctx)?;
        let second = evaluate_arg(id, 2, &self.args[2], ctx)?;
        let (Some(a), Some(b)) = (first.as_bag(), second.as_bag()) else {
            return Err(Indeterminate::processing_error(format!(
                "{id}: expected two bags"
            )));
        };

        let result = match self.kind {
            HigherOrderKind::AllOfAny => {
                let mut all = true;
                for x in a {
                    if !self.any_match(ctx, x, b)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            HigherOrderKind::AnyOfAll => {
                let mut any = false;
                for x in a {
                    if self.all_match(ctx, x, b)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            _ => {
                let mut all = true;
                for x in a {
                    if !self.all_match(ctx, x, b)? {
                        all = false;
                        break;
                    }
                }
                all
            }
        };
        Ok(Value::from(result))
    }
}

impl TwoBagCall {
    fn any_match(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        x: &AttributeValue,
        b: &Bag,
    ) -> EvalResult<bool> {
        for y in b {
            if self.matches(ctx, x, y)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn all_match(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        x: &AttributeValue,
        b: &Bag,
    ) -> EvalResult<bool> {
        for y in b {
            if !self.matches(ctx, x, y)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    for kind in HigherOrderKind::ALL {
        registry.register(HigherOrderBagFunction::new(kind))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatusCode;
    use crate::expression::{ConstantExpression, Expression, FunctionExpression};
    use crate::function::{Function, FunctionSignature, Implementation};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> FunctionRegistry {
        FunctionRegistry::standard(8).unwrap()
    }

    fn function(id: &str) -> ExpressionRef {
        Arc::new(FunctionExpression::new(registry().get(id).unwrap()))
    }

    fn strings(values: &[&str]) -> ExpressionRef {
        Arc::new(ConstantExpression::new(Bag::new(
            AttributeType::String,
            values.iter().map(|s| AttributeValue::from(*s)).collect(),
        )))
    }

    fn ints(values: &[i64]) -> ExpressionRef {
        Arc::new(ConstantExpression::new(Bag::new(
            AttributeType::Integer,
            values.iter().map(|v| AttributeValue::Integer(*v)).collect(),
        )))
    }

    fn string(s: &str) -> ExpressionRef {
        Arc::new(ConstantExpression::new(AttributeValue::from(s)))
    }

    fn call(kind: HigherOrderKind, args: Vec<ExpressionRef>) -> Result<Box<dyn FunctionCall>> {
        HigherOrderBagFunction::new(kind).new_call(args)
    }

    #[derive(Debug)]
    struct MissingSubject;

    impl Expression for MissingSubject {
        fn datatype(&self) -> Datatype {
            Datatype::STRING
        }

        fn evaluate(&self, _ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
            Err(Indeterminate::missing_attribute("no subject"))
        }
    }

    /// Non-constant string counting its evaluations.
    #[derive(Debug)]
    struct Counted {
        value: &'static str,
        calls: Arc<AtomicUsize>,
    }

    impl Expression for Counted {
        fn datatype(&self) -> Datatype {
            Datatype::STRING
        }

        fn evaluate(&self, _ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(AttributeValue::from(self.value).into())
        }
    }

    const STRING_EQUAL: &str = "urn:oasis:names:tc:xacml:1.0:function:string-equal";
    const INTEGER_GT: &str = "urn:oasis:names:tc:xacml:1.0:function:integer-greater-than";

    #[test]
    fn test_any_of_and_all_of() {
        let any = call(
            HigherOrderKind::AnyOf,
            vec![function(STRING_EQUAL), string("b"), strings(&["a", "b"])],
        )
        .unwrap();
        assert_eq!(any.evaluate(None, &[]).unwrap(), Value::from(true));

        let all = call(
            HigherOrderKind::AllOf,
            vec![function(STRING_EQUAL), string("b"), strings(&["a", "b"])],
        )
        .unwrap();
        assert_eq!(all.evaluate(None, &[]).unwrap(), Value::from(false));

        let all_empty = call(
            HigherOrderKind::AllOf,
            vec![function(STRING_EQUAL), string("b"), strings(&[])],
        )
        .unwrap();
        assert_eq!(all_empty.evaluate(None, &[]).unwrap(), Value::from(true));
    }

    #[test]
    fn test_bag_position_matters() {
        // integer-greater-than(10, x): 10 > x for some x
        let before = call(
            HigherOrderKind::AllOf,
            vec![
                function(INTEGER_GT),
                Arc::new(ConstantExpression::new(AttributeValue::Integer(10))),
                ints(&[1, 2, 3]),
            ],
        )
        .unwrap();
        assert_eq!(before.evaluate(None, &[]).unwrap(), Value::from(true));

        // integer-greater-than(x, 10) for all x
        let after = call(
            HigherOrderKind::AllOf,
            vec![
                function(INTEGER_GT),
                ints(&[1, 2, 3]),
                Arc::new(ConstantExpression::new(AttributeValue::Integer(10))),
            ],
        )
        .unwrap();
        assert_eq!(after.evaluate(None, &[]).unwrap(), Value::from(false));
    }

    #[test]
    fn test_any_of_short_circuits() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counting_equal = FirstOrderFunction::new(
            "urn:test:counting-string-equal",
            Datatype::BOOLEAN,
            FunctionSignature::fixed([Datatype::STRING; 2]),
            Implementation::single_primitive(move |values| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from(values[0] == values[1]))
            }),
        )
        .unwrap();
        let f: ExpressionRef = Arc::new(FunctionExpression::new(Function::from(counting_equal)));
        let any = call(
            HigherOrderKind::AnyOf,
            vec![f, string("b"), strings(&["a", "b", "c", "d"])],
        )
        .unwrap();
        assert_eq!(any.evaluate(None, &[]).unwrap(), Value::from(true));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_any_of_any() {
        let found = call(
            HigherOrderKind::AnyOfAny,
            vec![function(STRING_EQUAL), strings(&["a", "b"]), strings(&["c", "b"])],
        )
        .unwrap();
        assert_eq!(found.evaluate(None, &[]).unwrap(), Value::from(true));

        let none = call(
            HigherOrderKind::AnyOfAny,
            vec![function(STRING_EQUAL), strings(&["a", "b"]), string("z")],
        )
        .unwrap();
        assert_eq!(none.evaluate(None, &[]).unwrap(), Value::from(false));

        let empty = call(
            HigherOrderKind::AnyOfAny,
            vec![function(STRING_EQUAL), strings(&[]), string("z")],
        )
        .unwrap();
        assert_eq!(empty.evaluate(None, &[]).unwrap(), Value::from(false));
    }

    #[test]
    fn test_two_bag_combinators() {
        let gt = || function(INTEGER_GT);
        let eval = |kind, a: &[i64], b: &[i64]| {
            call(kind, vec![gt(), ints(a), ints(b)])
                .unwrap()
                .evaluate(None, &[])
                .unwrap()
        };
        // every x in a greater than some y in b
        assert_eq!(eval(HigherOrderKind::AllOfAny, &[10, 20], &[1, 15]), Value::from(true));
        assert_eq!(eval(HigherOrderKind::AllOfAny, &[0, 20], &[1, 15]), Value::from(false));
        // some x in a greater than every y in b
        assert_eq!(eval(HigherOrderKind::AnyOfAll, &[3, 20], &[1, 15]), Value::from(true));
        assert_eq!(eval(HigherOrderKind::AnyOfAll, &[3, 5], &[1, 15]), Value::from(false));
        // every pair
        assert_eq!(eval(HigherOrderKind::AllOfAll, &[16, 20], &[1, 15]), Value::from(true));
        assert_eq!(eval(HigherOrderKind::AllOfAll, &[10, 20], &[1, 15]), Value::from(false));
        assert_eq!(eval(HigherOrderKind::AllOfAll, &[], &[1]), Value::from(true));
    }

    #[test]
    fn test_map() {
        let lower = function("urn:oasis:names:tc:xacml:1.0:function:string-normalize-to-lower-case");
        let map = call(HigherOrderKind::Map, vec![lower, strings(&["A", "b"])]).unwrap();
        assert_eq!(map.return_type(), AttributeType::String.bag());
        let value = map.evaluate(None, &[]).unwrap();
        assert_eq!(
            value.as_bag().unwrap(),
            &Bag::new(AttributeType::String, vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn test_construction_errors() {
        let err = call(HigherOrderKind::AnyOf, vec![string("x"), strings(&["a"])]).unwrap_err();
        assert!(matches!(err, PolicyError::NonConstantFunctionArgument { .. }));

        let err = call(HigherOrderKind::AnyOf, vec![function(ids::ANY_OF), strings(&["a"])])
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidSubFunction { .. }));

        let err = call(
            HigherOrderKind::AnyOf,
            vec![
                function("urn:oasis:names:tc:xacml:1.0:function:string-normalize-space"),
                strings(&["a"]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidSubFunction { .. }));

        let err = call(
            HigherOrderKind::AnyOf,
            vec![function(STRING_EQUAL), strings(&["a"]), strings(&["b"])],
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidArguments { .. }));

        let err = call(HigherOrderKind::AllOfAll, vec![function(STRING_EQUAL), strings(&["a"])])
            .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidArity { .. }));

        // sub-function arity is checked against the bound + runtime args
        let err = call(
            HigherOrderKind::AnyOf,
            vec![function(STRING_EQUAL), string("a"), string("b"), strings(&["c"])],
        )
        .unwrap_err();
        assert!(matches!(err, PolicyError::InvalidArity { .. }));
    }

    #[test]
    fn test_sub_function_failure_propagates() {
        let failing = FirstOrderFunction::new(
            "urn:test:fail",
            Datatype::BOOLEAN,
            FunctionSignature::fixed([Datatype::STRING]),
            Implementation::single_primitive(|_| Err(Indeterminate::processing_error("boom"))),
        )
        .unwrap();
        let f: ExpressionRef = Arc::new(FunctionExpression::new(Function::from(failing)));
        let err = call(HigherOrderKind::AnyOf, vec![f, strings(&["a"])])
            .unwrap()
            .evaluate(None, &[])
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::ProcessingError);
        assert_eq!(err.root_cause().message(), "boom");
    }

    #[test]
    fn test_failing_arg_before_empty_bag() {
        for kind in [HigherOrderKind::AnyOf, HigherOrderKind::AllOf] {
            let c = call(
                kind,
                vec![function(STRING_EQUAL), Arc::new(MissingSubject), strings(&[])],
            )
            .unwrap();
            let err = c.evaluate(None, &[]).unwrap_err();
            assert_eq!(err.status(), StatusCode::MissingAttribute);
            assert_eq!(err.message(), format!("{}: indeterminate arg #1", kind.id()));
        }

        let after = call(
            HigherOrderKind::AnyOf,
            vec![function(STRING_EQUAL), strings(&[]), Arc::new(MissingSubject)],
        )
        .unwrap();
        let err = after.evaluate(None, &[]).unwrap_err();
        assert_eq!(err.message(), format!("{}: indeterminate arg #2", ids::ANY_OF));
    }

    #[test]
    fn test_non_constant_arg_evaluated_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let subject: ExpressionRef = Arc::new(Counted {
            value: "c",
            calls: calls.clone(),
        });
        let all = call(
            HigherOrderKind::AllOf,
            vec![function(STRING_EQUAL), subject.clone(), strings(&["c", "c", "c"])],
        )
        .unwrap();
        assert_eq!(all.evaluate(None, &[]).unwrap(), Value::from(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let empty = call(
            HigherOrderKind::AnyOf,
            vec![function(STRING_EQUAL), subject, strings(&[])],
        )
        .unwrap();
        assert_eq!(empty.evaluate(None, &[]).unwrap(), Value::from(false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_any_of_any_evaluates_args_after_empty_bag() {
        let c = call(
            HigherOrderKind::AnyOfAny,
            vec![function(STRING_EQUAL), strings(&[]), Arc::new(MissingSubject)],
        )
        .unwrap();
        let err = c.evaluate(None, &[]).unwrap_err();
        assert_eq!(err.status(), StatusCode::MissingAttribute);
        assert_eq!(err.message(), format!("{}: indeterminate arg #2", ids::ANY_OF_ANY));
    }
}
