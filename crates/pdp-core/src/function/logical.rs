//! Logical functions: `or`, `and`, `n-of`, `not`.
//!
//! `or`, `and` and `n-of` evaluate their arguments lazily, left to right,
//! and stop as soon as the result is decided. An indeterminate argument
//! does not stop them: a later argument may still decide the result, and
//! the first failure is returned only when none does.

use super::first_order::{primitive_arg, CallFactory, FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::{ids, FunctionCall, FunctionRegistry};
use crate::context::EvaluationContext;
use crate::datatype::{cast, AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::expression::ExpressionRef;
use crate::value::{AttributeValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connective {
    Or,
    And,
    NOf,
}

#[derive(Debug)]
struct LazyLogical(Connective);

impl CallFactory for LazyLogical {
    fn new_call(
        &self,
        function: &FirstOrderFunction,
        args: Vec<ExpressionRef>,
        remaining: &[AttributeType],
    ) -> Result<Box<dyn FunctionCall>> {
        Ok(Box::new(LogicalCall {
            connective: self.0,
            function_id: function.id().to_string(),
            arg_count: args.len() + remaining.len(),
            args,
        }))
    }
}

#[derive(Debug)]
struct LogicalCall {
    connective: Connective,
    function_id: String,
    args: Vec<ExpressionRef>,
    arg_count: usize,
}

impl LogicalCall {
    fn boolean_arg(
        &self,
        index: usize,
        ctx: Option<&dyn EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> EvalResult<bool> {
        let value = primitive_arg(&self.function_id, &self.args, remaining, index, ctx)?;
        cast::<bool>(&value)
            .copied()
            .map_err(|e| Indeterminate::for_arg(&self.function_id, index, e))
    }

    /// `or` / `and`: `decisive` is the argument value deciding the result.
    fn short_circuit(
        &self,
        decisive: bool,
        ctx: Option<&dyn EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        let mut first_error = None;
        for index in 0..self.arg_count {
            match self.boolean_arg(index, ctx, remaining) {
                Ok(b) if b == decisive => return Ok(Value::from(decisive)),
                Ok(_) => {}
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(Value::from(!decisive)),
        }
    }

    fn n_of(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        let n = primitive_arg(&self.function_id, &self.args, remaining, 0, ctx)?;
        let n = *cast::<i64>(&n).map_err(|e| Indeterminate::for_arg(&self.function_id, 0, e))?;
        let candidates = self.arg_count - 1;
        let needed = usize::try_from(n).map_err(|_| {
            Indeterminate::processing_error(format!("{}: negative count {n}", self.function_id))
        })?;
        if needed > candidates {
            return Err(Indeterminate::processing_error(format!(
                "{}: {needed} true args required, only {candidates} given",
                self.function_id
            )));
        }
        if needed == 0 {
            return Ok(Value::from(true));
        }

        let mut trues = 0;
        let mut first_error: Option<Indeterminate> = None;
        let mut failures = 0;
        for index in 1..self.arg_count {
            match self.boolean_arg(index, ctx, remaining) {
                Ok(true) => {
                    trues += 1;
                    if trues == needed {
                        return Ok(Value::from(true));
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    failures += 1;
                    first_error.get_or_insert(e);
                }
            }
            // even if every failure and unevaluated arg were true
            let unevaluated = self.arg_count - 1 - index;
            if trues + failures + unevaluated < needed {
                return Ok(Value::from(false));
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(Value::from(false)),
        }
    }
}

impl FunctionCall for LogicalCall {
    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn arguments(&self) -> &[ExpressionRef] {
        &self.args
    }

    fn evaluate(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        match self.connective {
            Connective::Or => self.short_circuit(true, ctx, remaining),
            Connective::And => self.short_circuit(false, ctx, remaining),
            Connective::NOf => self.n_of(ctx, remaining),
        }
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry) -> Result<()> {
    for (id, connective) in [(ids::OR, Connective::Or), (ids::AND, Connective::And)] {
        registry.register(FirstOrderFunction::new(
            id,
            Datatype::BOOLEAN,
            FunctionSignature::varargs([Datatype::BOOLEAN]),
            Implementation::custom(LazyLogical(connective)),
        )?)?;
    }
    registry.register(FirstOrderFunction::new(
        ids::N_OF,
        Datatype::BOOLEAN,
        FunctionSignature::varargs([Datatype::INTEGER, Datatype::BOOLEAN]),
        Implementation::custom(LazyLogical(Connective::NOf)),
    )?)?;
    registry.register(FirstOrderFunction::new(
        ids::NOT,
        Datatype::BOOLEAN,
        FunctionSignature::fixed([Datatype::BOOLEAN]),
        Implementation::single_primitive(|values| Ok(Value::from(!*cast::<bool>(&values[0])?))),
    )?)?;
    Ok(())
}
