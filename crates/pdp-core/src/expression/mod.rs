//! Expressions: the uniform "evaluate in context to a typed value" contract
//! and its variants.

pub mod designator;
pub mod selector;
pub mod variable;

pub use designator::{AttributeDesignator, NamedAttributeProvider, RequestAttributeProvider};
pub use selector::{AttributeSelector, CompiledXPath, XPathCompiler};
pub use variable::{VariableReference, VariableRegistry};

use crate::bag::Bag;
use crate::context::EvaluationContext;
use crate::datatype::Datatype;
use crate::error::{EvalResult, Indeterminate};
use crate::function::{Function, FunctionCall};
use crate::value::{AttributeValue, Value};
use std::fmt;
use std::sync::Arc;

/// A node of an expression tree.
///
/// Built once, then evaluated any number of times, possibly from many
/// threads at once; evaluation never mutates the tree.
pub trait Expression: fmt::Debug + Send + Sync {
    /// Datatype of every value this expression evaluates to.
    fn datatype(&self) -> Datatype;

    /// Context-independent value, when known at construction.
    fn value(&self) -> Option<&Value> {
        None
    }

    /// Evaluates the expression. `ctx` is `None` when no request context is
    /// available, which only attribute lookups care about.
    fn evaluate(&self, ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value>;

    /// Appends the variables this expression refers to directly, without
    /// following them: identifier and longest reference chain of each.
    fn collect_variable_references(&self, _refs: &mut Vec<(String, usize)>) {}
}

/// Shared handle to an expression.
pub type ExpressionRef = Arc<dyn Expression>;

/// Evaluates an expression expected to yield a single attribute value.
pub fn evaluate_attribute(
    expression: &dyn Expression,
    ctx: Option<&dyn EvaluationContext>,
) -> EvalResult<AttributeValue> {
    match expression.evaluate(ctx)? {
        Value::Attribute(v) => Ok(v),
        other => Err(Indeterminate::processing_error(format!(
            "expected an attribute value, got {}",
            other.datatype()
        ))),
    }
}

/// Evaluates an expression expected to yield a bag.
pub fn evaluate_bag(
    expression: &dyn Expression,
    ctx: Option<&dyn EvaluationContext>,
) -> EvalResult<Bag> {
    match expression.evaluate(ctx)? {
        Value::Bag(b) => Ok(b),
        other => Err(Indeterminate::processing_error(format!(
            "expected a bag, got {}",
            other.datatype()
        ))),
    }
}

/// Post-condition on the bag returned by a designator or selector, picked
/// once at construction from the MustBePresent flag.
pub(crate) type BagValidator = fn(&Bag, &str) -> EvalResult<()>;

pub(crate) fn bag_validator(must_be_present: bool) -> BagValidator {
    if must_be_present {
        require_non_empty
    } else {
        accept_any
    }
}

fn accept_any(_bag: &Bag, _name: &str) -> EvalResult<()> {
    Ok(())
}

fn require_non_empty(bag: &Bag, name: &str) -> EvalResult<()> {
    if !bag.is_empty() {
        return Ok(());
    }
    let err = Indeterminate::missing_attribute(format!(
        "no value for {name} and MustBePresent is true"
    ));
    Err(match bag.reason_why_empty() {
        Some(reason) => err.with_cause(reason.clone()),
        None => err,
    })
}

/// Literal value.
#[derive(Debug, Clone)]
pub struct ConstantExpression {
    value: Value,
}

impl ConstantExpression {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl Expression for ConstantExpression {
    fn datatype(&self) -> Datatype {
        self.value.datatype()
    }

    fn value(&self) -> Option<&Value> {
        Some(&self.value)
    }

    fn evaluate(&self, _ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
        Ok(self.value.clone())
    }
}

/// A function used as a value, as the first argument of a higher-order
/// function.
#[derive(Debug, Clone)]
pub struct FunctionExpression {
    value: Value,
}

impl FunctionExpression {
    pub fn new(function: Function) -> Self {
        Self {
            value: Value::Function(function),
        }
    }

    pub fn function(&self) -> Option<&Function> {
        self.value.as_function()
    }
}

impl Expression for FunctionExpression {
    fn datatype(&self) -> Datatype {
        Datatype::Function
    }

    fn value(&self) -> Option<&Value> {
        Some(&self.value)
    }

    fn evaluate(&self, _ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
        Ok(self.value.clone())
    }
}

/// Function application: an expression around a bound [`FunctionCall`].
#[derive(Debug)]
pub struct Apply {
    function_id: String,
    call: Box<dyn FunctionCall>,
}

impl Apply {
    pub fn new(function_id: impl Into<String>, call: Box<dyn FunctionCall>) -> Self {
        Self {
            function_id: function_id.into(),
            call,
        }
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }
}

impl Expression for Apply {
    fn datatype(&self) -> Datatype {
        self.call.return_type()
    }

    fn evaluate(&self, ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
        self.call.evaluate(ctx, &[])
    }

    fn collect_variable_references(&self, refs: &mut Vec<(String, usize)>) {
        for arg in self.call.arguments() {
            arg.collect_variable_references(refs);
        }
    }
}
