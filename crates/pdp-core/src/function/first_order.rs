//! First-order functions and the eager call engine.
//!
//! A first-order function declares its parameter list up front. Its shape
//! ([`ArgShape`]) selects one of four eager strategies; all of them
//! evaluate the arguments strictly left to right, stop at the first
//! failure and report it as an indeterminate argument of the call.

use super::signature::{ArgShape, FunctionSignature};
use super::FunctionCall;
use crate::bag::Bag;
use crate::context::EvaluationContext;
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, PolicyError, Result};
use crate::expression::{evaluate_attribute, evaluate_bag, ExpressionRef};
use crate::value::{AttributeValue, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Computes a result from single values, in parameter order.
pub type PrimitiveKernel = Arc<dyn Fn(&[AttributeValue]) -> EvalResult<Value> + Send + Sync>;

/// Computes a result from bags, in parameter order.
pub type BagKernel = Arc<dyn Fn(&[Bag]) -> EvalResult<Value> + Send + Sync>;

/// Computes a result from single values and bags, in parameter order.
pub type PartlyBagKernel = Arc<dyn Fn(&[Value]) -> EvalResult<Value> + Send + Sync>;

/// Builds calls of a function whose evaluation does not fit the eager
/// strategies, e.g. lazy logical functions or calls pre-compiling a
/// constant argument. Arity and argument types are checked before.
pub trait CallFactory: fmt::Debug + Send + Sync {
    fn new_call(
        &self,
        function: &FirstOrderFunction,
        args: Vec<ExpressionRef>,
        remaining: &[AttributeType],
    ) -> Result<Box<dyn FunctionCall>>;
}

/// Body of a first-order function. The variant must agree with the shape
/// of the signature; [`Implementation::Custom`] accepts any shape.
#[derive(Clone)]
pub enum Implementation {
    SinglePrimitive(PrimitiveKernel),
    MultiPrimitive(PrimitiveKernel),
    Bags(BagKernel),
    PartlyBag(PartlyBagKernel),
    Custom(Arc<dyn CallFactory>),
}

impl Implementation {
    pub fn single_primitive<F>(kernel: F) -> Self
    where
        F: Fn(&[AttributeValue]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Implementation::SinglePrimitive(Arc::new(kernel))
    }

    pub fn multi_primitive<F>(kernel: F) -> Self
    where
        F: Fn(&[AttributeValue]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Implementation::MultiPrimitive(Arc::new(kernel))
    }

    pub fn bags<F>(kernel: F) -> Self
    where
        F: Fn(&[Bag]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Implementation::Bags(Arc::new(kernel))
    }

    pub fn partly_bag<F>(kernel: F) -> Self
    where
        F: Fn(&[Value]) -> EvalResult<Value> + Send + Sync + 'static,
    {
        Implementation::PartlyBag(Arc::new(kernel))
    }

    pub fn custom(factory: impl CallFactory + 'static) -> Self {
        Implementation::Custom(Arc::new(factory))
    }

    fn kind(&self) -> &'static str {
        match self {
            Implementation::SinglePrimitive(_) => "single-primitive",
            Implementation::MultiPrimitive(_) => "multi-primitive",
            Implementation::Bags(_) => "bag",
            Implementation::PartlyBag(_) => "partly-bag",
            Implementation::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Implementation::Custom(factory) => write!(f, "Custom({factory:?})"),
            other => f.write_str(other.kind()),
        }
    }
}

fn check_implementation(
    function: &str,
    shape: ArgShape,
    implementation: &Implementation,
) -> Result<()> {
    let consistent = matches!(
        (shape, implementation),
        (ArgShape::SinglePrimitive(_), Implementation::SinglePrimitive(_))
            | (ArgShape::MultiPrimitive, Implementation::MultiPrimitive(_))
            | (ArgShape::Bags, Implementation::Bags(_))
            | (ArgShape::PartlyBag, Implementation::PartlyBag(_))
            | (_, Implementation::Custom(_))
    );
    if consistent {
        Ok(())
    } else {
        Err(PolicyError::InvalidSignature {
            function: function.to_string(),
            reason: format!(
                "{} implementation for {shape:?} parameters",
                implementation.kind()
            ),
        })
    }
}

/// Function with a parameter list known when it is defined.
#[derive(Debug)]
pub struct FirstOrderFunction {
    id: String,
    return_type: Datatype,
    signature: FunctionSignature,
    shape: ArgShape,
    implementation: Implementation,
}

impl FirstOrderFunction {
    pub fn new(
        id: impl Into<String>,
        return_type: Datatype,
        signature: FunctionSignature,
        implementation: Implementation,
    ) -> Result<Self> {
        let id = id.into();
        if return_type == Datatype::Function {
            return Err(PolicyError::InvalidSignature {
                function: id,
                reason: "a first-order function cannot return a function".to_string(),
            });
        }
        let shape = signature.shape(&id)?;
        check_implementation(&id, shape, &implementation)?;
        Ok(Self {
            id,
            return_type,
            signature,
            shape,
            implementation,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn return_type(&self) -> Datatype {
        self.return_type
    }

    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    pub fn shape(&self) -> ArgShape {
        self.shape
    }

    /// Binds the function to `args`, followed by runtime-only arguments of
    /// types `remaining` whose values are passed to each evaluation.
    pub fn new_call(
        &self,
        args: Vec<ExpressionRef>,
        remaining: &[AttributeType],
    ) -> Result<Box<dyn FunctionCall>> {
        let arg_types: Vec<Datatype> = args.iter().map(|a| a.datatype()).collect();
        let param_types = self.signature.check_call(&self.id, &arg_types, remaining)?;
        debug!(
            function = %self.id,
            args = args.len(),
            remaining = remaining.len(),
            "new function call"
        );

        let kernel = match &self.implementation {
            Implementation::Custom(factory) => return factory.new_call(self, args, remaining),
            Implementation::SinglePrimitive(k) | Implementation::MultiPrimitive(k) => {
                Kernel::Primitive(k.clone())
            }
            Implementation::Bags(k) => Kernel::Bags(k.clone()),
            Implementation::PartlyBag(k) => Kernel::PartlyBag(k.clone()),
        };
        Ok(Box::new(EagerCall {
            function_id: self.id.clone(),
            return_type: self.return_type,
            args,
            param_types,
            kernel,
        }))
    }
}

#[derive(Clone)]
enum Kernel {
    Primitive(PrimitiveKernel),
    Bags(BagKernel),
    PartlyBag(PartlyBagKernel),
}

/// Call of a first-order function evaluating every argument before
/// running the function body.
struct EagerCall {
    function_id: String,
    return_type: Datatype,
    args: Vec<ExpressionRef>,
    // expected datatype of every position, remaining args included
    param_types: Vec<Datatype>,
    kernel: Kernel,
}

impl fmt::Debug for EagerCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EagerCall")
            .field("function_id", &self.function_id)
            .field("args", &self.args)
            .finish()
    }
}

impl EagerCall {
    fn wrap(&self, index: usize) -> impl Fn(Indeterminate) -> Indeterminate + '_ {
        move |e| Indeterminate::for_arg(&self.function_id, index, e)
    }
}

impl FunctionCall for EagerCall {
    fn return_type(&self) -> Datatype {
        self.return_type
    }

    fn arguments(&self) -> &[ExpressionRef] {
        &self.args
    }

    fn evaluate(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        check_remaining(&self.function_id, &self.param_types[self.args.len()..], remaining)?;

        let result = match &self.kernel {
            Kernel::Primitive(kernel) => {
                let mut values = Vec::with_capacity(self.param_types.len());
                for (index, arg) in self.args.iter().enumerate() {
                    values.push(evaluate_attribute(arg.as_ref(), ctx).map_err(self.wrap(index))?);
                }
                values.extend_from_slice(remaining);
                kernel(&values)
            }
            Kernel::Bags(kernel) => {
                let mut bags = Vec::with_capacity(self.args.len());
                for (index, arg) in self.args.iter().enumerate() {
                    bags.push(evaluate_bag(arg.as_ref(), ctx).map_err(self.wrap(index))?);
                }
                kernel(&bags)
            }
            Kernel::PartlyBag(kernel) => {
                let mut values = self.return_type.new_array(self.param_types.len());
                for (index, (arg, expected)) in self.args.iter().zip(&self.param_types).enumerate() {
                    let value = if expected.is_bag() {
                        evaluate_bag(arg.as_ref(), ctx).map(Value::Bag)
                    } else {
                        evaluate_attribute(arg.as_ref(), ctx).map(Value::Attribute)
                    };
                    values.push(value.map_err(self.wrap(index))?);
                }
                values.extend(remaining.iter().cloned().map(Value::Attribute));
                kernel(&values)
            }
        };
        result.map_err(|e| {
            Indeterminate::new(e.status(), format!("{}: evaluation failed", self.function_id))
                .with_cause(e)
        })
    }
}

/// Checks runtime-only argument values against their declared types.
pub(crate) fn check_remaining(
    function: &str,
    expected: &[Datatype],
    remaining: &[AttributeValue],
) -> EvalResult<()> {
    if expected.len() != remaining.len() {
        return Err(Indeterminate::processing_error(format!(
            "{function}: expected {} remaining args, got {}",
            expected.len(),
            remaining.len()
        )));
    }
    for (index, (t, v)) in expected.iter().zip(remaining).enumerate() {
        if *t != Datatype::Attribute(v.attribute_type()) {
            return Err(Indeterminate::processing_error(format!(
                "{function}: invalid remaining arg #{index}: expected {t}, got {}",
                v.attribute_type()
            )));
        }
    }
    Ok(())
}

/// Value of primitive argument `index` of a call whose static arguments
/// are followed by runtime-only ones.
pub(crate) fn primitive_arg(
    function: &str,
    args: &[ExpressionRef],
    remaining: &[AttributeValue],
    index: usize,
    ctx: Option<&dyn EvaluationContext>,
) -> EvalResult<AttributeValue> {
    match args.get(index) {
        Some(arg) => evaluate_attribute(arg.as_ref(), ctx)
            .map_err(|e| Indeterminate::for_arg(function, index, e)),
        None => remaining.get(index - args.len()).cloned().ok_or_else(|| {
            Indeterminate::processing_error(format!("{function}: no arg #{index}"))
        }),
    }
}
