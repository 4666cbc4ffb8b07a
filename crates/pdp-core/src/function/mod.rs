//! Functions and function calls.
//!
//! A [`Function`] is a named, type-checked callable. Binding it to argument
//! expressions with [`Function::new_call`] validates arity and argument
//! datatypes once and yields a [`FunctionCall`] ready to be evaluated any
//! number of times.

pub mod arithmetic;
pub mod bag;
pub mod comparison;
pub mod conversion;
pub mod equality;
pub mod first_order;
pub mod higher_order;
pub mod logical;
pub mod regex;
pub mod set;
pub mod signature;
pub mod string;

pub use first_order::{CallFactory, FirstOrderFunction, Implementation};
pub use higher_order::{HigherOrderBagFunction, HigherOrderKind};
pub use self::regex::RegexCache;
pub use signature::{ArgShape, FunctionSignature};

use crate::context::EvaluationContext;
use crate::datatype::Datatype;
use crate::error::{EvalResult, PolicyError, Result};
use crate::expression::ExpressionRef;
use crate::value::{AttributeValue, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const FUNCTION_PREFIX_1_0: &str = "urn:oasis:names:tc:xacml:1.0:function:";
pub const FUNCTION_PREFIX_2_0: &str = "urn:oasis:names:tc:xacml:2.0:function:";
pub const FUNCTION_PREFIX_3_0: &str = "urn:oasis:names:tc:xacml:3.0:function:";

/// Identifiers of the standard functions that are not type-specific.
pub mod ids {
    pub const OR: &str = "urn:oasis:names:tc:xacml:1.0:function:or";
    pub const AND: &str = "urn:oasis:names:tc:xacml:1.0:function:and";
    pub const N_OF: &str = "urn:oasis:names:tc:xacml:1.0:function:n-of";
    pub const NOT: &str = "urn:oasis:names:tc:xacml:1.0:function:not";

    pub const ANY_OF: &str = "urn:oasis:names:tc:xacml:3.0:function:any-of";
    pub const ALL_OF: &str = "urn:oasis:names:tc:xacml:3.0:function:all-of";
    pub const ANY_OF_ANY: &str = "urn:oasis:names:tc:xacml:3.0:function:any-of-any";
    pub const ALL_OF_ANY: &str = "urn:oasis:names:tc:xacml:1.0:function:all-of-any";
    pub const ANY_OF_ALL: &str = "urn:oasis:names:tc:xacml:1.0:function:any-of-all";
    pub const ALL_OF_ALL: &str = "urn:oasis:names:tc:xacml:1.0:function:all-of-all";
    pub const MAP: &str = "urn:oasis:names:tc:xacml:3.0:function:map";

    pub const STRING_REGEXP_MATCH: &str = "urn:oasis:names:tc:xacml:1.0:function:string-regexp-match";
    pub const ANY_URI_REGEXP_MATCH: &str =
        "urn:oasis:names:tc:xacml:2.0:function:anyURI-regexp-match";
}

/// Evaluation-ready binding of a function to its argument expressions.
pub trait FunctionCall: fmt::Debug + Send + Sync {
    fn return_type(&self) -> Datatype;

    /// Argument expressions bound at construction.
    fn arguments(&self) -> &[ExpressionRef];

    /// Evaluates the call. `remaining` holds the values of the trailing
    /// arguments declared as runtime-only when the call was built; it is
    /// empty for a call used directly in an expression tree.
    fn evaluate(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> EvalResult<Value>;
}

/// A function, also usable as a value passed to a higher-order function.
#[derive(Clone)]
pub enum Function {
    FirstOrder(Arc<FirstOrderFunction>),
    HigherOrder(Arc<HigherOrderBagFunction>),
}

impl Function {
    pub fn id(&self) -> &str {
        match self {
            Function::FirstOrder(f) => f.id(),
            Function::HigherOrder(f) => f.id(),
        }
    }

    /// Declared return datatype; `None` when it depends on the arguments,
    /// as for `map`.
    pub fn return_type(&self) -> Option<Datatype> {
        match self {
            Function::FirstOrder(f) => Some(f.return_type()),
            Function::HigherOrder(f) => f.kind().return_type(),
        }
    }

    /// Binds the function to argument expressions, checking arity and
    /// argument datatypes.
    pub fn new_call(&self, args: Vec<ExpressionRef>) -> Result<Box<dyn FunctionCall>> {
        match self {
            Function::FirstOrder(f) => f.new_call(args, &[]),
            Function::HigherOrder(f) => f.new_call(args),
        }
    }

    pub fn as_first_order(&self) -> Option<&Arc<FirstOrderFunction>> {
        match self {
            Function::FirstOrder(f) => Some(f),
            Function::HigherOrder(_) => None,
        }
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::FirstOrder(_) => write!(f, "FirstOrder({})", self.id()),
            Function::HigherOrder(_) => write!(f, "HigherOrder({})", self.id()),
        }
    }
}

impl From<FirstOrderFunction> for Function {
    fn from(f: FirstOrderFunction) -> Self {
        Function::FirstOrder(Arc::new(f))
    }
}

impl From<HigherOrderBagFunction> for Function {
    fn from(f: HigherOrderBagFunction) -> Self {
        Function::HigherOrder(Arc::new(f))
    }
}

/// Functions by identifier, with the regex cache shared by the regex
/// functions it registers.
#[derive(Debug)]
pub struct FunctionRegistry {
    functions: HashMap<String, Function>,
    regex_cache: Arc<RegexCache>,
}

impl FunctionRegistry {
    /// Registry without any function.
    pub fn new(regex_cache_capacity: usize) -> Self {
        Self {
            functions: HashMap::new(),
            regex_cache: Arc::new(RegexCache::new(regex_cache_capacity)),
        }
    }

    /// Registry holding the standard function library.
    pub fn standard(regex_cache_capacity: usize) -> Result<Self> {
        let mut registry = Self::new(regex_cache_capacity);
        equality::register(&mut registry)?;
        comparison::register(&mut registry)?;
        arithmetic::register(&mut registry)?;
        string::register(&mut registry)?;
        conversion::register(&mut registry)?;
        logical::register(&mut registry)?;
        let cache = registry.regex_cache.clone();
        self::regex::register(&mut registry, cache)?;
        bag::register(&mut registry)?;
        set::register(&mut registry)?;
        higher_order::register(&mut registry)?;
        tracing::debug!(functions = registry.len(), "standard function library registered");
        Ok(registry)
    }

    pub fn register(&mut self, function: impl Into<Function>) -> Result<()> {
        let function = function.into();
        let id = function.id().to_string();
        if self.functions.contains_key(&id) {
            return Err(PolicyError::DuplicateFunction(id));
        }
        self.functions.insert(id, function);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Function> {
        self.functions
            .get(id)
            .cloned()
            .ok_or_else(|| PolicyError::UnknownFunction(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.functions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// Registered identifiers, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn regex_cache(&self) -> &Arc<RegexCache> {
        &self.regex_cache
    }
}
