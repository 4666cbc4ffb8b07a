//! PDP evaluation core
//!
//! The expression layer of an attribute-based Policy Decision Point:
//! datatypes and values, bags, attribute designators and selectors,
//! variables, and the standard function library with its higher-order
//! bag functions.
//!
//! Expressions are checked when they are built and evaluate to a value or
//! to an [`Indeterminate`] error, never to a panic.

pub mod bag;
pub mod condition;
pub mod config;
pub mod context;
pub mod datatype;
pub mod error;
pub mod expression;
pub mod factory;
pub mod function;
pub mod value;

pub use bag::{AttributeBag, Bag};
pub use condition::{Condition, Outcome};
pub use config::EngineConfig;
pub use context::{AttributeFqn, EvaluationContext, RequestContext};
pub use datatype::{AttributeType, Datatype};
pub use error::{EvalResult, Indeterminate, PolicyError, Result, StatusCode};
pub use expression::{Expression, ExpressionRef};
pub use factory::ExpressionFactory;
pub use function::{Function, FunctionCall, FunctionRegistry};
pub use value::{AttributeValue, Value};

/// Version of the evaluation core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::bag::Bag;
    pub use crate::condition::{Condition, Outcome};
    pub use crate::config::EngineConfig;
    pub use crate::context::{category, AttributeFqn, EvaluationContext, RequestContext};
    pub use crate::datatype::{AttributeType, Datatype};
    pub use crate::error::{EvalResult, Indeterminate, PolicyError, Result, StatusCode};
    pub use crate::expression::{Expression, ExpressionRef};
    pub use crate::factory::ExpressionFactory;
    pub use crate::function::{ids, Function, FunctionRegistry};
    pub use crate::value::{AttributeValue, Value};
}
