//! Conditions: boolean expressions gating a rule.

use crate::context::EvaluationContext;
use crate::datatype::Datatype;
use crate::error::{EvalResult, Indeterminate, PolicyError, Result};
use crate::expression::{evaluate_attribute, ExpressionRef};
use serde::Serialize;

/// Three-valued result of a condition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    True,
    False,
    Indeterminate(Indeterminate),
}

impl Outcome {
    pub fn is_true(&self) -> bool {
        matches!(self, Outcome::True)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Outcome::Indeterminate(_))
    }

    pub fn error(&self) -> Option<&Indeterminate> {
        match self {
            Outcome::Indeterminate(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bool> for Outcome {
    fn from(b: bool) -> Self {
        if b {
            Outcome::True
        } else {
            Outcome::False
        }
    }
}

impl From<EvalResult<bool>> for Outcome {
    fn from(result: EvalResult<bool>) -> Self {
        match result {
            Ok(b) => b.into(),
            Err(e) => Outcome::Indeterminate(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Condition {
    expression: ExpressionRef,
}

impl Condition {
    /// Fails unless `expression` returns a single boolean.
    pub fn new(expression: ExpressionRef) -> Result<Self> {
        let datatype = expression.datatype();
        if datatype != Datatype::BOOLEAN {
            return Err(PolicyError::InvalidExpression(format!(
                "condition must be of type {}, got {datatype}",
                Datatype::BOOLEAN
            )));
        }
        Ok(Self { expression })
    }

    pub fn expression(&self) -> &ExpressionRef {
        &self.expression
    }

    pub fn evaluate(&self, ctx: Option<&dyn EvaluationContext>) -> EvalResult<bool> {
        let value = evaluate_attribute(self.expression.as_ref(), ctx)?;
        value.as_bool().ok_or_else(|| {
            Indeterminate::processing_error(format!(
                "condition returned {}, expected a boolean",
                value.attribute_type()
            ))
        })
    }

    pub fn outcome(&self, ctx: Option<&dyn EvaluationContext>) -> Outcome {
        self.evaluate(ctx).into()
    }
}
