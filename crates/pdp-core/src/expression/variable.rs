//! Variable definitions and references.

use super::{Expression, ExpressionRef};
use crate::context::EvaluationContext;
use crate::datatype::Datatype;
use crate::error::{EvalResult, PolicyError, Result};
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Reference to a defined variable. Evaluates the variable's expression.
#[derive(Debug)]
pub struct VariableReference {
    id: String,
    expression: ExpressionRef,
    longest_chain: usize,
}

impl VariableReference {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn expression(&self) -> &ExpressionRef {
        &self.expression
    }

    /// Length of the longest chain of variable references reachable from
    /// this variable's expression; 0 when it references no variable.
    pub fn longest_chain(&self) -> usize {
        self.longest_chain
    }
}

impl Expression for VariableReference {
    fn datatype(&self) -> Datatype {
        self.expression.datatype()
    }

    fn value(&self) -> Option<&Value> {
        self.expression.value()
    }

    fn evaluate(&self, ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
        self.expression.evaluate(ctx)
    }

    fn collect_variable_references(&self, refs: &mut Vec<(String, usize)>) {
        refs.push((self.id.clone(), self.longest_chain));
    }
}

/// Variables defined so far, with their reference chain lengths.
///
/// A variable may only reference variables defined before it, so chains
/// are computed once at definition and cycles cannot be built.
#[derive(Debug, Default)]
pub struct VariableRegistry {
    variables: HashMap<String, Arc<VariableReference>>,
    max_depth: Option<usize>,
}

impl VariableRegistry {
    pub fn new(max_depth: Option<usize>) -> Self {
        Self {
            variables: HashMap::new(),
            max_depth,
        }
    }

    /// Defines a variable and returns its longest reference chain.
    pub fn define(&mut self, id: impl Into<String>, expression: ExpressionRef) -> Result<usize> {
        let id = id.into();
        if self.variables.contains_key(&id) {
            return Err(PolicyError::DuplicateVariable(id));
        }

        let mut refs = Vec::new();
        expression.collect_variable_references(&mut refs);
        // chains come from the references themselves, which outlive removal
        let longest_chain = refs
            .iter()
            .map(|(_, chain)| chain + 1)
            .max()
            .unwrap_or(0);
        if let Some(max) = self.max_depth {
            if longest_chain > max {
                return Err(PolicyError::VariableDepthExceeded {
                    variable: id,
                    depth: longest_chain,
                    max,
                });
            }
        }

        debug!(variable = %id, longest_chain, "defined variable");
        let reference = Arc::new(VariableReference {
            id: id.clone(),
            expression,
            longest_chain,
        });
        self.variables.insert(id, reference);
        Ok(longest_chain)
    }

    /// Reference expression to a defined variable.
    pub fn get(&self, id: &str) -> Result<ExpressionRef> {
        self.variables
            .get(id)
            .map(|v| v.clone() as ExpressionRef)
            .ok_or_else(|| PolicyError::UnknownVariable(id.to_string()))
    }

    /// Removes a variable, e.g. when the policy defining it goes out of
    /// scope. References already built keep working.
    pub fn remove(&mut self, id: &str) -> Option<Arc<VariableReference>> {
        self.variables.remove(id)
    }

    pub fn longest_chain(&self, id: &str) -> Result<usize> {
        self.variables
            .get(id)
            .map(|v| v.longest_chain)
            .ok_or_else(|| PolicyError::UnknownVariable(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.variables.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::ConstantExpression;
    use crate::value::AttributeValue;

    fn constant(value: i64) -> ExpressionRef {
        Arc::new(ConstantExpression::new(AttributeValue::Integer(value)))
    }

    /// Expression referencing several variables, standing in for an apply.
    #[derive(Debug)]
    struct Refs(Vec<ExpressionRef>);

    impl Expression for Refs {
        fn datatype(&self) -> Datatype {
            Datatype::INTEGER
        }

        fn evaluate(&self, _ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
            Ok(Value::from(AttributeValue::Integer(0)))
        }

        fn collect_variable_references(&self, refs: &mut Vec<(String, usize)>) {
            for e in &self.0 {
                e.collect_variable_references(refs);
            }
        }
    }

    #[test]
    fn test_longest_chain() {
        let mut vars = VariableRegistry::default();
        assert_eq!(vars.define("a", constant(1)).unwrap(), 0);
        assert_eq!(vars.define("b", vars.get("a").unwrap()).unwrap(), 1);
        let c = Arc::new(Refs(vec![vars.get("a").unwrap(), vars.get("b").unwrap()]));
        assert_eq!(vars.define("c", c).unwrap(), 2);
        assert_eq!(vars.longest_chain("c").unwrap(), 2);
    }

    #[test]
    fn test_max_depth() {
        let mut vars = VariableRegistry::new(Some(1));
        vars.define("a", constant(1)).unwrap();
        vars.define("b", vars.get("a").unwrap()).unwrap();
        let err = vars.define("c", vars.get("b").unwrap()).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::VariableDepthExceeded { depth: 2, max: 1, .. }
        ));
        assert!(!vars.contains("c"));
    }

    #[test]
    fn test_reference_delegates() {
        let mut vars = VariableRegistry::default();
        vars.define("limit", constant(10)).unwrap();
        let reference = vars.get("limit").unwrap();
        assert_eq!(reference.datatype(), Datatype::INTEGER);
        assert_eq!(
            reference.value(),
            Some(&Value::from(AttributeValue::Integer(10)))
        );
        assert_eq!(
            reference.evaluate(None).unwrap(),
            Value::from(AttributeValue::Integer(10))
        );
    }

    #[test]
    fn test_duplicate_unknown_and_remove() {
        let mut vars = VariableRegistry::default();
        vars.define("a", constant(1)).unwrap();
        assert!(matches!(
            vars.define("a", constant(2)),
            Err(PolicyError::DuplicateVariable(_))
        ));
        assert!(matches!(vars.get("zz"), Err(PolicyError::UnknownVariable(_))));

        let reference = vars.get("a").unwrap();
        assert!(vars.remove("a").is_some());
        assert!(vars.get("a").is_err());
        assert!(reference.evaluate(None).is_ok());
    }

    #[test]
    fn test_removed_reference_keeps_its_chain() {
        let mut vars = VariableRegistry::new(Some(1));
        vars.define("x", constant(1)).unwrap();
        vars.define("y", vars.get("x").unwrap()).unwrap();
        let old_y = vars.get("y").unwrap();

        vars.remove("y");
        vars.define("y", constant(2)).unwrap();

        let err = vars.define("z", old_y).unwrap_err();
        assert!(matches!(
            err,
            PolicyError::VariableDepthExceeded { depth: 2, max: 1, .. }
        ));

        // without another definition under its id
        let mut unbounded = VariableRegistry::default();
        unbounded.define("a", constant(1)).unwrap();
        let a = unbounded.get("a").unwrap();
        unbounded.remove("a");
        assert_eq!(unbounded.define("b", a).unwrap(), 1);
    }
}
