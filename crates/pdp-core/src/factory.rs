//! Expression factory.
//!
//! Entry point for building expression trees: it resolves function
//! identifiers against the function registry, keeps the variables defined
//! so far and checks every expression when it is built, so that a tree
//! handed out by the factory only fails at evaluation time.

use crate::condition::Condition;
use crate::config::EngineConfig;
use crate::context::AttributeFqn;
use crate::datatype::AttributeType;
use crate::error::{PolicyError, Result};
use crate::expression::{
    Apply, AttributeDesignator, AttributeSelector, ConstantExpression, ExpressionRef,
    FunctionExpression, NamedAttributeProvider, RequestAttributeProvider, VariableRegistry,
    XPathCompiler,
};
use crate::function::FunctionRegistry;
use crate::value::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
pub struct ExpressionFactory {
    config: EngineConfig,
    functions: FunctionRegistry,
    variables: VariableRegistry,
    xpath_compiler: Option<Arc<dyn XPathCompiler>>,
}

impl ExpressionFactory {
    /// Creates a factory with the standard function library.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let functions = FunctionRegistry::standard(config.regex_cache_capacity)?;
        let variables = VariableRegistry::new(config.max_variable_reference_depth);
        debug!(
            functions = functions.len(),
            xpath = config.enable_xpath,
            "expression factory created"
        );
        Ok(Self {
            config,
            functions,
            variables,
            xpath_compiler: None,
        })
    }

    /// Uses `functions` instead of the standard library.
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    pub fn with_xpath_compiler(mut self, compiler: Arc<dyn XPathCompiler>) -> Self {
        self.xpath_compiler = Some(compiler);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn registry_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    pub fn constant(&self, value: impl Into<Value>) -> ExpressionRef {
        Arc::new(ConstantExpression::new(value))
    }

    /// Constant parsed from its lexical form.
    pub fn literal(&self, datatype: AttributeType, lexical: &str) -> Result<ExpressionRef> {
        Ok(self.constant(datatype.parse(lexical)?))
    }

    /// A function as a value, for higher-order function arguments.
    pub fn function(&self, id: &str) -> Result<ExpressionRef> {
        Ok(Arc::new(FunctionExpression::new(self.functions.get(id)?)))
    }

    /// Application of the function `id` to `args`.
    pub fn apply(&self, id: &str, args: Vec<ExpressionRef>) -> Result<ExpressionRef> {
        let function = self.functions.get(id)?;
        let call = function.new_call(args)?;
        Ok(Arc::new(Apply::new(id, call)))
    }

    /// Designator reading the attribute from the request.
    pub fn designator(
        &self,
        fqn: AttributeFqn,
        element_type: AttributeType,
        must_be_present: bool,
    ) -> ExpressionRef {
        let provider = Arc::new(RequestAttributeProvider::new(fqn.clone(), element_type));
        self.designator_with_provider(fqn, element_type, must_be_present, provider)
    }

    pub fn designator_with_provider(
        &self,
        fqn: AttributeFqn,
        element_type: AttributeType,
        must_be_present: bool,
        provider: Arc<dyn NamedAttributeProvider>,
    ) -> ExpressionRef {
        Arc::new(AttributeDesignator::new(
            fqn,
            element_type,
            must_be_present,
            provider,
        ))
    }

    pub fn selector(
        &self,
        category: &str,
        path: &str,
        context_selector_id: Option<String>,
        element_type: AttributeType,
        must_be_present: bool,
    ) -> Result<ExpressionRef> {
        if !self.config.enable_xpath {
            return Err(PolicyError::Unsupported(
                "attribute selectors require enable_xpath".to_string(),
            ));
        }
        let compiler = self.xpath_compiler.as_deref().ok_or_else(|| {
            PolicyError::Unsupported("no XPath compiler configured".to_string())
        })?;
        Ok(Arc::new(AttributeSelector::new(
            category,
            path,
            context_selector_id,
            element_type,
            must_be_present,
            compiler,
        )?))
    }

    /// Defines a variable and returns the longest chain of variable
    /// references in its expression.
    pub fn define_variable(&mut self, id: &str, expression: ExpressionRef) -> Result<usize> {
        self.variables.define(id, expression)
    }

    /// Reference to a defined variable.
    pub fn variable(&self, id: &str) -> Result<ExpressionRef> {
        self.variables.get(id)
    }

    /// Drops a variable, e.g. at the end of the policy defining it.
    pub fn remove_variable(&mut self, id: &str) -> bool {
        self.variables.remove(id).is_some()
    }

    pub fn condition(&self, expression: ExpressionRef) -> Result<Condition> {
        Condition::new(expression)
    }
}
