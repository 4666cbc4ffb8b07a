//! Attribute selectors: values extracted from the XML content of a
//! category with an XPath expression.
//!
//! XPath itself lives outside this crate. A selector only needs a compiler
//! turning the path into a [`CompiledXPath`], and the content node the
//! evaluation context holds for the category.

use super::{bag_validator, BagValidator, Expression};
use crate::bag::Bag;
use crate::context::{AttributeFqn, ContentNode, EvaluationContext};
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Compiles XPath expressions for selectors.
pub trait XPathCompiler: fmt::Debug + Send + Sync {
    fn compile(&self, path: &str) -> Result<Arc<dyn CompiledXPath>>;
}

/// XPath expression ready to be evaluated against content nodes.
pub trait CompiledXPath: fmt::Debug + Send + Sync {
    /// String values of the selected nodes. `context_path` narrows the
    /// context node when the selector has a context selector.
    fn evaluate(
        &self,
        content: &dyn ContentNode,
        context_path: Option<&str>,
    ) -> EvalResult<Vec<String>>;
}

#[derive(Debug)]
pub struct AttributeSelector {
    category: String,
    path: String,
    context_selector_id: Option<String>,
    element_type: AttributeType,
    xpath: Arc<dyn CompiledXPath>,
    validator: BagValidator,
    name: String,
}

impl AttributeSelector {
    pub fn new(
        category: impl Into<String>,
        path: impl Into<String>,
        context_selector_id: Option<String>,
        element_type: AttributeType,
        must_be_present: bool,
        compiler: &dyn XPathCompiler,
    ) -> Result<Self> {
        let category = category.into();
        let path = path.into();
        let xpath = compiler.compile(&path)?;
        let name = format!("AttributeSelector[{category}, {path}, {element_type}]");
        Ok(Self {
            category,
            path,
            context_selector_id,
            element_type,
            xpath,
            validator: bag_validator(must_be_present),
            name,
        })
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn context_path(&self, ctx: &dyn EvaluationContext) -> EvalResult<Option<String>> {
        let Some(id) = &self.context_selector_id else {
            return Ok(None);
        };
        let fqn = AttributeFqn::new(self.category.clone(), id.clone());
        let missing = || {
            Indeterminate::missing_attribute(format!(
                "{}: no value for context selector {fqn}",
                self.name
            ))
        };
        let bag = ctx
            .attribute_bag(&fqn, AttributeType::String)?
            .ok_or_else(missing)?;
        let path = bag
            .bag()
            .single_element()?
            .and_then(|v| v.as_str())
            .ok_or_else(missing)?;
        Ok(Some(path.to_string()))
    }

    fn select(&self, ctx: &dyn EvaluationContext) -> EvalResult<Bag> {
        let Some(content) = ctx.attributes_content(&self.category) else {
            return Ok(Bag::empty_with_reason(
                self.element_type,
                Indeterminate::missing_attribute(format!(
                    "no content for category {}",
                    self.category
                )),
            ));
        };
        let context_path = self.context_path(ctx)?;
        let texts = self
            .xpath
            .evaluate(content.as_ref(), context_path.as_deref())
            .map_err(|e| {
                Indeterminate::processing_error(format!("{}: XPath evaluation failed", self.name))
                    .with_cause(e)
            })?;
        let values = texts
            .iter()
            .map(|text| self.element_type.parse_runtime(text))
            .collect::<EvalResult<Vec<_>>>()?;
        Ok(Bag::new(self.element_type, values))
    }
}

impl Expression for AttributeSelector {
    fn datatype(&self) -> Datatype {
        Datatype::Bag(self.element_type)
    }

    fn evaluate(&self, ctx: Option<&dyn EvaluationContext>) -> EvalResult<Value> {
        let ctx = ctx.ok_or_else(|| {
            Indeterminate::missing_attribute(format!(
                "missing attributes: no evaluation context to resolve {}",
                self.name
            ))
        })?;
        let bag = self.select(ctx)?;
        (self.validator)(&bag, &self.name)?;
        trace!(category = %self.category, path = %self.path, size = bag.size(), "selected content");
        Ok(Value::Bag(bag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{category, RequestContext};
    use crate::error::{PolicyError, StatusCode};
    use crate::value::AttributeValue;
    use std::any::Any;
    use std::collections::HashMap;

    /// Content as a flat map from path to node texts.
    #[derive(Debug)]
    struct MapContent(HashMap<String, Vec<String>>);

    impl ContentNode for MapContent {
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[derive(Debug)]
    struct MapCompiler;

    #[derive(Debug)]
    struct MapPath(String);

    impl XPathCompiler for MapCompiler {
        fn compile(&self, path: &str) -> Result<Arc<dyn CompiledXPath>> {
            if path.is_empty() {
                return Err(PolicyError::InvalidExpression("empty XPath".into()));
            }
            Ok(Arc::new(MapPath(path.to_string())))
        }
    }

    impl CompiledXPath for MapPath {
        fn evaluate(
            &self,
            content: &dyn ContentNode,
            context_path: Option<&str>,
        ) -> EvalResult<Vec<String>> {
            let map = content
                .as_any()
                .downcast_ref::<MapContent>()
                .ok_or_else(|| Indeterminate::processing_error("foreign content node"))?;
            let key = match context_path {
                Some(prefix) => format!("{prefix}{}", self.0),
                None => self.0.clone(),
            };
            Ok(map.0.get(&key).cloned().unwrap_or_default())
        }
    }

    fn content(entries: &[(&str, &[&str])]) -> Arc<dyn ContentNode> {
        Arc::new(MapContent(
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.iter().map(|s| s.to_string()).collect()))
                .collect(),
        ))
    }

    fn selector(path: &str, t: AttributeType, must_be_present: bool) -> AttributeSelector {
        AttributeSelector::new(category::RESOURCE, path, None, t, must_be_present, &MapCompiler)
            .unwrap()
    }

    #[test]
    fn test_select_and_parse() {
        let ctx = RequestContext::new()
            .with_content(category::RESOURCE, content(&[("/record/age", &["17", "42"])]));
        let value = selector("/record/age", AttributeType::Integer, true)
            .evaluate(Some(&ctx))
            .unwrap();
        let bag = value.as_bag().unwrap();
        assert_eq!(bag.element_type(), AttributeType::Integer);
        assert!(bag.contains(&AttributeValue::Integer(42)));
    }

    #[test]
    fn test_missing_content() {
        let ctx = RequestContext::new();
        let lenient = selector("/record/age", AttributeType::Integer, false);
        assert!(lenient.evaluate(Some(&ctx)).unwrap().as_bag().unwrap().is_empty());

        let err = selector("/record/age", AttributeType::Integer, true)
            .evaluate(Some(&ctx))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::MissingAttribute);
        assert!(err.cause().unwrap().message().contains("no content"));
    }

    #[test]
    fn test_bad_lexical_value_is_syntax_error() {
        let ctx = RequestContext::new()
            .with_content(category::RESOURCE, content(&[("/record/age", &["old"])]));
        let err = selector("/record/age", AttributeType::Integer, false)
            .evaluate(Some(&ctx))
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::SyntaxError);
    }

    #[test]
    fn test_context_selector() {
        let ctx = RequestContext::new()
            .with_attribute(AttributeFqn::new(category::RESOURCE, "ctx"), "/doc[2]")
            .with_content(
                category::RESOURCE,
                content(&[("/doc[2]/title", &["b"]), ("/title", &["a"])]),
            );
        let expr = AttributeSelector::new(
            category::RESOURCE,
            "/title",
            Some("ctx".into()),
            AttributeType::String,
            true,
            &MapCompiler,
        )
        .unwrap();
        let value = expr.evaluate(Some(&ctx)).unwrap();
        assert_eq!(value.as_bag().unwrap().values(), &[AttributeValue::from("b")]);
    }

    #[test]
    fn test_compile_failure_and_missing_context() {
        assert!(AttributeSelector::new(
            category::RESOURCE,
            "",
            None,
            AttributeType::String,
            false,
            &MapCompiler
        )
        .is_err());
        let err = selector("/x", AttributeType::String, false)
            .evaluate(None)
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::MissingAttribute);
    }
}
