//! Evaluation context: the request-scoped source of attribute bags and
//! XML content.

use crate::bag::{AttributeBag, AttributeSource, Bag};
use crate::datatype::AttributeType;
use crate::error::EvalResult;
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Standard attribute categories.
pub mod category {
    pub const ACCESS_SUBJECT: &str =
        "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
    pub const RESOURCE: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
    pub const ACTION: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
    pub const ENVIRONMENT: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";
}

/// Fully qualified attribute name: category, identifier and optional
/// issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeFqn {
    pub category: String,
    pub id: String,
    #[serde(default)]
    pub issuer: Option<String>,
}

impl AttributeFqn {
    pub fn new(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Whether an attribute named `other` answers a lookup for `self`: an
    /// issuer-less name matches any issuer.
    pub fn matches(&self, other: &AttributeFqn) -> bool {
        self.category == other.category
            && self.id == other.id
            && (self.issuer.is_none() || self.issuer == other.issuer)
    }
}

impl fmt::Display for AttributeFqn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category, self.id)?;
        if let Some(issuer) = &self.issuer {
            write!(f, " (issuer: {issuer})")?;
        }
        Ok(())
    }
}

/// Opaque XML content node of one attribute category. Only the XPath
/// evaluator that compiled a selector knows its concrete type.
pub trait ContentNode: fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

/// Request-scoped attribute source.
pub trait EvaluationContext {
    /// Bag of values of `fqn` with the given element type.
    ///
    /// `Ok(None)` means the request does not contain the attribute.
    fn attribute_bag(
        &self,
        fqn: &AttributeFqn,
        element_type: AttributeType,
    ) -> EvalResult<Option<AttributeBag>>;

    /// XML content of an attribute category, if any.
    fn attributes_content(&self, category: &str) -> Option<Arc<dyn ContentNode>>;
}

/// In-memory evaluation context for one decision request.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    attributes: HashMap<AttributeFqn, Vec<AttributeValue>>,
    content: HashMap<String, Arc<dyn ContentNode>>,
}

impl RequestContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute value. Repeated values accumulate into the bag.
    pub fn with_attribute(mut self, fqn: AttributeFqn, value: impl Into<AttributeValue>) -> Self {
        self.attributes.entry(fqn).or_default().push(value.into());
        self
    }

    /// Adds several values of one attribute.
    pub fn with_values<I, V>(mut self, fqn: AttributeFqn, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<AttributeValue>,
    {
        self.attributes
            .entry(fqn)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Sets the XML content of a category.
    pub fn with_content(mut self, category: impl Into<String>, content: Arc<dyn ContentNode>) -> Self {
        self.content.insert(category.into(), content);
        self
    }
}

impl EvaluationContext for RequestContext {
    fn attribute_bag(
        &self,
        fqn: &AttributeFqn,
        element_type: AttributeType,
    ) -> EvalResult<Option<AttributeBag>> {
        let mut found = false;
        let mut values = Vec::new();
        for (name, named_values) in &self.attributes {
            if !fqn.matches(name) {
                continue;
            }
            found = true;
            values.extend(
                named_values
                    .iter()
                    .filter(|v| element_type.is_instance(v))
                    .cloned(),
            );
        }
        if !found {
            return Ok(None);
        }
        Ok(Some(AttributeBag::new(
            Bag::new(element_type, values),
            AttributeSource::Request,
        )))
    }

    fn attributes_content(&self, category: &str) -> Option<Arc<dyn ContentNode>> {
        self.content.get(category).cloned()
    }
}
