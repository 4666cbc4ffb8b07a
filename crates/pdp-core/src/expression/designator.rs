//! Attribute designators.

use super::{bag_validator, BagValidator, Expression};
use crate::bag::AttributeBag;
use crate::context::{AttributeFqn, EvaluationContext};
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Provider of the values of one named attribute.
pub trait NamedAttributeProvider: fmt::Debug + Send + Sync {
    /// Bag of the attribute in `ctx`. `Ok(None)` means the provider could
    /// not produce any bag, not even an empty one.
    fn get(&self, ctx: &dyn EvaluationContext) -> EvalResult<Option<AttributeBag>>;
}

/// Default provider: looks the attribute up in the request. An attribute
/// absent from the request yields an empty bag carrying the reason.
#[derive(Debug, Clone)]
pub struct RequestAttributeProvider {
    fqn: AttributeFqn,
    element_type: AttributeType,
}

impl RequestAttributeProvider {
    pub fn new(fqn: AttributeFqn, element_type: AttributeType) -> Self {
        Self { fqn, element_type }
    }
}

impl NamedAttributeProvider for RequestAttributeProvider {
    fn get(&self, ctx: &dyn EvaluationContext) -> EvalResult<Option<AttributeBag>> {
        let found = ctx.attribute_bag(&self.fqn, self.element_type)?;
        Ok(Some(found.unwrap_or_else(|| {
            AttributeBag::empty(
                self.element_type,
                Some(Indeterminate::missing_attribute(format!(
                    "{} not found in request",
                    self.fqn
                ))),
            )
        })))
    }
}

/// Expression looking up a named attribute.
#[derive(Debug)]
pub struct AttributeDesignator {
    fqn: AttributeFqn,
    element_type: AttributeType,
    must_be_present: bool,
    provider: Arc<dyn NamedAttributeProvider>,
    validator: BagValidator,
    name: String,
}

impl AttributeDesignator {
    pub fn new(
        fqn: AttributeFqn,
        element_type: AttributeType,
        must_be_present: bool,
        provider: Arc<dyn NamedAttributeProvider>,
    ) -> Self {
        let name = format!("AttributeDesignator[{fqn}, {element_type}]");
        Self {
            fqn,
            element_type,
            must_be_present,
            provider,
            validator: bag_validator(must_be_present),
            name,
        }
    }

    pub fn fqn(&self) -> &AttributeFqn {
        &self.fqn
    }

    pub fn must_be_present(&self) -> bool {
        self.must_be_present
    }
}

impl Expression for AttributeDesignator {
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

        let attribute_bag = self
            .provider
            .get(ctx)
            .map_err(|e| {
                Indeterminate::new(e.status(), format!("failed to resolve {}", self.name))
                    .with_cause(e)
            })?
            .ok_or_else(|| {
                Indeterminate::missing_attribute(format!(
                    "missing attribute {} (unknown reason)",
                    self.name
                ))
            })?;

        let bag = attribute_bag.into_bag();
        if bag.element_type() != self.element_type {
            return Err(Indeterminate::processing_error(format!(
                "{}: provider returned a bag<{}>",
                self.name,
                bag.element_type()
            )));
        }
        (self.validator)(&bag, &self.name)?;
        trace!(attribute = %self.fqn, size = bag.size(), "resolved attribute");
        Ok(Value::Bag(bag))
    }
}
