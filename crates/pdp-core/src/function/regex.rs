//! Regular expression matching: `string-regexp-match` and
//! `anyURI-regexp-match`.
//!
//! Patterns are matched as unanchored searches. A constant pattern is
//! compiled once when the call is built; a pattern known only at
//! evaluation goes through the registry's bounded [`RegexCache`].

use super::first_order::{primitive_arg, CallFactory, FirstOrderFunction, Implementation};
use super::signature::FunctionSignature;
use super::{ids, FunctionCall, FunctionRegistry};
use crate::context::EvaluationContext;
use crate::datatype::{AttributeType, Datatype};
use crate::error::{EvalResult, Indeterminate, Result};
use crate::expression::ExpressionRef;
use crate::value::{AttributeValue, Value};
use ::regex::Regex;
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// Bounded LRU cache of compiled patterns, shared by all regex calls built
/// from one registry. Capacity 0 disables caching.
pub struct RegexCache {
    entries: Option<Mutex<LruCache<String, Arc<Regex>>>>,
}

impl RegexCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|c| Mutex::new(LruCache::new(c))),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .as_ref()
            .and_then(|e| e.lock().ok().map(|e| e.cap().get()))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries
            .as_ref()
            .and_then(|e| e.lock().ok().map(|e| e.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Compiled `pattern`, from the cache when present. A poisoned lock
    /// only bypasses the cache.
    pub fn get_or_compile(&self, pattern: &str) -> EvalResult<Arc<Regex>> {
        if let Some(Ok(mut entries)) = self.entries.as_ref().map(|e| e.lock()) {
            if let Some(regex) = entries.get(pattern) {
                return Ok(regex.clone());
            }
        }
        trace!(pattern, "regex cache miss");
        let regex = Arc::new(Regex::new(pattern).map_err(|e| {
            Indeterminate::syntax_error(format!("invalid regular expression '{pattern}': {e}"))
        })?);
        if let Some(Ok(mut entries)) = self.entries.as_ref().map(|e| e.lock()) {
            entries.put(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

impl fmt::Debug for RegexCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegexCache")
            .field("capacity", &self.capacity())
            .field("len", &self.len())
            .finish()
    }
}

#[derive(Debug)]
struct RegexpMatch {
    cache: Arc<RegexCache>,
}

impl CallFactory for RegexpMatch {
    fn new_call(
        &self,
        function: &FirstOrderFunction,
        args: Vec<ExpressionRef>,
        _remaining: &[AttributeType],
    ) -> Result<Box<dyn FunctionCall>> {
        let compiled = match args.first().and_then(|a| a.value()) {
            Some(Value::Attribute(AttributeValue::String(pattern))) => {
                Some(Arc::new(Regex::new(pattern)?))
            }
            _ => None,
        };
        Ok(Box::new(RegexpMatchCall {
            function_id: function.id().to_string(),
            args,
            compiled,
            cache: self.cache.clone(),
        }))
    }
}

#[derive(Debug)]
struct RegexpMatchCall {
    function_id: String,
    args: Vec<ExpressionRef>,
    compiled: Option<Arc<Regex>>,
    cache: Arc<RegexCache>,
}

impl FunctionCall for RegexpMatchCall {
    fn return_type(&self) -> Datatype {
        Datatype::BOOLEAN
    }

    fn arguments(&self) -> &[ExpressionRef] {
        &self.args
    }

    fn evaluate(
        &self,
        ctx: Option<&dyn EvaluationContext>,
        remaining: &[AttributeValue],
    ) -> EvalResult<Value> {
        let regex = match &self.compiled {
            Some(regex) => regex.clone(),
            None => {
                let pattern = primitive_arg(&self.function_id, &self.args, remaining, 0, ctx)?;
                let pattern = pattern.as_str().ok_or_else(|| {
                    Indeterminate::processing_error(format!(
                        "{}: pattern is not a string",
                        self.function_id
                    ))
                })?;
                self.cache.get_or_compile(pattern)?
            }
        };
        let subject = primitive_arg(&self.function_id, &self.args, remaining, 1, ctx)?;
        let text = match &subject {
            AttributeValue::String(s) => s.as_str(),
            AttributeValue::AnyUri(u) => u.as_str(),
            other => {
                return Err(Indeterminate::processing_error(format!(
                    "{}: cannot match a {} value",
                    self.function_id,
                    other.attribute_type()
                )))
            }
        };
        Ok(Value::from(regex.is_match(text)))
    }
}

pub(crate) fn register(registry: &mut FunctionRegistry, cache: Arc<RegexCache>) -> Result<()> {
    for (id, subject) in [
        (ids::STRING_REGEXP_MATCH, Datatype::STRING),
        (ids::ANY_URI_REGEXP_MATCH, AttributeType::AnyUri.datatype()),
    ] {
        registry.register(FirstOrderFunction::new(
            id,
            Datatype::BOOLEAN,
            FunctionSignature::fixed([Datatype::STRING, subject]),
            Implementation::custom(RegexpMatch {
                cache: cache.clone(),
            }),
        )?)?;
    }
    Ok(())
}
