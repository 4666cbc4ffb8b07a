//! Bags: immutable multisets of attribute values of one type.

use crate::datatype::AttributeType;
use crate::error::{EvalResult, Indeterminate};
use crate::value::AttributeValue;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

/// Immutable multiset of attribute values sharing one element type.
///
/// Equality and hashing are multiset semantics: duplicates count, order
/// does not. Set semantics (duplicates collapsed) are what the set
/// functions use, see [`Bag::distinct`].
#[derive(Clone)]
pub struct Bag {
    element_type: AttributeType,
    content: Content,
}

#[derive(Clone)]
enum Content {
    Empty { reason: Option<Arc<Indeterminate>> },
    Single(AttributeValue),
    Multi(Arc<Multi>),
}

struct Multi {
    values: Vec<AttributeValue>,
    // order-independent content hash, computed on first use
    hash: OnceLock<u64>,
}

impl Bag {
    /// Builds a bag, picking the empty/singleton/multi representation from
    /// the number of values. Callers guarantee every value is of
    /// `element_type`; [`Bag::try_new`] is the public, checked constructor.
    pub(crate) fn new(element_type: AttributeType, mut values: Vec<AttributeValue>) -> Self {
        debug_assert!(values.iter().all(|v| element_type.is_instance(v)));
        let content = match values.len() {
            0 => Content::Empty { reason: None },
            1 => match values.pop() {
                Some(v) => Content::Single(v),
                None => Content::Empty { reason: None },
            },
            _ => Content::Multi(Arc::new(Multi {
                values,
                hash: OnceLock::new(),
            })),
        };
        Self {
            element_type,
            content,
        }
    }

    /// Builds a bag from values of `element_type`; any other value is an
    /// error.
    pub fn try_new(element_type: AttributeType, values: Vec<AttributeValue>) -> EvalResult<Self> {
        if let Some((index, bad)) = values
            .iter()
            .enumerate()
            .find(|(_, v)| !element_type.is_instance(v))
        {
            return Err(Indeterminate::processing_error(format!(
                "invalid bag element #{index}: expected {element_type}, got {}",
                bad.attribute_type()
            )));
        }
        Ok(Self::new(element_type, values))
    }

    pub fn empty(element_type: AttributeType) -> Self {
        Self {
            element_type,
            content: Content::Empty { reason: None },
        }
    }

    /// Empty bag remembering why no value could be found.
    pub fn empty_with_reason(element_type: AttributeType, reason: Indeterminate) -> Self {
        Self {
            element_type,
            content: Content::Empty {
                reason: Some(Arc::new(reason)),
            },
        }
    }

    pub fn singleton(value: AttributeValue) -> Self {
        Self {
            element_type: value.attribute_type(),
            content: Content::Single(value),
        }
    }

    pub fn element_type(&self) -> AttributeType {
        self.element_type
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.content, Content::Empty { .. })
    }

    pub fn size(&self) -> usize {
        self.values().len()
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values().contains(value)
    }

    /// Elements in construction order, duplicates preserved.
    pub fn values(&self) -> &[AttributeValue] {
        match &self.content {
            Content::Empty { .. } => &[],
            Content::Single(v) => std::slice::from_ref(v),
            Content::Multi(m) => &m.values,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttributeValue> {
        self.values().iter()
    }

    /// Multiset view: each distinct element with its number of occurrences.
    pub fn elements(&self) -> HashMap<&AttributeValue, usize> {
        let mut counts = HashMap::with_capacity(self.size());
        for v in self.values() {
            *counts.entry(v).or_insert(0) += 1;
        }
        counts
    }

    /// Distinct elements, in order of first occurrence.
    pub fn distinct(&self) -> Vec<&AttributeValue> {
        let mut seen = HashSet::with_capacity(self.size());
        self.values().iter().filter(|v| seen.insert(*v)).collect()
    }

    /// The only element of a bag of at most one element.
    ///
    /// More than one element is always an explicit processing error naming
    /// the size; there is no silent fallback.
    pub fn single_element(&self) -> EvalResult<Option<&AttributeValue>> {
        match &self.content {
            Content::Empty { .. } => Ok(None),
            Content::Single(v) => Ok(Some(v)),
            Content::Multi(m) => Err(Indeterminate::processing_error(format!(
                "bag<{}> has {} elements, expected at most one",
                self.element_type,
                m.values.len()
            ))),
        }
    }

    /// Why the bag is empty, if it is and a reason was recorded.
    pub fn reason_why_empty(&self) -> Option<&Indeterminate> {
        match &self.content {
            Content::Empty { reason } => reason.as_deref(),
            _ => None,
        }
    }

    fn content_hash(&self) -> u64 {
        match &self.content {
            Content::Empty { .. } => 0,
            Content::Single(v) => element_hash(v),
            Content::Multi(m) => *m
                .hash
                .get_or_init(|| m.values.iter().map(element_hash).fold(0u64, u64::wrapping_add)),
        }
    }
}

fn element_hash(value: &AttributeValue) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl PartialEq for Bag {
    fn eq(&self, other: &Self) -> bool {
        if self.element_type != other.element_type || self.size() != other.size() {
            return false;
        }
        match (&self.content, &other.content) {
            (Content::Multi(a), Content::Multi(b)) => {
                Arc::ptr_eq(a, b)
                    || (self.content_hash() == other.content_hash()
                        && self.elements() == other.elements())
            }
            _ => self.values() == other.values(),
        }
    }
}

impl Eq for Bag {}

impl Hash for Bag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.element_type.hash(state);
        self.content_hash().hash(state);
    }
}

impl fmt::Debug for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bag")
            .field("element_type", &self.element_type)
            .field("values", &self.values())
            .field("reason_why_empty", &self.reason_why_empty())
            .finish()
    }
}

impl fmt::Display for Bag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bag<{}>[", self.element_type)?;
        for (i, v) in self.values().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        f.write_str("]")
    }
}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a AttributeValue;
    type IntoIter = std::slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Where the values of an attribute bag came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSource {
    /// The decision request itself.
    Request,
    /// A default value declared in the policy.
    PolicyDefault,
    /// A named attribute provider.
    Provider(String),
}

impl fmt::Display for AttributeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeSource::Request => f.write_str("request"),
            AttributeSource::PolicyDefault => f.write_str("policy default"),
            AttributeSource::Provider(name) => write!(f, "provider '{name}'"),
        }
    }
}

/// Bag of an attribute with its provenance. Non-empty bags always carry a
/// source; empty bags may not.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeBag {
    bag: Bag,
    source: Option<AttributeSource>,
}

impl AttributeBag {
    pub fn new(bag: Bag, source: AttributeSource) -> Self {
        Self {
            bag,
            source: Some(source),
        }
    }

    /// Empty bag without source, optionally with a reason.
    pub fn empty(element_type: AttributeType, reason: Option<Indeterminate>) -> Self {
        let bag = match reason {
            Some(reason) => Bag::empty_with_reason(element_type, reason),
            None => Bag::empty(element_type),
        };
        Self { bag, source: None }
    }

    /// Assembles a bag from parts; a non-empty bag without source is
    /// rejected.
    pub fn from_parts(bag: Bag, source: Option<AttributeSource>) -> EvalResult<Self> {
        if !bag.is_empty() && source.is_none() {
            return Err(Indeterminate::processing_error(format!(
                "non-empty attribute bag<{}> without source",
                bag.element_type()
            )));
        }
        Ok(Self { bag, source })
    }

    pub fn bag(&self) -> &Bag {
        &self.bag
    }

    pub fn source(&self) -> Option<&AttributeSource> {
        self.source.as_ref()
    }

    pub fn into_bag(self) -> Bag {
        self.bag
    }
}
