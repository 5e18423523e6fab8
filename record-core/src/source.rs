//! Attribute extraction from heterogeneous inputs
//!
//! Records are built from anything implementing [`AttributeSource`].
//! Extraction precedence:
//!
//! 1. **Structured mapping**: the source hands over a whole payload
//!    (JSON objects, payloads, other records)
//! 2. **Field probing**: otherwise each expected attribute name is asked for
//!    individually and missing names are skipped
//!
//! A source may also report whether it represents a persisted record.

use crate::types::{Payload, Record};
use serde_json::Value;

/// Input a record can be built from
pub trait AttributeSource {
    /// Whole attribute map, when the source is a structured mapping
    fn as_payload(&self) -> Option<Payload> {
        None
    }

    /// Value of a single attribute
    fn probe(&self, name: &str) -> Option<Value>;

    /// Persisted state the source claims for itself
    fn persisted(&self) -> Option<bool> {
        None
    }
}

/// Result of running the adapter over a source
#[derive(Debug, Clone, Default)]
pub struct Extracted {
    /// Attribute values found in the source
    pub attributes: Payload,
    /// Persistence reported by the source, if it has an opinion
    pub persisted: Option<bool>,
}

/// Pull attributes out of a source, probing `names` when it is not a mapping
pub fn extract<'a, S>(source: &S, names: impl IntoIterator<Item = &'a str>) -> Extracted
where
    S: AttributeSource + ?Sized,
{
    let attributes = match source.as_payload() {
        Some(payload) => payload,
        None => names
            .into_iter()
            .filter_map(|name| source.probe(name).map(|value| (name.to_string(), value)))
            .collect(),
    };
    Extracted {
        attributes,
        persisted: source.persisted(),
    }
}

impl AttributeSource for Payload {
    fn as_payload(&self) -> Option<Payload> {
        Some(self.clone())
    }

    fn probe(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl AttributeSource for Value {
    fn as_payload(&self) -> Option<Payload> {
        self.as_object().cloned()
    }

    fn probe(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }
}

impl AttributeSource for Record {
    fn as_payload(&self) -> Option<Payload> {
        Some(self.attributes().clone())
    }

    fn probe(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    fn persisted(&self) -> Option<bool> {
        Some(self.is_persisted())
    }
}

impl<T: AttributeSource + ?Sized> AttributeSource for &T {
    fn as_payload(&self) -> Option<Payload> {
        (**self).as_payload()
    }

    fn probe(&self, name: &str) -> Option<Value> {
        (**self).probe(name)
    }

    fn persisted(&self) -> Option<bool> {
        (**self).persisted()
    }
}

/// Source backed by a lookup function
///
/// Wraps objects that only expose field accessors.
pub struct FieldProbe<F> {
    lookup: F,
    persisted: Option<bool>,
}

impl<F> FieldProbe<F>
where
    F: Fn(&str) -> Option<Value>,
{
    /// Probe backed by a field lookup
    pub fn new(lookup: F) -> Self {
        Self {
            lookup,
            persisted: None,
        }
    }

    /// Report a persisted state for the probed object
    pub fn with_persisted(mut self, persisted: bool) -> Self {
        self.persisted = Some(persisted);
        self
    }
}

impl<F> AttributeSource for FieldProbe<F>
where
    F: Fn(&str) -> Option<Value>,
{
    fn probe(&self, name: &str) -> Option<Value> {
        (self.lookup)(name)
    }

    fn persisted(&self) -> Option<bool> {
        self.persisted
    }
}

impl<F> std::fmt::Debug for FieldProbe<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldProbe")
            .field("persisted", &self.persisted)
            .finish_non_exhaustive()
    }
}
