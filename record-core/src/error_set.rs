//! Field-scoped error collections
//!
//! An [`ErrorSet`] maps a field name (or the pseudo-field [`BASE`]) to the
//! ordered messages reported against it. Local validation and gateway
//! responses both land in this shape, so callers cannot tell them apart.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Pseudo-field for errors that belong to the record as a whole
pub const BASE: &str = "base";

/// Field name → ordered messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSet {
    fields: BTreeMap<String, Vec<String>>,
}

impl ErrorSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message under a field
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Append a record-level message
    pub fn add_to_base(&mut self, message: impl Into<String>) {
        self.add(BASE, message);
    }

    /// Messages for a field, empty when none
    pub fn on(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Record-level messages
    pub fn on_base(&self) -> &[String] {
        self.on(BASE)
    }

    /// Whether any message is recorded against the field
    pub fn contains(&self, field: &str) -> bool {
        !self.on(field).is_empty()
    }

    /// Whether no field has a message
    pub fn is_empty(&self) -> bool {
        self.fields.values().all(Vec::is_empty)
    }

    /// Total number of messages
    pub fn len(&self) -> usize {
        self.fields.values().map(Vec::len).sum()
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Drop every message on a field
    pub fn remove(&mut self, field: &str) -> Vec<String> {
        self.fields.remove(field).unwrap_or_default()
    }

    /// Fields with at least one message, in name order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, messages)| !messages.is_empty())
            .map(|(field, _)| field.as_str())
    }

    /// (field, message) pairs in field order, messages in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().flat_map(|(field, messages)| {
            messages
                .iter()
                .map(move |message| (field.as_str(), message.as_str()))
        })
    }

    /// Copy every message from `other` into this set
    pub fn merge(&mut self, other: &ErrorSet) {
        for (field, message) in other.iter() {
            self.add(field, message);
        }
    }

    /// Copy of this set without record-level messages
    ///
    /// Used when pushing an owner's errors down to its associations, so
    /// owner-level messages are never attributed to a child.
    pub fn without_base(&self) -> ErrorSet {
        ErrorSet {
            fields: self
                .fields
                .iter()
                .filter(|(field, _)| field.as_str() != BASE)
                .map(|(field, messages)| (field.clone(), messages.clone()))
                .collect(),
        }
    }

    /// Human-readable messages, `base` messages unprefixed
    pub fn full_messages(&self) -> Vec<String> {
        self.iter()
            .map(|(field, message)| {
                if field == BASE {
                    message.to_string()
                } else {
                    format!("{} {}", field, message)
                }
            })
            .collect()
    }
}

impl fmt::Display for ErrorSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_messages().join(", "))
    }
}

impl<F, M> FromIterator<(F, M)> for ErrorSet
where
    F: Into<String>,
    M: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (F, M)>>(iter: I) -> Self {
        let mut errors = ErrorSet::new();
        for (field, message) in iter {
            errors.add(field, message);
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_keep_insertion_order() {
        let mut errors = ErrorSet::new();
        errors.add("number", "can't be blank");
        errors.add("number", "is not a number");

        assert_eq!(errors.on("number"), ["can't be blank", "is not a number"]);
        assert_eq!(errors.len(), 2);
        assert!(errors.on("cvv").is_empty());
    }

    #[test]
    fn test_without_base_drops_record_level_messages() {
        let mut errors = ErrorSet::new();
        errors.add_to_base("Gateway rejected");
        errors.add("amount", "is invalid");

        let child = errors.without_base();
        assert!(child.on_base().is_empty());
        assert_eq!(child.on("amount"), ["is invalid"]);
        // original untouched
        assert_eq!(errors.on_base(), ["Gateway rejected"]);
    }

    #[test]
    fn test_merge_and_full_messages() {
        let mut errors: ErrorSet = [("cvv", "is too short")].into_iter().collect();
        let remote: ErrorSet = [(BASE, "Declined"), ("cvv", "does not match")]
            .into_iter()
            .collect();
        errors.merge(&remote);

        assert_eq!(errors.on("cvv"), ["is too short", "does not match"]);
        assert_eq!(
            errors.full_messages(),
            vec!["Declined", "cvv is too short", "cvv does not match"]
        );
        assert_eq!(errors.to_string(), "Declined, cvv is too short, cvv does not match");
    }

    #[test]
    fn test_clear() {
        let mut errors: ErrorSet = [("id", "is reserved")].into_iter().collect();
        assert!(!errors.is_empty());
        errors.clear();
        assert!(errors.is_empty());
        assert_eq!(errors.fields().count(), 0);
    }
}
