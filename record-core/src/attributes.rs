//! Attribute registry
//!
//! Each entity type declares a static [`AttributeRegistry`] naming which
//! fields it may send on create and update, which fields are gateway echoes
//! that are never sent, and which operations the gateway supports for it.

use crate::types::{EntityKind, Operation, Payload, Record};
use crate::{Error, Result};

/// Payload context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Body of a create request
    Create,
    /// Body of an update request
    Update,
    /// Body nested inside an owner's request
    AsAssociation,
}

/// Per-type attribute and operation table
#[derive(Debug)]
pub struct AttributeRegistry {
    /// Entity type the table describes
    pub kind: EntityKind,
    /// Fields accepted on create
    pub creatable: &'static [&'static str],
    /// Fields accepted on update
    pub updatable: &'static [&'static str],
    /// Fields only ever returned by the gateway
    pub readonly: &'static [&'static str],
    /// Fields dropped when nested inside an owner
    pub nested_excluded: &'static [&'static str],
    /// Supported operations
    pub operations: &'static [Operation],
}

impl AttributeRegistry {
    /// Whether the type exposes the operation
    pub fn supports(&self, operation: Operation) -> bool {
        self.operations.contains(&operation)
    }

    /// Fail with `UnsupportedOperation` unless declared
    pub fn ensure_supported(&self, operation: Operation) -> Result<()> {
        if self.supports(operation) {
            Ok(())
        } else {
            Err(Error::UnsupportedOperation {
                kind: self.kind,
                operation,
            })
        }
    }

    /// Whether the attribute is only ever echoed back
    pub fn is_readonly(&self, name: &str) -> bool {
        self.readonly.contains(&name)
    }

    /// Every attribute name the type knows about
    pub fn known_attributes(&self) -> impl Iterator<Item = &'static str> + '_ {
        let mut seen: Vec<&'static str> = Vec::new();
        self.creatable
            .iter()
            .chain(self.updatable)
            .chain(self.readonly)
            .copied()
            .chain(std::iter::once(self.kind.id_field()))
            .filter(move |name| {
                if seen.contains(name) {
                    false
                } else {
                    seen.push(*name);
                    true
                }
            })
    }

    /// Names in scope for an action on a record in the given state
    pub fn fields_for(&self, action: Action, persisted: bool) -> Vec<&'static str> {
        let (fields, excluded): (&[&str], &[&str]) = match action {
            Action::Create => (self.creatable, &[]),
            Action::Update => (self.updatable, &[]),
            Action::AsAssociation if persisted => (self.updatable, self.nested_excluded),
            Action::AsAssociation => (self.creatable, self.nested_excluded),
        };
        fields
            .iter()
            .copied()
            .filter(|name| !self.is_readonly(name) && !excluded.contains(name))
            .collect()
    }

    /// Current non-null values of the in-scope fields
    pub fn attributes_for(&self, action: Action, record: &Record) -> Payload {
        self.fields_for(action, record.is_persisted())
            .into_iter()
            .filter_map(|name| record.get(name).map(|value| (name.to_string(), value.clone())))
            .collect()
    }
}
