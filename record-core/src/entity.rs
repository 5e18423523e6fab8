//! The model trait shared by every gateway resource
//!
//! A model is a [`Record`] plus typed association slots. The trait supplies
//! the generic behaviour (construction from sources, validation, payload
//! building, error merging, persistence hook); models override the hooks
//! where their associations need it.

use crate::association::AssociationDescriptor;
use crate::attributes::{Action, AttributeRegistry};
use crate::error_set::ErrorSet;
use crate::source::{extract, AttributeSource};
use crate::types::{EntityKind, Payload, Record};
use crate::validation::Schema;
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Gateway resource model
pub trait Entity: Sized {
    /// Attribute table for the type
    fn registry() -> &'static AttributeRegistry;

    /// Wrap a record, leaving associations unresolved
    fn from_record(record: Record) -> Self;

    /// Underlying record
    fn record(&self) -> &Record;

    /// Underlying record, mutably
    fn record_mut(&mut self) -> &mut Record;

    /// Association table for the type
    fn associations() -> &'static [AssociationDescriptor] {
        &[]
    }

    /// Gateway type of the model
    fn kind() -> EntityKind {
        Self::registry().kind
    }

    /// Build from any attribute source
    ///
    /// Structured sources are copied whole; other sources are probed for
    /// every declared attribute and association field. The record is new
    /// unless the source reports otherwise.
    fn from_source<S: AttributeSource + ?Sized>(source: &S) -> Self {
        let registry = Self::registry();
        let names = registry.known_attributes().chain(
            Self::associations()
                .iter()
                .flat_map(|association| [association.name, association.source_field]),
        );
        let extracted = extract(source, names);
        Self::from_record(Record::new(
            registry,
            extracted.attributes,
            extracted.persisted.unwrap_or(false),
        ))
    }

    /// Build from a gateway document
    fn from_document(document: Payload) -> Self {
        Self::from_record(Record::new(Self::registry(), document, true))
    }

    /// Build from a fragment embedded in an owner's attributes
    ///
    /// The fragment is persisted only when its owner is and it carries its
    /// own identifier.
    fn from_fragment(fragment: Payload, owner_persisted: bool) -> Self {
        let mut record = Record::new(Self::registry(), fragment, false);
        let persisted = owner_persisted && record.id().is_some();
        record.set_persisted(persisted);
        Self::from_record(record)
    }

    /// Empty new model
    fn blank() -> Self {
        Self::from_record(Record::blank(Self::registry()))
    }

    /// Gateway identifier, if assigned
    fn id(&self) -> Option<&str> {
        self.record().id()
    }

    /// Whether the model came from the gateway
    fn is_persisted(&self) -> bool {
        self.record().is_persisted()
    }

    /// Opposite of [`is_persisted`](Self::is_persisted)
    fn is_new(&self) -> bool {
        self.record().is_new()
    }

    /// Errors from the last validation or persist
    fn errors(&self) -> &ErrorSet {
        self.record().errors()
    }

    /// Creation time echoed by the gateway
    fn created_at(&self) -> Option<DateTime<Utc>> {
        self.record().get_time("created_at")
    }

    /// Last update time echoed by the gateway
    fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.record().get_time("updated_at")
    }

    /// Raw attribute value; null reads as absent
    fn get(&self, name: &str) -> Option<&Value> {
        self.record().get(name)
    }

    /// Set a raw attribute value
    fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.record_mut().set(name, value);
    }

    /// Attribute view without raw association fragments
    fn attributes(&self) -> Payload {
        let associations = Self::associations();
        self.record()
            .attributes()
            .iter()
            .filter(|(name, _)| {
                !associations
                    .iter()
                    .any(|association| association.source_field == name.as_str())
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Request body for an action
    fn attributes_for(&self, action: Action) -> Payload {
        self.record().attributes_for(action)
    }

    /// Hook for validating resolved associations after the type's own rules
    fn validate_associations(&mut self, _schema: &Schema) {}

    /// Run the full rule set, replacing any previous errors
    fn is_valid(&mut self, schema: &Schema) -> bool {
        let errors = schema.check(self.record());
        *self.record_mut().errors_mut() = errors;
        self.validate_associations(schema);
        self.errors().is_empty()
    }

    /// Validate as a nested association
    ///
    /// Fields the owner supplies (the registry's nested exclusions) are not
    /// required of the nested model.
    fn is_valid_nested(&mut self, schema: &Schema) -> bool {
        self.is_valid(schema);
        for field in self.record().registry().nested_excluded {
            self.record_mut().errors_mut().remove(field);
        }
        self.errors().is_empty()
    }

    /// Merge errors into this model
    fn add_errors(&mut self, errors: &ErrorSet) {
        self.record_mut().errors_mut().merge(errors);
    }

    /// Hook for dropping cached associations once the record changes
    fn reset_associations(&mut self) {}

    /// Replace state with a gateway document
    fn load(&mut self, document: Payload) {
        self.record_mut().load(document);
        self.reset_associations();
    }

    /// Wrap one persist attempt
    ///
    /// Runs exactly once per attempt. Overrides must run their cleanup
    /// whether or not `persist` fails.
    fn around_persist<R, F>(&mut self, persist: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        persist(self)
    }
}

/// Validate a nested model and flag the owner when it fails
pub fn validate_nested<T: Entity>(
    owner_errors: &mut ErrorSet,
    name: &str,
    nested: Option<&mut T>,
    schema: &Schema,
) {
    if let Some(nested) = nested {
        if !nested.is_valid_nested(schema) {
            owner_errors.add(name, "is invalid");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeRegistry;
    use crate::source::FieldProbe;
    use crate::types::Operation;
    use crate::validation::{Constraint, ValidationRule, Validator};
    use serde_json::json;

    static NOTE: AttributeRegistry = AttributeRegistry {
        kind: EntityKind::Address,
        creatable: &["street_address"],
        updatable: &["street_address"],
        readonly: &["id"],
        nested_excluded: &[],
        operations: &[Operation::Create],
    };

    #[derive(Debug, Clone)]
    struct Note {
        record: Record,
    }

    impl Entity for Note {
        fn registry() -> &'static AttributeRegistry {
            &NOTE
        }

        fn from_record(record: Record) -> Self {
            Self { record }
        }

        fn record(&self) -> &Record {
            &self.record
        }

        fn record_mut(&mut self) -> &mut Record {
            &mut self.record
        }
    }

    fn schema() -> Schema {
        let mut schema = Schema::new();
        schema.insert(
            EntityKind::Address,
            Validator::new(vec![ValidationRule::new(
                &["street_address"],
                Constraint::Presence,
            )]),
        );
        schema
    }

    #[test]
    fn test_is_valid_is_idempotent() {
        let schema = schema();
        let mut note = Note::from_source(&json!({}));

        assert!(!note.is_valid(&schema));
        assert!(!note.is_valid(&schema));
        assert_eq!(note.errors().on("street_address"), ["can't be blank"]);

        note.set("street_address", "1 Main St");
        assert!(note.is_valid(&schema));
        assert!(note.errors().is_empty());
    }

    #[test]
    fn test_from_fragment_inherits_owner_persistence() {
        let fragment = json!({"id": "a1"}).as_object().cloned().unwrap();
        assert!(Note::from_fragment(fragment.clone(), true).is_persisted());
        assert!(!Note::from_fragment(fragment, false).is_persisted());

        let anonymous = json!({"street_address": "x"}).as_object().cloned().unwrap();
        assert!(!Note::from_fragment(anonymous, true).is_persisted());
    }

    #[test]
    fn test_from_source_probe_reports_persistence() {
        let probe = FieldProbe::new(|name| (name == "id").then(|| json!("a1"))).with_persisted(true);
        let note = Note::from_source(&probe);
        assert!(note.is_persisted());
        assert_eq!(note.id(), Some("a1"));
    }

    #[test]
    fn test_nested_validation_skips_owner_supplied_fields() {
        static NESTED: AttributeRegistry = AttributeRegistry {
            kind: EntityKind::Address,
            creatable: &["customer_id", "street_address"],
            updatable: &["street_address"],
            readonly: &["id"],
            nested_excluded: &["customer_id"],
            operations: &[Operation::Create],
        };
        let mut schema = Schema::new();
        schema.insert(
            EntityKind::Address,
            Validator::new(vec![ValidationRule::new(
                &["customer_id", "street_address"],
                Constraint::Presence,
            )]),
        );

        let mut note = Note::from_record(Record::blank(&NESTED));
        note.set("street_address", "1 Main St");
        assert!(!note.is_valid(&schema));
        assert!(note.is_valid_nested(&schema));
    }

    #[test]
    fn test_validate_nested_flags_owner() {
        let schema = schema();
        let mut owner_errors = ErrorSet::new();
        let mut nested = Note::blank();

        validate_nested(&mut owner_errors, "billing_address", Some(&mut nested), &schema);
        assert_eq!(owner_errors.on("billing_address"), ["is invalid"]);
        assert!(nested.errors().contains("street_address"));

        let mut owner_errors = ErrorSet::new();
        validate_nested::<Note>(&mut owner_errors, "billing_address", None, &schema);
        assert!(owner_errors.is_empty());
    }
}
