//! Request payload overrides for related models
//!
//! A related model travels either as a token/identifier (when the gateway
//! already has it) or as a nested object (when it is created together with
//! the owner), never both.

use crate::attributes::Action;
use crate::entity::Entity;
use crate::types::Payload;
use serde_json::Value;

/// How a related model appears in an owner's request
#[derive(Debug, Clone, PartialEq)]
pub enum Linked {
    /// Created together with the owner
    Nested(Payload),
    /// Already stored; sent by identifier
    Reference(String),
    /// Nothing to send; the payload is left as is
    Absent,
}

impl Linked {
    /// Representation of an optional related model
    pub fn for_entity<T: Entity>(related: Option<&T>) -> Self {
        match related {
            Some(related) => Self::for_model(related, |related| {
                related.attributes_for(Action::AsAssociation)
            }),
            None => Linked::Absent,
        }
    }

    /// Reference when persisted with an identifier, otherwise the body
    /// produced by `nested`
    pub fn for_model<T, F>(related: T, nested: F) -> Self
    where
        T: std::ops::Deref,
        T::Target: Entity,
        F: FnOnce(T) -> Payload,
    {
        if related.is_persisted() {
            if let Some(id) = related.id() {
                return Linked::Reference(id.to_string());
            }
        }
        Linked::Nested(nested(related))
    }

    /// Use `fallback` as a reference when nothing is linked
    pub fn or_reference(self, fallback: Option<&str>) -> Self {
        match (self, fallback) {
            (Linked::Absent, Some(id)) => Linked::Reference(id.to_string()),
            (linked, _) => linked,
        }
    }

    /// Whether there is nothing to send
    pub fn is_absent(&self) -> bool {
        matches!(self, Linked::Absent)
    }

    /// Write into a request body
    ///
    /// The key not used is removed so the body never carries both forms.
    /// An absent link leaves the body untouched.
    pub fn apply(self, payload: &mut Payload, nested_key: &str, reference_key: &str) {
        match self {
            Linked::Nested(nested) => {
                payload.remove(reference_key);
                payload.insert(nested_key.to_string(), Value::Object(nested));
            }
            Linked::Reference(id) => {
                payload.remove(nested_key);
                payload.insert(reference_key.to_string(), Value::String(id));
            }
            Linked::Absent => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::AttributeRegistry;
    use crate::types::{EntityKind, Operation, Record};
    use serde_json::json;

    static CARD: AttributeRegistry = AttributeRegistry {
        kind: EntityKind::CreditCard,
        creatable: &["number", "cvv", "customer_id"],
        updatable: &["number", "cvv"],
        readonly: &["token"],
        nested_excluded: &["customer_id"],
        operations: &[Operation::Create],
    };

    #[derive(Debug)]
    struct Card {
        record: Record,
    }

    impl Entity for Card {
        fn registry() -> &'static AttributeRegistry {
            &CARD
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

    fn card(persisted: bool) -> Card {
        let attributes = json!({"token": "tok1", "number": "4111111111111111", "customer_id": "c1"});
        Card::from_record(Record::new(&CARD, attributes.as_object().cloned().unwrap(), persisted))
    }

    #[test]
    fn test_persisted_card_is_referenced() {
        let mut payload = Payload::new();
        payload.insert("credit_card".into(), json!({"number": "1"}));

        Linked::for_entity(Some(&card(true))).apply(&mut payload, "credit_card", "payment_method_token");
        assert_eq!(payload.get("payment_method_token"), Some(&json!("tok1")));
        assert!(!payload.contains_key("credit_card"));
    }

    #[test]
    fn test_new_card_is_nested() {
        let mut payload = Payload::new();
        payload.insert("payment_method_token".into(), json!("stale"));

        Linked::for_entity(Some(&card(false))).apply(&mut payload, "credit_card", "payment_method_token");
        let nested = payload["credit_card"].as_object().unwrap();
        assert_eq!(nested.get("number"), Some(&json!("4111111111111111")));
        assert!(!nested.contains_key("customer_id"));
        assert!(!nested.contains_key("token"));
        assert!(!payload.contains_key("payment_method_token"));
    }

    #[test]
    fn test_absent_uses_fallback_reference() {
        let linked = Linked::for_entity::<Card>(None);
        assert!(linked.is_absent());
        assert_eq!(linked.clone().or_reference(None), Linked::Absent);
        assert_eq!(
            linked.or_reference(Some("default")),
            Linked::Reference("default".to_string())
        );
    }
}
