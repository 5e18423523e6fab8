//! Vault customers

use crate::address::{self, Address};
use crate::credit_card::{self, CreditCard};
use crate::model::Model;
use record_core::{
    validate_nested, Action, AssociationDescriptor, AttributeRegistry, BelongsTo, Cardinality,
    Collection, Entity, EntityKind, ErrorSet, GatewayConfig, HasMany, Operation, Payload, Record,
    Result, Schema, Strategy,
};
use serde_json::Value;

const FIELDS: &[&str] = &[
    "company",
    "custom_fields",
    "device_data",
    "email",
    "fax",
    "first_name",
    "id",
    "last_name",
    "options",
    "phone",
    "website",
];

static CUSTOMER: AttributeRegistry = AttributeRegistry {
    kind: EntityKind::Customer,
    creatable: FIELDS,
    updatable: FIELDS,
    readonly: &["created_at", "updated_at"],
    nested_excluded: &[],
    operations: &[
        Operation::Find,
        Operation::All,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ],
};

static ASSOCIATIONS: [AssociationDescriptor; 3] = [
    AssociationDescriptor {
        name: "credit_cards",
        target: EntityKind::CreditCard,
        cardinality: Cardinality::Many,
        strategy: Strategy::Embedded,
        source_field: "credit_cards",
    },
    AssociationDescriptor {
        name: "addresses",
        target: EntityKind::Address,
        cardinality: Cardinality::Many,
        strategy: Strategy::Embedded,
        source_field: "addresses",
    },
    AssociationDescriptor {
        name: "credit_card",
        target: EntityKind::CreditCard,
        cardinality: Cardinality::One,
        strategy: Strategy::Embedded,
        source_field: "credit_card",
    },
];

/// Customer record with its vaulted cards and addresses
#[derive(Debug, Clone)]
pub struct Customer {
    record: Record,
    credit_cards: HasMany<CreditCard>,
    addresses: HasMany<Address>,
    /// Card created together with the customer
    credit_card: BelongsTo<CreditCard>,
}

impl Customer {
    /// Email address
    pub fn email(&self) -> Option<&str> {
        self.record.get_str("email")
    }

    /// First and last name joined by a space
    pub fn full_name(&self) -> String {
        address::full_name(&self.record)
    }

    fn member_defaults(&self) -> Payload {
        let mut defaults = Payload::new();
        if let Some(id) = self.record.id() {
            defaults.insert("customer_id".into(), Value::String(id.to_string()));
        }
        defaults
    }

    /// Vaulted cards; cards built here carry the customer id
    pub fn credit_cards(&mut self) -> &mut Collection<CreditCard> {
        let defaults = self.member_defaults();
        self.credit_cards.resolve(&self.record, defaults)
    }

    /// Stored addresses; addresses built here carry the customer id
    pub fn addresses(&mut self) -> &mut Collection<Address> {
        let defaults = self.member_defaults();
        self.addresses.resolve(&self.record, defaults)
    }

    /// Card flagged as the default payment method
    pub fn default_credit_card(&mut self) -> Option<&CreditCard> {
        self.credit_cards().iter().find(|card| card.is_default())
    }

    /// Card to create together with the customer
    pub fn credit_card(&mut self) -> Option<&mut CreditCard> {
        self.credit_card.resolve(&self.record)
    }

    /// Replace the card created with the customer
    pub fn set_credit_card(&mut self, card: Option<CreditCard>) {
        self.credit_card.set(card);
    }
}

impl Entity for Customer {
    fn registry() -> &'static AttributeRegistry {
        &CUSTOMER
    }

    fn associations() -> &'static [AssociationDescriptor] {
        &ASSOCIATIONS
    }

    fn from_record(record: Record) -> Self {
        Self {
            record,
            credit_cards: HasMany::new(&ASSOCIATIONS[0]),
            addresses: HasMany::new(&ASSOCIATIONS[1]),
            credit_card: BelongsTo::new(&ASSOCIATIONS[2]),
        }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn validate_associations(&mut self, schema: &Schema) {
        if self.record.is_persisted() {
            return;
        }
        let card = self.credit_card.resolve(&self.record).filter(|card| card.is_new());
        validate_nested(self.record.errors_mut(), "credit_card", card, schema);
    }

    fn add_errors(&mut self, errors: &ErrorSet) {
        if let Some(card) = self.credit_card.resolve(&self.record) {
            card.add_errors(&errors.without_base());
        }
        self.record.errors_mut().merge(errors);
    }

    fn reset_associations(&mut self) {
        self.credit_cards.reset();
        self.addresses.reset();
        self.credit_card.reset();
    }

    /// Card secrets never outlive a create attempt, accepted or not
    fn around_persist<R, F>(&mut self, persist: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        let result = persist(self);
        if let Some(card) = self.credit_card.get_mut() {
            card.clear_encrypted_attributes();
        }
        if let Some(fragment) = self.record.get_object_mut("credit_card") {
            credit_card::scrub(fragment);
        }
        result
    }
}

impl Model for Customer {
    fn request_body(&mut self, action: Action, config: &GatewayConfig) -> Payload {
        let mut body = self.attributes_for(action);
        if action == Action::Create {
            if let Some(card) = self.credit_card.resolve(&self.record).filter(|card| card.is_new()) {
                let nested = card.request_body(Action::AsAssociation, config);
                body.insert("credit_card".into(), Value::Object(nested));
            }
        }
        body
    }
}
