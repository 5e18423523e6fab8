//! Vaulted credit cards

use crate::address::Address;
use crate::model::Model;
use record_core::{
    validate_nested, Action, AssociationDescriptor, AttributeRegistry, Cardinality, Entity,
    EntityKind, ErrorSet, GatewayConfig, HasOne, Linked, Operation, Payload, Record, Result,
    Schema, Strategy,
};
use serde_json::Value;

static CREDIT_CARD: AttributeRegistry = AttributeRegistry {
    kind: EntityKind::CreditCard,
    creatable: &[
        "cardholder_name",
        "customer_id",
        "cvv",
        "expiration_month",
        "expiration_year",
        "number",
        "options",
        "token",
    ],
    updatable: &[
        "cardholder_name",
        "cvv",
        "expiration_month",
        "expiration_year",
        "number",
        "options",
    ],
    readonly: &[
        "bin",
        "card_type",
        "commercial",
        "country_of_issuance",
        "created_at",
        "debit",
        "default",
        "durbin_regulated",
        "expired",
        "healthcare",
        "image_url",
        "issuing_bank",
        "last_4",
        "payroll",
        "prepaid",
        "unique_number_identifier",
        "updated_at",
    ],
    nested_excluded: &["customer_id"],
    operations: &[
        Operation::Find,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ],
};

static ASSOCIATIONS: [AssociationDescriptor; 1] = [AssociationDescriptor {
    name: "billing_address",
    target: EntityKind::Address,
    cardinality: Cardinality::One,
    strategy: Strategy::Embedded,
    source_field: "billing_address",
}];

/// Attributes cleared after every persist attempt
pub(crate) const ENCRYPTED: &[&str] = &["number", "cvv"];

/// Drop card secrets from a payload
pub(crate) fn scrub(payload: &mut Payload) {
    for name in ENCRYPTED {
        payload.remove(*name);
    }
}

/// Payment card stored in the gateway vault
#[derive(Debug, Clone)]
pub struct CreditCard {
    record: Record,
    billing_address: HasOne<Address>,
}

impl CreditCard {
    /// Vault token, the card's identifier
    pub fn token(&self) -> Option<&str> {
        self.id()
    }

    /// Owning customer
    pub fn customer_id(&self) -> Option<&str> {
        self.record.get_str("customer_id")
    }

    /// Name printed on the card
    pub fn cardholder_name(&self) -> Option<&str> {
        self.record.get_str("cardholder_name")
    }

    /// Whether this is the customer's default payment method
    pub fn is_default(&self) -> bool {
        self.record.get_bool("default").unwrap_or(false)
    }

    /// Whether the gateway flagged the card as expired
    pub fn is_expired(&self) -> bool {
        self.record.get_bool("expired").unwrap_or(false)
    }

    /// `MM/YYYY`, when both parts are known
    pub fn expiration_date(&self) -> Option<String> {
        let month = self.record.get("expiration_month")?;
        let year = self.record.get("expiration_year")?;
        Some(format!(
            "{:0>2}/{}",
            value_text(month),
            value_text(year)
        ))
    }

    /// Masked number built from the bin and last four digits
    pub fn masked_number(&self) -> Option<String> {
        let bin = self.record.get_str("bin")?;
        let last_4 = self.record.get_str("last_4")?;
        Some(format!("{}******{}", bin, last_4))
    }

    /// Resolved billing address, blank when none was given
    pub fn billing_address(&mut self) -> &mut Address {
        self.billing_address.resolve(&self.record)
    }

    /// Replace the billing address sent with the card
    pub fn set_billing_address(&mut self, address: Address) {
        self.billing_address.set(address);
    }

    /// Remove number and cvv from the card
    pub fn clear_encrypted_attributes(&mut self) {
        for name in ENCRYPTED {
            self.record.remove(name);
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Split `expiration_date` into month and year when those are missing
fn split_expiration_date(record: &mut Record) {
    if record.get("expiration_month").is_some() || record.get("expiration_year").is_some() {
        return;
    }
    let parts = record
        .get_str("expiration_date")
        .and_then(|date| date.split_once('/'))
        .map(|(month, year)| (month.trim().to_string(), year.trim().to_string()));
    if let Some((month, year)) = parts {
        record.set("expiration_month", month);
        record.set("expiration_year", year);
    }
}

impl Entity for CreditCard {
    fn registry() -> &'static AttributeRegistry {
        &CREDIT_CARD
    }

    fn associations() -> &'static [AssociationDescriptor] {
        &ASSOCIATIONS
    }

    fn from_record(mut record: Record) -> Self {
        split_expiration_date(&mut record);
        Self {
            record,
            billing_address: HasOne::new(&ASSOCIATIONS[0]),
        }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn validate_associations(&mut self, schema: &Schema) {
        let address = self.billing_address.resolve_present(&self.record);
        let address = address.filter(|address| address.is_new());
        validate_nested(self.record.errors_mut(), "billing_address", address, schema);
    }

    fn add_errors(&mut self, errors: &ErrorSet) {
        if let Some(address) = self.billing_address.resolve_present(&self.record) {
            address.add_errors(&errors.without_base());
        }
        self.record.errors_mut().merge(errors);
    }

    fn reset_associations(&mut self) {
        self.billing_address.reset();
    }

    fn around_persist<R, F>(&mut self, persist: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        let result = persist(self);
        self.clear_encrypted_attributes();
        result
    }
}

impl Model for CreditCard {
    fn request_body(&mut self, action: Action, _config: &GatewayConfig) -> Payload {
        let mut body = self.attributes_for(action);
        let linked = match self.billing_address.resolve_present(&self.record) {
            Some(address) => Linked::for_model(address, |address| {
                address.attributes_for(Action::AsAssociation)
            }),
            None => Linked::Absent,
        };
        linked.apply(&mut body, "billing_address", "billing_address_id");
        body
    }
}
