//! Customer, billing and shipping addresses

use crate::model::Model;
use record_core::{AttributeRegistry, Entity, EntityKind, Operation, Record};

const FIELDS: &[&str] = &[
    "company",
    "country_code_alpha2",
    "country_code_alpha3",
    "country_code_numeric",
    "country_name",
    "customer_id",
    "extended_address",
    "first_name",
    "last_name",
    "locality",
    "postal_code",
    "region",
    "street_address",
];

static ADDRESS: AttributeRegistry = AttributeRegistry {
    kind: EntityKind::Address,
    creatable: FIELDS,
    updatable: &[
        "company",
        "country_code_alpha2",
        "country_code_alpha3",
        "country_code_numeric",
        "country_name",
        "extended_address",
        "first_name",
        "last_name",
        "locality",
        "postal_code",
        "region",
        "street_address",
    ],
    readonly: &["id", "created_at", "updated_at"],
    nested_excluded: &["customer_id"],
    operations: &[
        Operation::Find,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ],
};

/// Postal address
#[derive(Debug, Clone)]
pub struct Address {
    record: Record,
}

impl Entity for Address {
    fn registry() -> &'static AttributeRegistry {
        &ADDRESS
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

impl Model for Address {}

impl Address {
    /// Owning customer
    pub fn customer_id(&self) -> Option<&str> {
        self.record.get_str("customer_id")
    }

    /// Street line
    pub fn street_address(&self) -> Option<&str> {
        self.record.get_str("street_address")
    }

    /// Postal code
    pub fn postal_code(&self) -> Option<&str> {
        self.record.get_str("postal_code")
    }

    /// First and last name joined by a space
    pub fn full_name(&self) -> String {
        full_name(&self.record)
    }
}

pub(crate) fn full_name(record: &Record) -> String {
    [record.get_str("first_name"), record.get_str("last_name")]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use record_core::Action;
    use serde_json::json;

    #[test]
    fn test_full_name() {
        let address = Address::from_source(&json!({"first_name": "Foo", "last_name": "Bar"}));
        assert_eq!(address.full_name(), "Foo Bar");

        let address = Address::from_source(&json!({"last_name": "Bar"}));
        assert_eq!(address.full_name(), "Bar");
    }

    #[test]
    fn test_nested_body_drops_customer_id() {
        let address = Address::from_source(&json!({
            "customer_id": "c1",
            "street_address": "1 Main St",
            "postal_code": "60622"
        }));
        let body = address.attributes_for(Action::AsAssociation);
        assert!(!body.contains_key("customer_id"));
        assert_eq!(body["postal_code"], json!("60622"));

        let body = address.attributes_for(Action::Create);
        assert_eq!(body["customer_id"], json!("c1"));
    }
}
