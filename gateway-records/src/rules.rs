//! Rule tables for every gateway entity type
//!
//! Built once from [`ValidationConfig`] and shared by every validation.

use record_core::{
    Constraint, EntityKind, Result, Schema, ValidationConfig, ValidationRule, Validator,
};
use rust_decimal::Decimal;

/// Transaction types the gateway accepts
pub const TRANSACTION_TYPES: &[&str] = &["sale", "credit"];

/// Customer rules: id format and length, field lengths, email and website format
pub fn customer() -> Result<Validator> {
    Ok(Validator::new(vec![
        ValidationRule::new(&["id"], Constraint::format(r"(?i)^[-_a-z0-9]*$")?),
        ValidationRule::new(&["id"], Constraint::max_length(36)),
        ValidationRule::new(&["id"], Constraint::exclusion(&["all", "new"])),
        ValidationRule::new(
            &["first_name", "last_name", "company", "website", "phone", "fax"],
            Constraint::max_length(255),
        ),
    ]))
}

/// Card rules: number, cvv and expiration bounds
pub fn credit_card(config: &ValidationConfig) -> Validator {
    Validator::new(vec![
        ValidationRule::new(&["customer_id"], Constraint::Presence).on_create(),
        ValidationRule::new(&["customer_id"], Constraint::max_length(36)),
        ValidationRule::new(&["number"], Constraint::Presence).on_create(),
        ValidationRule::new(&["number"], Constraint::integer()),
        ValidationRule::new(&["number"], Constraint::length_between(12, 19)),
        ValidationRule::new(&["cvv"], Constraint::Presence).on_create(),
        ValidationRule::new(&["cvv"], Constraint::integer()),
        ValidationRule::new(&["cvv"], Constraint::length_between(3, 4)),
        ValidationRule::new(&["cardholder_name"], Constraint::max_length(255)),
        ValidationRule::new(&["expiration_month"], Constraint::Presence),
        ValidationRule::new(&["expiration_month"], Constraint::integer_between(1, 12)),
        ValidationRule::new(&["expiration_year"], Constraint::Presence),
        ValidationRule::new(
            &["expiration_year"],
            Constraint::integer_between(config.min_expiration_year, config.max_expiration_year),
        ),
    ])
}

/// Address rules; presence of street and postal code is configurable
pub fn address(config: &ValidationConfig) -> Result<Validator> {
    let mut validator = Validator::new(vec![
        ValidationRule::new(
            &[
                "first_name",
                "last_name",
                "company",
                "street_address",
                "extended_address",
                "locality",
                "region",
            ],
            Constraint::max_length(255),
        ),
        ValidationRule::new(&["postal_code"], Constraint::format(r"(?i)^[- a-z0-9]+$")?),
    ]);
    if config.require_street_address {
        validator.push(ValidationRule::new(&["street_address"], Constraint::Presence));
    }
    if config.require_postal_code {
        validator.push(ValidationRule::new(&["postal_code"], Constraint::Presence));
    }
    Ok(validator)
}

/// Transaction rules: amount and type
pub fn transaction() -> Validator {
    Validator::new(vec![
        ValidationRule::new(&["amount"], Constraint::Presence).on_create(),
        ValidationRule::new(&["amount"], Constraint::number_at_least(Decimal::ZERO)),
        ValidationRule::new(&["type"], Constraint::Presence).on_create(),
        ValidationRule::new(&["type"], Constraint::inclusion(TRANSACTION_TYPES)),
    ])
}

/// Schema covering every entity type; read-only types carry no rules
pub fn schema(config: &ValidationConfig) -> Result<Schema> {
    let mut schema = Schema::new();
    schema.insert(EntityKind::Customer, customer()?);
    schema.insert(EntityKind::CreditCard, credit_card(config));
    schema.insert(EntityKind::Address, address(config)?);
    schema.insert(EntityKind::Transaction, transaction());
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Address, CreditCard, Customer, Transaction};
    use record_core::Entity;
    use serde_json::{json, Value};

    fn schema() -> Schema {
        super::schema(&ValidationConfig::default()).unwrap()
    }

    fn card(overrides: Value) -> CreditCard {
        let mut hash = json!({
            "customer_id": "customer_id",
            "number": "4111111111111111",
            "cvv": "123",
            "cardholder_name": "Brain Tree",
            "expiration_month": "05",
            "expiration_year": "2037"
        });
        for (name, value) in overrides.as_object().cloned().unwrap_or_default() {
            hash[name.as_str()] = value;
        }
        CreditCard::from_source(&hash)
    }

    fn card_errors(overrides: Value, field: &str) -> Vec<String> {
        let mut card = card(overrides);
        card.is_valid(&schema());
        card.errors().on(field).to_vec()
    }

    #[test]
    fn test_customer_id_rules() {
        let schema = schema();
        for id in ["foo-bar_1", "", "A".repeat(36).as_str()] {
            let mut customer = Customer::from_source(&json!({ "id": id }));
            assert!(customer.is_valid(&schema), "{} should be valid", id);
        }
        for id in ["foo bar", "foo@bar", "all", "new", "a".repeat(37).as_str()] {
            let mut customer = Customer::from_source(&json!({ "id": id }));
            assert!(!customer.is_valid(&schema), "{} should be invalid", id);
        }
    }

    #[test]
    fn test_customer_name_length() {
        let mut customer = Customer::from_source(&json!({"first_name": "f".repeat(256)}));
        assert!(!customer.is_valid(&schema()));
        assert_eq!(
            customer.errors().on("first_name"),
            ["is too long (maximum is 255 characters)"]
        );
    }

    #[test]
    fn test_card_customer_id() {
        assert_eq!(card_errors(json!({"customer_id": null}), "customer_id"), ["can't be blank"]);
        assert!(!card_errors(json!({"customer_id": "a".repeat(37)}), "customer_id").is_empty());
    }

    #[test]
    fn test_card_number() {
        assert_eq!(card_errors(json!({"number": null}), "number"), ["can't be blank"]);
        assert!(card_errors(json!({"number": "foobar"}), "number").contains(&"is not a number".to_string()));
        assert_eq!(
            card_errors(json!({"number": "1".repeat(11)}), "number"),
            ["is too short (minimum is 12 characters)"]
        );
        assert_eq!(
            card_errors(json!({"number": "1".repeat(20)}), "number"),
            ["is too long (maximum is 19 characters)"]
        );
        assert!(card_errors(json!({"number": "1".repeat(12)}), "number").is_empty());
        assert!(card_errors(json!({"number": "1".repeat(19)}), "number").is_empty());
    }

    #[test]
    fn test_card_cvv() {
        assert_eq!(card_errors(json!({"cvv": null}), "cvv"), ["can't be blank"]);
        assert_eq!(card_errors(json!({"cvv": "foo"}), "cvv"), ["is not a number"]);
        assert!(!card_errors(json!({"cvv": "12"}), "cvv").is_empty());
        assert!(!card_errors(json!({"cvv": "12345"}), "cvv").is_empty());
        assert!(card_errors(json!({"cvv": "123"}), "cvv").is_empty());
        assert!(card_errors(json!({"cvv": "1234"}), "cvv").is_empty());
    }

    #[test]
    fn test_card_expiration_bounds() {
        for month in [0, 13] {
            assert!(!card_errors(json!({"expiration_month": month}), "expiration_month").is_empty());
        }
        for month in [1, 12] {
            assert!(card_errors(json!({"expiration_month": month}), "expiration_month").is_empty());
        }
        for year in [1975, 2201] {
            assert!(!card_errors(json!({"expiration_year": year}), "expiration_year").is_empty());
        }
        for year in [1976, 2200] {
            assert!(card_errors(json!({"expiration_year": year}), "expiration_year").is_empty());
        }
        assert_eq!(
            card_errors(json!({"expiration_month": null}), "expiration_month"),
            ["can't be blank"]
        );
    }

    #[test]
    fn test_cardholder_name_length() {
        assert!(card_errors(json!({"cardholder_name": "f".repeat(255)}), "cardholder_name").is_empty());
        assert!(!card_errors(json!({"cardholder_name": "f".repeat(256)}), "cardholder_name").is_empty());
    }

    #[test]
    fn test_persisted_card_skips_create_presence() {
        let document = json!({"token": "tok", "expiration_month": "05", "expiration_year": "2037"});
        let mut card = CreditCard::from_document(document.as_object().cloned().unwrap());
        assert!(card.is_valid(&schema()), "{}", card.errors());
    }

    #[test]
    fn test_address_presence_follows_config() {
        let relaxed = super::schema(&ValidationConfig {
            require_postal_code: false,
            require_street_address: false,
            ..ValidationConfig::default()
        })
        .unwrap();

        let mut address = Address::from_source(&json!({"locality": "Chicago"}));
        assert!(address.is_valid(&relaxed));
        assert!(!address.is_valid(&schema()));
        assert!(address.errors().contains("street_address"));
        assert!(address.errors().contains("postal_code"));
    }

    #[test]
    fn test_transaction_amount_and_type() {
        let schema = schema();
        let mut transaction = Transaction::from_source(&json!({"amount": "10.00"}));
        assert!(transaction.is_valid(&schema), "{}", transaction.errors());

        let mut transaction = Transaction::from_source(&json!({"amount": "-1"}));
        assert!(!transaction.is_valid(&schema));

        let mut transaction = Transaction::from_source(&json!({"amount": "1", "type": "refund"}));
        assert!(!transaction.is_valid(&schema));
        assert_eq!(transaction.errors().on("type"), ["is not included in the list"]);

        let mut transaction = Transaction::from_source(&json!({}));
        assert!(!transaction.is_valid(&schema));
        assert_eq!(transaction.errors().on("amount"), ["can't be blank"]);
    }
}
