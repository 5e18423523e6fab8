//! Sales and credits
//!
//! A new transaction carries its payment instrument either by reference
//! (`customer_id`, `payment_method_token`) or nested (`customer`,
//! `credit_card`). Once persisted it only moves through the settlement
//! operations on [`Gateway`](crate::Gateway).

use crate::address::Address;
use crate::credit_card::{self, CreditCard};
use crate::customer::Customer;
use crate::model::Model;
use crate::modification::{AddOn, Discount};
use crate::plan::Plan;
use record_core::{
    validate_nested, Action, AssociationDescriptor, AttributeRegistry, BelongsTo, Cardinality,
    Collection, Entity, EntityKind, Error, ErrorSet, GatewayConfig, HasMany, HasOne, Linked,
    Operation, Payload, Record, Result, Schema, Strategy,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

static TRANSACTION: AttributeRegistry = AttributeRegistry {
    kind: EntityKind::Transaction,
    creatable: &[
        "amount",
        "billing",
        "channel",
        "custom_fields",
        "customer_id",
        "descriptor",
        "merchant_account_id",
        "options",
        "order_id",
        "payment_method_token",
        "purchase_order_number",
        "recurring",
        "shipping",
        "tax_amount",
        "tax_exempt",
        "type",
        "venmo_sdk_payment_method_code",
    ],
    updatable: &[],
    readonly: &[
        "avs_error_response_code",
        "avs_postal_code_response_code",
        "avs_street_address_response_code",
        "billing_details",
        "created_at",
        "credit_card_details",
        "currency_iso_code",
        "customer_details",
        "cvv_response_code",
        "id",
        "plan_id",
        "refund_ids",
        "refunded_transaction_id",
        "settlement_batch_id",
        "shipping_details",
        "status",
        "status_history",
        "subscription_details",
        "updated_at",
    ],
    nested_excluded: &[],
    operations: &[
        Operation::Find,
        Operation::All,
        Operation::Create,
        Operation::SubmitForSettlement,
        Operation::Refund,
        Operation::Void,
    ],
};

static ASSOCIATIONS: [AssociationDescriptor; 7] = [
    AssociationDescriptor {
        name: "add_ons",
        target: EntityKind::AddOn,
        cardinality: Cardinality::Many,
        strategy: Strategy::Embedded,
        source_field: "add_ons",
    },
    AssociationDescriptor {
        name: "discounts",
        target: EntityKind::Discount,
        cardinality: Cardinality::Many,
        strategy: Strategy::Embedded,
        source_field: "discounts",
    },
    AssociationDescriptor {
        name: "billing",
        target: EntityKind::Address,
        cardinality: Cardinality::One,
        strategy: Strategy::Embedded,
        source_field: "billing_details",
    },
    AssociationDescriptor {
        name: "shipping",
        target: EntityKind::Address,
        cardinality: Cardinality::One,
        strategy: Strategy::Embedded,
        source_field: "shipping_details",
    },
    AssociationDescriptor {
        name: "customer",
        target: EntityKind::Customer,
        cardinality: Cardinality::One,
        strategy: Strategy::Embedded,
        source_field: "customer_details",
    },
    AssociationDescriptor {
        name: "credit_card",
        target: EntityKind::CreditCard,
        cardinality: Cardinality::One,
        strategy: Strategy::Embedded,
        source_field: "credit_card_details",
    },
    AssociationDescriptor {
        name: "plan",
        target: EntityKind::Plan,
        cardinality: Cardinality::One,
        strategy: Strategy::Reference,
        source_field: "plan_id",
    },
];

/// Gateway documents hidden from [`Entity::attributes`] besides association fragments
const HIDDEN: &[&str] = &["status_history", "descriptor", "subscription_details"];

/// Settlement state reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Approved, waiting for settlement
    Authorized,
    /// Authorization lapsed before settlement
    AuthorizationExpired,
    /// Queued for the next settlement batch
    SubmittedForSettlement,
    /// Settlement in progress
    Settling,
    /// Funds settled
    Settled,
    /// Processor declined the settlement
    SettlementDeclined,
    /// Cancelled before settlement
    Voided,
    /// Processing error
    Failed,
    /// Rejected by gateway fraud rules
    GatewayRejected,
    /// Declined by the processor
    ProcessorDeclined,
    /// Missing or not recognized
    Unknown,
}

impl TransactionStatus {
    /// Gateway spelling of the status
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Authorized => "authorized",
            TransactionStatus::AuthorizationExpired => "authorization_expired",
            TransactionStatus::SubmittedForSettlement => "submitted_for_settlement",
            TransactionStatus::Settling => "settling",
            TransactionStatus::Settled => "settled",
            TransactionStatus::SettlementDeclined => "settlement_declined",
            TransactionStatus::Voided => "voided",
            TransactionStatus::Failed => "failed",
            TransactionStatus::GatewayRejected => "gateway_rejected",
            TransactionStatus::ProcessorDeclined => "processor_declined",
            TransactionStatus::Unknown => "unknown",
        }
    }

    /// Whether the operation may run from this status
    pub fn permits(&self, operation: Operation) -> bool {
        match operation {
            Operation::SubmitForSettlement => *self == TransactionStatus::Authorized,
            Operation::Void => matches!(
                self,
                TransactionStatus::Authorized | TransactionStatus::SubmittedForSettlement
            ),
            Operation::Refund => {
                matches!(self, TransactionStatus::Settling | TransactionStatus::Settled)
            }
            _ => true,
        }
    }
}

impl From<&str> for TransactionStatus {
    fn from(status: &str) -> Self {
        match status {
            "authorized" => TransactionStatus::Authorized,
            "authorization_expired" => TransactionStatus::AuthorizationExpired,
            "submitted_for_settlement" => TransactionStatus::SubmittedForSettlement,
            "settling" => TransactionStatus::Settling,
            "settled" => TransactionStatus::Settled,
            "settlement_declined" => TransactionStatus::SettlementDeclined,
            "voided" => TransactionStatus::Voided,
            "failed" => TransactionStatus::Failed,
            "gateway_rejected" => TransactionStatus::GatewayRejected,
            "processor_declined" => TransactionStatus::ProcessorDeclined,
            _ => TransactionStatus::Unknown,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sale or credit
#[derive(Debug, Clone)]
pub struct Transaction {
    record: Record,
    add_ons: HasMany<AddOn>,
    discounts: HasMany<Discount>,
    billing: HasOne<Address>,
    shipping: HasOne<Address>,
    customer: BelongsTo<Customer>,
    credit_card: BelongsTo<CreditCard>,
    plan: BelongsTo<Plan>,
}

impl Transaction {
    /// Amount charged
    pub fn amount(&self) -> Option<Decimal> {
        self.record.get_decimal("amount")
    }

    /// Replace the amount
    pub fn set_amount(&mut self, amount: Decimal) {
        self.record.set("amount", amount.to_string());
    }

    /// `sale` or `credit`
    pub fn transaction_type(&self) -> Option<&str> {
        self.record.get_str("type")
    }

    /// Current settlement state
    pub fn status(&self) -> TransactionStatus {
        self.record
            .get_str("status")
            .map(TransactionStatus::from)
            .unwrap_or(TransactionStatus::Unknown)
    }

    /// Identifiers of refunds issued against this transaction
    pub fn refund_ids(&self) -> Vec<&str> {
        self.record
            .get("refund_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// For a refund, the transaction it refunds
    pub fn refunded_transaction_id(&self) -> Option<&str> {
        self.record.get_str("refunded_transaction_id")
    }

    /// Add-ons applied to the transaction
    pub fn add_ons(&mut self) -> &mut Collection<AddOn> {
        self.add_ons.resolve(&self.record, Payload::new())
    }

    /// Discounts applied to the transaction
    pub fn discounts(&mut self) -> &mut Collection<Discount> {
        self.discounts.resolve(&self.record, Payload::new())
    }

    /// Billing address, blank when not given
    pub fn billing(&mut self) -> &mut Address {
        self.billing.resolve(&self.record)
    }

    /// Replace the billing address
    pub fn set_billing(&mut self, address: Address) {
        self.billing.set(address);
    }

    /// Shipping address, blank when not given
    pub fn shipping(&mut self) -> &mut Address {
        self.shipping.resolve(&self.record)
    }

    /// Replace the shipping address
    pub fn set_shipping(&mut self, address: Address) {
        self.shipping.set(address);
    }

    /// Customer the transaction is for
    pub fn customer(&mut self) -> Option<&mut Customer> {
        self.customer.resolve(&self.record)
    }

    /// Replace the customer
    pub fn set_customer(&mut self, customer: Option<Customer>) {
        self.customer.set(customer);
    }

    /// Card charged by the transaction
    pub fn credit_card(&mut self) -> Option<&mut CreditCard> {
        self.credit_card.resolve(&self.record)
    }

    /// Replace the card
    pub fn set_credit_card(&mut self, card: Option<CreditCard>) {
        self.credit_card.set(card);
    }

    /// Plan referenced by `plan_id`, loaded on first access
    pub fn resolve_plan<F>(&mut self, loader: F) -> Result<Option<&mut Plan>>
    where
        F: FnOnce(&str) -> Result<Plan>,
    {
        self.plan.resolve_with(&self.record, loader)
    }

    /// Reject a settlement operation the current state does not allow
    ///
    /// Violations replace the transaction's errors and are returned as
    /// `ValidationFailed`.
    pub fn check_transition(&mut self, operation: Operation, amount: Option<Decimal>) -> Result<()> {
        let status = self.status();
        let mut errors = ErrorSet::new();

        if !status.permits(operation) {
            errors.add_to_base(format!(
                "Cannot {} transaction in status {}",
                operation, status
            ));
        }
        if let Some(amount) = amount {
            if amount < Decimal::ZERO {
                errors.add("amount", "must be greater than or equal to 0");
            } else if let Some(limit) = self.amount() {
                if amount > limit {
                    errors.add("amount", format!("must be less than or equal to {}", limit));
                }
            }
        }

        *self.record.errors_mut() = errors.clone();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::ValidationFailed(errors))
        }
    }

    /// Remember a refund issued against this transaction
    pub fn record_refund(&mut self, refund_id: &str) {
        let mut ids = self.refund_ids();
        if ids.contains(&refund_id) {
            return;
        }
        ids.push(refund_id);
        let ids: Vec<Value> = ids.into_iter().map(Value::from).collect();
        self.record.set("refund_ids", Value::Array(ids));
    }
}

impl Entity for Transaction {
    fn registry() -> &'static AttributeRegistry {
        &TRANSACTION
    }

    fn associations() -> &'static [AssociationDescriptor] {
        &ASSOCIATIONS
    }

    fn from_record(mut record: Record) -> Self {
        if record.is_new() && record.get("type").is_none() {
            record.set("type", "sale");
        }
        Self {
            record,
            add_ons: HasMany::new(&ASSOCIATIONS[0]),
            discounts: HasMany::new(&ASSOCIATIONS[1]),
            billing: HasOne::new(&ASSOCIATIONS[2]),
            shipping: HasOne::new(&ASSOCIATIONS[3]),
            customer: BelongsTo::new(&ASSOCIATIONS[4]),
            credit_card: BelongsTo::new(&ASSOCIATIONS[5]),
            plan: BelongsTo::new(&ASSOCIATIONS[6]),
        }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn attributes(&self) -> Payload {
        self.record
            .attributes()
            .iter()
            .filter(|(name, _)| {
                let name = name.as_str();
                !HIDDEN.contains(&name)
                    && !ASSOCIATIONS
                        .iter()
                        .any(|association| association.source_field == name)
            })
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn validate_associations(&mut self, schema: &Schema) {
        if self.record.is_persisted() {
            return;
        }
        let card = self.credit_card.resolve(&self.record).filter(|card| card.is_new());
        validate_nested(self.record.errors_mut(), "credit_card", card, schema);

        let customer = self.customer.resolve(&self.record).filter(|customer| customer.is_new());
        validate_nested(self.record.errors_mut(), "customer", customer, schema);

        let billing = self.billing.resolve_present(&self.record).filter(|address| address.is_new());
        validate_nested(self.record.errors_mut(), "billing", billing, schema);

        let shipping = self.shipping.resolve_present(&self.record).filter(|address| address.is_new());
        validate_nested(self.record.errors_mut(), "shipping", shipping, schema);
    }

    fn add_errors(&mut self, errors: &ErrorSet) {
        let child = errors.without_base();
        if let Some(customer) = self.customer.resolve(&self.record) {
            customer.add_errors(&child);
        }
        if let Some(card) = self.credit_card.resolve(&self.record) {
            card.add_errors(&child);
        }
        if let Some(billing) = self.billing.resolve_present(&self.record) {
            billing.add_errors(&child);
        }
        if let Some(shipping) = self.shipping.resolve_present(&self.record) {
            shipping.add_errors(&child);
        }
        self.record.errors_mut().merge(errors);
    }

    fn reset_associations(&mut self) {
        self.add_ons.reset();
        self.discounts.reset();
        self.billing.reset();
        self.shipping.reset();
        self.customer.reset();
        self.credit_card.reset();
        self.plan.reset();
    }

    fn around_persist<R, F>(&mut self, persist: F) -> Result<R>
    where
        F: FnOnce(&mut Self) -> Result<R>,
    {
        let result = persist(self);
        if let Some(card) = self.credit_card.get_mut() {
            card.clear_encrypted_attributes();
        }
        for field in ["credit_card", "credit_card_details"] {
            if let Some(fragment) = self.record.get_object_mut(field) {
                credit_card::scrub(fragment);
            }
        }
        result
    }
}

impl Model for Transaction {
    fn request_body(&mut self, action: Action, config: &GatewayConfig) -> Payload {
        let mut body = self.attributes_for(action);

        let customer = match self.customer.resolve(&self.record) {
            Some(customer) => Linked::for_entity(Some(&*customer)),
            None => Linked::Absent,
        };
        let default_token = self
            .customer
            .get_mut()
            .and_then(|customer| customer.default_credit_card())
            .and_then(|card| card.token())
            .map(str::to_string);
        customer.apply(&mut body, "customer", "customer_id");

        let card = match self.credit_card.resolve(&self.record) {
            Some(card) => Linked::for_model(card, |card| {
                card.request_body(Action::AsAssociation, config)
            }),
            None => Linked::Absent,
        };
        card.or_reference(default_token.as_deref())
            .apply(&mut body, "credit_card", "payment_method_token");

        for (slot, nested_key, reference_key) in [
            (&mut self.billing, "billing", "billing_address_id"),
            (&mut self.shipping, "shipping", "shipping_address_id"),
        ] {
            match slot.resolve_present(&self.record) {
                Some(address) => {
                    Linked::for_entity(Some(&*address)).apply(&mut body, nested_key, reference_key)
                }
                // raw values that are not an address
                None => {
                    body.remove(nested_key);
                }
            }
        }

        if action == Action::Create && !body.contains_key("merchant_account_id") {
            if let Some(account) = &config.merchant_account_id {
                body.insert("merchant_account_id".into(), Value::String(account.clone()));
            }
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn persisted(status: &str) -> Transaction {
        let document = json!({"id": "tx1", "amount": "10.00", "status": status, "type": "sale"});
        Transaction::from_document(document.as_object().cloned().unwrap())
    }

    #[test]
    fn test_type_defaults_to_sale() {
        let transaction = Transaction::from_source(&json!({"amount": "1.00"}));
        assert_eq!(transaction.transaction_type(), Some("sale"));

        let transaction = Transaction::from_source(&json!({"amount": "1.00", "type": "credit"}));
        assert_eq!(transaction.transaction_type(), Some("credit"));
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!(persisted("settled").status(), TransactionStatus::Settled);
        assert_eq!(persisted("mystery").status(), TransactionStatus::Unknown);
        assert_eq!(TransactionStatus::SubmittedForSettlement.to_string(), "submitted_for_settlement");
    }

    #[test]
    fn test_transition_checks() {
        assert!(persisted("authorized")
            .check_transition(Operation::SubmitForSettlement, None)
            .is_ok());
        assert!(persisted("submitted_for_settlement")
            .check_transition(Operation::Void, None)
            .is_ok());

        let mut settled = persisted("settled");
        let err = settled.check_transition(Operation::Void, None).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            settled.errors().on_base(),
            ["Cannot void transaction in status settled"]
        );
        assert!(settled.check_transition(Operation::Refund, None).is_ok());
        assert!(settled.errors().is_empty());
    }

    #[test]
    fn test_settlement_amount_limit() {
        let mut transaction = persisted("authorized");
        let over = Some(Decimal::new(1001, 2));
        assert!(transaction
            .check_transition(Operation::SubmitForSettlement, over)
            .is_err());
        assert_eq!(
            transaction.errors().on("amount"),
            ["must be less than or equal to 10.00"]
        );
        let exact = Some(Decimal::new(1000, 2));
        assert!(transaction
            .check_transition(Operation::SubmitForSettlement, exact)
            .is_ok());
    }

    #[test]
    fn test_record_refund_once() {
        let mut transaction = persisted("settled");
        transaction.record_refund("r1");
        transaction.record_refund("r1");
        transaction.record_refund("r2");
        assert_eq!(transaction.refund_ids(), ["r1", "r2"]);
    }

    #[test]
    fn test_attributes_hide_gateway_details() {
        let document = json!({
            "id": "tx1",
            "amount": "10.00",
            "customer_details": {"id": "c1"},
            "status_history": [],
            "descriptor": {"name": "x"}
        });
        let transaction = Transaction::from_document(document.as_object().cloned().unwrap());
        let attributes = transaction.attributes();
        assert!(attributes.contains_key("amount"));
        for hidden in ["customer_details", "status_history", "descriptor"] {
            assert!(!attributes.contains_key(hidden));
        }
    }

    #[test]
    fn test_unusable_address_values_not_sent() {
        let mut transaction = Transaction::from_source(&json!({
            "amount": "10.00",
            "billing": "not-an-address",
            "shipping": {"postal_code": null}
        }));
        let body = transaction.request_body(Action::Create, &GatewayConfig::default());
        assert!(!body.contains_key("billing"));
        assert!(!body.contains_key("shipping"));
        assert!(!body.contains_key("billing_address_id"));

        let mut transaction = Transaction::from_source(&json!({
            "amount": "10.00",
            "billing": {"postal_code": "60622"}
        }));
        let body = transaction.request_body(Action::Create, &GatewayConfig::default());
        assert_eq!(body["billing"]["postal_code"], json!("60622"));
        assert!(!body.contains_key("shipping"));
    }

    #[test]
    fn test_around_persist_scrubs_card_fragment() {
        let mut transaction = Transaction::from_source(&json!({
            "amount": "10.00",
            "credit_card": {"number": "4111111111111111", "cvv": "123", "cardholder_name": "Brain"}
        }));
        assert!(transaction.credit_card().is_some());

        let result: Result<()> = transaction.around_persist(|_| Err("timeout".into()));
        assert!(result.is_err());

        assert!(transaction.credit_card().unwrap().get("number").is_none());
        let fragment = transaction.record().get_object("credit_card").unwrap();
        assert!(!fragment.contains_key("number"));
        assert!(!fragment.contains_key("cvv"));
        assert_eq!(fragment["cardholder_name"], json!("Brain"));
    }
}
