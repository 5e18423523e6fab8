//! Subscription add-ons and discounts
//!
//! Both are read-only price modifications defined in the gateway's control
//! panel; they are only ever listed or embedded in plans and transactions.

use crate::model::Model;
use record_core::{AttributeRegistry, Entity, EntityKind, Operation, Record};
use rust_decimal::Decimal;

const FIELDS: &[&str] = &[
    "id",
    "amount",
    "created_at",
    "current_billing_cycle",
    "description",
    "kind",
    "merchant_id",
    "name",
    "never_expires",
    "number_of_billing_cycles",
    "quantity",
    "updated_at",
];

static ADD_ON: AttributeRegistry = AttributeRegistry {
    kind: EntityKind::AddOn,
    creatable: &[],
    updatable: &[],
    readonly: FIELDS,
    nested_excluded: &[],
    operations: &[Operation::All],
};

static DISCOUNT: AttributeRegistry = AttributeRegistry {
    kind: EntityKind::Discount,
    creatable: &[],
    updatable: &[],
    readonly: FIELDS,
    nested_excluded: &[],
    operations: &[Operation::All],
};

macro_rules! modification {
    ($(#[$meta:meta])* $name:ident, $registry:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            record: Record,
        }

        impl Entity for $name {
            fn registry() -> &'static AttributeRegistry {
                &$registry
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

        impl Model for $name {}

        impl $name {
            /// Display name
            pub fn name(&self) -> Option<&str> {
                self.record.get_str("name")
            }

            /// Amount per billing cycle
            pub fn amount(&self) -> Option<Decimal> {
                self.record.get_decimal("amount")
            }

            /// Number of times the modification applies
            pub fn quantity(&self) -> Option<i64> {
                self.record.get("quantity").and_then(serde_json::Value::as_i64)
            }

            /// Whether the modification applies for every billing cycle
            pub fn never_expires(&self) -> bool {
                self.record.get_bool("never_expires").unwrap_or(false)
            }
        }
    };
}

modification!(
    /// Recurring charge added to a plan or subscription
    AddOn,
    ADD_ON
);
modification!(
    /// Recurring reduction applied to a plan or subscription
    Discount,
    DISCOUNT
);
