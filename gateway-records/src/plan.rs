//! Recurring billing plans

use crate::model::Model;
use crate::modification::{AddOn, Discount};
use record_core::{
    AssociationDescriptor, AttributeRegistry, Cardinality, Collection, Entity, EntityKind,
    HasMany, Operation, Payload, Record, Strategy,
};
use rust_decimal::Decimal;

static PLAN: AttributeRegistry = AttributeRegistry {
    kind: EntityKind::Plan,
    creatable: &[],
    updatable: &[],
    readonly: &[
        "id",
        "billing_day_of_month",
        "billing_frequency",
        "created_at",
        "currency_iso_code",
        "description",
        "name",
        "number_of_billing_cycles",
        "price",
        "trial_duration",
        "trial_duration_unit",
        "trial_period",
        "updated_at",
    ],
    nested_excluded: &[],
    operations: &[Operation::Find, Operation::All],
};

static ASSOCIATIONS: [AssociationDescriptor; 2] = [
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
];

/// Billing plan, looked up by id from transactions
#[derive(Debug, Clone)]
pub struct Plan {
    record: Record,
    add_ons: HasMany<AddOn>,
    discounts: HasMany<Discount>,
}

impl Plan {
    /// Display name
    pub fn name(&self) -> Option<&str> {
        self.record.get_str("name")
    }

    /// Price per billing cycle
    pub fn price(&self) -> Option<Decimal> {
        self.record.get_decimal("price")
    }

    /// Whether subscriptions start with a trial
    pub fn has_trial_period(&self) -> bool {
        self.record.get_bool("trial_period").unwrap_or(false)
    }

    /// Add-ons included in the plan
    pub fn add_ons(&mut self) -> &mut Collection<AddOn> {
        self.add_ons.resolve(&self.record, Payload::new())
    }

    /// Discounts included in the plan
    pub fn discounts(&mut self) -> &mut Collection<Discount> {
        self.discounts.resolve(&self.record, Payload::new())
    }
}

impl Entity for Plan {
    fn registry() -> &'static AttributeRegistry {
        &PLAN
    }

    fn associations() -> &'static [AssociationDescriptor] {
        &ASSOCIATIONS
    }

    fn from_record(record: Record) -> Self {
        Self {
            record,
            add_ons: HasMany::new(&ASSOCIATIONS[0]),
            discounts: HasMany::new(&ASSOCIATIONS[1]),
        }
    }

    fn record(&self) -> &Record {
        &self.record
    }

    fn record_mut(&mut self) -> &mut Record {
        &mut self.record
    }

    fn reset_associations(&mut self) {
        self.add_ons.reset();
        self.discounts.reset();
    }
}

impl Model for Plan {}
