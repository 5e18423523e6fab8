//! Core types for gateway records
//!
//! Payloads are plain JSON objects so inbound documents and outbound
//! requests share one shape:
//! - scalars for simple attributes
//! - objects for embedded associations
//! - arrays of objects for has-many associations

use crate::attributes::{Action, AttributeRegistry};
use crate::error_set::ErrorSet;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Gateway document or request body
pub type Payload = serde_json::Map<String, Value>;

/// Gateway resource type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Customer vault record
    Customer,
    /// Vaulted credit card (payment method)
    CreditCard,
    /// Customer, billing or shipping address
    Address,
    /// Sale or credit
    Transaction,
    /// Subscription add-on
    AddOn,
    /// Subscription discount
    Discount,
    /// Recurring billing plan
    Plan,
}

impl EntityKind {
    /// Gateway resource name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customer",
            EntityKind::CreditCard => "credit_card",
            EntityKind::Address => "address",
            EntityKind::Transaction => "transaction",
            EntityKind::AddOn => "add_on",
            EntityKind::Discount => "discount",
            EntityKind::Plan => "plan",
        }
    }

    /// Attribute holding the identifier
    pub const fn id_field(&self) -> &'static str {
        match self {
            EntityKind::CreditCard => "token",
            _ => "id",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Operation a caller can request on an entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Load one record by identifier
    Find,
    /// Load every record of a type
    All,
    /// Persist a new record
    Create,
    /// Persist changes to an existing record
    Update,
    /// Remove a record
    Delete,
    /// Capture an authorized transaction
    SubmitForSettlement,
    /// Return funds of a settled transaction
    Refund,
    /// Cancel an unsettled transaction
    Void,
}

impl Operation {
    /// Gateway operation name
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::All => "all",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::SubmitForSettlement => "submit_for_settlement",
            Operation::Refund => "refund",
            Operation::Void => "void",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// String representation used by length, format and inclusion rules
pub fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Absent, null, whitespace-only or empty containers
pub fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => false,
    }
}

/// Numeric reading of a JSON number or numeric string
pub fn value_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .ok()
            .or_else(|| Decimal::from_scientific(&n.to_string()).ok()),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Attribute storage shared by every model
///
/// Holds the raw attribute map, the persisted flag and the current
/// [`ErrorSet`]. The identifier lives in the attribute map under the
/// registry's identifier field, so it is null until the gateway assigns it.
#[derive(Debug, Clone)]
pub struct Record {
    registry: &'static AttributeRegistry,
    attributes: Payload,
    persisted: bool,
    errors: ErrorSet,
}

impl Record {
    /// Create record for a registry
    pub fn new(registry: &'static AttributeRegistry, attributes: Payload, persisted: bool) -> Self {
        Self {
            registry,
            attributes,
            persisted,
            errors: ErrorSet::new(),
        }
    }

    /// Empty new record
    pub fn blank(registry: &'static AttributeRegistry) -> Self {
        Self::new(registry, Payload::new(), false)
    }

    /// Type of the record
    pub fn kind(&self) -> EntityKind {
        self.registry.kind
    }

    /// Attribute table of the record's type
    pub fn registry(&self) -> &'static AttributeRegistry {
        self.registry
    }

    /// Identifier, when present and non-empty
    pub fn id(&self) -> Option<&str> {
        self.get_str(self.registry.kind.id_field())
            .filter(|id| !id.is_empty())
    }

    /// Attribute value; null counts as absent
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name).filter(|v| !v.is_null())
    }

    /// String attribute
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Decimal attribute, parsed from strings or numbers
    pub fn get_decimal(&self, name: &str) -> Option<Decimal> {
        self.get(name).and_then(value_decimal)
    }

    /// Boolean attribute
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Embedded object stored under a field
    pub fn get_object(&self, name: &str) -> Option<&Payload> {
        self.get(name).and_then(Value::as_object)
    }

    /// Nested object attribute, mutably
    pub fn get_object_mut(&mut self, name: &str) -> Option<&mut Payload> {
        self.attributes.get_mut(name).and_then(Value::as_object_mut)
    }

    /// Timestamp attribute in RFC 3339 form
    pub fn get_time(&self, name: &str) -> Option<DateTime<Utc>> {
        self.get_str(name)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|time| time.with_timezone(&Utc))
    }

    /// Whether no attribute carries a value
    pub fn is_empty(&self) -> bool {
        self.attributes.values().all(Value::is_null)
    }

    /// Set an attribute
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Remove an attribute, returning its value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }

    /// Raw attribute map
    pub fn attributes(&self) -> &Payload {
        &self.attributes
    }

    /// Whether the record came from the gateway
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Opposite of [`is_persisted`](Self::is_persisted)
    pub fn is_new(&self) -> bool {
        !self.persisted
    }

    /// Mark the record as stored or not
    pub fn set_persisted(&mut self, persisted: bool) {
        self.persisted = persisted;
    }

    /// Replace attributes with a gateway document and mark persisted
    pub fn load(&mut self, document: Payload) {
        self.attributes = document;
        self.persisted = true;
    }

    /// Errors on the record
    pub fn errors(&self) -> &ErrorSet {
        &self.errors
    }

    /// Errors on the record, mutably
    pub fn errors_mut(&mut self) -> &mut ErrorSet {
        &mut self.errors
    }

    /// In-scope attribute values for an action
    pub fn attributes_for(&self, action: Action) -> Payload {
        self.registry.attributes_for(action, self)
    }
}
