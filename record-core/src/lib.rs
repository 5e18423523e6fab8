//! Gateway Records Core
//!
//! Generic machinery for mapping payment gateway documents onto validated
//! domain records.
//!
//! # Architecture
//!
//! - **Attribute Registry**: static per-type tables of creatable, updatable
//!   and read-only fields plus supported operations
//! - **Validator Chain**: declarative rule tables interpreted on demand
//! - **Associations**: lazily resolved one/many slots, embedded or referenced
//! - **Request Builder**: in-scope attributes plus token-or-nested overrides
//! - **Transport**: the single seam where requests leave the process
//!
//! # Invariants
//!
//! - Read-only attributes never appear in a create or update body
//! - A related model is sent as a token or nested, never both
//! - Unsupported operations fail before the transport is touched

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod association;
pub mod attributes;
pub mod config;
pub mod entity;
pub mod error;
pub mod error_set;
pub mod payload;
pub mod source;
pub mod transport;
pub mod types;
pub mod validation;

// Re-exports
pub use association::{
    AssociationDescriptor, BelongsTo, Cardinality, Collection, HasMany, HasOne, Persist, Strategy,
};
pub use attributes::{Action, AttributeRegistry};
pub use config::{Config, GatewayConfig, ValidationConfig};
pub use entity::{validate_nested, Entity};
pub use error::{Error, Result};
pub use error_set::{ErrorSet, BASE};
pub use payload::Linked;
pub use source::{AttributeSource, FieldProbe};
pub use transport::{remote_error_set, RemoteError, Request, Response, StubTransport, Transport};
pub use types::{EntityKind, Operation, Payload, Record};
pub use validation::{Constraint, RuleScope, Schema, ValidationRule, Validator};
