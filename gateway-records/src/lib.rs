//! Gateway Records
//!
//! Payment gateway resources (customers, credit cards, addresses,
//! transactions, plans and their modifications) built on `record-core`.
//!
//! # Architecture
//!
//! Every call through the [`Gateway`] runs the same pipeline:
//!
//! 1. **Check**: the operation is declared for the type and the record is in
//!    the right lifecycle state
//! 2. **Validate**: the type's rule table plus nested associations
//! 3. **Build**: in-scope attributes with token-or-nested association fields
//! 4. **Send**: one request through the [`Transport`](record_core::Transport)
//! 5. **Apply**: load the returned document, or push the returned errors down
//!    to the record and its associations
//!
//! # Example
//!
//! ```no_run
//! use gateway_records::{Gateway, Transaction};
//! use record_core::{Config, Entity, StubTransport};
//! use serde_json::json;
//!
//! fn main() -> record_core::Result<()> {
//!     let mut gateway = Gateway::new(Config::default(), StubTransport::new())?;
//!
//!     let mut sale = Transaction::from_source(&json!({
//!         "amount": "10.00",
//!         "credit_card": {
//!             "number": "4111111111111111",
//!             "cvv": "123",
//!             "expiration_date": "05/2037"
//!         }
//!     }));
//!     gateway.create(&mut sale)?;
//!     gateway.submit_for_settlement(&mut sale, None)?;
//!     println!("{} is {}", sale.id().unwrap_or("-"), sale.status());
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod address;
pub mod credit_card;
pub mod customer;
pub mod gateway;
pub mod model;
pub mod modification;
pub mod plan;
pub mod rules;
pub mod transaction;

// Re-exports
pub use address::Address;
pub use credit_card::CreditCard;
pub use customer::Customer;
pub use gateway::Gateway;
pub use model::Model;
pub use modification::{AddOn, Discount};
pub use plan::Plan;
pub use transaction::{Transaction, TransactionStatus};
