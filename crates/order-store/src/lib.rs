//! Order persistence for the order backend.
//!
//! Exposes the [`OrderStore`] trait with two implementations:
//! - [`PostgresOrderStore`]: sqlx-backed, serializing the monthly
//!   order-number sequencer with a transaction-scoped advisory lock
//! - [`InMemoryOrderStore`]: lock-serialized equivalent for unit and
//!   API tests
//!
//! Both implementations also answer the read-side capability traits
//! ([`domain::CustomerDirectory`], [`domain::ProductCatalog`],
//! [`domain::PreferenceSource`]) consumed by the notification
//! dispatcher.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use store::OrderStore;
