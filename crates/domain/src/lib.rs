//! Domain layer for the order backend.
//!
//! This crate provides the core order lifecycle model:
//! - The [`Order`] record and its status state machine
//! - Once-only shipped/delivered stamping via [`Order::apply_transition`]
//! - Phone normalization for outbound messaging destinations
//! - Per-user notification preferences
//! - Read-side capability traits consumed by the notification dispatcher

pub mod error;
pub mod lookup;
pub mod order;
pub mod phone;
pub mod preferences;

pub use common::{Money, OrderId, ProductId, UserId};
pub use error::OrderError;
pub use lookup::{CustomerDirectory, PreferenceSource, ProductCatalog, ProductSummary};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, TransitionOutcome};
pub use phone::{CanonicalPhone, normalize};
pub use preferences::NotificationPreferences;
