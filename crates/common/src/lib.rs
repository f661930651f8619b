//! Shared types used across the order backend.

mod types;

pub use types::{Money, OrderId, ProductId, UserId};
