//! Domain error types.

use thiserror::Error;

/// Errors raised while validating or operating on orders.
///
/// All of these reject the request before any side effect runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrderError {
    /// Customer phone is required for every order.
    #[error("Customer phone is required")]
    MissingPhone,

    /// Phone number could not be normalized to a dialable form.
    #[error("Invalid phone number: {raw:?}")]
    InvalidPhone { raw: String },

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// Invalid item quantity.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Negative unit price.
    #[error("Invalid unit price: {price} (must not be negative)")]
    NegativePrice { price: i64 },

    /// Negative monetary amount on the order itself.
    #[error("Invalid {field}: {amount} (must not be negative)")]
    NegativeAmount { field: &'static str, amount: i64 },

    /// Unknown order status string.
    #[error("Unknown order status: {raw:?}")]
    UnknownStatus { raw: String },
}
