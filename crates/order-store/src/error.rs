use common::OrderId;
use thiserror::Error;

/// Errors that can occur when interacting with the order store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The monthly sequencer could not be serialized against a
    /// concurrent creation. Creation retries once before surfacing
    /// this as a transient error.
    #[error("Order number sequencing conflict for {year}-{month:02}")]
    SequencingConflict { year: i32, month: u32 },

    /// The order data was rejected before any side effect.
    #[error(transparent)]
    Invalid(#[from] domain::OrderError),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
