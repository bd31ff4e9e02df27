//! Unified error type for the marketplace core.
//!
//! Service functions return `Result<T>`; callers hosting an HTTP layer map
//! variants onto status codes (Validation/EmptyCart/InvalidCart/
//! CapacityExceeded/InvalidState -> 400, NotFound -> 404, Forbidden -> 403,
//! Conflict -> 409, Database/Io -> 500 with the detail logged, not returned).

use thiserror::Error;

/// All errors surfaced by the marketplace services.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// Human-readable description of the problem
        message: String,
    },

    /// Malformed or out-of-range input, detected before any mutation
    #[error("{message}")]
    Validation {
        /// Field-level description of what failed
        message: String,
    },

    /// Missing resource, or a resource not owned by the caller
    #[error("{what} not found")]
    NotFound {
        /// The kind of resource that was looked up
        what: String,
    },

    /// Authenticated caller lacks the role required for the operation
    #[error("{message}")]
    Forbidden {
        /// Why the caller is not allowed
        message: String,
    },

    /// Duplicate of a unique resource (review, cart row, category name)
    #[error("{message}")]
    Conflict {
        /// What already exists
        message: String,
    },

    /// A lesson cannot absorb the requested quantity
    #[error("Only {available} spots available")]
    CapacityExceeded {
        /// Seats the lesson can still accept
        available: i32,
    },

    /// Checkout was attempted with no cart rows
    #[error("Cart is empty")]
    EmptyCart,

    /// Every cart row referenced a lesson that no longer exists
    #[error("Cart contains invalid items. Please remove them and try again.")]
    InvalidCart,

    /// A state-machine transition from a terminal status
    #[error("{message}")]
    InvalidState {
        /// Which transition was rejected
        message: String,
    },

    /// A monetary amount or quantity outside its domain
    #[error("Invalid amount: {amount}")]
    InvalidAmount {
        /// The offending value
        amount: f64,
    },

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O error (config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
