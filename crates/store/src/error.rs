//! Store error types.

use std::fmt;

use thiserror::Error;
use userstore_core::{ObjectIdError, User};

use crate::db::Collection;

/// Result type alias for store operations.
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// Errors that can occur during store operations.
///
/// No variant is retried anywhere in the store; every failure surfaces to the
/// immediate caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An identifier string could not be decoded.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] ObjectIdError),

    /// No document matched the lookup.
    #[error("not found")]
    NotFound,

    /// Another user already holds this username.
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// The database could not be reached.
    #[error("connectivity failure: {0}")]
    Connectivity(#[source] sqlx::Error),

    /// The user was stored but some nested writes failed.
    #[error(transparent)]
    PartialAggregate(Box<PartialAggregateFailure>),

    /// A unique index rejected the write.
    #[error("unique constraint violated in {collection}")]
    Conflict {
        /// Collection holding the index.
        collection: Collection,
    },

    /// Any other server-side failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    /// A stored document or id could not be decoded.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A document body could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this is a `NotFound` error.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => Self::Connectivity(e),
            other => Self::Database(other),
        }
    }
}

impl From<PartialAggregateFailure> for StoreError {
    fn from(failure: PartialAggregateFailure) -> Self {
        Self::PartialAggregate(Box::new(failure))
    }
}

/// A user write that succeeded while some nested card or address writes did not.
///
/// The user document stays persisted with the references that did succeed;
/// nothing is rolled back.
#[derive(Debug)]
pub struct PartialAggregateFailure {
    /// The user as stored.
    pub user: User,
    /// First card creation failure, if any.
    pub card_error: Option<StoreError>,
    /// First address creation failure, if any.
    pub address_error: Option<StoreError>,
}

impl fmt::Display for PartialAggregateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {} stored with failed attributes", self.user.id)?;
        if let Some(e) = &self.card_error {
            write!(f, "; card: {e}")?;
        }
        if let Some(e) = &self.address_error {
            write!(f, "; address: {e}")?;
        }
        Ok(())
    }
}

impl std::error::Error for PartialAggregateFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.card_error
            .as_ref()
            .or(self.address_error.as_ref())
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}
