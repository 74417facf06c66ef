//! Database access for the user store.
//!
//! # Database
//!
//! A single `SQLite` file holds three document collections:
//!
//! ## Tables
//!
//! - `customers` - User documents, carrying `addresses`/`cards` reference sets
//! - `addresses` - Postal addresses, owned or anonymous
//! - `cards` - Payment cards, owned or anonymous
//!
//! Every table has the shape `(id TEXT PRIMARY KEY, doc TEXT NOT NULL)`, with
//! `doc` holding the JSON body. See [`schema`] for the DDL.
//!
//! # Connections
//!
//! The pool is dialed once by [`LeaseProvider::dial`] and never redialed. Each
//! storage operation checks out its own [`Lease`] and gives it back when the
//! lease is dropped, on every exit path.

pub mod documents;
pub mod records;
pub mod references;
pub mod schema;

use std::str::FromStr;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection};
use tracing::{debug, instrument};

pub use documents::{Collection, Document, EntityStore, Filter, Record};
pub use records::{AddressDoc, CardDoc, CustomerDoc};
pub use references::{ReferenceManager, ReferenceSet};

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::trace::TraceContext;

/// Create a `SQLite` connection pool from the store configuration.
///
/// The database file is created if it does not exist. The connect attempt is
/// bounded by `config.connect_timeout`, which also bounds every later
/// checkout.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL is malformed or the database cannot be
/// opened.
pub async fn create_pool(config: &StoreConfig) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(config.expose_database_url())?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.connect_timeout);

    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .connect_with(options)
        .await
}

/// Hands out one connection lease per storage operation.
///
/// Cloning is cheap; all clones share the same pool.
#[derive(Debug, Clone)]
pub struct LeaseProvider {
    pool: SqlitePool,
}

impl LeaseProvider {
    /// Dial the pool described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connectivity` if the database cannot be reached
    /// within the connect timeout.
    #[instrument(skip_all, fields(max_connections = config.max_connections), err)]
    pub async fn dial(config: &StoreConfig) -> Result<Self> {
        let pool = create_pool(config)
            .await
            .map_err(StoreError::Connectivity)?;
        Ok(Self { pool })
    }

    /// Wrap an already established pool.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Check out a connection.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connectivity` if no connection becomes available
    /// before the checkout timeout.
    pub async fn lease(&self) -> Result<Lease> {
        let conn = self.pool.acquire().await?;
        debug!("lease acquired");
        Ok(Lease { conn })
    }

    /// Check that the database answers.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connectivity` if the database does not answer.
    #[instrument(parent = cx.span(), skip_all, err)]
    pub async fn ping(&self, cx: &TraceContext) -> Result<()> {
        let mut lease = self.lease().await?;
        sqlx::query("SELECT 1")
            .execute(lease.conn())
            .await
            .map_err(StoreError::Connectivity)?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, waiting for outstanding leases to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A connection checked out for the duration of one operation.
///
/// Returned to the pool when dropped.
pub struct Lease {
    conn: PoolConnection<Sqlite>,
}

impl Lease {
    /// The leased connection, usable as a query executor.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        debug!("lease released");
    }
}
