//! Collection tables and indexes.

use tracing::{info, instrument};

use super::LeaseProvider;
use super::documents::Collection;
use crate::error::Result;
use crate::trace::TraceContext;

/// Name of the unique index on `customers.username`.
pub const USERNAME_INDEX: &str = "customers_username";

/// Create the collection tables and the unique username index if missing.
///
/// Safe to run on every startup.
///
/// # Errors
///
/// Returns an error if a statement fails, e.g. because existing customers
/// already share a username.
#[instrument(parent = cx.span(), skip_all, err)]
pub async fn ensure_indexes(cx: &TraceContext, leases: &LeaseProvider) -> Result<()> {
    let mut lease = leases.lease().await?;

    for collection in Collection::ALL {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {collection} (id TEXT PRIMARY KEY NOT NULL, doc TEXT NOT NULL)"
        );
        sqlx::query(&ddl).execute(lease.conn()).await?;
    }

    let index = format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {USERNAME_INDEX} \
         ON {} (json_extract(doc, '$.username'))",
        Collection::Customers
    );
    sqlx::query(&index).execute(lease.conn()).await?;

    info!("collections and indexes ensured");
    Ok(())
}
