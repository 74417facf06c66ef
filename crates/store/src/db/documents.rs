//! Generic per-collection document storage.
//!
//! Every collection table stores `(id, doc)` pairs where `doc` is the JSON body
//! of a [`Document`]. [`EntityStore`] provides upsert, lookup and removal over
//! any of them; each call checks out its own lease and returns it on every exit
//! path.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::FromRow;
use tracing::{Span, instrument};
use userstore_core::ObjectId;

use super::LeaseProvider;
use crate::error::{Result, StoreError};
use crate::trace::TraceContext;

/// The three document collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// User documents.
    Customers,
    /// Address documents.
    Addresses,
    /// Card documents.
    Cards,
}

impl Collection {
    /// Every collection, in creation order.
    pub const ALL: [Self; 3] = [Self::Customers, Self::Addresses, Self::Cards];

    /// Table name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Customers => "customers",
            Self::Addresses => "addresses",
            Self::Cards => "cards",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown collection name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown collection: {0}")]
pub struct UnknownCollection(pub String);

impl FromStr for Collection {
    type Err = UnknownCollection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customers" => Ok(Self::Customers),
            "addresses" => Ok(Self::Addresses),
            "cards" => Ok(Self::Cards),
            other => Err(UnknownCollection(other.to_string())),
        }
    }
}

/// A document body stored in a fixed collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Collection holding documents of this type.
    const COLLECTION: Collection;
}

/// A document together with its store identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record<D> {
    pub id: ObjectId,
    pub doc: D,
}

impl<D> Record<D> {
    /// Assign a freshly generated identifier to `doc`.
    #[must_use]
    pub fn new(doc: D) -> Self {
        Self {
            id: ObjectId::new(),
            doc,
        }
    }
}

/// Raw table row.
#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    doc: String,
}

impl DocumentRow {
    fn decode<D: Document>(self) -> Result<Record<D>> {
        let id = ObjectId::parse_hex(&self.id).map_err(|e| {
            StoreError::DataCorruption(format!("{}: bad id {:?}: {e}", D::COLLECTION, self.id))
        })?;
        let doc = serde_json::from_str(&self.doc).map_err(|e| {
            StoreError::DataCorruption(format!("{}: bad document {id}: {e}", D::COLLECTION))
        })?;
        Ok(Record { id, doc })
    }
}

/// Row selection for lookups.
#[derive(Debug, Clone, Copy)]
pub enum Filter<'a> {
    /// Every document.
    All,
    /// The document with this id.
    Id(ObjectId),
    /// Documents whose id is in the set.
    IdIn(&'a [ObjectId]),
    /// Documents whose top-level string field equals `value`.
    Field {
        /// JSON path, e.g. `$.username`.
        path: &'static str,
        value: &'a str,
    },
}

impl<'a> Filter<'a> {
    /// Match a customer by username.
    #[must_use]
    pub const fn username(name: &'a str) -> Self {
        Self::Field {
            path: "$.username",
            value: name,
        }
    }

    /// SQL `WHERE` clause, including the keyword, or an empty string.
    fn where_clause(&self) -> String {
        match self {
            Self::All => String::new(),
            Self::Id(_) => "WHERE id = ?1".to_string(),
            Self::IdIn(_) => "WHERE id IN (SELECT value FROM json_each(?1))".to_string(),
            Self::Field { path, .. } => format!("WHERE json_extract(doc, '{path}') = ?1"),
        }
    }

    /// Values bound to the clause placeholders, in order.
    fn params(&self) -> Result<Vec<String>> {
        Ok(match self {
            Self::All => Vec::new(),
            Self::Id(id) => vec![id.to_hex()],
            Self::IdIn(ids) => vec![id_array(ids)?],
            Self::Field { value, .. } => vec![(*value).to_string()],
        })
    }
}

/// JSON array of hex ids, for `json_each` membership tests.
pub(crate) fn id_array(ids: &[ObjectId]) -> Result<String> {
    Ok(serde_json::to_string(ids)?)
}

/// Whether `e` reports a unique index violation.
pub(crate) fn is_unique_violation(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e
        && (db_err.is_unique_violation() || db_err.message().contains("UNIQUE constraint failed"))
    {
        return true;
    }
    false
}

/// CRUD over the document collections.
#[derive(Debug, Clone)]
pub struct EntityStore {
    leases: LeaseProvider,
}

impl EntityStore {
    #[must_use]
    pub const fn new(leases: LeaseProvider) -> Self {
        Self { leases }
    }

    /// Insert `record`, or replace the document stored under its id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if a unique index rejects the document.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = %D::COLLECTION, entity.id = %record.id),
        err
    )]
    pub async fn upsert<D: Document>(&self, cx: &TraceContext, record: &Record<D>) -> Result<()> {
        let body = serde_json::to_string(&record.doc)?;
        let sql = format!(
            "INSERT INTO {} (id, doc) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
            D::COLLECTION
        );

        let mut lease = self.leases.lease().await?;
        sqlx::query(&sql)
            .bind(record.id.to_hex())
            .bind(body)
            .execute(lease.conn())
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::Conflict {
                        collection: D::COLLECTION,
                    }
                } else {
                    e.into()
                }
            })?;
        Ok(())
    }

    /// Fetch the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such document exists.
    pub async fn find_by_id<D: Document>(
        &self,
        cx: &TraceContext,
        id: ObjectId,
    ) -> Result<Record<D>> {
        self.find_one(cx, Filter::Id(id)).await
    }

    /// Fetch the first document matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if nothing matches.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = %D::COLLECTION, filter = ?filter),
        err
    )]
    pub async fn find_one<D: Document>(
        &self,
        cx: &TraceContext,
        filter: Filter<'_>,
    ) -> Result<Record<D>> {
        let sql = format!(
            "SELECT id, doc FROM {} {} ORDER BY rowid LIMIT 1",
            D::COLLECTION,
            filter.where_clause()
        );

        let mut query = sqlx::query_as::<_, DocumentRow>(&sql);
        for param in filter.params()? {
            query = query.bind(param);
        }

        let mut lease = self.leases.lease().await?;
        let row = query
            .fetch_optional(lease.conn())
            .await?
            .ok_or(StoreError::NotFound)?;
        row.decode()
    }

    /// Fetch every document matching `filter`, in insertion order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored document cannot be
    /// decoded.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(
            db.collection = %D::COLLECTION,
            filter = ?filter,
            result.count = tracing::field::Empty,
        ),
        err
    )]
    pub async fn find_all<D: Document>(
        &self,
        cx: &TraceContext,
        filter: Filter<'_>,
    ) -> Result<Vec<Record<D>>> {
        if let Filter::IdIn(ids) = filter
            && ids.is_empty()
        {
            Span::current().record("result.count", 0);
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, doc FROM {} {} ORDER BY rowid",
            D::COLLECTION,
            filter.where_clause()
        );

        let mut query = sqlx::query_as::<_, DocumentRow>(&sql);
        for param in filter.params()? {
            query = query.bind(param);
        }

        let mut lease = self.leases.lease().await?;
        let rows = query.fetch_all(lease.conn()).await?;
        drop(lease);

        Span::current().record("result.count", rows.len());
        rows.into_iter().map(DocumentRow::decode).collect()
    }

    /// Remove the document stored under `id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no such document exists.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = %collection, entity.id = %id),
        err
    )]
    pub async fn remove(&self, cx: &TraceContext, collection: Collection, id: ObjectId) -> Result<()> {
        let sql = format!("DELETE FROM {collection} WHERE id = ?1");

        let mut lease = self.leases.lease().await?;
        let result = sqlx::query(&sql)
            .bind(id.to_hex())
            .execute(lease.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove every document whose id is in `ids`.
    ///
    /// Returns the number of documents removed; ids with no document are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(
            db.collection = %collection,
            requested = ids.len(),
            result.count = tracing::field::Empty,
        ),
        err
    )]
    pub async fn remove_many(
        &self,
        cx: &TraceContext,
        collection: Collection,
        ids: &[ObjectId],
    ) -> Result<u64> {
        if ids.is_empty() {
            Span::current().record("result.count", 0);
            return Ok(0);
        }

        let sql = format!("DELETE FROM {collection} WHERE id IN (SELECT value FROM json_each(?1))");

        let mut lease = self.leases.lease().await?;
        let result = sqlx::query(&sql)
            .bind(id_array(ids)?)
            .execute(lease.conn())
            .await?;

        Span::current().record("result.count", result.rows_affected());
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_names_roundtrip() {
        for collection in Collection::ALL {
            assert_eq!(collection.name().parse::<Collection>().unwrap(), collection);
        }
        assert_eq!(Collection::Customers.to_string(), "customers");
    }

    #[test]
    fn test_unknown_collection() {
        let err = "users".parse::<Collection>().unwrap_err();
        assert_eq!(err.to_string(), "unknown collection: users");
    }

    #[test]
    fn test_filter_all() {
        assert_eq!(Filter::All.where_clause(), "");
        assert!(Filter::All.params().unwrap().is_empty());
    }

    #[test]
    fn test_filter_id() {
        let id = ObjectId::from_bytes([7; 12]);
        let filter = Filter::Id(id);
        assert_eq!(filter.where_clause(), "WHERE id = ?1");
        assert_eq!(filter.params().unwrap(), vec!["070707070707070707070707"]);
    }

    #[test]
    fn test_filter_id_in_binds_json_array() {
        let ids = [ObjectId::from_bytes([1; 12]), ObjectId::from_bytes([2; 12])];
        let filter = Filter::IdIn(&ids);
        assert!(filter.where_clause().contains("json_each(?1)"));
        assert_eq!(
            filter.params().unwrap(),
            vec![r#"["010101010101010101010101","020202020202020202020202"]"#]
        );
    }

    #[test]
    fn test_filter_username() {
        let filter = Filter::username("alice");
        assert_eq!(
            filter.where_clause(),
            "WHERE json_extract(doc, '$.username') = ?1"
        );
        assert_eq!(filter.params().unwrap(), vec!["alice"]);
    }

    #[test]
    fn test_row_decode_rejects_bad_id() {
        #[derive(Debug, serde::Serialize, serde::Deserialize)]
        struct EmptyDoc {}
        impl Document for EmptyDoc {
            const COLLECTION: Collection = Collection::Cards;
        }

        let row = DocumentRow {
            id: "bogus".to_string(),
            doc: "{}".to_string(),
        };
        let err = row.decode::<EmptyDoc>().unwrap_err();
        assert!(matches!(err, StoreError::DataCorruption(_)));

        let row = DocumentRow {
            id: ObjectId::new().to_hex(),
            doc: "not json".to_string(),
        };
        assert!(matches!(
            row.decode::<EmptyDoc>().unwrap_err(),
            StoreError::DataCorruption(_)
        ));
    }
}
