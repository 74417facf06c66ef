//! Reference sets on user documents and the writes that keep them in step
//! with the address and card collections.
//!
//! Nothing here spans a transaction. Each statement is atomic on its own
//! document, and multi-document sequences (insert then link, cascade delete)
//! can be interrupted between steps, leaving orphans or dangling references.

use tracing::{Span, instrument, warn};
use userstore_core::{Address, Card, ObjectId};

use super::LeaseProvider;
use super::documents::{Collection, Document, EntityStore, Record};
use super::records::{AddressDoc, CardDoc, CustomerDoc};
use crate::error::{Result, StoreError};
use crate::trace::TraceContext;

/// A reference set held by every customer document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceSet {
    Addresses,
    Cards,
}

impl ReferenceSet {
    /// Field name on the customer document.
    #[must_use]
    pub const fn field(self) -> &'static str {
        match self {
            Self::Addresses => "addresses",
            Self::Cards => "cards",
        }
    }

    /// JSON path of the set.
    const fn path(self) -> &'static str {
        match self {
            Self::Addresses => "$.addresses",
            Self::Cards => "$.cards",
        }
    }

    /// JSON path that appends to the set.
    const fn append_path(self) -> &'static str {
        match self {
            Self::Addresses => "$.addresses[#]",
            Self::Cards => "$.cards[#]",
        }
    }

    /// Collection the referenced documents live in.
    #[must_use]
    pub const fn collection(self) -> Collection {
        match self {
            Self::Addresses => Collection::Addresses,
            Self::Cards => Collection::Cards,
        }
    }

    /// The set referencing documents of `collection`, if any.
    #[must_use]
    pub const fn of(collection: Collection) -> Option<Self> {
        match collection {
            Collection::Addresses => Some(Self::Addresses),
            Collection::Cards => Some(Self::Cards),
            Collection::Customers => None,
        }
    }
}

/// Set-union: append `?3` unless already present. `?1` set path, `?2` append path.
const ADD_TO_SET: &str = "UPDATE customers SET doc = CASE \
     WHEN EXISTS (SELECT 1 FROM json_each(customers.doc, ?1) WHERE value = ?3) THEN doc \
     ELSE json_insert(json_set(doc, ?1, json(coalesce(json_extract(doc, ?1), '[]'))), ?2, ?3) \
     END \
     WHERE id = ?4";

/// Rewrite the set at `?1` without `?2`.
const PULL: &str = "UPDATE customers SET doc = json_set(doc, ?1, json(( \
     SELECT json_group_array(value) FROM json_each(customers.doc, ?1) WHERE value <> ?2)))";

/// Maintains customer reference sets and the documents they point at.
#[derive(Debug, Clone)]
pub struct ReferenceManager {
    leases: LeaseProvider,
    store: EntityStore,
}

impl ReferenceManager {
    #[must_use]
    pub fn new(leases: LeaseProvider) -> Self {
        Self {
            store: EntityStore::new(leases.clone()),
            leases,
        }
    }

    /// Add `id` to a user's reference set. Adding an id already present is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user does not exist.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = "customers", set = set.field(), entity.id = %id, user.id = %user_id),
        err
    )]
    pub async fn append_attribute_id(
        &self,
        cx: &TraceContext,
        set: ReferenceSet,
        id: ObjectId,
        user_id: ObjectId,
    ) -> Result<()> {
        let mut lease = self.leases.lease().await?;
        let result = sqlx::query(ADD_TO_SET)
            .bind(set.path())
            .bind(set.append_path())
            .bind(id.to_hex())
            .bind(user_id.to_hex())
            .execute(lease.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove `id` from a user's reference set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the user does not exist.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = "customers", set = set.field(), entity.id = %id, user.id = %user_id),
        err
    )]
    pub async fn remove_attribute_id(
        &self,
        cx: &TraceContext,
        set: ReferenceSet,
        id: ObjectId,
        user_id: ObjectId,
    ) -> Result<()> {
        let sql = format!("{PULL} WHERE id = ?3");

        let mut lease = self.leases.lease().await?;
        let result = sqlx::query(&sql)
            .bind(set.path())
            .bind(id.to_hex())
            .bind(user_id.to_hex())
            .execute(lease.conn())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Remove `id` from the reference set of every user holding it.
    ///
    /// There is no reverse index, so every customer document is scanned.
    /// Returns the number of users updated.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(
            db.collection = "customers",
            set = set.field(),
            entity.id = %id,
            result.count = tracing::field::Empty,
        ),
        err
    )]
    pub async fn pull_everywhere(
        &self,
        cx: &TraceContext,
        set: ReferenceSet,
        id: ObjectId,
    ) -> Result<u64> {
        let sql = format!(
            "{PULL} WHERE EXISTS (SELECT 1 FROM json_each(customers.doc, ?1) WHERE value = ?2)"
        );

        let mut lease = self.leases.lease().await?;
        let result = sqlx::query(&sql)
            .bind(set.path())
            .bind(id.to_hex())
            .execute(lease.conn())
            .await?;

        Span::current().record("result.count", result.rows_affected());
        Ok(result.rows_affected())
    }

    /// Store a card and, if `user_id` is not empty, link it to that user.
    ///
    /// Returns the card with its new id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` before writing anything if
    /// `user_id` is malformed. If linking fails the card stays stored but
    /// unowned, and the link error is returned.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = "cards", user.id = user_id),
        err
    )]
    pub async fn create_card(&self, cx: &TraceContext, card: &Card, user_id: &str) -> Result<Card> {
        let record = self
            .create_attribute(cx, ReferenceSet::Cards, CardDoc::from(card), user_id)
            .await?;
        Ok(record.into())
    }

    /// Store an address and, if `user_id` is not empty, link it to that user.
    ///
    /// Returns the address with its new id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` before writing anything if
    /// `user_id` is malformed. If linking fails the address stays stored but
    /// unowned, and the link error is returned.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = "addresses", user.id = user_id),
        err
    )]
    pub async fn create_address(
        &self,
        cx: &TraceContext,
        address: &Address,
        user_id: &str,
    ) -> Result<Address> {
        let record = self
            .create_attribute(cx, ReferenceSet::Addresses, AddressDoc::from(address), user_id)
            .await?;
        Ok(record.into())
    }

    async fn create_attribute<D: Document>(
        &self,
        cx: &TraceContext,
        set: ReferenceSet,
        doc: D,
        user_id: &str,
    ) -> Result<Record<D>> {
        let owner = if user_id.is_empty() {
            None
        } else {
            Some(ObjectId::parse_hex(user_id)?)
        };

        let record = Record::new(doc);
        self.store.upsert(cx, &record).await?;

        if let Some(owner) = owner
            && let Err(e) = self.append_attribute_id(cx, set, record.id, owner).await
        {
            warn!(
                entity.id = %record.id,
                user.id = %owner,
                error = %e,
                "{} stored but not linked",
                set.collection()
            );
            return Err(e);
        }

        Ok(record)
    }

    /// Delete a document by collection and id.
    ///
    /// Deleting a customer first removes every address and card in its
    /// reference sets; failures there are logged and ignored. Deleting an
    /// address or card first pulls it from every user's reference set.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` before any mutation if `id` is
    /// malformed, and `StoreError::NotFound` if the document does not exist.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = %collection, entity.id = id),
        err
    )]
    pub async fn delete(&self, cx: &TraceContext, collection: Collection, id: &str) -> Result<()> {
        let id = ObjectId::parse_hex(id)?;

        match ReferenceSet::of(collection) {
            None => {
                let user = self.store.find_by_id::<CustomerDoc>(cx, id).await?;
                for (set, ids) in [
                    (ReferenceSet::Addresses, &user.doc.addresses),
                    (ReferenceSet::Cards, &user.doc.cards),
                ] {
                    if let Err(e) = self.store.remove_many(cx, set.collection(), ids).await {
                        warn!(
                            user.id = %id,
                            error = %e,
                            "failed to remove {} of deleted user",
                            set.field()
                        );
                    }
                }
            }
            Some(set) => {
                self.pull_everywhere(cx, set, id).await?;
            }
        }

        self.store.remove(cx, collection, id).await
    }
}
