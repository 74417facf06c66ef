//! User aggregate persistence.
//!
//! [`UserStore`] is the entry point of the crate. It composes single-document
//! operations from [`EntityStore`] with the linking and cascade logic of
//! [`ReferenceManager`] to store and load a user together with its addresses
//! and cards.

use std::collections::HashMap;

use sqlx::SqlitePool;
use tracing::{Span, info, instrument, warn};
use userstore_core::{Address, Card, ObjectId, User};

use crate::config::StoreConfig;
use crate::db::{
    AddressDoc, CardDoc, Collection, CustomerDoc, Document, EntityStore, Filter, LeaseProvider,
    Record, ReferenceManager, ReferenceSet, schema,
};
use crate::error::{PartialAggregateFailure, Result, StoreError};
use crate::trace::TraceContext;

/// Store for users, addresses and cards.
///
/// Cloning is cheap; clones share one connection pool.
///
/// # Example
///
/// ```no_run
/// use userstore::{StoreConfig, TraceContext, UserStore};
/// use userstore_core::{Address, User};
///
/// # async fn run() -> Result<(), userstore::StoreError> {
/// let store = UserStore::init(&StoreConfig::new("sqlite://users.db")).await?;
/// let cx = TraceContext::current();
///
/// let mut user = User::new("alice");
/// user.addresses.push(Address { city: "X".to_string(), ..Address::default() });
///
/// let stored = store.create_user(&cx, user).await?;
/// let mut loaded = store.get_user(&cx, &stored.id).await?;
/// store.get_user_attributes(&cx, &mut loaded).await?;
/// assert_eq!(loaded.addresses[0].city, "X");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct UserStore {
    leases: LeaseProvider,
    store: EntityStore,
    references: ReferenceManager,
}

impl UserStore {
    /// Dial the database, check that it answers and ensure the collections
    /// and the unique username index exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connectivity` if the database cannot be reached
    /// within the connect timeout, or the error of the failing schema step.
    #[instrument(skip_all, err)]
    pub async fn init(config: &StoreConfig) -> Result<Self> {
        let cx = TraceContext::current();
        let store = Self::with_leases(LeaseProvider::dial(config).await?);
        store.ping(&cx).await?;
        store.ensure_indexes(&cx).await?;
        info!(max_connections = config.max_connections, "user store ready");
        Ok(store)
    }

    /// Build a store over an existing pool without touching the schema.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self::with_leases(LeaseProvider::from_pool(pool))
    }

    #[must_use]
    pub fn with_leases(leases: LeaseProvider) -> Self {
        Self {
            store: EntityStore::new(leases.clone()),
            references: ReferenceManager::new(leases.clone()),
            leases,
        }
    }

    /// Check that the database answers.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connectivity` if the database does not answer.
    pub async fn ping(&self, cx: &TraceContext) -> Result<()> {
        self.leases.ping(cx).await
    }

    /// Create the collections and the unique username index if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails.
    pub async fn ensure_indexes(&self, cx: &TraceContext) -> Result<()> {
        schema::ensure_indexes(cx, &self.leases).await
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        self.leases.pool()
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.leases.close().await;
    }

    /// Store a new user together with the addresses and cards nested in it.
    ///
    /// Every nested address and card is stored as its own document first,
    /// then the user is written referencing those that succeeded. Returns the
    /// stored user with its new id and the stored nested documents.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateUsername` if the username is taken. The nested
    ///   documents created for this call are removed again on a best-effort
    ///   basis; the same holds for any other failure of the user write.
    /// - `StoreError::PartialAggregate` if the user was stored but some nested
    ///   documents were not. The user is not rolled back.
    #[instrument(
        parent = cx.span(),
        skip_all,
        fields(db.collection = "customers", username = %user.username, user.id = tracing::field::Empty),
        err
    )]
    pub async fn create_user(&self, cx: &TraceContext, user: User) -> Result<User> {
        let (cards, card_error) = self
            .create_detached(cx, user.cards.iter().map(CardDoc::from).collect::<Vec<_>>())
            .await;
        let (addresses, address_error) = self
            .create_detached(cx, user.addresses.iter().map(AddressDoc::from).collect::<Vec<_>>())
            .await;

        let address_ids: Vec<ObjectId> = addresses.iter().map(|r| r.id).collect();
        let card_ids: Vec<ObjectId> = cards.iter().map(|r| r.id).collect();

        let record = Record::new(
            CustomerDoc::from_user(&user).with_references(address_ids.clone(), card_ids.clone()),
        );
        Span::current().record("user.id", tracing::field::display(record.id));

        if let Err(e) = self.store.upsert(cx, &record).await {
            self.discard(cx, Collection::Addresses, &address_ids).await;
            self.discard(cx, Collection::Cards, &card_ids).await;

            return Err(match e {
                StoreError::Conflict {
                    collection: Collection::Customers,
                } => StoreError::DuplicateUsername(user.username),
                other => other,
            });
        }

        let stored = User {
            id: record.id.to_hex(),
            addresses: addresses.into_iter().map(Address::from).collect(),
            cards: cards.into_iter().map(Card::from).collect(),
            ..user
        };

        if card_error.is_some() || address_error.is_some() {
            return Err(PartialAggregateFailure {
                user: stored,
                card_error,
                address_error,
            }
            .into());
        }

        Ok(stored)
    }

    /// Store each document under a fresh id, continuing past failures.
    ///
    /// Returns the stored records and the first failure.
    async fn create_detached<D: Document>(
        &self,
        cx: &TraceContext,
        docs: impl IntoIterator<Item = D>,
    ) -> (Vec<Record<D>>, Option<StoreError>) {
        let mut stored = Vec::new();
        let mut first_error = None;

        for doc in docs {
            let record = Record::new(doc);
            match self.store.upsert(cx, &record).await {
                Ok(()) => stored.push(record),
                Err(e) => {
                    warn!(db.collection = %D::COLLECTION, error = %e, "nested create failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        (stored, first_error)
    }

    /// Best-effort removal of documents created by a failed user write.
    async fn discard(&self, cx: &TraceContext, collection: Collection, ids: &[ObjectId]) {
        if let Err(e) = self.store.remove_many(cx, collection, ids).await {
            warn!(
                db.collection = %collection,
                count = ids.len(),
                error = %e,
                "compensating delete failed, documents orphaned"
            );
        }
    }

    /// Fetch a user by id.
    ///
    /// Addresses and cards are returned as id-only references; see
    /// [`UserStore::get_user_attributes`].
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` if `id` is malformed and
    /// `StoreError::NotFound` if no user has it.
    #[instrument(parent = cx.span(), skip_all, fields(db.collection = "customers", user.id = id), err)]
    pub async fn get_user(&self, cx: &TraceContext, id: &str) -> Result<User> {
        let id = ObjectId::parse_hex(id)?;
        let record = self.store.find_by_id::<CustomerDoc>(cx, id).await?;
        Ok(record.into())
    }

    /// Fetch a user by username.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if no user has this username.
    #[instrument(parent = cx.span(), skip_all, fields(db.collection = "customers", username = name), err)]
    pub async fn get_user_by_name(&self, cx: &TraceContext, name: &str) -> Result<User> {
        let record = self
            .store
            .find_one::<CustomerDoc>(cx, Filter::username(name))
            .await?;
        Ok(record.into())
    }

    /// Fetch every user.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document cannot be decoded.
    #[instrument(parent = cx.span(), skip_all, fields(db.collection = "customers"), err)]
    pub async fn get_users(&self, cx: &TraceContext) -> Result<Vec<User>> {
        let records = self.store.find_all::<CustomerDoc>(cx, Filter::All).await?;
        Ok(records.into_iter().map(User::from).collect())
    }

    /// Replace the id-only addresses and cards of `user` with the stored
    /// documents.
    ///
    /// Referenced documents that no longer exist are left out without error.
    /// Results follow the order of the references.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` if any reference is malformed;
    /// `user` is left unchanged in that case.
    #[instrument(parent = cx.span(), skip_all, fields(user.id = %user.id), err)]
    pub async fn get_user_attributes(&self, cx: &TraceContext, user: &mut User) -> Result<()> {
        let address_ids = parse_ids(user.addresses.iter().map(|a| a.id.as_str()))?;
        let card_ids = parse_ids(user.cards.iter().map(|c| c.id.as_str()))?;

        let addresses = self.hydrate::<AddressDoc>(cx, &address_ids).await?;
        let cards = self.hydrate::<CardDoc>(cx, &card_ids).await?;

        user.addresses = addresses.into_iter().map(Address::from).collect();
        user.cards = cards.into_iter().map(Card::from).collect();
        Ok(())
    }

    /// Batch-load the documents for `ids`, in the order given.
    async fn hydrate<D: Document>(
        &self,
        cx: &TraceContext,
        ids: &[ObjectId],
    ) -> Result<Vec<Record<D>>> {
        let mut found: HashMap<ObjectId, Record<D>> = self
            .store
            .find_all::<D>(cx, Filter::IdIn(ids))
            .await?
            .into_iter()
            .map(|r| (r.id, r))
            .collect();

        Ok(ids.iter().filter_map(|id| found.remove(id)).collect())
    }

    /// Store a card, linking it to `user_id` unless that is empty.
    ///
    /// # Errors
    ///
    /// See [`ReferenceManager::create_card`].
    pub async fn create_card(&self, cx: &TraceContext, card: &Card, user_id: &str) -> Result<Card> {
        self.references.create_card(cx, card, user_id).await
    }

    /// Fetch a card by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` if `id` is malformed and
    /// `StoreError::NotFound` if no card has it.
    #[instrument(parent = cx.span(), skip_all, fields(db.collection = "cards", entity.id = id), err)]
    pub async fn get_card(&self, cx: &TraceContext, id: &str) -> Result<Card> {
        let id = ObjectId::parse_hex(id)?;
        let record = self.store.find_by_id::<CardDoc>(cx, id).await?;
        Ok(record.into())
    }

    /// Fetch every card, owned or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document cannot be decoded.
    pub async fn get_cards(&self, cx: &TraceContext) -> Result<Vec<Card>> {
        let records = self.store.find_all::<CardDoc>(cx, Filter::All).await?;
        Ok(records.into_iter().map(Card::from).collect())
    }

    /// Store an address, linking it to `user_id` unless that is empty.
    ///
    /// # Errors
    ///
    /// See [`ReferenceManager::create_address`].
    pub async fn create_address(
        &self,
        cx: &TraceContext,
        address: &Address,
        user_id: &str,
    ) -> Result<Address> {
        self.references.create_address(cx, address, user_id).await
    }

    /// Fetch an address by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` if `id` is malformed and
    /// `StoreError::NotFound` if no address has it.
    #[instrument(parent = cx.span(), skip_all, fields(db.collection = "addresses", entity.id = id), err)]
    pub async fn get_address(&self, cx: &TraceContext, id: &str) -> Result<Address> {
        let id = ObjectId::parse_hex(id)?;
        let record = self.store.find_by_id::<AddressDoc>(cx, id).await?;
        Ok(record.into())
    }

    /// Fetch every address, owned or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a document cannot be decoded.
    pub async fn get_addresses(&self, cx: &TraceContext) -> Result<Vec<Address>> {
        let records = self.store.find_all::<AddressDoc>(cx, Filter::All).await?;
        Ok(records.into_iter().map(Address::from).collect())
    }

    /// Delete a user, address or card.
    ///
    /// # Errors
    ///
    /// See [`ReferenceManager::delete`].
    pub async fn delete(&self, cx: &TraceContext, collection: Collection, id: &str) -> Result<()> {
        self.references.delete(cx, collection, id).await
    }

    /// Add `id` to a user's reference set directly.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` if either id is malformed and
    /// `StoreError::NotFound` if the user does not exist.
    pub async fn link(
        &self,
        cx: &TraceContext,
        set: ReferenceSet,
        id: &str,
        user_id: &str,
    ) -> Result<()> {
        let id = ObjectId::parse_hex(id)?;
        let user_id = ObjectId::parse_hex(user_id)?;
        self.references
            .append_attribute_id(cx, set, id, user_id)
            .await
    }

    /// Remove `id` from a user's reference set without deleting the document.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIdentifier` if either id is malformed and
    /// `StoreError::NotFound` if the user does not exist.
    pub async fn unlink(
        &self,
        cx: &TraceContext,
        set: ReferenceSet,
        id: &str,
        user_id: &str,
    ) -> Result<()> {
        let id = ObjectId::parse_hex(id)?;
        let user_id = ObjectId::parse_hex(user_id)?;
        self.references
            .remove_attribute_id(cx, set, id, user_id)
            .await
    }
}

fn parse_ids<'a>(ids: impl Iterator<Item = &'a str>) -> Result<Vec<ObjectId>> {
    ids.map(|id| ObjectId::parse_hex(id).map_err(StoreError::from))
        .collect()
}
