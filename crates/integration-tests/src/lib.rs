//! Integration tests for the userstore.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p userstore-integration-tests
//! ```
//!
//! Every test gets its own `SQLite` file in a temporary directory, so no
//! database server is needed and tests can run in parallel.
//!
//! # Test Categories
//!
//! - `aggregate` - User creation with nested addresses and cards
//! - `references` - Linking, anonymous documents and hydration
//! - `delete` - Cascade and nested deletes
//! - `leases` - Connection checkout and initialization

use std::time::Duration;

use tempfile::TempDir;
use userstore::{Collection, StoreConfig, TraceContext, UserStore};
use userstore_core::{Address, Card, User};

/// A store over a fresh database file, removed when the context is dropped.
pub struct TestContext {
    pub store: UserStore,
    pub cx: TraceContext,
    _dir: TempDir,
}

impl TestContext {
    /// Create a store with a small pool.
    pub async fn new() -> Self {
        Self::with_max_connections(4).await
    }

    /// Create a store whose pool holds at most `max_connections`.
    ///
    /// Checkout times out after two seconds, so a leaked lease fails the test
    /// quickly instead of hanging it.
    pub async fn with_max_connections(max_connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = Self::config_for(&dir)
            .with_max_connections(max_connections)
            .with_connect_timeout(Duration::from_secs(2));

        let store = UserStore::init(&config)
            .await
            .expect("Failed to initialize store");

        Self {
            store,
            cx: TraceContext::detached(),
            _dir: dir,
        }
    }

    /// Configuration pointing at the database file inside `dir`.
    pub fn config_for(dir: &TempDir) -> StoreConfig {
        StoreConfig::new(format!("sqlite://{}", dir.path().join("users.db").display()))
    }

    /// Make every `event` (`INSERT`, `UPDATE` or `DELETE`) on `collection` fail.
    pub async fn fail_on(&self, name: &str, event: &str, collection: Collection) {
        let sql = format!(
            "CREATE TRIGGER {name} BEFORE {event} ON {collection} \
             BEGIN SELECT RAISE(ABORT, '{name} injected failure'); END"
        );
        sqlx::query(&sql)
            .execute(self.store.pool())
            .await
            .expect("Failed to install trigger");
    }

    /// Remove a trigger installed by [`TestContext::fail_on`].
    pub async fn clear_failure(&self, name: &str) {
        sqlx::query(&format!("DROP TRIGGER IF EXISTS {name}"))
            .execute(self.store.pool())
            .await
            .expect("Failed to drop trigger");
    }

    /// Number of documents in `collection`.
    pub async fn count(&self, collection: Collection) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {collection}"))
            .fetch_one(self.store.pool())
            .await
            .expect("Failed to count documents")
    }

    /// Delete a document behind the store's back, leaving references dangling.
    pub async fn delete_raw(&self, collection: Collection, id: &str) {
        sqlx::query(&format!("DELETE FROM {collection} WHERE id = ?1"))
            .bind(id)
            .execute(self.store.pool())
            .await
            .expect("Failed to delete document");
    }

    /// Store a user with no nested documents.
    pub async fn create_plain_user(&self, username: &str) -> User {
        self.store
            .create_user(&self.cx, User::new(username))
            .await
            .expect("Failed to create user")
    }
}

/// An address in `city`.
pub fn address(city: &str) -> Address {
    Address {
        street: "Main St".to_string(),
        number: "1".to_string(),
        country: "NL".to_string(),
        city: city.to_string(),
        post_code: "1011".to_string(),
        id: String::new(),
    }
}

/// A card with number `long_num`.
pub fn card(long_num: &str) -> Card {
    Card {
        long_num: long_num.to_string(),
        expires: "04/27".to_string(),
        ccv: "123".to_string(),
        id: String::new(),
    }
}

/// A user named `username` with the given nested documents.
pub fn user_with(username: &str, addresses: Vec<Address>, cards: Vec<Card>) -> User {
    User {
        first_name: "Test".to_string(),
        last_name: "User".to_string(),
        email: format!("{username}@example.com"),
        password: "secret".to_string(),
        addresses,
        cards,
        ..User::new(username)
    }
}
