//! Integration tests for connection leases and store initialization.
//!
//! Run with: cargo test -p userstore-integration-tests --test leases

use std::time::Duration;

use userstore::{Collection, ReferenceSet, StoreConfig, StoreError, UserStore};
use userstore_core::ObjectId;
use userstore_integration_tests::{TestContext, address, card, user_with};

/// Every operation, including failing ones, on a single-connection pool.
///
/// A lease held past the end of any operation would make the next checkout
/// time out.
#[tokio::test]
async fn test_single_connection_pool_survives_every_operation() {
    let ctx = TestContext::with_max_connections(1).await;
    let store = &ctx.store;
    let cx = &ctx.cx;
    let missing = ObjectId::new().to_hex();

    let user = store
        .create_user(
            cx,
            user_with("alice", vec![address("X")], vec![card("4111111111111111")]),
        )
        .await
        .expect("Failed to create user");

    // Failure paths
    assert!(store.get_user(cx, "bad").await.is_err());
    assert!(store.get_user(cx, &missing).await.is_err());
    assert!(store.get_user_by_name(cx, "nobody").await.is_err());
    assert!(store.create_card(cx, &card("1"), &missing).await.is_err());
    assert!(
        store
            .create_user(cx, user_with("alice", vec![address("Y")], Vec::new()))
            .await
            .is_err()
    );
    assert!(store.delete(cx, Collection::Cards, &missing).await.is_err());

    // Success paths
    let mut loaded = store.get_user(cx, &user.id).await.expect("get");
    store
        .get_user_attributes(cx, &mut loaded)
        .await
        .expect("hydrate");
    store.get_users(cx).await.expect("list users");
    store.get_addresses(cx).await.expect("list addresses");
    store.get_cards(cx).await.expect("list cards");
    let extra = store
        .create_address(cx, &address("Z"), &user.id)
        .await
        .expect("create address");
    store
        .link(cx, ReferenceSet::Addresses, &extra.id, &user.id)
        .await
        .expect("link");
    store
        .delete(cx, Collection::Addresses, &extra.id)
        .await
        .expect("delete address");
    store
        .delete(cx, Collection::Customers, &user.id)
        .await
        .expect("delete user");

    store.ping(cx).await.expect("Pool exhausted by a leaked lease");
    assert_eq!(store.pool().size(), 1);
}

#[tokio::test]
async fn test_init_is_idempotent() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = TestContext::config_for(&dir);

    let first = UserStore::init(&config).await.expect("First init failed");
    let cx = userstore::TraceContext::detached();
    first
        .create_user(&cx, user_with("alice", Vec::new(), Vec::new()))
        .await
        .expect("Failed to create user");
    first.close().await;

    let second = UserStore::init(&config).await.expect("Second init failed");
    let found = second
        .get_user_by_name(&cx, "alice")
        .await
        .expect("Data should survive re-init");
    assert_eq!(found.username, "alice");

    // Index survives as well
    let err = second
        .create_user(&cx, user_with("alice", Vec::new(), Vec::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateUsername(_)));
}

#[tokio::test]
async fn test_init_unreachable_database() {
    let config = StoreConfig::new("sqlite:///nonexistent-userstore-dir/nested/users.db")
        .with_connect_timeout(Duration::from_millis(200));

    let err = UserStore::init(&config).await.unwrap_err();
    assert!(matches!(err, StoreError::Connectivity(_)), "{err}");
}

#[tokio::test]
async fn test_from_pool_shares_database() {
    let ctx = TestContext::new().await;
    let user = ctx.create_plain_user("alice").await;

    let other = UserStore::from_pool(ctx.store.pool().clone());
    let found = other
        .get_user(&ctx.cx, &user.id)
        .await
        .expect("Failed to get user");
    assert_eq!(found.id, user.id);
}
