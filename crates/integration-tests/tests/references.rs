//! Integration tests for reference sets, standalone documents and hydration.
//!
//! Run with: cargo test -p userstore-integration-tests --test references

use userstore::{Collection, ReferenceSet, StoreError};
use userstore_core::{Address, Card, ObjectId};
use userstore_integration_tests::{TestContext, address, card, user_with};

// ============================================================================
// Standalone documents
// ============================================================================

#[tokio::test]
async fn test_anonymous_address_and_card() {
    let ctx = TestContext::new().await;

    let stored_address = ctx
        .store
        .create_address(&ctx.cx, &address("X"), "")
        .await
        .expect("Failed to create address");
    assert!(stored_address.is_persisted());
    assert_eq!(stored_address.city, "X");

    let stored_card = ctx
        .store
        .create_card(&ctx.cx, &card("4111111111111111"), "")
        .await
        .expect("Failed to create card");
    assert!(stored_card.is_persisted());

    let fetched = ctx
        .store
        .get_address(&ctx.cx, &stored_address.id)
        .await
        .expect("Failed to get address");
    assert_eq!(fetched, stored_address);

    let fetched = ctx
        .store
        .get_card(&ctx.cx, &stored_card.id)
        .await
        .expect("Failed to get card");
    assert_eq!(fetched, stored_card);

    assert_eq!(
        ctx.store.get_addresses(&ctx.cx).await.expect("list").len(),
        1
    );
    assert_eq!(ctx.store.get_cards(&ctx.cx).await.expect("list").len(), 1);
}

#[tokio::test]
async fn test_create_linked_to_owner() {
    let ctx = TestContext::new().await;
    let user = ctx.create_plain_user("alice").await;

    let stored_address = ctx
        .store
        .create_address(&ctx.cx, &address("X"), &user.id)
        .await
        .expect("Failed to create address");
    let stored_card = ctx
        .store
        .create_card(&ctx.cx, &card("4111111111111111"), &user.id)
        .await
        .expect("Failed to create card");

    let loaded = ctx
        .store
        .get_user(&ctx.cx, &user.id)
        .await
        .expect("Failed to get user");
    assert_eq!(loaded.addresses, vec![Address::reference(&stored_address.id)]);
    assert_eq!(loaded.cards, vec![Card::reference(&stored_card.id)]);
}

#[tokio::test]
async fn test_malformed_owner_rejected_before_write() {
    let ctx = TestContext::new().await;

    let err = ctx
        .store
        .create_address(&ctx.cx, &address("X"), "not-an-id")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));

    let err = ctx
        .store
        .create_card(&ctx.cx, &card("4111111111111111"), "0123")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));

    assert_eq!(ctx.count(Collection::Addresses).await, 0);
    assert_eq!(ctx.count(Collection::Cards).await, 0);
}

#[tokio::test]
async fn test_missing_owner_leaves_orphan() {
    let ctx = TestContext::new().await;
    let ghost = ObjectId::new().to_hex();

    let err = ctx
        .store
        .create_card(&ctx.cx, &card("4111111111111111"), &ghost)
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let cards = ctx.store.get_cards(&ctx.cx).await.expect("Failed to list");
    assert_eq!(cards.len(), 1, "card stays stored but unlinked");
    assert_eq!(cards[0].long_num, "4111111111111111");
}

#[tokio::test]
async fn test_get_missing_documents() {
    let ctx = TestContext::new().await;
    let id = ObjectId::new().to_hex();

    assert!(ctx.store.get_address(&ctx.cx, &id).await.unwrap_err().is_not_found());
    assert!(ctx.store.get_card(&ctx.cx, &id).await.unwrap_err().is_not_found());
    assert!(matches!(
        ctx.store.get_card(&ctx.cx, "nope").await.unwrap_err(),
        StoreError::InvalidIdentifier(_)
    ));
}

// ============================================================================
// Reference sets
// ============================================================================

#[tokio::test]
async fn test_link_is_idempotent() {
    let ctx = TestContext::new().await;
    let user = ctx.create_plain_user("alice").await;
    let stored = ctx
        .store
        .create_address(&ctx.cx, &address("X"), "")
        .await
        .expect("Failed to create address");

    for _ in 0..2 {
        ctx.store
            .link(&ctx.cx, ReferenceSet::Addresses, &stored.id, &user.id)
            .await
            .expect("Failed to link");
    }

    let loaded = ctx
        .store
        .get_user(&ctx.cx, &user.id)
        .await
        .expect("Failed to get user");
    assert_eq!(loaded.addresses, vec![Address::reference(&stored.id)]);
}

#[tokio::test]
async fn test_link_keeps_sets_apart() {
    let ctx = TestContext::new().await;
    let user = ctx.create_plain_user("alice").await;
    let id = ObjectId::new().to_hex();

    ctx.store
        .link(&ctx.cx, ReferenceSet::Cards, &id, &user.id)
        .await
        .expect("Failed to link");

    let loaded = ctx
        .store
        .get_user(&ctx.cx, &user.id)
        .await
        .expect("Failed to get user");
    assert!(loaded.addresses.is_empty());
    assert_eq!(loaded.cards, vec![Card::reference(&id)]);
}

#[tokio::test]
async fn test_unlink() {
    let ctx = TestContext::new().await;
    let user = ctx
        .store
        .create_user(
            &ctx.cx,
            user_with("alice", vec![address("X"), address("Y")], Vec::new()),
        )
        .await
        .expect("Failed to create user");
    let (first, second) = (&user.addresses[0].id, &user.addresses[1].id);

    ctx.store
        .unlink(&ctx.cx, ReferenceSet::Addresses, first, &user.id)
        .await
        .expect("Failed to unlink");
    // Absent ids are a no-op
    ctx.store
        .unlink(&ctx.cx, ReferenceSet::Addresses, first, &user.id)
        .await
        .expect("Failed to unlink twice");

    let loaded = ctx
        .store
        .get_user(&ctx.cx, &user.id)
        .await
        .expect("Failed to get user");
    assert_eq!(loaded.addresses, vec![Address::reference(second)]);

    // The document itself is untouched
    ctx.store
        .get_address(&ctx.cx, first)
        .await
        .expect("Unlinked address should remain");
}

#[tokio::test]
async fn test_link_missing_user() {
    let ctx = TestContext::new().await;
    let err = ctx
        .store
        .link(
            &ctx.cx,
            ReferenceSet::Addresses,
            &ObjectId::new().to_hex(),
            &ObjectId::new().to_hex(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

// ============================================================================
// Hydration
// ============================================================================

#[tokio::test]
async fn test_hydration_follows_reference_order() {
    let ctx = TestContext::new().await;
    let user = ctx.create_plain_user("alice").await;

    let a = ctx
        .store
        .create_address(&ctx.cx, &address("A"), "")
        .await
        .expect("Failed to create address");
    let b = ctx
        .store
        .create_address(&ctx.cx, &address("B"), "")
        .await
        .expect("Failed to create address");

    for id in [&b.id, &a.id] {
        ctx.store
            .link(&ctx.cx, ReferenceSet::Addresses, id, &user.id)
            .await
            .expect("Failed to link");
    }

    let mut loaded = ctx
        .store
        .get_user(&ctx.cx, &user.id)
        .await
        .expect("Failed to get user");
    ctx.store
        .get_user_attributes(&ctx.cx, &mut loaded)
        .await
        .expect("Failed to hydrate");

    let cities: Vec<&str> = loaded.addresses.iter().map(|a| a.city.as_str()).collect();
    assert_eq!(cities, ["B", "A"]);
}

#[tokio::test]
async fn test_hydration_skips_missing_documents() {
    let ctx = TestContext::new().await;
    let user = ctx
        .store
        .create_user(
            &ctx.cx,
            user_with(
                "alice",
                vec![address("X"), address("Y")],
                vec![card("4111111111111111")],
            ),
        )
        .await
        .expect("Failed to create user");

    ctx.delete_raw(Collection::Addresses, &user.addresses[0].id)
        .await;
    ctx.delete_raw(Collection::Cards, &user.cards[0].id).await;

    let mut loaded = ctx
        .store
        .get_user(&ctx.cx, &user.id)
        .await
        .expect("Failed to get user");
    assert_eq!(loaded.addresses.len(), 2, "dangling reference still listed");

    ctx.store
        .get_user_attributes(&ctx.cx, &mut loaded)
        .await
        .expect("Failed to hydrate");
    assert_eq!(loaded.addresses.len(), 1);
    assert_eq!(loaded.addresses[0].city, "Y");
    assert!(loaded.cards.is_empty());
}

#[tokio::test]
async fn test_hydration_rejects_malformed_reference() {
    let ctx = TestContext::new().await;
    let user = ctx
        .store
        .create_user(&ctx.cx, user_with("alice", vec![address("X")], Vec::new()))
        .await
        .expect("Failed to create user");

    let mut tampered = user.clone();
    tampered.cards.push(Card::reference("garbage"));

    let err = ctx
        .store
        .get_user_attributes(&ctx.cx, &mut tampered)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    assert_eq!(tampered.addresses, user.addresses, "user left unchanged");
}

#[tokio::test]
async fn test_hydration_of_empty_user() {
    let ctx = TestContext::new().await;
    let mut user = ctx.create_plain_user("alice").await;

    ctx.store
        .get_user_attributes(&ctx.cx, &mut user)
        .await
        .expect("Failed to hydrate");
    assert!(user.addresses.is_empty());
    assert!(user.cards.is_empty());
}
