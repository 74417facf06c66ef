//! User commands.
//!
//! # Usage
//!
//! ```bash
//! userstore user import alice.json
//! userstore user get 65f1c0a4e13a5b2f9c8d7e61 --hydrate
//! userstore user find alice
//! userstore user list
//! ```
//!
//! Import payloads use the same field names as the output, e.g.
//! `{"username": "alice", "addresses": [{"city": "X"}], "cards": [{"longNum": "4111111111111111"}]}`.

use std::io::Write;
use std::path::Path;

use tracing::{info, warn};
use userstore::{StoreError, TraceContext, UserStore};
use userstore_core::User;

use super::{CommandError, print_json, read_payload};

/// Create a user, with nested addresses and cards, from a JSON file.
///
/// If the user is stored but some nested documents are not, the stored user
/// is still printed before the error is returned.
pub async fn import(
    store: &UserStore,
    cx: &TraceContext,
    file: &Path,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let user: User = read_payload(file).await?;
    info!(username = %user.username, "Importing user");

    match store.create_user(cx, user).await {
        Ok(mut stored) => {
            mask_cards(&mut stored);
            print_json(out, &stored)
        }
        Err(StoreError::PartialAggregate(mut failure)) => {
            warn!(user.id = %failure.user.id, "User stored with failed attributes");
            mask_cards(&mut failure.user);
            print_json(out, &failure.user)?;
            Err(StoreError::PartialAggregate(failure).into())
        }
        Err(e) => Err(e.into()),
    }
}

/// Fetch a user by id.
pub async fn get(
    store: &UserStore,
    cx: &TraceContext,
    id: &str,
    hydrate: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let user = store.get_user(cx, id).await?;
    print_user(store, cx, user, hydrate, out).await
}

/// Fetch a user by username.
pub async fn find(
    store: &UserStore,
    cx: &TraceContext,
    username: &str,
    hydrate: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let user = store.get_user_by_name(cx, username).await?;
    print_user(store, cx, user, hydrate, out).await
}

/// List every user.
pub async fn list(
    store: &UserStore,
    cx: &TraceContext,
    hydrate: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let mut users = store.get_users(cx).await?;
    if hydrate {
        for user in &mut users {
            store.get_user_attributes(cx, user).await?;
            mask_cards(user);
        }
    }
    info!(count = users.len(), "Listed users");
    print_json(out, &users)
}

async fn print_user(
    store: &UserStore,
    cx: &TraceContext,
    mut user: User,
    hydrate: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    if hydrate {
        store.get_user_attributes(cx, &mut user).await?;
        mask_cards(&mut user);
    }
    print_json(out, &user)
}

fn mask_cards(user: &mut User) {
    for card in &mut user.cards {
        card.mask();
    }
}
