//! Card commands.
//!
//! Card numbers are masked to their last four digits unless `--reveal` is
//! given.

use std::io::Write;
use std::path::Path;

use tracing::info;
use userstore::{TraceContext, UserStore};
use userstore_core::Card;

use super::{CommandError, print_json, read_payload};

/// Store a card from a JSON file, optionally linked to `user`.
pub async fn add(
    store: &UserStore,
    cx: &TraceContext,
    file: &Path,
    user: Option<&str>,
    reveal: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let card: Card = read_payload(file).await?;
    let mut stored = store.create_card(cx, &card, user.unwrap_or_default()).await?;
    info!(id = %stored.id, "Card stored");
    if !reveal {
        stored.mask();
    }
    print_json(out, &stored)
}

/// Fetch a card by id.
pub async fn get(
    store: &UserStore,
    cx: &TraceContext,
    id: &str,
    reveal: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let mut card = store.get_card(cx, id).await?;
    if !reveal {
        card.mask();
    }
    print_json(out, &card)
}

/// List every card.
pub async fn list(
    store: &UserStore,
    cx: &TraceContext,
    reveal: bool,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let mut cards = store.get_cards(cx).await?;
    if !reveal {
        cards.iter_mut().for_each(Card::mask);
    }
    print_json(out, &cards)
}
