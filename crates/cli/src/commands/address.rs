//! Address commands.

use std::io::Write;
use std::path::Path;

use tracing::info;
use userstore::{TraceContext, UserStore};
use userstore_core::Address;

use super::{CommandError, print_json, read_payload};

/// Store an address from a JSON file, optionally linked to `user`.
pub async fn add(
    store: &UserStore,
    cx: &TraceContext,
    file: &Path,
    user: Option<&str>,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    let address: Address = read_payload(file).await?;
    let stored = store
        .create_address(cx, &address, user.unwrap_or_default())
        .await?;
    info!(id = %stored.id, "Address stored");
    print_json(out, &stored)
}

/// Fetch an address by id.
pub async fn get(
    store: &UserStore,
    cx: &TraceContext,
    id: &str,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    print_json(out, &store.get_address(cx, id).await?)
}

/// List every address.
pub async fn list(
    store: &UserStore,
    cx: &TraceContext,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    print_json(out, &store.get_addresses(cx).await?)
}
