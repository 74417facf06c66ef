//! Command implementations.

pub mod address;
pub mod card;
pub mod user;

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;
use userstore::{Collection, ConfigError, StoreConfig, StoreError, TraceContext, UserStore};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The store rejected the operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An input file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    /// An input file is not valid JSON for the expected payload.
    #[error("Invalid payload in {path}: {source}")]
    Payload {
        path: String,
        source: serde_json::Error,
    },

    /// Output could not be written.
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),

    /// Output could not be encoded.
    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Open the store, from `database_url` if given and the environment otherwise.
///
/// # Errors
///
/// Returns an error if configuration is missing or the store cannot be
/// initialized.
pub async fn connect(database_url: Option<String>) -> Result<UserStore, CommandError> {
    let config = match database_url {
        Some(url) => StoreConfig::new(url),
        None => StoreConfig::from_env()?,
    };

    info!("Connecting to user store...");
    Ok(UserStore::init(&config).await?)
}

/// Check that the database answers.
pub async fn ping(store: &UserStore, cx: &TraceContext) -> Result<(), CommandError> {
    store.ping(cx).await?;
    info!("Store is reachable");
    Ok(())
}

/// Delete a document by collection and id.
pub async fn delete(
    store: &UserStore,
    cx: &TraceContext,
    collection: Collection,
    id: &str,
) -> Result<(), CommandError> {
    store.delete(cx, collection, id).await?;
    info!(%collection, id, "Deleted");
    Ok(())
}

/// Await `command`, then close the store whether or not it succeeded.
pub async fn close_after<T>(
    store: &UserStore,
    command: impl Future<Output = Result<T, CommandError>>,
) -> Result<T, CommandError> {
    let result = command.await;
    store.close().await;
    result
}

/// Read and decode a JSON payload.
pub(crate) async fn read_payload<T: DeserializeOwned>(path: &Path) -> Result<T, CommandError> {
    let display = path.display().to_string();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Read {
            path: display.clone(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| CommandError::Payload {
        path: display,
        source,
    })
}

/// Write `value` to `out` as pretty JSON followed by a newline.
pub(crate) fn print_json<T: Serialize + ?Sized>(
    out: &mut impl Write,
    value: &T,
) -> Result<(), CommandError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    use tempfile::TempDir;
    use userstore::{Collection, StoreConfig, UserStore};

    /// A store over a fresh database file in `dir`.
    pub async fn store(dir: &TempDir) -> UserStore {
        let url = format!("sqlite://{}", dir.path().join("users.db").display());
        UserStore::init(&StoreConfig::new(url))
            .await
            .expect("Failed to initialize store")
    }

    /// Make every insert into `collection` fail.
    pub async fn block_inserts(store: &UserStore, collection: Collection) {
        let sql = format!(
            "CREATE TRIGGER block_{collection} BEFORE INSERT ON {collection} \
             BEGIN SELECT RAISE(ABORT, 'blocked'); END"
        );
        sqlx::query(&sql)
            .execute(store.pool())
            .await
            .expect("Failed to install trigger");
    }

    /// Write `payload` to `name` inside `dir`.
    pub fn payload(dir: &TempDir, name: &str, payload: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, payload).expect("Failed to write payload");
        path
    }
}
