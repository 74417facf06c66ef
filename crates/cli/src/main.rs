//! Userstore CLI - schema setup, imports and lookups against a user store.
//!
//! # Usage
//!
//! ```bash
//! # Create collections and the unique username index
//! userstore init
//!
//! # Import a user with nested addresses and cards
//! userstore user import alice.json
//!
//! # Look a user up and load its addresses and cards
//! userstore user find alice --hydrate
//!
//! # Attach a new address to an existing user
//! userstore address add home.json --user 65f1c0a4e13a5b2f9c8d7e61
//!
//! # Delete a user and everything it references
//! userstore delete customers 65f1c0a4e13a5b2f9c8d7e61
//! ```
//!
//! # Commands
//!
//! - `init` - Ensure collections and indexes
//! - `ping` - Check that the database answers
//! - `user` - Import and look up users
//! - `address` / `card` - Add and look up addresses and cards
//! - `delete` - Delete a user, address or card
//!
//! The database is taken from `--database-url` or `USERSTORE_DATABASE_URL`.
//! Results are printed to stdout as JSON; logs go to stderr.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::io::Write;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use userstore::{Collection, TraceContext, UserStore};

mod commands;

use commands::CommandError;

#[derive(Parser)]
#[command(name = "userstore")]
#[command(author, version, about = "User store operator tools")]
struct Cli {
    /// `SQLite` URL, overriding `USERSTORE_DATABASE_URL`
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create collections and the unique username index
    Init,
    /// Check that the database answers
    Ping,
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Manage addresses
    Address {
        #[command(subcommand)]
        action: AttributeAction,
    },
    /// Manage cards
    Card {
        #[command(subcommand)]
        action: AttributeAction,

        /// Print full card numbers instead of masking them
        #[arg(long, global = true)]
        reveal: bool,
    },
    /// Delete a user, address or card
    Delete {
        /// Collection: `customers`, `addresses` or `cards`
        collection: Collection,
        /// Document id
        id: String,
    },
}

#[derive(Subcommand)]
enum UserAction {
    /// Create a user from a JSON file, including nested addresses and cards
    Import {
        /// Path to the JSON payload
        file: PathBuf,
    },
    /// Fetch a user by id
    Get {
        id: String,
        #[command(flatten)]
        hydrate: Hydrate,
    },
    /// Fetch a user by username
    Find {
        username: String,
        #[command(flatten)]
        hydrate: Hydrate,
    },
    /// List all users
    List {
        #[command(flatten)]
        hydrate: Hydrate,
    },
}

#[derive(Args, Clone, Copy)]
struct Hydrate {
    /// Load full addresses and cards instead of ids
    #[arg(long)]
    hydrate: bool,
}

#[derive(Subcommand)]
enum AttributeAction {
    /// Store a document from a JSON file
    Add {
        /// Path to the JSON payload
        file: PathBuf,
        /// Owner to link the new document to
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Fetch a document by id
    Get { id: String },
    /// List all documents
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "userstore=info,userstore_cli=info".into());

    let json_layer = cli.log_json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_writer(std::io::stderr)
    });
    let text_layer =
        (!cli.log_json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = commands::connect(cli.database_url).await?;
    let cx = userstore::TraceContext::current();
    let mut out = std::io::stdout();

    commands::close_after(&store, dispatch(&store, &cx, cli.command, &mut out)).await?;
    Ok(())
}

async fn dispatch(
    store: &UserStore,
    cx: &TraceContext,
    command: Commands,
    out: &mut impl Write,
) -> Result<(), CommandError> {
    match command {
        // `connect` already ensured the schema
        Commands::Init => tracing::info!("Store initialized"),
        Commands::Ping => commands::ping(store, cx).await?,
        Commands::User { action } => match action {
            UserAction::Import { file } => commands::user::import(store, cx, &file, out).await?,
            UserAction::Get { id, hydrate } => {
                commands::user::get(store, cx, &id, hydrate.hydrate, out).await?;
            }
            UserAction::Find { username, hydrate } => {
                commands::user::find(store, cx, &username, hydrate.hydrate, out).await?;
            }
            UserAction::List { hydrate } => {
                commands::user::list(store, cx, hydrate.hydrate, out).await?;
            }
        },
        Commands::Address { action } => match action {
            AttributeAction::Add { file, user } => {
                commands::address::add(store, cx, &file, user.as_deref(), out).await?;
            }
            AttributeAction::Get { id } => commands::address::get(store, cx, &id, out).await?,
            AttributeAction::List => commands::address::list(store, cx, out).await?,
        },
        Commands::Card { action, reveal } => match action {
            AttributeAction::Add { file, user } => {
                commands::card::add(store, cx, &file, user.as_deref(), reveal, out).await?;
            }
            AttributeAction::Get { id } => {
                commands::card::get(store, cx, &id, reveal, out).await?;
            }
            AttributeAction::List => commands::card::list(store, cx, reveal, out).await?,
        },
        Commands::Delete { collection, id } => {
            commands::delete(store, cx, collection, &id).await?;
        }
    }
    Ok(())
}
