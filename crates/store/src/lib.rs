//! Persistence for the user aggregate.
//!
//! A user document references its addresses and cards, which live in their
//! own collections. The store keeps the references and the documents in step
//! without multi-document transactions:
//!
//! - nested documents are created first, then the user referencing them
//! - a failed user write removes the nested documents again (best effort)
//! - deleting a user removes what it references; deleting an address or card
//!   pulls it from every user first
//!
//! Start with [`UserStore::init`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod trace;
pub mod users;

pub use config::{ConfigError, StoreConfig};
pub use db::{Collection, ReferenceSet};
pub use error::{PartialAggregateFailure, Result, StoreError};
pub use trace::TraceContext;
pub use users::UserStore;
