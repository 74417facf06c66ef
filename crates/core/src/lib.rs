//! Userstore Core - Shared types library.
//!
//! This crate provides the types shared by every userstore component:
//! - `userstore` - The aggregate persistence layer
//! - `userstore-cli` - Operator command-line tools
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access.
//! The persistence layer converts these passive values to and from its own
//! storage records.
//!
//! # Modules
//!
//! - [`types`] - The `ObjectId` identifier codec and the `User`, `Address`
//!   and `Card` value records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
