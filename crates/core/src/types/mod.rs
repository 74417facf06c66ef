//! Core types for the userstore.
//!
//! This module provides the identifier codec and the domain value records.

pub mod address;
pub mod card;
pub mod id;
pub mod user;

pub use address::Address;
pub use card::Card;
pub use id::{ObjectId, ObjectIdError};
pub use user::User;
