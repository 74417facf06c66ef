//! Stored document bodies and their conversion to and from domain values.
//!
//! Domain values carry string ids and nested documents; stored bodies carry
//! no id of their own (it is the row key) and customers hold their addresses
//! and cards as reference sets of [`ObjectId`]s.

use serde::{Deserialize, Serialize};
use userstore_core::{Address, Card, ObjectId, User};

use super::documents::{Collection, Document, Record};

/// Stored body of a user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CustomerDoc {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub salt: String,
    /// Reference set of address ids.
    pub addresses: Vec<ObjectId>,
    /// Reference set of card ids.
    pub cards: Vec<ObjectId>,
}

impl Document for CustomerDoc {
    const COLLECTION: Collection = Collection::Customers;
}

impl CustomerDoc {
    /// Copy the profile fields of `user`, with empty reference sets.
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
            username: user.username.clone(),
            password: user.password.clone(),
            salt: user.salt.clone(),
            addresses: Vec::new(),
            cards: Vec::new(),
        }
    }

    /// Replace both reference sets.
    #[must_use]
    pub fn with_references(mut self, addresses: Vec<ObjectId>, cards: Vec<ObjectId>) -> Self {
        self.addresses = addresses;
        self.cards = cards;
        self
    }
}

impl From<Record<CustomerDoc>> for User {
    /// Reference sets become identifier-only addresses and cards.
    fn from(record: Record<CustomerDoc>) -> Self {
        let Record { id, doc } = record;
        Self {
            first_name: doc.first_name,
            last_name: doc.last_name,
            email: doc.email,
            username: doc.username,
            password: doc.password,
            salt: doc.salt,
            addresses: doc
                .addresses
                .iter()
                .map(|a| Address::reference(a.to_hex()))
                .collect(),
            cards: doc.cards.iter().map(|c| Card::reference(c.to_hex())).collect(),
            id: id.to_hex(),
        }
    }
}

/// Stored body of an address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressDoc {
    pub street: String,
    pub number: String,
    pub country: String,
    pub city: String,
    #[serde(rename = "postcode")]
    pub post_code: String,
}

impl Document for AddressDoc {
    const COLLECTION: Collection = Collection::Addresses;
}

impl From<&Address> for AddressDoc {
    fn from(address: &Address) -> Self {
        Self {
            street: address.street.clone(),
            number: address.number.clone(),
            country: address.country.clone(),
            city: address.city.clone(),
            post_code: address.post_code.clone(),
        }
    }
}

impl From<Record<AddressDoc>> for Address {
    fn from(record: Record<AddressDoc>) -> Self {
        let Record { id, doc } = record;
        Self {
            street: doc.street,
            number: doc.number,
            country: doc.country,
            city: doc.city,
            post_code: doc.post_code,
            id: id.to_hex(),
        }
    }
}

/// Stored body of a card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CardDoc {
    pub long_num: String,
    pub expires: String,
    pub ccv: String,
}

impl Document for CardDoc {
    const COLLECTION: Collection = Collection::Cards;
}

impl From<&Card> for CardDoc {
    fn from(card: &Card) -> Self {
        Self {
            long_num: card.long_num.clone(),
            expires: card.expires.clone(),
            ccv: card.ccv.clone(),
        }
    }
}

impl From<Record<CardDoc>> for Card {
    fn from(record: Record<CardDoc>) -> Self {
        let Record { id, doc } = record;
        Self {
            long_num: doc.long_num,
            expires: doc.expires,
            ccv: doc.ccv,
            id: id.to_hex(),
        }
    }
}
