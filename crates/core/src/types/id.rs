//! Store-generated document identifiers.
//!
//! Every document in the store is keyed by a 12-byte [`ObjectId`]. Outside the
//! store the identifier travels as its 24-character hexadecimal string form;
//! [`ObjectId::parse_hex`] and [`ObjectId::to_hex`] convert between the two.

use core::fmt;
use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors that can occur when decoding an [`ObjectId`] from its string form.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ObjectIdError {
    /// The input is not exactly [`ObjectId::HEX_LEN`] bytes long.
    #[error("invalid id hex: expected {expected} characters, got {len}")]
    InvalidLength {
        /// Length of the rejected input in bytes.
        len: usize,
        /// Required length.
        expected: usize,
    },
    /// The input contains a character outside `[0-9a-fA-F]`.
    #[error("invalid id hex: contains non-hexadecimal characters")]
    InvalidHex,
}

/// A 12-byte document identifier.
///
/// The first four bytes are the big-endian creation time in seconds since the
/// Unix epoch; the remaining eight bytes are random. Identifiers are generated
/// on the client side right before a document is first written.
///
/// ## Examples
///
/// ```
/// use userstore_core::ObjectId;
///
/// let id = ObjectId::new();
/// let hex = id.to_hex();
/// assert_eq!(hex.len(), ObjectId::HEX_LEN);
/// assert_eq!(ObjectId::parse_hex(&hex), Ok(id));
///
/// assert!(ObjectId::parse_hex("not-an-id").is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    /// Length of the binary form in bytes.
    pub const LEN: usize = 12;

    /// Length of the hexadecimal string form in characters.
    pub const HEX_LEN: usize = 24;

    /// Generate a fresh identifier.
    #[must_use]
    pub fn new() -> Self {
        let seconds = u32::try_from(Utc::now().timestamp()).unwrap_or_default();

        let mut bytes = [0u8; Self::LEN];
        let (head, tail) = bytes.split_at_mut(4);
        head.copy_from_slice(&seconds.to_be_bytes());
        tail.copy_from_slice(&rand::random::<[u8; 8]>());

        Self(bytes)
    }

    /// Build an identifier from its binary form.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    /// Decode an identifier from its hexadecimal string form.
    ///
    /// Upper- and lower-case digits are both accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not exactly 24 characters long or
    /// contains a non-hexadecimal character.
    pub fn parse_hex(s: &str) -> Result<Self, ObjectIdError> {
        if s.len() != Self::HEX_LEN {
            return Err(ObjectIdError::InvalidLength {
                len: s.len(),
                expected: Self::HEX_LEN,
            });
        }

        let mut bytes = [0u8; Self::LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ObjectIdError::InvalidHex)?;
        Ok(Self(bytes))
    }

    /// Encode the identifier as 24 lower-case hexadecimal characters.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Creation time embedded in the identifier.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        let [a, b, c, d, ..] = self.0;
        let seconds = u32::from_be_bytes([a, b, c, d]);
        DateTime::from_timestamp(i64::from(seconds), 0).unwrap_or_default()
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_hex(s)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse_hex(&s).map_err(serde::de::Error::custom)
    }
}
