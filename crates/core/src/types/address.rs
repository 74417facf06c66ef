//! Postal address value record.

use serde::{Deserialize, Serialize};

/// A postal address.
///
/// `id` is the external string form of the store identifier; an empty `id`
/// means the address has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Address {
    /// Street name.
    pub street: String,
    /// House or building number.
    pub number: String,
    /// Country name.
    pub country: String,
    /// City name.
    pub city: String,
    /// Postal code.
    #[serde(rename = "postcode")]
    pub post_code: String,
    /// External identifier (empty until persisted).
    pub id: String,
}

impl Address {
    /// An address carrying only its identifier.
    ///
    /// Stored users list their addresses in this form until the full
    /// documents are loaded.
    #[must_use]
    pub fn reference(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Whether the address has been assigned a store identifier.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_has_only_id() {
        let address = Address::reference("abc");
        assert_eq!(address.id, "abc");
        assert!(address.city.is_empty());
        assert!(address.is_persisted());
    }

    #[test]
    fn test_default_is_not_persisted() {
        assert!(!Address::default().is_persisted());
    }

    #[test]
    fn test_serde_field_names() {
        let address = Address {
            street: "Main St".to_string(),
            number: "1".to_string(),
            country: "NL".to_string(),
            city: "Amsterdam".to_string(),
            post_code: "1011".to_string(),
            id: String::new(),
        };
        let json = serde_json::to_value(&address).unwrap();
        assert_eq!(json["postcode"], "1011");
        assert_eq!(json["city"], "Amsterdam");
    }

    #[test]
    fn test_deserialize_partial_payload() {
        let address: Address = serde_json::from_str(r#"{"city":"X"}"#).unwrap();
        assert_eq!(address.city, "X");
        assert!(address.id.is_empty());
    }
}
