//! Payment card value record.

use serde::{Deserialize, Serialize};

/// A payment card.
///
/// `id` is the external string form of the store identifier; an empty `id`
/// means the card has not been persisted yet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Card {
    /// Full card number.
    pub long_num: String,
    /// Expiry, as supplied by the client (e.g. `"04/27"`).
    pub expires: String,
    /// Card verification code.
    pub ccv: String,
    /// External identifier (empty until persisted).
    pub id: String,
}

impl Card {
    /// A card carrying only its identifier.
    #[must_use]
    pub fn reference(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Whether the card has been assigned a store identifier.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    /// Replace every character of the card number except the last four with `*`.
    pub fn mask(&mut self) {
        let keep_from = self.long_num.chars().count().saturating_sub(4);
        self.long_num = self
            .long_num
            .chars()
            .enumerate()
            .map(|(i, c)| if i < keep_from { '*' } else { c })
            .collect();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_keeps_last_four() {
        let mut card = Card {
            long_num: "4111111111111111".to_string(),
            ..Card::default()
        };
        card.mask();
        assert_eq!(card.long_num, "************1111");
    }

    #[test]
    fn test_mask_short_number_untouched() {
        let mut card = Card {
            long_num: "123".to_string(),
            ..Card::default()
        };
        card.mask();
        assert_eq!(card.long_num, "123");
    }

    #[test]
    fn test_serde_field_names() {
        let card = Card {
            long_num: "4111".to_string(),
            expires: "04/27".to_string(),
            ccv: "123".to_string(),
            id: "x".to_string(),
        };
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["longNum"], "4111");
        assert_eq!(json["ccv"], "123");
        assert_eq!(json["id"], "x");
    }

    #[test]
    fn test_reference() {
        let card = Card::reference("abc");
        assert!(card.is_persisted());
        assert!(card.long_num.is_empty());
    }
}
