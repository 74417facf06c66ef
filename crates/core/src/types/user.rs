//! User value record.

use serde::{Deserialize, Serialize};

use super::{Address, Card};

/// A user with its addresses and payment cards.
///
/// This is the externally visible shape of the aggregate: identifiers are
/// strings, and `addresses`/`cards` hold either full documents or
/// identifier-only references (see [`Address::reference`]).
///
/// `password` and `salt` are accepted on input but never serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct User {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
    /// Login name, unique across all users.
    pub username: String,
    /// Password material as supplied by the caller.
    #[serde(skip_serializing)]
    pub password: String,
    /// Salt paired with `password`.
    #[serde(skip_serializing)]
    pub salt: String,
    /// Addresses owned by the user.
    pub addresses: Vec<Address>,
    /// Cards owned by the user.
    pub cards: Vec<Card>,
    /// External identifier (empty until persisted).
    pub id: String,
}

impl User {
    /// Create an unpersisted user with the given username.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    /// Whether the user has been assigned a store identifier.
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
    fn test_new_user_is_empty() {
        let user = User::new("alice");
        assert_eq!(user.username, "alice");
        assert!(user.addresses.is_empty());
        assert!(user.cards.is_empty());
        assert!(!user.is_persisted());
    }

    #[test]
    fn test_password_not_serialized() {
        let user = User {
            password: "hunter2".to_string(),
            salt: "pepper".to_string(),
            ..User::new("alice")
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(!json.contains("pepper"));
    }

    #[test]
    fn test_deserialize_nested_payload() {
        let user: User = serde_json::from_str(
            r#"{
                "username": "alice",
                "firstName": "Alice",
                "password": "secret",
                "addresses": [{"city": "X"}],
                "cards": [{"longNum": "4111111111111111"}]
            }"#,
        )
        .unwrap();

        assert_eq!(user.first_name, "Alice");
        assert_eq!(user.password, "secret");
        assert_eq!(user.addresses.len(), 1);
        assert_eq!(user.cards.first().unwrap().long_num, "4111111111111111");
    }
}
