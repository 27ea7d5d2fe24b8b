//! User and address records.
//!
//! These are the shapes carried through the bulk source, the ingestion
//! pipeline, the store and the HTTP API. Field values are not validated
//! beyond the identifier.

use serde::{Deserialize, Serialize};

use super::UserId;

/// A user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Caller-supplied identifier, unique within the store.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Email address (stored as given).
    pub email: String,
    /// Phone number (stored as given).
    pub phone_number: String,
    /// Addresses owned by this user. Order is not significant.
    #[serde(default)]
    pub addresses: Vec<Address>,
}

/// A postal address. Always a child of exactly one [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_source_field_names() {
        let json = r#"{
            "id": "u-1",
            "name": "Ada",
            "email": "ada@example.com",
            "phone_number": "+44 20 7946 0000",
            "addresses": [{
                "street": "12 Analytical Row",
                "city": "London",
                "state": "Greater London",
                "zip_code": "NW1",
                "country": "UK"
            }]
        }"#;

        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id.as_str(), "u-1");
        assert_eq!(user.phone_number, "+44 20 7946 0000");
        assert_eq!(user.addresses.len(), 1);
        assert_eq!(user.addresses.first().unwrap().zip_code, "NW1");
    }

    #[test]
    fn test_missing_addresses_defaults_to_empty() {
        let json = r#"{"id":"u-2","name":"Bo","email":"bo@example.com","phone_number":"1"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.addresses.is_empty());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let json = r#"{"id":"u-3","name":"Cy","email":"cy@example.com"}"#;
        assert!(serde_json::from_str::<User>(json).is_err());
    }
}
