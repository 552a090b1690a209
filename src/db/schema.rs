use serde::{Deserialize, Serialize};
use surrealdb::sql::Datetime;

/// Columns selected whenever a user is read, with the record key flattened to
/// its integer value.
pub const USER_PROJECTION: &str = "record::id(id) AS id, email, name, picture, \
     external_id, provider, created_at, updated_at";

/// Persisted user record.
///
/// This is also the `user` object returned to the client after a successful
/// callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Integer key of the `user` record
    pub id: i64,
    /// Unique, case-sensitive as stored
    pub email: String,
    /// Display name
    pub name: Option<String>,
    /// Picture URL
    pub picture: Option<String>,
    /// Provider account id, set once the account is linked
    pub external_id: Option<String>,
    /// Provider that most recently linked this account
    pub provider: Option<String>,
    pub created_at: Option<Datetime>,
    pub updated_at: Option<Datetime>,
}

/// Payload for creating a new user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserCreate {
    pub email: String,
    pub name: Option<String>,
    pub picture: Option<String>,
    pub external_id: Option<String>,
    pub provider: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(external_id: Option<&str>) -> UserRecord {
        UserRecord {
            id: 7,
            email: "ada@example.com".to_string(),
            name: Some("Ada".to_string()),
            picture: None,
            external_id: external_id.map(str::to_string),
            provider: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_user_record_json_shape() {
        let json = serde_json::to_value(record(Some("g-1"))).unwrap();

        assert_eq!(json["id"], 7);
        assert_eq!(json["email"], "ada@example.com");
        assert_eq!(json["external_id"], "g-1");
        assert!(json["picture"].is_null());
    }
}
