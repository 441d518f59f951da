use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::store::Document;

/// User record, keyed by email.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(default)]
pub struct User {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub location: String,
    pub password: String, // Argon2 PHC string at rest, empty on the wire
}

impl User {
    /// Copy safe to send to a client.
    pub fn redacted(mut self) -> Self {
        self.password.clear();
        self
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn key(&self) -> &str {
        &self.email
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacted_clears_only_the_password() {
        let user = User {
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            location: "London".into(),
            password: "$argon2id$v=19$...".into(),
        };
        let public = user.clone().redacted();
        assert!(public.password.is_empty());
        assert_eq!(public.email, user.email);
        assert_eq!(public.location, user.location);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let user: User = serde_json::from_str(r#"{"email":"a@b.com"}"#).unwrap();
        assert_eq!(user.email, "a@b.com");
        assert!(user.password.is_empty());
        assert!(user.first_name.is_empty());
    }
}
