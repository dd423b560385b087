//! Database models for users.

use crate::types::UserId;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database request for creating a new user
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
    pub password_hash: Option<String>,
}

/// Database request for updating a user. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_path: Option<String>,
    pub password_hash: Option<String>,
}

/// Database response for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_path: Option<String>,
    pub is_admin: bool,
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserDBResponse {
    /// Human-readable display name: full name when known, username otherwise.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => format!("{first} {last}"),
            (Some(first), _) if !first.is_empty() => first.to_string(),
            _ => self.username.clone(),
        }
    }

    /// Whether the account has filled in the fields registration leaves blank.
    pub fn profile_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        filled(&self.first_name) && filled(&self.last_name) && !self.email.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(first: Option<&str>, last: Option<&str>) -> UserDBResponse {
        UserDBResponse {
            id: Uuid::new_v4(),
            username: "marge".to_string(),
            email: "marge@example.com".to_string(),
            first_name: first.map(|s| s.to_string()),
            last_name: last.map(|s| s.to_string()),
            avatar_path: None,
            is_admin: false,
            password_hash: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_display_name_prefers_full_name() {
        assert_eq!(user(Some("Marge"), Some("Bouvier")).display_name(), "Marge Bouvier");
        assert_eq!(user(Some("Marge"), None).display_name(), "Marge");
        assert_eq!(user(None, None).display_name(), "marge");
        assert_eq!(user(Some(""), Some("")).display_name(), "marge");
    }

    #[test]
    fn test_profile_complete() {
        assert!(user(Some("Marge"), Some("Bouvier")).profile_complete());
        assert!(!user(Some("Marge"), None).profile_complete());
        assert!(!user(None, None).profile_complete());
        assert!(!user(Some("  "), Some("Bouvier")).profile_complete());
    }
}
