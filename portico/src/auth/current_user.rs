//! Extractors for the authenticated principal.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use crate::{
    AppState,
    auth::session,
    db::models::users::UserDBResponse,
    errors::{Error, Result},
    types::UserId,
};

/// The authenticated user making the request, as recovered from the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_admin: bool,
}

impl CurrentUser {
    /// Human-readable display name: full name when known, username otherwise.
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => format!("{first} {last}"),
            (Some(first), _) if !first.is_empty() => first.to_string(),
            _ => self.username.clone(),
        }
    }
}

impl From<UserDBResponse> for CurrentUser {
    fn from(db: UserDBResponse) -> Self {
        Self {
            id: db.id,
            username: db.username,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            is_admin: db.is_admin,
        }
    }
}

/// Extract user from the session cookie if present and valid
/// Returns:
/// - None: No session cookie present
/// - Some(Ok(user)): Valid session found and verified
/// - Some(Err(error)): Session cookie present but malformed beyond repair
#[instrument(skip(parts, config))]
fn try_session_auth(parts: &Parts, config: &crate::config::Config) -> Option<Result<CurrentUser>> {
    let cookie_header = parts.headers.get(axum::http::header::COOKIE)?;

    let cookie_str = match cookie_header.to_str() {
        Ok(s) => s,
        Err(e) => {
            return Some(Err(Error::Internal {
                operation: format!("read cookie header: {e}"),
            }));
        }
    };
    let cookie_name = &config.auth.session.cookie_name;

    for cookie in cookie_str.split(';') {
        let cookie = cookie.trim();
        if let Some((name, value)) = cookie.split_once('=') {
            if name == cookie_name {
                match session::verify_session_token(value, config) {
                    Ok(user) => return Some(Ok(user)),
                    Err(_) => {
                        // Invalid/expired token; expected for stale cookies, keep looking
                        continue;
                    }
                }
            }
        }
    }
    None
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    #[instrument(skip(parts, state))]
    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        match try_session_auth(parts, &state.config) {
            Some(Ok(user)) => {
                debug!("Found session authenticated user: {}", user.id);
                Ok(user)
            }
            Some(Err(e)) => Err(e),
            None => {
                trace!("No session authentication attempted");
                Err(Error::Unauthenticated {
                    next: Some(parts.uri.path().to_string()),
                })
            }
        }
    }
}

/// Optional variant of [`CurrentUser`] for pages that render for both
/// anonymous and authenticated visitors.
#[derive(Debug, Clone)]
pub struct OptionalUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> std::result::Result<Self, Infallible> {
        match try_session_auth(parts, &state.config) {
            Some(Ok(user)) => Ok(OptionalUser(Some(user))),
            _ => Ok(OptionalUser(None)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::Request;
    use uuid::Uuid;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.secret_key = Some("current-user-test-secret".to_string());
        config
    }

    fn test_user() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            username: "lisa".to_string(),
            email: "lisa@example.com".to_string(),
            first_name: None,
            last_name: None,
            is_admin: false,
        }
    }

    fn parts_with_cookie(cookie: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/accounts/profile/");
        if let Some(cookie) = cookie {
            builder = builder.header(axum::http::header::COOKIE, cookie);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    #[test]
    fn test_session_auth_roundtrip() {
        let config = test_config();
        let user = test_user();
        let token = session::create_session_token(&user, &config).unwrap();

        let parts = parts_with_cookie(Some(format!("{}={}", config.auth.session.cookie_name, token)));
        let extracted = try_session_auth(&parts, &config).unwrap().unwrap();
        assert_eq!(extracted.id, user.id);
        assert_eq!(extracted.username, "lisa");
    }

    #[test]
    fn test_missing_cookie_is_none() {
        let config = test_config();
        assert!(try_session_auth(&parts_with_cookie(None), &config).is_none());
    }

    #[test]
    fn test_garbage_token_is_ignored() {
        let config = test_config();
        let parts = parts_with_cookie(Some(format!("{}=not-a-token; other=1", config.auth.session.cookie_name)));
        assert!(try_session_auth(&parts, &config).is_none());
    }

    #[test]
    fn test_display_name_falls_back_to_username() {
        let mut user = test_user();
        assert_eq!(user.display_name(), "lisa");
        user.first_name = Some("Lisa".to_string());
        user.last_name = Some("Simpson".to_string());
        assert_eq!(user.display_name(), "Lisa Simpson");
    }
}
