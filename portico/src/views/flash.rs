//! One-shot user-visible messages.
//!
//! Outcome messages from mutating views must survive exactly one redirect hop
//! and be delivered exactly once. They are carried in a short-lived cookie set
//! alongside the redirect; the next rendered page reads the cookie, shows the
//! messages, and clears it in the same response. This is deliberately explicit
//! session-scoped state with a visible consume-and-clear step rather than
//! middleware magic.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};

const FLASH_COOKIE: &str = "portico_flash";

/// Severity of a flash message; templates use it as a CSS class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
    Info,
}

/// A single user-visible outcome message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            message: message.into(),
        }
    }

    fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        general_purpose::URL_SAFE_NO_PAD.encode(json)
    }

    fn decode(raw: &str) -> Option<Self> {
        let bytes = general_purpose::URL_SAFE_NO_PAD.decode(raw).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Redirect to `to`, carrying this message across the hop.
    pub fn redirect(self, to: &str) -> Response {
        let mut response = Redirect::to(to).into_response();
        // Base64 keeps the value cookie-safe ASCII; a malformed header here is unreachable
        match HeaderValue::from_str(&set_cookie(&self.encode())) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("failed to attach flash cookie: {e}"),
        }
        response
    }
}

fn set_cookie(encoded: &str) -> String {
    // Max-Age bounds how long an undelivered message can linger
    format!("{FLASH_COOKIE}={encoded}; Path=/; HttpOnly; SameSite=Lax; Max-Age=60")
}

/// The Set-Cookie value that consumes the flash cookie.
pub fn clear_cookie() -> String {
    format!("{FLASH_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// Messages carried on the incoming request. Extracting never fails; a missing
/// or garbled cookie is simply no messages.
#[derive(Debug, Clone, Default)]
pub struct IncomingFlashes(pub Vec<Flash>);

impl IncomingFlashes {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add a message generated while handling the current request, delivered
    /// on this response rather than after a redirect.
    pub fn push(&mut self, flash: Flash) {
        self.0.push(flash);
    }
}

impl<S: Send + Sync> FromRequestParts<S> for IncomingFlashes {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Infallible> {
        let mut flashes = Vec::new();

        if let Some(cookie_str) = parts.headers.get(header::COOKIE).and_then(|h| h.to_str().ok()) {
            for cookie in cookie_str.split(';') {
                if let Some((name, value)) = cookie.trim().split_once('=') {
                    if name == FLASH_COOKIE && !value.is_empty() {
                        if let Some(flash) = Flash::decode(value) {
                            flashes.push(flash);
                        }
                    }
                }
            }
        }

        Ok(IncomingFlashes(flashes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[test]
    fn test_encode_decode_roundtrip() {
        let flash = Flash::success("Account updated successfully.");
        let decoded = Flash::decode(&flash.encode()).unwrap();
        assert_eq!(decoded, flash);
    }

    #[test]
    fn test_decode_garbage_is_none() {
        assert!(Flash::decode("!!!not-base64!!!").is_none());
        assert!(Flash::decode("bm90LWpzb24").is_none());
    }

    #[test]
    fn test_redirect_sets_cookie_and_location() {
        let response = Flash::success("Done.").redirect("/dashboard/");
        assert_eq!(response.status(), axum::http::StatusCode::SEE_OTHER);
        assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/dashboard/");

        let cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.starts_with("portico_flash="));
        assert!(cookie.contains("Max-Age=60"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        assert!(clear_cookie().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_extract_from_cookie_header() {
        let flash = Flash::error("Error occurred while processing.");
        let request = Request::builder()
            .uri("/")
            .header(header::COOKIE, format!("other=1; portico_flash={}", flash.encode()))
            .body(())
            .unwrap();
        let (mut parts, ()) = request.into_parts();

        let IncomingFlashes(flashes) = IncomingFlashes::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(flashes, vec![flash]);
    }

    #[tokio::test]
    async fn test_extract_without_cookie_is_empty() {
        let request = Request::builder().uri("/").body(()).unwrap();
        let (mut parts, ()) = request.into_parts();

        let IncomingFlashes(flashes) = IncomingFlashes::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(flashes.is_empty());
    }
}
