//! Authentication system.
//!
//! Browser-based authentication using signed, HTTP-only session cookies:
//! users log in via `/accounts/login/` with email/password, a JWT session
//! token is stored in the cookie, and handlers recover the principal with the
//! [`current_user::CurrentUser`] extractor (or [`current_user::OptionalUser`]
//! on public pages).
//!
//! # Modules
//!
//! - [`current_user`]: Extractors for getting the authenticated user in handlers
//! - [`middleware`]: Route protection middleware
//! - [`password`]: Password hashing and verification using Argon2
//! - [`session`]: Session token creation and verification

pub mod current_user;
pub mod middleware;
pub mod password;
pub mod session;
