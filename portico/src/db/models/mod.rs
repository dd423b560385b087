//! Database record structures matching table schemas.

pub mod password_reset_tokens;
pub mod users;
