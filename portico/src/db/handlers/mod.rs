//! Repository implementations for database access.
//!
//! Each repository wraps a SQLx connection, provides strongly-typed CRUD
//! operations, and returns domain models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Users`]: User account management and authentication
//! - [`PasswordResetTokens`]: Password reset token lifecycle

pub mod password_reset_tokens;
pub mod repository;
pub mod users;

pub use password_reset_tokens::PasswordResetTokens;
pub use repository::Repository;
pub use users::Users;
