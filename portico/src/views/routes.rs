//! Static route table.
//!
//! Paths are declared once here and referenced everywhere else (handlers,
//! redirects, templates via context). The [`resolve`] function maps the
//! canonical route names produced by the template registry (for example
//! `portico:user_list`) to concrete paths; the startup validation walks every
//! registered resource kind through it, so an unregistered list route is a
//! configuration fault caught before the server accepts traffic.

use uuid::Uuid;

pub const INDEX: &str = "/";
pub const ABOUT: &str = "/about/";
pub const CONTACT: &str = "/contact/";
pub const DASHBOARD: &str = "/dashboard/";

pub const LOGIN: &str = "/accounts/login/";
pub const LOGOUT: &str = "/accounts/logout/";
pub const REGISTER: &str = "/accounts/register/";
pub const PROFILE: &str = "/accounts/profile/";

pub const PASSWORD_CHANGE: &str = "/accounts/password/change/";
pub const PASSWORD_CHANGE_DONE: &str = "/accounts/password/change/done/";
pub const PASSWORD_RESET: &str = "/accounts/password/reset/";
pub const PASSWORD_RESET_DONE: &str = "/accounts/password/reset/done/";
pub const PASSWORD_RESET_COMPLETE: &str = "/accounts/password/reset/complete/";

pub fn edit_user(id: Uuid) -> String {
    format!("/accounts/{id}/edit/")
}

pub fn delete_user(id: Uuid) -> String {
    format!("/accounts/{id}/delete/")
}

pub fn user_avatar_upload(id: Uuid) -> String {
    format!("/accounts/{id}/avatar/")
}

pub fn member_detail(id: Uuid) -> String {
    format!("/members/{id}/")
}

pub fn user_image(id: Uuid) -> String {
    format!("/media/users/{id}/")
}

/// Resolve a canonical route name to its registered path.
///
/// Route names follow the `portico:<name>` convention; list routes are
/// `portico:<kind slug>_list`.
pub fn resolve(name: &str) -> Option<&'static str> {
    match name {
        "portico:index" => Some(INDEX),
        "portico:about" => Some(ABOUT),
        "portico:contact" => Some(CONTACT),
        "portico:user_list" => Some(DASHBOARD),
        "portico:login" => Some(LOGIN),
        "portico:profile" => Some(PROFILE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_routes() {
        assert_eq!(resolve("portico:user_list"), Some(DASHBOARD));
        assert_eq!(resolve("portico:index"), Some(INDEX));
        assert_eq!(resolve("portico:nonexistent_list"), None);
    }

    #[test]
    fn test_parameterized_paths() {
        let id: Uuid = "550e8400-e29b-41d4-a716-446655440000".parse().unwrap();
        assert_eq!(edit_user(id), "/accounts/550e8400-e29b-41d4-a716-446655440000/edit/");
        assert_eq!(user_image(id), "/media/users/550e8400-e29b-41d4-a716-446655440000/");
    }
}
