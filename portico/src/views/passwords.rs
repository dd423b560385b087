//! Login/logout and the password change and reset flows.
//!
//! The reset flow is the classic four-step sequence: request a link by email,
//! see the "sent" page, follow the emailed token link to choose a new
//! password, land on the "complete" page. Raw tokens never touch the
//! database; only their Argon2 hashes are stored, and consuming one token
//! invalidates every open token for that account.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
};
use minijinja::context;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{
        current_user::{CurrentUser, OptionalUser},
        password, session,
    },
    db::{
        handlers::{PasswordResetTokens, Repository, Users},
        models::users::UserUpdateDBRequest,
    },
    email::EmailService,
    errors::{Error, Result},
    views::{
        flash::IncomingFlashes,
        forms::{self, FormData, FormErrors},
        render_page, routes,
    },
};

#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Only same-site paths are allowed as post-login redirect targets.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//"))
}

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("failed to attach cookie: {e}"),
    }
}

/// GET /accounts/login/ - login form with the registration form alongside.
#[instrument(skip_all)]
pub async fn login_form(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    flashes: IncomingFlashes,
    Query(query): Query<LoginQuery>,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to(routes::PROFILE).into_response());
    }

    render_page(
        &state,
        "authentication/login.html",
        context! {
            current_user => user,
            next => safe_next(query.next.as_deref()),
            values => FormData::default(),
            errors => FormErrors::default(),
            registration_open => state.config.auth.allow_registration,
        },
        flashes,
    )
}

/// POST /accounts/login/ - verify credentials and establish a session.
#[instrument(skip_all)]
pub async fn login(State(state): State<AppState>, flashes: IncomingFlashes, Form(form): Form<FormData>) -> Result<Response> {
    let email = forms::optional(&form, "email").to_string();
    let password_input = form.get("password").cloned().unwrap_or_default();
    let next = safe_next(form.get("next").map(String::as_str)).map(str::to_string);

    // Non-specific failure: do not reveal which half was wrong
    let rejected = |state: &AppState, flashes: IncomingFlashes, email: String, next: Option<String>| {
        let mut errors = FormErrors::default();
        errors.form_error("Invalid email or password.");
        let mut values = FormData::default();
        values.insert("email".to_string(), email);
        render_page(
            state,
            "authentication/login.html",
            context! {
                current_user => (),
                next => next,
                values => values,
                errors => errors,
                registration_open => state.config.auth.allow_registration,
            },
            flashes,
        )
    };

    if email.is_empty() || password_input.is_empty() {
        return rejected(&state, flashes, email, next);
    }

    let user = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Users::new(&mut conn).get_user_by_email(&email).await?
    };

    let Some(user) = user else {
        return rejected(&state, flashes, email, next);
    };
    let Some(password_hash) = user.password_hash.clone() else {
        return rejected(&state, flashes, email, next);
    };

    // Verify on a blocking thread to avoid stalling the async runtime
    let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&password_input, &password_hash))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password verification task: {e}"),
        })??;

    if !is_valid {
        return rejected(&state, flashes, email, next);
    }

    let principal = CurrentUser::from(user);
    let token = session::create_session_token(&principal, &state.config)?;
    let cookie = session::create_session_cookie(&token, &state.config);

    let target = next.unwrap_or_else(|| routes::PROFILE.to_string());
    let mut response = Redirect::to(&target).into_response();
    append_cookie(&mut response, &cookie);
    Ok(response)
}

/// GET/POST /accounts/logout/ - clear the session and show the logged-out page.
#[instrument(skip_all)]
pub async fn logout(State(state): State<AppState>, flashes: IncomingFlashes) -> Result<Response> {
    let mut response = render_page(&state, "authentication/logged_out.html", context! { current_user => () }, flashes)?;
    append_cookie(&mut response, &session::clear_session_cookie(&state.config));
    Ok(response)
}

/// GET /accounts/password/change/
#[instrument(skip_all)]
pub async fn change_password_form(State(state): State<AppState>, principal: CurrentUser, flashes: IncomingFlashes) -> Result<Response> {
    render_page(
        &state,
        "authentication/change_password.html",
        context! { current_user => principal, errors => FormErrors::default() },
        flashes,
    )
}

/// POST /accounts/password/change/ - verify the current password and store a
/// new hash.
#[instrument(skip_all)]
pub async fn change_password(
    State(state): State<AppState>,
    principal: CurrentUser,
    flashes: IncomingFlashes,
    Form(form): Form<FormData>,
) -> Result<Response> {
    let mut errors = FormErrors::default();

    let current_password = form.get("current_password").cloned().unwrap_or_default();
    if current_password.is_empty() {
        errors.field("current_password", "This field is required.");
    }
    let new_password = forms::check_password_pair(&form, &state.config.auth.password, &mut errors);

    if errors.is_empty() {
        let user = {
            let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
            Users::new(&mut conn).get_by_id(principal.id).await?
        }
        .ok_or(Error::Unauthenticated { next: None })?;

        match user.password_hash.clone() {
            Some(hash) => {
                let is_valid = tokio::task::spawn_blocking(move || password::verify_string(&current_password, &hash))
                    .await
                    .map_err(|e| Error::Internal {
                        operation: format!("spawn password verification task: {e}"),
                    })??;

                if !is_valid {
                    errors.field("current_password", "Your current password was entered incorrectly.");
                }
            }
            None => errors.field("current_password", "This account has no password set."),
        }
    }

    let (Some(new_password), true) = (new_password, errors.is_empty()) else {
        return render_page(
            &state,
            "authentication/change_password.html",
            context! { current_user => principal, errors => errors },
            flashes,
        );
    };

    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&new_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let request = UserUpdateDBRequest {
        password_hash: Some(password_hash),
        ..Default::default()
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut conn).update(principal.id, &request).await?;

    Ok(Redirect::to(routes::PASSWORD_CHANGE_DONE).into_response())
}

/// GET /accounts/password/change/done/
#[instrument(skip_all)]
pub async fn change_password_done(State(state): State<AppState>, principal: CurrentUser, flashes: IncomingFlashes) -> Result<Response> {
    render_page(
        &state,
        "authentication/change_done.html",
        context! { current_user => principal },
        flashes,
    )
}

/// GET /accounts/password/reset/ - request form.
#[instrument(skip_all)]
pub async fn reset_password_form(State(state): State<AppState>, flashes: IncomingFlashes) -> Result<Response> {
    render_page(
        &state,
        "authentication/reset_password.html",
        context! { current_user => (), errors => FormErrors::default() },
        flashes,
    )
}

/// POST /accounts/password/reset/ - send the reset email.
///
/// Responds identically whether or not the address belongs to an account, to
/// avoid confirming which emails are registered.
#[instrument(skip_all)]
pub async fn request_password_reset(State(state): State<AppState>, Form(form): Form<FormData>) -> Result<Response> {
    let email = forms::optional(&form, "email").to_string();

    if forms::looks_like_email(&email) {
        let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

        let user = Users::new(&mut tx).get_user_by_email(&email).await?;

        if let Some(user) = user {
            // Only accounts with a password can have it reset
            if user.password_hash.is_some() {
                let (raw_token, token) = PasswordResetTokens::new(&mut tx).create_for_user(user.id, &state.config).await?;

                let email_service = EmailService::new(&state.config)?;
                email_service
                    .send_password_reset_email(&user.email, user.first_name.as_deref(), &token.id, &raw_token)
                    .await?;
            }
        }

        tx.commit().await.map_err(|e| Error::Database(e.into()))?;
    }

    Ok(Redirect::to(routes::PASSWORD_RESET_DONE).into_response())
}

/// GET /accounts/password/reset/done/
#[instrument(skip_all)]
pub async fn reset_password_done(State(state): State<AppState>, flashes: IncomingFlashes) -> Result<Response> {
    render_page(&state, "authentication/reset_done.html", context! { current_user => () }, flashes)
}

/// GET /accounts/password/reset/confirm/{id}/{token}/ - new-password form,
/// shown only when the link is still valid.
#[instrument(skip_all)]
pub async fn reset_password_confirm_form(
    State(state): State<AppState>,
    flashes: IncomingFlashes,
    Path((token_id, token)): Path<(Uuid, String)>,
) -> Result<Response> {
    let valid = {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        PasswordResetTokens::new(&mut conn)
            .find_valid_token_by_id(token_id, &token)
            .await?
            .is_some()
    };

    render_page(
        &state,
        "authentication/reset_confirm.html",
        context! { current_user => (), link_valid => valid, errors => FormErrors::default() },
        flashes,
    )
}

/// POST /accounts/password/reset/confirm/{id}/{token}/ - set the new password
/// and burn every open token for the account.
#[instrument(skip_all)]
pub async fn reset_password_confirm(
    State(state): State<AppState>,
    flashes: IncomingFlashes,
    Path((token_id, token)): Path<(Uuid, String)>,
    Form(form): Form<FormData>,
) -> Result<Response> {
    let mut errors = FormErrors::default();
    let new_password = forms::check_password_pair(&form, &state.config.auth.password, &mut errors);

    let Some(new_password) = new_password else {
        return render_page(
            &state,
            "authentication/reset_confirm.html",
            context! { current_user => (), link_valid => true, errors => errors },
            flashes,
        );
    };

    let password_hash = tokio::task::spawn_blocking(move || password::hash_string(&new_password))
        .await
        .map_err(|e| Error::Internal {
            operation: format!("spawn password hashing task: {e}"),
        })??;

    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let reset_token = PasswordResetTokens::new(&mut tx).find_valid_token_by_id(token_id, &token).await?;

    let Some(reset_token) = reset_token else {
        return render_page(
            &state,
            "authentication/reset_confirm.html",
            context! { current_user => (), link_valid => false, errors => FormErrors::default() },
            flashes,
        );
    };

    let request = UserUpdateDBRequest {
        password_hash: Some(password_hash),
        ..Default::default()
    };
    Users::new(&mut tx).update(reset_token.user_id, &request).await?;

    // Invalidate all tokens for this user (including the current one) after
    // the password update so the two stay consistent
    PasswordResetTokens::new(&mut tx).invalidate_for_user(reset_token.user_id).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    Ok(Redirect::to(routes::PASSWORD_RESET_COMPLETE).into_response())
}

/// GET /accounts/password/reset/complete/
#[instrument(skip_all)]
pub async fn reset_password_complete(State(state): State<AppState>, flashes: IncomingFlashes) -> Result<Response> {
    render_page(&state, "authentication/reset_complete.html", context! { current_user => () }, flashes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next_rejects_external_targets() {
        assert_eq!(safe_next(Some("/dashboard/")), Some("/dashboard/"));
        assert_eq!(safe_next(Some("//evil.example.com")), None);
        assert_eq!(safe_next(Some("https://evil.example.com")), None);
        assert_eq!(safe_next(None), None);
    }
}
