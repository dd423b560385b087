//! User views: the User instantiation of the generic view family.
//!
//! Registration is the Create view, profile editing the Edit view, and account
//! deletion the Delete view; the member directory and member pages are the
//! List and Detail views wired up in the route table. Edit and Delete resolve
//! their target through the ownership guard, so another member's account is
//! indistinguishable from a missing one.

use async_trait::async_trait;
use axum::{
    Form,
    extract::{Multipart, Path, State},
    http::{HeaderValue, header},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    AppState,
    auth::{current_user::CurrentUser, session},
    config::Config,
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    errors::{Error, Result},
    templates::{ResourceKind, ViewOp},
    views::{
        flash::{Flash, IncomingFlashes},
        forms::{self, FormData, FormErrors},
        resource::{self, Messaged, Outcome, RequestOwned, ResourceController},
        routes,
    },
};

/// Template-facing record for a member. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: String,
    pub has_avatar: bool,
    pub profile_complete: bool,
    pub joined_at: DateTime<Utc>,
}

impl From<UserDBResponse> for Member {
    fn from(db: UserDBResponse) -> Self {
        Self {
            display_name: db.display_name(),
            profile_complete: db.profile_complete(),
            has_avatar: db.avatar_path.is_some(),
            id: db.id,
            username: db.username,
            email: db.email,
            first_name: db.first_name,
            last_name: db.last_name,
            joined_at: db.created_at,
        }
    }
}

/// Validated registration submission.
#[derive(Debug)]
pub struct RegistrationDraft {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Validated profile edit submission.
#[derive(Debug)]
pub struct ProfileDraft {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
}

/// The User resource plugged into the generic view family.
pub struct UserController;

#[async_trait]
impl ResourceController for UserController {
    const KIND: ResourceKind = ResourceKind::User;

    type Record = Member;
    type CreateDraft = RegistrationDraft;
    type EditDraft = ProfileDraft;

    fn validate_create(config: &Config, form: &FormData) -> std::result::Result<RegistrationDraft, FormErrors> {
        let mut errors = FormErrors::default();

        let username = forms::required(form, "username", &mut errors).map(str::to_string);
        let email = forms::required(form, "email", &mut errors).map(str::to_string);
        if let Some(email) = email.as_deref() {
            if !forms::looks_like_email(email) {
                errors.field("email", "Enter a valid email address.");
            }
        }
        let password = forms::check_password_pair(form, &config.auth.password, &mut errors);

        match (username, email, password, errors.is_empty()) {
            (Some(username), Some(email), Some(password), true) => Ok(RegistrationDraft { username, email, password }),
            _ => Err(errors),
        }
    }

    fn validate_edit(_config: &Config, form: &FormData) -> std::result::Result<ProfileDraft, FormErrors> {
        let mut errors = FormErrors::default();

        let email = forms::required(form, "email", &mut errors).map(str::to_string);
        if let Some(email) = email.as_deref() {
            if !forms::looks_like_email(email) {
                errors.field("email", "Enter a valid email address.");
            }
        }
        let first_name = forms::required(form, "first_name", &mut errors).map(str::to_string);
        let last_name = forms::required(form, "last_name", &mut errors).map(str::to_string);

        match (email, first_name, last_name, errors.is_empty()) {
            (Some(email), Some(first_name), Some(last_name), true) => Ok(ProfileDraft {
                email,
                first_name,
                last_name,
            }),
            _ => Err(errors),
        }
    }

    fn record_id(record: &Member) -> Uuid {
        record.id
    }

    async fn fetch(state: &AppState, id: Uuid) -> Result<Option<Member>> {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let user = Users::new(&mut conn).get_by_id(id).await?;
        Ok(user.map(Member::from))
    }

    async fn list(state: &AppState) -> Result<Vec<Member>> {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let users = Users::new(&mut conn).list(&Default::default()).await?;
        Ok(users.into_iter().map(Member::from).collect())
    }

    async fn insert(state: &AppState, draft: RegistrationDraft) -> Result<Member> {
        // Hash the password on a blocking thread to avoid blocking the async runtime
        let password = draft.password;
        let password_hash = tokio::task::spawn_blocking(move || crate::auth::password::hash_string(&password))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("spawn password hashing task: {e}"),
            })??;

        let request = UserCreateDBRequest {
            username: draft.username,
            email: draft.email,
            first_name: None,
            last_name: None,
            is_admin: false,
            password_hash: Some(password_hash),
        };

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let created = Users::new(&mut conn).create(&request).await?;
        Ok(Member::from(created))
    }

    async fn apply(state: &AppState, id: Uuid, draft: ProfileDraft) -> Result<Member> {
        let request = UserUpdateDBRequest {
            email: Some(draft.email),
            first_name: Some(draft.first_name),
            last_name: Some(draft.last_name),
            ..Default::default()
        };

        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let updated = Users::new(&mut conn).update(id, &request).await?;
        Ok(Member::from(updated))
    }

    async fn destroy(state: &AppState, id: Uuid) -> Result<bool> {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        Ok(Users::new(&mut conn).delete(id).await?)
    }

    /// A fresh account lands on its own edit page, not on the login form.
    fn success_url(record: &Member) -> Option<String> {
        Some(routes::edit_user(record.id))
    }

    /// Deleting an account returns to the landing page rather than the
    /// (login-gated) member directory.
    fn delete_redirect() -> Option<String> {
        Some(routes::INDEX.to_string())
    }
}

#[async_trait]
impl RequestOwned for UserController {
    async fn fetch_owned(state: &AppState, id: Uuid, principal: &CurrentUser) -> Result<Option<Member>> {
        let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
        let user = Users::new(&mut conn).get_owned_by(id, principal.id).await?;
        Ok(user.map(Member::from))
    }
}

pub struct UserEditMessages;

impl Messaged for UserEditMessages {
    const SUCCESS_MESSAGE: &'static str = "Account updated successfully.";
    const ERROR_MESSAGE: &'static str = "Error occurred while processing.";
}

pub struct UserDeleteMessages;

impl Messaged for UserDeleteMessages {
    const SUCCESS_MESSAGE: &'static str = "Account deleted successfully.";
    const ERROR_MESSAGE: &'static str = "Error occurred while processing.";
}

const FILL_IN_PROFILE_MESSAGE: &str = "Account created successfully, please fill in your information.";

fn append_cookie(response: &mut Response, cookie: &str) {
    match HeaderValue::from_str(cookie) {
        Ok(value) => {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        Err(e) => tracing::error!("failed to attach cookie: {e}"),
    }
}

/// GET /accounts/register/ - render the registration form.
#[instrument(skip_all)]
pub async fn register_form(State(state): State<AppState>, flashes: IncomingFlashes) -> Result<Response> {
    if !state.config.auth.allow_registration {
        return Ok(Flash::info("Registration is currently closed.").redirect(routes::LOGIN));
    }

    resource::render_form::<UserController>(
        &state,
        flashes,
        ViewOp::Create,
        &FormData::default(),
        &FormErrors::default(),
        None,
        minijinja::context! {},
    )
}

/// POST /accounts/register/ - create the account, sign the new member in, and
/// send them to their edit page.
#[instrument(skip_all)]
pub async fn register(State(state): State<AppState>, flashes: IncomingFlashes, Form(form): Form<FormData>) -> Result<Response> {
    if !state.config.auth.allow_registration {
        return Ok(Flash::info("Registration is currently closed.").redirect(routes::LOGIN));
    }

    match resource::submit_create::<UserController>(&state, form).await? {
        Outcome::Committed(member) => {
            let principal = CurrentUser {
                id: member.id,
                username: member.username.clone(),
                email: member.email.clone(),
                first_name: member.first_name.clone(),
                last_name: member.last_name.clone(),
                is_admin: false,
            };
            let token = session::create_session_token(&principal, &state.config)?;
            let cookie = session::create_session_cookie(&token, &state.config);

            let target = resource::commit_target::<UserController>(UserController::success_url(&member))?;
            let mut response = Redirect::to(&target).into_response();
            append_cookie(&mut response, &cookie);
            Ok(response)
        }
        Outcome::Rejected { values, errors } => resource::render_form::<UserController>(
            &state,
            flashes,
            ViewOp::Create,
            &forms::sanitized(&values),
            &errors,
            None,
            minijinja::context! {},
        ),
    }
}

/// GET /accounts/{id}/edit/ - pre-populated profile form for the owner.
///
/// Freshly registered accounts are prompted to complete their profile before
/// any submission happens.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn edit_form(
    State(state): State<AppState>,
    principal: CurrentUser,
    mut flashes: IncomingFlashes,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let member = UserController::fetch_owned(&state, id, &principal)
        .await?
        .ok_or_else(|| resource::not_found::<UserController>(id))?;

    if !member.profile_complete {
        flashes.push(Flash::success(FILL_IN_PROFILE_MESSAGE));
    }

    let mut values = FormData::default();
    values.insert("email".to_string(), member.email.clone());
    values.insert("first_name".to_string(), member.first_name.clone().unwrap_or_default());
    values.insert("last_name".to_string(), member.last_name.clone().unwrap_or_default());

    resource::render_form::<UserController>(
        &state,
        flashes,
        ViewOp::Edit,
        &values,
        &FormErrors::default(),
        Some(&member),
        minijinja::context! { current_user => principal },
    )
}

/// POST /accounts/{id}/edit/ - apply profile changes for the owner.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn edit(
    State(state): State<AppState>,
    principal: CurrentUser,
    mut flashes: IncomingFlashes,
    Path(id): Path<Uuid>,
    Form(form): Form<FormData>,
) -> Result<Response> {
    match resource::submit_edit::<UserController>(&state, &principal, id, form).await? {
        Outcome::Committed(_) => Ok(Flash::success(UserEditMessages::SUCCESS_MESSAGE).redirect(routes::PROFILE)),
        Outcome::Rejected { values, errors } => {
            let member = UserController::fetch_owned(&state, id, &principal)
                .await?
                .ok_or_else(|| resource::not_found::<UserController>(id))?;

            flashes.push(Flash::error(UserEditMessages::ERROR_MESSAGE));
            resource::render_form::<UserController>(
                &state,
                flashes,
                ViewOp::Edit,
                &forms::sanitized(&values),
                &errors,
                Some(&member),
                minijinja::context! { current_user => principal },
            )
        }
    }
}

/// GET /accounts/{id}/delete/ - confirmation page (phase one of delete).
#[instrument(skip_all, fields(user_id = %id.0))]
pub async fn delete_confirm(
    state: State<AppState>,
    principal: CurrentUser,
    flashes: IncomingFlashes,
    id: Path<Uuid>,
) -> Result<Response> {
    resource::confirm_delete::<UserController>(state, principal, flashes, id).await
}

/// POST /accounts/{id}/delete/ - execute the delete and end the session.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn delete(State(state): State<AppState>, principal: CurrentUser, Path(id): Path<Uuid>) -> Result<Response> {
    let mut response = resource::submit_delete::<UserController, UserDeleteMessages>(&state, &principal, id).await?;

    // The deleted account's session is no longer valid
    append_cookie(&mut response, &session::clear_session_cookie(&state.config));
    Ok(response)
}

/// POST /accounts/{id}/avatar/ - store a profile image for the owner.
#[instrument(skip_all, fields(user_id = %id))]
pub async fn upload_avatar(
    State(state): State<AppState>,
    principal: CurrentUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Response> {
    // Same ownership rule as edit: someone else's account does not exist
    let member = UserController::fetch_owned(&state, id, &principal)
        .await?
        .ok_or_else(|| resource::not_found::<UserController>(id))?;

    let mut stored: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| Error::Internal {
        operation: format!("read multipart field: {e}"),
    })? {
        if field.name() != Some("avatar") {
            continue;
        }

        let extension = field
            .file_name()
            .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()))
            .filter(|ext| matches!(ext.as_str(), "png" | "jpg" | "jpeg" | "gif" | "webp"));

        let Some(extension) = extension else {
            return Ok(Flash::error("Please upload a PNG, JPEG, GIF, or WebP image.").redirect(&routes::edit_user(id)));
        };

        let bytes = field.bytes().await.map_err(|e| Error::Internal {
            operation: format!("read avatar upload: {e}"),
        })?;
        if bytes.is_empty() {
            return Ok(Flash::error("The uploaded file was empty.").redirect(&routes::edit_user(id)));
        }

        let relative = format!("users/{}.{extension}", member.id);
        let target = state.config.media_dir.join(&relative);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| Error::Internal {
                operation: format!("create media directory: {e}"),
            })?;
        }
        tokio::fs::write(&target, &bytes).await.map_err(|e| Error::Internal {
            operation: format!("store avatar: {e}"),
        })?;

        stored = Some(relative);
    }

    let Some(relative) = stored else {
        return Ok(Flash::error("No image was uploaded.").redirect(&routes::edit_user(id)));
    };

    let request = UserUpdateDBRequest {
        avatar_path: Some(relative),
        ..Default::default()
    };
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    Users::new(&mut conn).update(id, &request).await?;

    Ok(Flash::success("Profile image updated.").redirect(&routes::edit_user(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn config() -> Config {
        Config::default()
    }

    #[test]
    fn test_validate_create_accepts_complete_form() {
        let draft = UserController::validate_create(
            &config(),
            &form(&[
                ("username", "bart"),
                ("email", "bart@example.com"),
                ("password1", "el-barto-99"),
                ("password2", "el-barto-99"),
            ]),
        )
        .unwrap();

        assert_eq!(draft.username, "bart");
        assert_eq!(draft.email, "bart@example.com");
        assert_eq!(draft.password, "el-barto-99");
    }

    #[test]
    fn test_validate_create_collects_field_errors() {
        let errors = UserController::validate_create(
            &config(),
            &form(&[("username", ""), ("email", "not-an-email"), ("password1", "short"), ("password2", "short")]),
        )
        .unwrap_err();

        assert!(errors.fields.contains_key("username"));
        assert!(errors.fields.contains_key("email"));
        assert!(errors.fields.contains_key("password1"));
    }

    #[test]
    fn test_validate_edit_requires_all_profile_fields() {
        let errors = UserController::validate_edit(&config(), &form(&[("email", "lisa@example.com"), ("first_name", "Lisa")])).unwrap_err();
        assert_eq!(errors.fields.keys().collect::<Vec<_>>(), vec!["last_name"]);

        let draft = UserController::validate_edit(
            &config(),
            &form(&[("email", "lisa@example.com"), ("first_name", "Lisa"), ("last_name", "Simpson")]),
        )
        .unwrap();
        assert_eq!(draft.first_name, "Lisa");
    }

    #[test]
    fn test_success_url_points_at_own_edit_page() {
        let member = Member {
            id: Uuid::new_v4(),
            username: "bart".to_string(),
            email: "bart@example.com".to_string(),
            first_name: None,
            last_name: None,
            display_name: "bart".to_string(),
            has_avatar: false,
            profile_complete: false,
            joined_at: Utc::now(),
        };

        let url = UserController::success_url(&member).unwrap();
        assert_eq!(url, format!("/accounts/{}/edit/", member.id));
    }

    #[test]
    fn test_delete_redirect_is_index() {
        assert_eq!(UserController::delete_redirect().as_deref(), Some("/"));
    }
}
