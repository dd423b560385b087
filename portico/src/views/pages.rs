//! Static pages and the profile page.

use axum::{extract::State, response::Response};
use minijinja::context;
use tracing::instrument;

use crate::{
    AppState,
    auth::current_user::{CurrentUser, OptionalUser},
    db::handlers::{Repository, Users},
    errors::{Error, Result},
    views::{flash::IncomingFlashes, render_page, users::Member},
};

/// GET /
#[instrument(skip_all)]
pub async fn index(State(state): State<AppState>, OptionalUser(user): OptionalUser, flashes: IncomingFlashes) -> Result<Response> {
    render_page(&state, "base/index.html", context! { current_user => user }, flashes)
}

/// GET /about/
#[instrument(skip_all)]
pub async fn about(State(state): State<AppState>, OptionalUser(user): OptionalUser, flashes: IncomingFlashes) -> Result<Response> {
    render_page(&state, "base/about.html", context! { current_user => user }, flashes)
}

/// GET /contact/
#[instrument(skip_all)]
pub async fn contact(State(state): State<AppState>, OptionalUser(user): OptionalUser, flashes: IncomingFlashes) -> Result<Response> {
    render_page(&state, "base/contact.html", context! { current_user => user }, flashes)
}

/// GET /accounts/profile/ - the signed-in member's own page.
///
/// Reads the account fresh from the database so edits show up immediately,
/// not at the next session renewal.
#[instrument(skip_all)]
pub async fn profile(State(state): State<AppState>, principal: CurrentUser, flashes: IncomingFlashes) -> Result<Response> {
    let mut conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let member = Users::new(&mut conn)
        .get_by_id(principal.id)
        .await?
        .map(Member::from)
        // A session for a deleted account is just an expired session
        .ok_or(Error::Unauthenticated { next: None })?;

    render_page(
        &state,
        "authentication/profile.html",
        context! { current_user => principal, object => member },
        flashes,
    )
}
