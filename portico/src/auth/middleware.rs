//! Route protection middleware.

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{AppState, auth::current_user::CurrentUser};

/// Guard a route behind authentication. Unauthenticated requests are
/// redirected to the login form with a `next` parameter pointing back here.
///
/// Handlers that need the principal itself use the [`CurrentUser`] extractor
/// instead; this layer exists so read-only views stay guard-free and the
/// guard is composed in the route table.
pub async fn login_required(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    match CurrentUser::from_request_parts(&mut parts, &state).await {
        Ok(_) => next.run(Request::from_parts(parts, body)).await,
        Err(rejection) => rejection.into_response(),
    }
}
