//! HTTP views for all rendered pages.
//!
//! This module contains the Axum route handlers organized by concern:
//!
//! - [`resource`]: the generic Create/Detail/List/Edit/Delete view family
//! - [`users`]: the User instantiation of the family (register, edit, delete, avatar)
//! - [`passwords`]: login/logout and the password change and reset flows
//! - [`pages`]: static pages and the profile page
//! - [`media`]: image-serving endpoint
//! - [`flash`]: one-shot outcome messages
//! - [`forms`]: form payloads and validation annotations
//! - [`routes`]: the static route table
//!
//! Handlers return [`crate::errors::Error`], which converts to the matching
//! HTTP response (404 page, login redirect, generic 500).

use axum::{
    http::{HeaderValue, header},
    response::{Html, IntoResponse, Response},
};
use minijinja::{context, value::Value};

use crate::{
    AppState,
    errors::{Error, Result},
};

pub mod flash;
pub mod forms;
pub mod media;
pub mod pages;
pub mod passwords;
pub mod resource;
pub mod routes;
pub mod users;

use flash::IncomingFlashes;

/// Render a template with the given context, delivering and consuming any
/// flash messages in the same response.
pub fn render_page(state: &AppState, template: &str, ctx: Value, flashes: IncomingFlashes) -> Result<Response> {
    let tmpl = state.templates.get_template(template).map_err(|_| Error::Configuration {
        message: format!("template {template} is not registered"),
    })?;

    let consumed = !flashes.is_empty();
    let body = tmpl
        .render(context! { messages => flashes.0, ..ctx })
        .map_err(|e| Error::Internal {
            operation: format!("render template {template}: {e}"),
        })?;

    let mut response = Html(body).into_response();
    if consumed {
        // Single-delivery: the messages just rendered are cleared with this response
        match HeaderValue::from_str(&flash::clear_cookie()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!("failed to clear flash cookie: {e}"),
        }
    }
    Ok(response)
}
