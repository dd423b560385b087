//! Generic view family: Create, Detail, List, Edit, and Delete over any
//! registered resource kind.
//!
//! A view is assembled from explicit capabilities rather than inherited
//! behavior: [`ResourceController`] is the one required capability ("declares
//! a resource kind" plus fetch/mutate plumbing), [`RequestOwned`] adds
//! ownership-guarded target resolution for Edit/Delete, and [`Messaged`]
//! declares the outcome messages a mutating view attaches. Handlers that need
//! resource-specific behavior (session issuance on registration, the
//! profile-completeness prompt) wrap the submit helpers here instead of
//! duplicating the state machine.
//!
//! Every mutating operation walks the same states: validate the submission,
//! then either commit (flash success, redirect) or reject (re-render the form
//! with the submitted values and field annotations, HTTP 200).

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    response::Response,
};
use minijinja::{context, value::Value};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppState,
    auth::current_user::CurrentUser,
    config::Config,
    db::errors::DbError,
    errors::{Error, Result},
    templates::{ResourceKind, ViewOp},
    views::{
        flash::{Flash, IncomingFlashes},
        forms::{FormData, FormErrors},
        render_page,
    },
};

/// Required capability of every view family instantiation.
#[async_trait]
pub trait ResourceController: Send + Sync + 'static {
    /// The resource kind this controller serves; drives template and route
    /// resolution.
    const KIND: ResourceKind;

    /// Record exposed to templates.
    type Record: Serialize + Send + Sync;
    /// Validated payload for Create submissions.
    type CreateDraft: Send;
    /// Validated payload for Edit submissions.
    type EditDraft: Send;

    /// Validate a Create submission. Pure function of configuration and form.
    fn validate_create(config: &Config, form: &FormData) -> std::result::Result<Self::CreateDraft, FormErrors>;

    /// Validate an Edit submission. Pure function of configuration and form.
    fn validate_edit(config: &Config, form: &FormData) -> std::result::Result<Self::EditDraft, FormErrors>;

    /// Identifier of a record, for building redirect targets.
    fn record_id(record: &Self::Record) -> Uuid;

    async fn fetch(state: &AppState, id: Uuid) -> Result<Option<Self::Record>>;
    async fn list(state: &AppState) -> Result<Vec<Self::Record>>;
    async fn insert(state: &AppState, draft: Self::CreateDraft) -> Result<Self::Record>;
    async fn apply(state: &AppState, id: Uuid, draft: Self::EditDraft) -> Result<Self::Record>;
    async fn destroy(state: &AppState, id: Uuid) -> Result<bool>;

    /// Redirect target after a committed Create; defaults to the kind's list route.
    fn success_url(record: &Self::Record) -> Option<String> {
        let _ = record;
        None
    }

    /// Redirect target after a committed Delete; defaults to the kind's list route.
    fn delete_redirect() -> Option<String> {
        None
    }
}

/// Optional capability: ownership-guarded target resolution.
///
/// The lookup is constrained to (identifier == path parameter) AND (owner ==
/// authenticated principal); a record owned by someone else resolves to `None`
/// exactly as if it did not exist. Runs before any mutation logic.
#[async_trait]
pub trait RequestOwned: ResourceController {
    async fn fetch_owned(state: &AppState, id: Uuid, principal: &CurrentUser) -> Result<Option<Self::Record>>;
}

/// Optional capability: outcome messages for a mutating view. Both
/// declarations are required; omitting one is a composition-time fault the
/// compiler rejects.
pub trait Messaged {
    const SUCCESS_MESSAGE: &'static str;
    const ERROR_MESSAGE: &'static str;
}

/// Outcome of a mutating submission.
pub enum Outcome<R> {
    Committed(R),
    Rejected { values: FormData, errors: FormErrors },
}

/// NotFound error for one record of this controller's kind.
pub fn not_found<C: ResourceController>(id: Uuid) -> Error {
    Error::NotFound {
        resource: C::KIND.slug().to_string(),
        id: id.to_string(),
    }
}

/// Post-mutation redirect target: the controller's declared URL, or the
/// kind's registered list route.
pub fn commit_target<C: ResourceController>(declared: Option<String>) -> Result<String> {
    match declared {
        Some(url) => Ok(url),
        None => Ok(C::KIND.list_route()?.to_string()),
    }
}

/// Map a uniqueness conflict onto the submitted form instead of failing the
/// request; anything else stays a hard error.
fn conflict_to_rejection(constraint: Option<String>, errors: &mut FormErrors) {
    match constraint.as_deref() {
        Some(c) if c.contains("email") => errors.field("email", "An account with this email address already exists."),
        Some(c) if c.contains("username") => errors.field("username", "This username is already taken."),
        _ => errors.form_error("A matching record already exists."),
    }
}

/// Run the Create state machine: validate, then commit or reject.
pub async fn submit_create<C: ResourceController>(state: &AppState, form: FormData) -> Result<Outcome<C::Record>> {
    let draft = match C::validate_create(&state.config, &form) {
        Ok(draft) => draft,
        Err(errors) => return Ok(Outcome::Rejected { values: form, errors }),
    };

    match C::insert(state, draft).await {
        Ok(record) => Ok(Outcome::Committed(record)),
        Err(Error::Database(DbError::UniqueViolation { constraint, .. })) => {
            let mut errors = FormErrors::default();
            conflict_to_rejection(constraint, &mut errors);
            Ok(Outcome::Rejected { values: form, errors })
        }
        Err(e) => Err(e),
    }
}

/// Run the Edit state machine against an ownership-guarded target.
pub async fn submit_edit<C: RequestOwned>(
    state: &AppState,
    principal: &CurrentUser,
    id: Uuid,
    form: FormData,
) -> Result<Outcome<C::Record>> {
    // Ownership guard resolves the target before any mutation logic
    C::fetch_owned(state, id, principal).await?.ok_or_else(|| not_found::<C>(id))?;

    let draft = match C::validate_edit(&state.config, &form) {
        Ok(draft) => draft,
        Err(errors) => return Ok(Outcome::Rejected { values: form, errors }),
    };

    match C::apply(state, id, draft).await {
        Ok(record) => Ok(Outcome::Committed(record)),
        Err(Error::Database(DbError::UniqueViolation { constraint, .. })) => {
            let mut errors = FormErrors::default();
            conflict_to_rejection(constraint, &mut errors);
            Ok(Outcome::Rejected { values: form, errors })
        }
        Err(e) => Err(e),
    }
}

/// Render a create/edit form, preserving submitted values and annotations.
pub fn render_form<C: ResourceController>(
    state: &AppState,
    flashes: IncomingFlashes,
    op: ViewOp,
    values: &FormData,
    errors: &FormErrors,
    object: Option<&C::Record>,
    extra: Value,
) -> Result<Response> {
    let ctx = context! {
        kind => C::KIND.slug(),
        values => values,
        errors => errors,
        object => object,
        ..extra
    };
    render_page(state, &C::KIND.template(op), ctx, flashes)
}

/// List view: read-only collection fetch. Guards are composed in the route
/// table, not here.
pub async fn listing<C: ResourceController>(State(state): State<AppState>, flashes: IncomingFlashes) -> Result<Response> {
    let records = C::list(&state).await?;
    let ctx = context! {
        kind => C::KIND.slug(),
        object_list => records,
    };
    render_page(&state, &C::KIND.template(ViewOp::List), ctx, flashes)
}

/// Detail view: read-only single-record fetch by path identifier.
pub async fn detail<C: ResourceController>(
    State(state): State<AppState>,
    flashes: IncomingFlashes,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let record = C::fetch(&state, id).await?.ok_or_else(|| not_found::<C>(id))?;
    let ctx = context! {
        kind => C::KIND.slug(),
        object => record,
    };
    render_page(&state, &C::KIND.template(ViewOp::Detail), ctx, flashes)
}

/// Delete, phase one: render the confirmation page for an owned record.
pub async fn confirm_delete<C: RequestOwned>(
    State(state): State<AppState>,
    principal: CurrentUser,
    flashes: IncomingFlashes,
    Path(id): Path<Uuid>,
) -> Result<Response> {
    let record = C::fetch_owned(&state, id, &principal).await?.ok_or_else(|| not_found::<C>(id))?;
    let ctx = context! {
        kind => C::KIND.slug(),
        object => record,
        current_user => principal,
    };
    render_page(&state, &C::KIND.template(ViewOp::Delete), ctx, flashes)
}

/// Delete, phase two: execute against an owned record, flash the outcome, and
/// redirect to the declared target or the kind's list route.
pub async fn submit_delete<C: RequestOwned, M: Messaged>(state: &AppState, principal: &CurrentUser, id: Uuid) -> Result<Response> {
    let record = C::fetch_owned(state, id, principal).await?.ok_or_else(|| not_found::<C>(id))?;

    if !C::destroy(state, C::record_id(&record)).await? {
        return Err(not_found::<C>(id));
    }

    let target = commit_target::<C>(C::delete_redirect())?;
    Ok(Flash::success(M::SUCCESS_MESSAGE).redirect(&target))
}
