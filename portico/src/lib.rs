//! # Portico
//!
//! A self-hostable member portal: server-rendered pages, standard CRUD views,
//! and full account management (registration, login, profile editing, account
//! deletion, password change and reset, avatar images).
//!
//! ## Architecture
//!
//! Requests flow router -> view handler -> repository -> PostgreSQL. View
//! handlers are composed from explicit capabilities (the generic view family
//! in [`views::resource`], outcome messaging in [`views::flash`], ownership
//! guarding, login requirement), templates resolve through the explicit
//! registration table in [`templates`], and every registered template and
//! route is validated eagerly at startup.
//!
//! ## Lifecycle
//!
//! 1. **Create**: [`Application::new`] loads resources, connects the pool,
//!    runs migrations, seeds the initial admin user, and validates templates
//! 2. **Serve**: [`Application::serve`] binds a TCP port and handles requests
//! 3. **Shutdown**: the provided future resolves (SIGTERM/Ctrl-C) and the
//!    server drains gracefully

pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod telemetry;
pub mod templates;
pub mod types;
pub mod views;

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::{Level, debug, info, instrument};

use crate::{
    auth::password,
    db::handlers::{Repository, Users},
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    views::users::UserController,
};

pub use types::{ResetTokenId, UserId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from file/environment
/// - `templates`: The validated rendering environment
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub templates: Arc<minijinja::Environment<'static>>,
}

/// Get the portico database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create the initial admin user if it doesn't exist.
///
/// Idempotent: creates the account on first startup, or refreshes the
/// password on later startups when one is configured.
///
/// # Errors
///
/// Returns an error if hashing or database operations fail.
#[instrument(skip_all)]
pub async fn create_initial_admin_user(email: &str, admin_password: Option<&str>, db: &PgPool) -> anyhow::Result<UserId> {
    let password_hash = match admin_password {
        Some(pwd) => Some(password::hash_string(pwd).map_err(|e| anyhow::anyhow!("hash admin password: {e}"))?),
        None => None,
    };

    let mut tx = db.begin().await?;
    let mut user_repo = Users::new(&mut tx);

    if let Some(existing_user) = user_repo
        .get_user_by_email(email)
        .await
        .map_err(|e| anyhow::anyhow!("check existing admin user: {e}"))?
    {
        if password_hash.is_some() {
            user_repo
                .update(
                    existing_user.id,
                    &UserUpdateDBRequest {
                        password_hash,
                        ..Default::default()
                    },
                )
                .await
                .map_err(|e| anyhow::anyhow!("update admin password: {e}"))?;
        }
        tx.commit().await?;
        return Ok(existing_user.id);
    }

    let user_create = UserCreateDBRequest {
        username: email.to_string(),
        email: email.to_string(),
        first_name: None,
        last_name: None,
        is_admin: true,
        password_hash,
    };

    let created_user = user_repo
        .create(&user_create)
        .await
        .map_err(|e| anyhow::anyhow!("create admin user: {e}"))?;

    tx.commit().await?;
    Ok(created_user.id)
}

/// Build the application router: the full route table plus tracing.
///
/// Guarded routes compose the login requirement here, in the table, rather
/// than inside the generic view handlers. Template/route registration is
/// validated before any route is built, so a misconfigured convention fails
/// at startup instead of at first render.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    templates::validate(&state.templates).map_err(|e| anyhow::anyhow!("{e}"))?;

    // Member directory and member pages: the List/Detail views of the family,
    // visible to signed-in members only
    let directory = Router::new()
        .route("/dashboard/", get(views::resource::listing::<UserController>))
        .route("/members/{id}/", get(views::resource::detail::<UserController>))
        .route_layer(from_fn_with_state(state.clone(), auth::middleware::login_required));

    let accounts = Router::new()
        .route("/accounts/login/", get(views::passwords::login_form).post(views::passwords::login))
        .route("/accounts/logout/", get(views::passwords::logout).post(views::passwords::logout))
        .route("/accounts/register/", get(views::users::register_form).post(views::users::register))
        .route("/accounts/{id}/edit/", get(views::users::edit_form).post(views::users::edit))
        .route("/accounts/{id}/delete/", get(views::users::delete_confirm).post(views::users::delete))
        .route("/accounts/{id}/avatar/", post(views::users::upload_avatar))
        .route("/accounts/profile/", get(views::pages::profile))
        .route(
            "/accounts/password/change/",
            get(views::passwords::change_password_form).post(views::passwords::change_password),
        )
        .route("/accounts/password/change/done/", get(views::passwords::change_password_done))
        .route(
            "/accounts/password/reset/",
            get(views::passwords::reset_password_form).post(views::passwords::request_password_reset),
        )
        .route("/accounts/password/reset/done/", get(views::passwords::reset_password_done))
        .route(
            "/accounts/password/reset/confirm/{id}/{token}/",
            get(views::passwords::reset_password_confirm_form).post(views::passwords::reset_password_confirm),
        )
        .route("/accounts/password/reset/complete/", get(views::passwords::reset_password_complete));

    let router = Router::new()
        .route("/", get(views::pages::index))
        .route("/about/", get(views::pages::about))
        .route("/contact/", get(views::pages::contact))
        .route("/healthz", get(|| async { "OK" }))
        .route("/media/users/{id}/", get(views::media::download::<UserController>))
        .merge(directory)
        .merge(accounts)
        .with_state(state.clone());

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Setup the database connection, run migrations, and seed initial data.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(config.database.url()).await?;
    migrator().run(&pool).await?;

    create_initial_admin_user(&config.admin_email, config.admin_password.as_deref(), &pool)
        .await
        .map_err(|e| anyhow::anyhow!("create initial admin user: {e}"))?;

    Ok(pool)
}

/// Main application struct that owns all resources and lifecycle.
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting portal with configuration: {:#?}", config);

        let pool = setup_database(&config).await?;

        let environment = templates::environment().map_err(|e| anyhow::anyhow!("{e}"))?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .templates(Arc::new(environment))
            .build();

        let router = build_router(&state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("Portal listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
