use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::auth::{self, SessionStore};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::store::Store;
use crate::{admin, companies, holidays, logging, mileage, templates, users};

/// Shared state of every request handler
pub struct AppState {
    pub store: Store,
    pub sessions: SessionStore,
    pub config: Config,
}

impl AppState {
    /// Opens the data directory named in `config`
    pub fn open(config: Config) -> AppResult<Self> {
        Ok(AppState {
            store: Store::open(&config.data_dir)?,
            sessions: SessionStore::new(config.session_ttl),
            config,
        })
    }
}

fn cors(config: &Config) -> AppResult<CorsLayer> {
    match &config.cors_origin {
        Some(origin) => {
            let origin: HeaderValue = origin
                .parse()
                .map_err(|_| AppError::Config(format!("invalid CORS origin '{}'", origin)))?;
            Ok(CorsLayer::new()
                .allow_origin(origin)
                .allow_methods(Any)
                .allow_headers(Any))
        }
        None => Ok(CorsLayer::permissive()),
    }
}

/// Builds the complete HTTP API
pub fn router(state: Arc<AppState>) -> AppResult<Router> {
    let upload_limit = state.config.max_upload_bytes;
    let protected = Router::new()
        .route("/api/logout", post(auth::handle_logout))
        .route("/api/me", get(auth::handle_me))
        .route("/api/password", post(auth::handle_change_password))
        .route("/api/users", get(users::list_users).post(users::create_user))
        .route(
            "/api/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .route(
            "/api/companies",
            get(companies::list_companies).post(companies::create_company),
        )
        .route(
            "/api/companies/:id",
            get(companies::get_company)
                .put(companies::update_company)
                .delete(companies::delete_company),
        )
        .route(
            "/api/projects",
            get(companies::list_projects).post(companies::create_project),
        )
        .route(
            "/api/projects/:id",
            get(companies::get_project)
                .put(companies::update_project)
                .delete(companies::delete_project),
        )
        .route(
            "/api/routes",
            get(mileage::list_routes).post(mileage::create_route),
        )
        .route(
            "/api/routes/:id",
            get(mileage::get_route)
                .put(mileage::update_route)
                .delete(mileage::delete_route),
        )
        .route("/api/kilometers/:year/:month", get(mileage::kilometers))
        .route("/api/kilometers/:year/:month/xlsx", get(mileage::kilometers_xlsx))
        .route("/api/kilometers/:year/:month/csv", get(mileage::kilometers_csv))
        .route(
            "/api/holidays",
            get(holidays::list_holidays).post(holidays::submit_holiday),
        )
        .route(
            "/api/holidays/:id",
            get(holidays::get_holiday).delete(holidays::delete_holiday),
        )
        .route("/api/holidays/:id/approve", post(holidays::approve_holiday))
        .route("/api/holidays/:id/reject", post(holidays::reject_holiday))
        .route(
            "/api/holidays/set/:user/:year/:month",
            get(holidays::user_holiday_set),
        )
        .route("/api/calendar/:year/:month", get(holidays::calendar))
        .route("/api/calendar/:year/:month/xlsx", get(holidays::calendar_xlsx))
        .route(
            "/api/templates",
            get(templates::list_templates)
                .post(templates::upload_template)
                .layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route(
            "/api/templates/:id",
            get(templates::get_template).delete(templates::delete_template),
        )
        .route("/api/templates/:id/download", get(templates::download_template))
        .route("/api/admin/backup", get(admin::backup))
        .route(
            "/api/admin/restore",
            post(admin::restore).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    let mut app = Router::new()
        .route("/api/login", post(auth::handle_login))
        .merge(protected);

    if state.config.static_dir.is_dir() {
        app = app.nest_service("/static", ServeDir::new(&state.config.static_dir));
    }

    Ok(app
        .layer(cors(&state.config)?)
        .layer(middleware::from_fn(logging::log_requests))
        .with_state(state))
}

/// Opens the store, creates the first admin if needed and serves the API
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::open(config)?);

    if let Some(password) =
        auth::bootstrap_admin(&state.store, state.config.admin_password.as_deref())?
    {
        log::warn!(
            "no users found, created 'admin' with password '{}'; change it after logging in",
            password
        );
    }

    let bind = state.config.bind;
    let app = router(state)?;

    let listener = TcpListener::bind(bind).await?;
    log::info!("Listening on http://{}", bind);
    axum::serve(listener, app).await?;

    Ok(())
}
