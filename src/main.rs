//! Panchayat Portal Backend
//!
//! REST backend for the village portal's team directory: member records in SQLite,
//! member photos in a local blob store served over HTTP.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod storage;
mod team;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue},
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::{Config, LogFormat};
use db::Repository;
use storage::{LocalBlobStore, PUBLIC_OBJECT_PREFIX};
use team::TeamService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub team: TeamService,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!("Starting Panchayat Portal Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Public URL: {}", config.public_url);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_psk.is_none() {
        tracing::warn!("No admin PSK configured (PORTAL_ADMIN_PSK). Admin routes are open!");
    }

    // Stores are built once here and injected into the team service.
    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));
    let blobs = Arc::new(LocalBlobStore::open(&config.storage_root, &config.public_url).await?);
    tracing::info!("Storage root: {:?}", blobs.root());
    let team = TeamService::new(repo, blobs, config.photo_bucket.clone());

    let state = AppState {
        team,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.admin_psk.clone();

    // Read routes used by the public site
    let public_routes = Router::new()
        .route("/team", get(api::list_team))
        .route("/team/{id}", get(api::get_team_member));

    // Admin console routes
    let admin_routes = Router::new()
        .route("/team", post(api::create_team_member))
        .route(
            "/team/{id}",
            patch(api::update_team_member).delete(api::delete_team_member),
        )
        .route_layer(middleware::from_fn(move |req, next| {
            auth::admin_auth_layer(psk.clone(), req, next)
        }));

    let api_routes = public_routes
        .merge(admin_routes)
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes));

    let cache_control = HeaderValue::from_str(&state.config.storage_cache_control)
        .unwrap_or_else(|_| {
            tracing::warn!(
                "Invalid PORTAL_STORAGE_CACHE_CONTROL {:?}; using max-age=3600",
                state.config.storage_cache_control
            );
            HeaderValue::from_static("max-age=3600")
        });

    let storage_service = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            cache_control,
        ))
        .service(ServeDir::new(&state.config.storage_root));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .nest_service(PUBLIC_OBJECT_PREFIX, storage_service)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
