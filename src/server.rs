//! REST HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Auth | Description |
//! |--------|------|------|-------------|
//! | `POST` | `/api/auth/register` | public | Create an account |
//! | `POST` | `/api/auth/login` | public | Exchange credentials for a bearer token |
//! | `GET`  | `/api/v1/products` | bearer | Search and page through products |
//! | `GET`  | `/api/v1/products/{id}` | bearer | Fetch one product |
//! | `POST` | `/api/v1/products` | bearer | Create a product |
//! | `PUT`  | `/api/v1/products/{id}` | bearer | Replace a product |
//! | `DELETE` | `/api/v1/products/{id}` | bearer | Delete a product |
//! | `GET`  | `/health` | public | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "product not found: id=7" } }
//! ```
//!
//! Error codes: `bad_request` (400), `unauthorized` (401), `not_found` (404),
//! `conflict` (409), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::auth::{require_auth, AuthError, CurrentUser, TokenService};
use crate::config::Config;
use crate::db;
use crate::error::StoreError;
use crate::import::spawn_background_import;
use crate::migrate;
use crate::models::Product;
use crate::products::{self, ProductError, ProductRequest, SearchParams};
use crate::store::{Page, ProductStore, SqliteProductStore};
use crate::users::{self, AccountError, AuthResponse, LoginRequest, RegisterRequest, User, UserRepository};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn ProductStore>,
    pub users: Arc<UserRepository>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// State backed by an already migrated SQLite pool.
    pub fn from_pool(config: &Config, pool: sqlx::SqlitePool) -> anyhow::Result<Self> {
        Ok(Self {
            config: Arc::new(config.clone()),
            store: Arc::new(SqliteProductStore::new(pool.clone())),
            users: Arc::new(UserRepository::new(pool)),
            tokens: Arc::new(TokenService::from_config(&config.auth)?),
        })
    }
}

/// Starts the HTTP server.
///
/// Applies migrations, dispatches the startup import in the background
/// (unless `[import].on_startup = false`) and binds `[server].bind`
/// without waiting for the import. Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let state = AppState::from_pool(config, pool)?;

    if config.import.on_startup {
        spawn_background_import(config.import.clone(), state.store.clone());
    } else {
        info!("startup import disabled");
    }

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(addr = %config.server.bind, "HTTP server listening");
    println!("catalog server listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let protected = Router::new()
        .route("/api/v1/products", get(handle_search).post(handle_create))
        .route(
            "/api/v1/products/{id}",
            get(handle_get).put(handle_update).delete(handle_delete),
        )
        .route_layer(middleware::from_fn_with_state(
            state.tokens.clone(),
            require_auth,
        ));

    Router::new()
        .route("/api/auth/register", post(handle_register))
        .route("/api/auth/login", post(handle_login))
        .route("/health", get(handle_health))
        .merge(protected)
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"conflict"`).
    code: String,
    message: String,
}

/// Error type that converts into an HTTP response with the JSON envelope.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn unauthorized(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn conflict(message: impl Into<String>) -> ApiError {
    ApiError {
        status: StatusCode::CONFLICT,
        code: "conflict",
        message: message.into(),
    }
}

/// Logs the cause and hides it from the client.
fn internal(err: &dyn std::fmt::Display) -> ApiError {
    error!(error = %err, "request failed");
    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: "internal server error".to_string(),
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Hashing(_) => internal(&err),
            AuthError::InvalidToken(_) => unauthorized("invalid or expired token"),
            AuthError::MissingToken | AuthError::BadCredentials => unauthorized(err.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => not_found(err.to_string()),
            StoreError::Duplicate(_) => conflict(err.to_string()),
            StoreError::Corrupt(_) | StoreError::Database(_) => internal(&err),
        }
    }
}

impl From<ProductError> for ApiError {
    fn from(err: ProductError) -> Self {
        match err {
            ProductError::Invalid(e) => bad_request(e.to_string()),
            ProductError::BadQuery(msg) => bad_request(msg),
            ProductError::Store(e) => e.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Invalid(msg) => bad_request(msg),
            AccountError::Conflict(msg) => conflict(msg),
            AccountError::Auth(e) => e.into(),
            AccountError::Database(e) => internal(&e),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /api/auth ============

async fn handle_register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = users::register(&state.users, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn handle_login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    Ok(Json(users::login(&state.users, &state.tokens, req).await?))
}

// ============ /api/v1/products ============

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Page<Product>>, ApiError> {
    Ok(Json(products::search(state.store.as_ref(), params).await?))
}

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Product>, ApiError> {
    Ok(Json(products::get(state.store.as_ref(), id).await?))
}

async fn handle_create(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = products::create(state.store.as_ref(), req).await?;
    info!(user = %claims.sub, id = product.id, "product created via API");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn handle_update(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<i64>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<Product>, ApiError> {
    let product = products::update(state.store.as_ref(), id, req).await?;
    info!(user = %claims.sub, id, "product updated via API");
    Ok(Json(product))
}

async fn handle_delete(
    State(state): State<AppState>,
    CurrentUser(claims): CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    products::delete(state.store.as_ref(), id).await?;
    info!(user = %claims.sub, id, "product deleted via API");
    Ok(StatusCode::NO_CONTENT)
}
