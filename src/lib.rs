use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod backends;
pub mod config;
pub mod error;
pub mod flash;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod uploads;
pub mod validator;
pub mod views;

pub mod routes;
use routes::{admin, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::RepoError;
pub use repository::{LockedRepository, Repository, RepositoryState};
pub use uploads::{DiskUploadStore, MockUploadStore, S3UploadStore, UploadState};
pub use views::Views;

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints, served at `/api-docs/openapi.json`.
/// The HTML pages are not part of it.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health, handlers::list_documents, handlers::api_add_document,
        handlers::api_delete_document, handlers::api_reset
    ),
    components(
        schemas(
            models::Document, models::DocumentSummary, models::Listing, models::NewDocument,
            models::Subject, models::Visibility, models::ApiMessage, models::DataStats,
            models::HealthResponse,
        )
    ),
    tags(
        (name = "docboard", description = "Document bulletin board API")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Unified state shared by every request. Each field is an independently
/// swappable service; handlers pull what they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub uploads: UploadState,
    pub config: AppConfig,
    pub views: Arc<Views>,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for UploadState {
    fn from_ref(app_state: &AppState) -> UploadState {
        app_state.uploads.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the page, API and documentation routes and wraps them in the
/// request-id, tracing and CORS layers. Disk uploads are served from
/// `/uploads` when the upload store has a local directory.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS: the JSON API is called from other origins, so nothing is restricted.
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Routes. Admin handlers check the session themselves through the
    // `AdminSession` extractor, so both routers merge at the root.
    let mut base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(admin::admin_routes());

    // Disk uploads are served back from here; S3 objects are linked directly.
    if let Some(dir) = state.uploads.serve_dir() {
        base_router = base_router.nest_service(uploads::UPLOADS_ROUTE, ServeDir::new(dir));
    }

    // 3. Request correlation and tracing, outermost first.
    base_router
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                // 3a. Every request gets an id unless the caller already sent one.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One span per request, tagged with that id, closed with the latency.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo the id back in the response headers.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS wraps everything, including error responses from the layers above.
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying the `x-request-id` so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
