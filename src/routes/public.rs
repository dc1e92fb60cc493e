use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Private documents appear here only
/// as summaries; their URL is released by `/access_private/{id}` when the
/// submitted key matches.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Every document, grouped by bucket.
        .route("/", get(handlers::index))
        // GET /subject/{name}
        // Same page filtered to one subject label. Unknown labels show nothing.
        .route("/subject/{name}", get(handlers::subject))
        // POST /access_private/{id}
        // Form field `key`. Redirects to the document URL on an exact match.
        .route("/access_private/{id}", post(handlers::access_private))
        // POST /login, GET /logout
        .route("/login", post(handlers::login))
        .route("/logout", get(handlers::logout))
        // GET /health
        // Liveness plus bucket sizes. 500 when the store cannot be read.
        .route("/health", get(handlers::health))
        // GET /api/documents?subject=...
        .route("/api/documents", get(handlers::list_documents))
}
