use crate::{AppState, handlers};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Admin Router Module
///
/// Everything that changes the collection. HTML routes redirect anonymous
/// callers to `/` with a flash message; JSON routes answer 403.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin, POST /admin
        // Admin page and the add-document form.
        .route("/admin", get(handlers::admin_page).post(handlers::admin_add))
        // POST /admin/upload
        // Multipart: `file` plus the same fields as the add form.
        .route(
            "/admin/upload",
            post(handlers::admin_upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        // POST /delete/{id}
        .route("/delete/{id}", post(handlers::delete_document))
        // POST /reset
        // Replaces the whole collection with the sample set.
        .route("/reset", post(handlers::reset_documents))
        // JSON counterparts.
        .route("/api/admin/documents", post(handlers::api_add_document))
        .route("/api/admin/documents/{id}", delete(handlers::api_delete_document))
        .route("/api/admin/reset", post(handlers::api_reset))
}
