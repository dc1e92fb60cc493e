use axum::{
    Form, Json,
    extract::{Multipart, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use crate::{
    AppState,
    auth::{self, AdminRejection, AdminSession},
    error::RepoError,
    flash::{self, Flash},
    models::{
        ApiMessage, Collection, HealthResponse, Listing, NewDocument, Subject, SubjectFilter,
        Visibility,
    },
    validator,
    views::{AdminPage, IndexPage},
};

// --- Form Structs ---

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct AccessKeyForm {
    #[serde(default)]
    pub key: String,
}

fn added_message(key: Option<&str>) -> String {
    match key {
        Some(key) => format!("Thêm tài liệu thành công! Key: {key}"),
        None => "Thêm tài liệu thành công!".to_string(),
    }
}

fn forbidden() -> Response {
    (StatusCode::FORBIDDEN, Json(ApiMessage::failure("Không có quyền"))).into_response()
}

// --- Public Pages ---

/// index
///
/// [Public Route] Every document, grouped by bucket. Private entries are listed
/// without their URL; a key form unlocks them.
pub async fn index(State(state): State<AppState>, jar: CookieJar) -> Response {
    render_listing(state, jar, None).await
}

/// subject
///
/// [Public Route] Same listing restricted to one subject. An unknown subject
/// simply matches nothing.
pub async fn subject(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(name): Path<String>,
) -> Response {
    render_listing(state, jar, Some(name)).await
}

async fn render_listing(state: AppState, jar: CookieJar, subject: Option<String>) -> Response {
    let is_admin = auth::is_admin(&state.config, &jar);
    let (jar, mut pending) = flash::take(jar);

    let collection = match state.repo.read().await {
        Ok(collection) => collection,
        Err(e) => {
            pending = Some(Flash::error(e.user_message()));
            Collection::default()
        }
    };

    let shown = by_subject(collection, subject.as_deref());

    let page = IndexPage::new(&shown, subject, is_admin, pending);
    match state.views.index(&page) {
        Ok(html) => (jar, html).into_response(),
        Err(status) => status.into_response(),
    }
}

/// Shared by the HTML and JSON listings. An unknown label matches nothing.
fn by_subject(collection: Collection, label: Option<&str>) -> Collection {
    match label {
        None => collection,
        Some(label) => match Subject::parse(label) {
            Some(subject) => collection.filtered(subject),
            None => Collection::default(),
        },
    }
}

/// access_private
///
/// [Public Route] Redirects to a private document's URL when the submitted key
/// matches its access key exactly (after trimming the input).
pub async fn access_private(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
    Form(form): Form<AccessKeyForm>,
) -> Response {
    let collection = match state.repo.read().await {
        Ok(collection) => collection,
        Err(e) => {
            let jar = flash::push(jar, Flash::error(e.user_message()));
            return (jar, Redirect::to("/")).into_response();
        }
    };

    let entered = form.key.trim();
    match collection.find_private(&id) {
        Some(doc) if doc.access_key.as_deref() == Some(entered) => match document_location(&doc.url) {
            Some(location) => {
                tracing::info!(id = %doc.id, "private document unlocked");
                (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
            }
            None => {
                tracing::warn!(id = %doc.id, "stored URL cannot be used as a redirect target");
                let jar = flash::push(jar, Flash::error("URL không hợp lệ"));
                (jar, Redirect::to("/")).into_response()
            }
        },
        Some(_) => {
            tracing::warn!(id = %id, "wrong access key");
            let jar = flash::push(jar, Flash::error("Key không đúng!"));
            (jar, Redirect::to("/")).into_response()
        }
        None => {
            let jar = flash::push(jar, Flash::error("Tài liệu không tồn tại!"));
            (jar, Redirect::to("/")).into_response()
        }
    }
}

/// Stored URLs predate validation in some stores. Parsing re-encodes
/// non-ASCII hosts and paths; anything left that a header cannot carry is refused.
fn document_location(raw: &str) -> Option<HeaderValue> {
    let parsed = url::Url::parse(raw.trim()).ok()?;
    HeaderValue::from_str(parsed.as_str()).ok()
}

// --- Session ---

/// login
///
/// [Public Route] Checks the shared admin password and sets the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> (CookieJar, Redirect) {
    if !auth::check_password(&state.config, &form.password) {
        tracing::warn!("failed admin login");
        let jar = flash::push(jar, Flash::error("Mật khẩu không đúng!"));
        return (jar, Redirect::to("/"));
    }

    match auth::issue_session_token(&state.config) {
        Ok(token) => {
            tracing::info!("admin logged in");
            let jar = jar.add(auth::session_cookie(token));
            let jar = flash::push(jar, Flash::success("Đăng nhập thành công!"));
            (jar, Redirect::to("/admin"))
        }
        Err(e) => {
            tracing::error!("could not sign session token: {:?}", e);
            let jar = flash::push(jar, Flash::error("Lỗi server"));
            (jar, Redirect::to("/"))
        }
    }
}

/// logout
///
/// [Public Route] Drops the session cookie.
pub async fn logout(jar: CookieJar) -> (CookieJar, Redirect) {
    let jar = auth::clear_session(jar);
    let jar = flash::push(jar, Flash::success("Đã đăng xuất thành công!"));
    (jar, Redirect::to("/"))
}

// --- Admin Pages ---

/// admin_page
///
/// [Admin Route] Full listing including URLs and access keys.
pub async fn admin_page(
    _admin: AdminSession,
    State(state): State<AppState>,
    jar: CookieJar,
) -> Response {
    let (jar, mut pending) = flash::take(jar);

    let collection = match state.repo.read().await {
        Ok(collection) => collection,
        Err(e) => {
            pending = Some(Flash::error(e.user_message()));
            Collection::default()
        }
    };

    match state.views.admin(&AdminPage::new(&collection, pending)) {
        Ok(html) => (jar, html).into_response(),
        Err(status) => status.into_response(),
    }
}

/// admin_add
///
/// [Admin Route] Adds a document from the admin form. The generated key of a
/// private document is shown once in the flash message.
pub async fn admin_add(
    _admin: AdminSession,
    State(state): State<AppState>,
    jar: CookieJar,
    Form(fields): Form<NewDocument>,
) -> (CookieJar, Redirect) {
    let flash = match state.repo.add(fields).await {
        Ok(key) => Flash::success(added_message(key.as_deref())),
        Err(e) => Flash::error(e.user_message()),
    };
    (flash::push(jar, flash), Redirect::to("/admin"))
}

/// admin_upload
///
/// [Admin Route] Stores an uploaded file and adds a document pointing at it.
/// The title is checked before the file is written so a rejected form leaves
/// no orphan file behind.
pub async fn admin_upload(
    _admin: AdminSession,
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> (CookieJar, Redirect) {
    let flash = match upload_document(&state, multipart).await {
        Ok(key) => Flash::success(added_message(key.as_deref())),
        Err(e) => Flash::error(e.user_message()),
    };
    (flash::push(jar, flash), Redirect::to("/admin"))
}

struct UploadedFile {
    filename: String,
    content_type: String,
    bytes: Vec<u8>,
}

async fn upload_document(
    state: &AppState,
    mut multipart: Multipart,
) -> Result<Option<String>, RepoError> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        tracing::warn!("multipart error: {}", e);
        RepoError::InvalidInput("Dữ liệu tải lên không hợp lệ".to_string())
    };

    let mut fields = NewDocument::default();
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(invalid)?.to_vec();
                file = Some(UploadedFile { filename, content_type, bytes });
            }
            "title" => fields.title = field.text().await.map_err(invalid)?,
            "description" => fields.description = Some(field.text().await.map_err(invalid)?),
            "category" => fields.category = field.text().await.map_err(invalid)?,
            "type" => {
                fields.visibility = Visibility::from_form_value(&field.text().await.map_err(invalid)?)
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| RepoError::InvalidInput("Vui lòng chọn tệp".to_string()))?;
    validator::validate_title(&fields.title)?;

    fields.url = state
        .uploads
        .store(&file.filename, &file.content_type, file.bytes)
        .await?;
    tracing::info!(url = %fields.url, "file uploaded");

    let url = fields.url.clone();
    let added = state.repo.add(fields).await;
    if added.is_err() {
        // Nothing points at the file any more.
        if let Err(e) = state.uploads.discard(&url).await {
            tracing::warn!(url = %url, "could not remove orphaned upload: {}", e);
        }
    }
    added
}

/// delete_document
///
/// [Admin Route] Removes a document by id from whichever bucket holds it.
pub async fn delete_document(
    _admin: AdminSession,
    State(state): State<AppState>,
    jar: CookieJar,
    Path(id): Path<String>,
) -> (CookieJar, Redirect) {
    let flash = match state.repo.remove(&id).await {
        Ok(true) => Flash::success("Xóa tài liệu thành công"),
        Ok(false) => Flash::error("Không tìm thấy tài liệu"),
        Err(e) => Flash::error(e.user_message()),
    };
    (flash::push(jar, flash), Redirect::to("/admin"))
}

/// reset_documents
///
/// [Admin Route] Replaces everything with the sample set.
pub async fn reset_documents(
    _admin: AdminSession,
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let flash = match state.repo.reset().await {
        Ok(_) => Flash::success("Đã reset dữ liệu về mẫu!"),
        Err(e) => Flash::error(e.user_message()),
    };
    (flash::push(jar, flash), Redirect::to("/admin"))
}

// --- JSON API ---

/// health
///
/// [Public Route] Liveness plus document counts by visibility.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store readable", body = HealthResponse),
        (status = 500, description = "Store unreadable", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.repo.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                data_stats: Some(stats),
            }),
        ),
        Err(e) => {
            tracing::error!("health check failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    status: "error".to_string(),
                    data_stats: None,
                }),
            )
        }
    }
}

/// list_documents
///
/// [Public Route] Public documents in full, private ones as summaries only.
#[utoipa::path(
    get,
    path = "/api/documents",
    params(SubjectFilter),
    responses((status = 200, description = "Listing", body = Listing))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    Query(filter): Query<SubjectFilter>,
) -> Result<Json<Listing>, RepoError> {
    let collection = state.repo.read().await?;
    let shown = by_subject(collection, filter.subject.as_deref());
    Ok(Json(Listing::from(&shown)))
}

/// api_add_document
///
/// [Admin Route] JSON counterpart of the admin form.
#[utoipa::path(
    post,
    path = "/api/admin/documents",
    request_body = NewDocument,
    responses(
        (status = 200, description = "Added", body = ApiMessage),
        (status = 400, description = "Invalid input", body = ApiMessage),
        (status = 403, description = "No admin session", body = ApiMessage)
    )
)]
pub async fn api_add_document(
    session: Result<AdminSession, AdminRejection>,
    State(state): State<AppState>,
    Json(fields): Json<NewDocument>,
) -> Response {
    if session.is_err() {
        return forbidden();
    }

    match state.repo.add(fields).await {
        Ok(key) => Json(ApiMessage {
            success: true,
            message: added_message(key.as_deref()),
            key,
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// api_delete_document
///
/// [Admin Route] Removes a document by id.
#[utoipa::path(
    delete,
    path = "/api/admin/documents/{id}",
    params(("id" = String, Path, description = "Document id")),
    responses(
        (status = 200, description = "Deleted", body = ApiMessage),
        (status = 404, description = "Not found", body = ApiMessage),
        (status = 403, description = "No admin session", body = ApiMessage)
    )
)]
pub async fn api_delete_document(
    session: Result<AdminSession, AdminRejection>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    if session.is_err() {
        return forbidden();
    }

    match state.repo.remove(&id).await {
        Ok(true) => Json(ApiMessage::ok("Xóa tài liệu thành công")).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ApiMessage::failure("Không tìm thấy tài liệu")),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// api_reset
///
/// [Admin Route] Restores the sample set.
#[utoipa::path(
    post,
    path = "/api/admin/reset",
    responses(
        (status = 200, description = "Reset", body = ApiMessage),
        (status = 403, description = "No admin session", body = ApiMessage)
    )
)]
pub async fn api_reset(
    session: Result<AdminSession, AdminRejection>,
    State(state): State<AppState>,
) -> Response {
    if session.is_err() {
        return forbidden();
    }

    match state.repo.reset().await {
        Ok(_) => Json(ApiMessage::ok("Đã reset dữ liệu về mẫu!")).into_response(),
        Err(e) => e.into_response(),
    }
}
