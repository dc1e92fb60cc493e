use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    flash::{self, Flash},
};

pub const SESSION_COOKIE: &str = "docboard_session";

/// The only subject a session token can carry: the board has one shared
/// admin secret and no user accounts.
pub const ADMIN_SUBJECT: &str = "admin";

/// Claims
///
/// Payload of the signed session token stored in the session cookie.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
}

/// Exact match after trimming the submitted value.
pub fn check_password(config: &AppConfig, candidate: &str) -> bool {
    candidate.trim() == config.admin_password
}

pub fn issue_session_token(config: &AppConfig) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: ADMIN_SUBJECT.to_string(),
        iat: now.timestamp() as usize,
        exp: (now + Duration::hours(config.session_ttl_hours)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.session_secret.as_bytes()),
    )
}

/// Signature, expiry and subject must all check out.
pub fn verify_session_token(config: &AppConfig, token: &str) -> bool {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.session_secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims.sub == ADMIN_SUBJECT)
    .unwrap_or(false)
}

pub fn is_admin(config: &AppConfig, jar: &CookieJar) -> bool {
    jar.get(SESSION_COOKIE)
        .is_some_and(|cookie| verify_session_token(config, cookie.value()))
}

pub fn session_cookie(token: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build((SESSION_COOKIE, "")).path("/").removal().build())
}

/// AdminSession
///
/// Extractor that only succeeds for requests carrying a valid admin session
/// cookie. HTML routes take it directly; the JSON routes take
/// `Result<AdminSession, AdminRejection>` and answer 403 themselves.
#[derive(Debug, Clone, Copy)]
pub struct AdminSession;

/// Rejection used by the HTML routes: back to the listing with a message.
#[derive(Debug)]
pub struct AdminRejection;

impl IntoResponse for AdminRejection {
    fn into_response(self) -> Response {
        let jar = flash::push(
            CookieJar::new(),
            Flash::error("Vui lòng đăng nhập để truy cập trang quản trị"),
        );
        (jar, Redirect::to("/")).into_response()
    }
}

impl<S> FromRequestParts<S> for AdminSession
where
    S: Send + Sync,
    AppConfig: FromRef<S>,
{
    type Rejection = AdminRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AppConfig::from_ref(state);
        let jar = CookieJar::from_headers(&parts.headers);

        if is_admin(&config, &jar) {
            Ok(AdminSession)
        } else {
            Err(AdminRejection)
        }
    }
}
