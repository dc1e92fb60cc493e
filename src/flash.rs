use axum_extra::extract::{
    CookieJar,
    cookie::{Cookie, SameSite},
};
use serde::{Deserialize, Serialize};

/// One-shot message shown on the next rendered page.
pub const FLASH_COOKIE: &str = "docboard_flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: FlashKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: FlashKind::Error, message: message.into() }
    }
}

/// Queues `flash` on the jar. The value is hex-encoded JSON so non-ASCII
/// messages survive the Set-Cookie header.
pub fn push(jar: CookieJar, flash: Flash) -> CookieJar {
    let Ok(json) = serde_json::to_vec(&flash) else {
        return jar;
    };

    let cookie = Cookie::build((FLASH_COOKIE, hex::encode(json)))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    jar.add(cookie)
}

/// Reads and clears the pending flash, if any. A garbled cookie is dropped.
pub fn take(jar: CookieJar) -> (CookieJar, Option<Flash>) {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return (jar, None);
    };

    let flash = hex::decode(cookie.value())
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    let removal = Cookie::build((FLASH_COOKIE, "")).path("/").removal().build();
    (jar.remove(removal), flash)
}
