use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Danger,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Success => "success",
            Level::Danger => "danger",
        }
    }
}

/// One-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub message: String,
}

pub(crate) fn push(jar: SignedCookieJar, level: Level, message: &str) -> SignedCookieJar {
    let mut pending = read(&jar);
    pending.push(Flash {
        level,
        message: message.to_string(),
    });

    match serde_json::to_string(&pending) {
        Ok(json) => jar.add(
            Cookie::build((FLASH_COOKIE, urlencoding::encode(&json).into_owned()))
                .path("/")
                .http_only(true),
        ),
        Err(e) => {
            warn!("Dropping flash message: {}", e);
            jar
        }
    }
}

pub(crate) fn take(jar: SignedCookieJar) -> (SignedCookieJar, Vec<Flash>) {
    let pending = read(&jar);
    if jar.get(FLASH_COOKIE).is_none() {
        return (jar, pending);
    }
    (jar.remove(Cookie::build(FLASH_COOKIE).path("/")), pending)
}

fn read(jar: &SignedCookieJar) -> Vec<Flash> {
    let Some(cookie) = jar.get(FLASH_COOKIE) else {
        return Vec::new();
    };

    urlencoding::decode(cookie.value())
        .ok()
        .and_then(|json| serde_json::from_str(&json).ok())
        .unwrap_or_default()
}
