use std::ops::Deref;
use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use tracing::error;

use inkwell_db::Database;

use crate::auth::PasswordScheme;
use crate::error::AppResult;
use crate::session::SessionStore;

/// Runtime settings the handlers need. Loaded by the binary.
#[derive(Debug, Clone)]
pub struct Settings {
    pub secret_key: String,
    pub admin_username: String,
    pub admin_password: String,
    pub password_scheme: PasswordScheme,
    pub page_size: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            secret_key: "shhh, secret".into(),
            admin_username: "admin".into(),
            admin_password: "secret".into(),
            password_scheme: PasswordScheme::Plaintext,
            page_size: 20,
        }
    }
}

#[derive(Clone)]
pub struct AppState(Arc<AppStateInner>);

pub struct AppStateInner {
    pub db: Database,
    pub sessions: Arc<dyn SessionStore>,
    pub settings: Settings,
    cookie_key: Key,
}

impl AppState {
    pub fn new(db: Database, sessions: Arc<dyn SessionStore>, settings: Settings) -> Self {
        let cookie_key = derive_cookie_key(&settings.secret_key);
        Self(Arc::new(AppStateInner {
            db,
            sessions,
            settings,
            cookie_key,
        }))
    }

    /// Run blocking DB work off the async runtime.
    pub async fn db<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = self.clone();
        let result = tokio::task::spawn_blocking(move || f(&state.db))
            .await
            .inspect_err(|e| error!("spawn_blocking join error: {}", e))?;
        Ok(result?)
    }
}

impl Deref for AppState {
    type Target = AppStateInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Cookie keys need 64 bytes; stretch the configured secret with SHA-512.
fn derive_cookie_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}
