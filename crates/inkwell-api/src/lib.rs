pub mod auth;
pub mod entries;
pub mod error;
pub mod flash;
pub mod guard;
pub mod profiles;
pub mod session;
pub mod state;
pub mod views;

use axum::{
    Router,
    routing::{get, post},
};

pub use auth::PasswordScheme;
pub use session::{MemorySessionStore, SessionStore};
pub use state::{AppState, Settings};

/// Every page route. The caller adds tracing and serves it.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(entries::index))
        .route("/create_user/", get(auth::create_user_page).post(auth::create_user))
        .route("/login/", get(auth::login_page).post(auth::login))
        .route("/logout/", get(auth::logout_page).post(auth::logout))
        .route("/drafts/", get(entries::drafts))
        .route("/create/", get(entries::create_page).post(entries::create))
        .route("/profile/", get(profiles::own_profile))
        .route("/profile/{name}", get(profiles::profile))
        // Entry slugs and usernames share the first path segment.
        .route("/{slug}/", get(entries::detail).post(entries::reply))
        .route("/{slug}/edit/", get(entries::edit_page).post(entries::edit))
        .route("/{slug}/followers", get(profiles::followers))
        .route("/{slug}/following", get(profiles::following))
        .route("/{slug}/follow", post(profiles::follow))
        .fallback(error::not_found)
        .with_state(state)
}
