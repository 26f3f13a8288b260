use std::fmt;
use std::str::FromStr;

use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Form,
    extract::{Query, State},
    response::Response,
};
use tracing::{info, warn};
use uuid::Uuid;

use inkwell_types::Role;
use inkwell_types::api::{CredentialsForm, NextQuery};

use crate::error::AppResult;
use crate::flash::Level;
use crate::guard::WebSession;
use crate::state::AppState;
use crate::views;

/// How user passwords are stored and compared.
///
/// `Plaintext` keeps the historical behaviour: the password is stored as
/// typed and compared with exact string equality. `Argon2` stores an
/// Argon2id PHC string instead. Switching an existing database to `Argon2`
/// locks out users whose rows still hold plaintext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordScheme {
    Plaintext,
    Argon2,
}

impl PasswordScheme {
    pub fn store(&self, password: &str) -> anyhow::Result<String> {
        match self {
            PasswordScheme::Plaintext => Ok(password.to_string()),
            PasswordScheme::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                let hash = Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| anyhow::anyhow!("Password hashing failed: {}", e))?;
                Ok(hash.to_string())
            }
        }
    }

    pub fn matches(&self, stored: &str, given: &str) -> bool {
        match self {
            PasswordScheme::Plaintext => stored == given,
            PasswordScheme::Argon2 => PasswordHash::new(stored)
                .map(|parsed| {
                    Argon2::default()
                        .verify_password(given.as_bytes(), &parsed)
                        .is_ok()
                })
                .unwrap_or(false),
        }
    }
}

impl fmt::Display for PasswordScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PasswordScheme::Plaintext => "plaintext",
            PasswordScheme::Argon2 => "argon2",
        })
    }
}

impl FromStr for PasswordScheme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plaintext" => Ok(PasswordScheme::Plaintext),
            "argon2" => Ok(PasswordScheme::Argon2),
            other => Err(anyhow::anyhow!("unknown password scheme '{}'", other)),
        }
    }
}

// -- Signup --

pub async fn create_user_page(session: WebSession, Query(query): Query<NextQuery>) -> Response {
    session.render("Create account", views::create_user(query.next.as_deref()))
}

pub async fn create_user(
    State(state): State<AppState>,
    session: WebSession,
    Query(query): Query<NextQuery>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let next = query.next.or(form.next.clone());

    let Some((username, password)) = form.credentials() else {
        return Ok(session
            .flash(Level::Danger, "You must enter a username and a password")
            .render("Create account", views::create_user(next.as_deref())));
    };

    let name = username.to_string();
    if state.db(move |db| db.get_user_by_username(&name)).await?.is_some() {
        return Ok(session
            .flash(Level::Danger, "A user with that name already exists!")
            .render("Create account", views::create_user(next.as_deref())));
    }

    let stored = state.settings.password_scheme.store(password)?;
    let name = username.to_string();
    state
        .db(move |db| db.create_user(&name, &stored, Role::User))
        .await?;
    info!("Created user '{}'", username);

    Ok(session
        .flash(Level::Success, "User created!")
        .render("Log in", views::login(next.as_deref())))
}

// -- Login --

pub async fn login_page(session: WebSession, Query(query): Query<NextQuery>) -> Response {
    session.render("Log in", views::login(query.next.as_deref()))
}

pub async fn login(
    State(state): State<AppState>,
    session: WebSession,
    Query(query): Query<NextQuery>,
    Form(form): Form<CredentialsForm>,
) -> AppResult<Response> {
    let next = query.next.or(form.next.clone());

    let Some((username, password)) = form.credentials() else {
        return Ok(session.render("Log in", views::login(next.as_deref())));
    };
    let destination = safe_next(next.as_deref());

    // The configured admin pair logs in without a session-store entry.
    if username == state.settings.admin_username && password == state.settings.admin_password {
        let token = Uuid::new_v4().to_string();
        info!("Admin login");
        return Ok(session
            .log_in(&token)
            .flash(Level::Success, "You are now logged in.")
            .redirect(destination));
    }

    let name = username.to_string();
    let user = state.db(move |db| db.get_user_by_username(&name)).await?;
    let scheme = state.settings.password_scheme;

    match user.filter(|u| scheme.matches(&u.password, password)) {
        Some(user) => {
            let token = Uuid::new_v4().to_string();
            state.sessions.put(token.clone(), user.to_session_user());
            info!("User '{}' logged in", user.username);
            Ok(session
                .log_in(&token)
                .flash(Level::Success, "You are now logged in.")
                .redirect(destination))
        }
        None => {
            warn!("Failed login for '{}'", username);
            Ok(session
                .flash(Level::Danger, "Incorrect login details!")
                .render("Log in", views::login(next.as_deref())))
        }
    }
}

// -- Logout --

pub async fn logout_page(session: WebSession) -> Response {
    session.render("Log out", views::logout())
}

pub async fn logout(State(state): State<AppState>, session: WebSession) -> Response {
    // A token the store has already forgotten is not an error.
    if let Some(token) = session.token() {
        if let Some(user) = state.sessions.remove(&token) {
            info!("User '{}' logged out", user.username);
        }
    }
    session.log_out().redirect("/login/")
}

/// Only same-site paths are honoured as a post-login destination.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") => path,
        _ => "/",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_compares_exactly() {
        let scheme = PasswordScheme::Plaintext;
        let stored = scheme.store("pw1").unwrap();
        assert_eq!(stored, "pw1");
        assert!(scheme.matches(&stored, "pw1"));
        assert!(!scheme.matches(&stored, "PW1"));
    }

    #[test]
    fn argon2_stores_a_salted_hash() {
        let scheme = PasswordScheme::Argon2;
        let first = scheme.store("pw1").unwrap();
        let second = scheme.store("pw1").unwrap();
        assert_ne!(first, "pw1");
        assert_ne!(first, second);
        assert!(scheme.matches(&first, "pw1"));
        assert!(!scheme.matches(&first, "pw2"));
        assert!(!scheme.matches("pw1", "pw1"));
    }

    #[test]
    fn scheme_parses_case_insensitively() {
        assert_eq!("Argon2".parse::<PasswordScheme>().unwrap(), PasswordScheme::Argon2);
        assert_eq!("plaintext".parse::<PasswordScheme>().unwrap(), PasswordScheme::Plaintext);
        assert!("md5".parse::<PasswordScheme>().is_err());
    }

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/drafts/")), "/drafts/");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
