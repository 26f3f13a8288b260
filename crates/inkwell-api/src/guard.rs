use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, SignedCookieJar};
use maud::Markup;
use tracing::warn;

use inkwell_types::SessionUser;

use crate::error::AppError;
use crate::flash::{self, Level};
use crate::session::SessionStore;
use crate::state::AppState;
use crate::views;

pub const TOKEN_COOKIE: &str = "token";
pub const LOGGED_IN_COOKIE: &str = "logged_in";

const SESSION_DAYS: i64 = 31;

/// What the cookies claim, checked against the session store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Anonymous,
    Authenticated { token: String, user: SessionUser },
    /// Cookies say logged in but the store has no such token.
    Stale,
}

pub fn reconcile(store: &dyn SessionStore, logged_in: bool, token: Option<&str>) -> Reconciled {
    if !logged_in {
        return Reconciled::Anonymous;
    }
    match token.and_then(|t| store.get(t).map(|user| (t, user))) {
        Some((token, user)) => Reconciled::Authenticated {
            token: token.to_string(),
            user,
        },
        None => Reconciled::Stale,
    }
}

/// Per-request session view. Extracting it runs the reconciliation, so
/// every handler that takes a `WebSession` sees stale logins already
/// cleared. Handlers must send `jar` back with their response.
pub struct WebSession {
    pub jar: SignedCookieJar,
    user: Option<SessionUser>,
}

impl FromRequestParts<AppState> for WebSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = SignedCookieJar::from_request_parts(parts, state).await?;

        let logged_in = jar.get(LOGGED_IN_COOKIE).is_some_and(|c| c.value() == "true");
        let token = jar.get(TOKEN_COOKIE).map(|c| c.value().to_string());

        Ok(match reconcile(state.sessions.as_ref(), logged_in, token.as_deref()) {
            Reconciled::Anonymous => WebSession { jar, user: None },
            Reconciled::Authenticated { user, .. } => WebSession {
                jar,
                user: Some(user),
            },
            Reconciled::Stale => {
                warn!("Session token no longer known, clearing cookies");
                WebSession {
                    jar: clear_cookies(jar),
                    user: None,
                }
            }
        })
    }
}

impl WebSession {
    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<String> {
        self.jar.get(TOKEN_COOKIE).map(|c| c.value().to_string())
    }

    /// Editable iff the viewer's name matches the author's exactly.
    pub fn owns(&self, author_username: &str) -> bool {
        self.user.as_ref().is_some_and(|u| u.owns(author_username))
    }

    /// Mark the browser as logged in under `token`.
    pub fn log_in(mut self, token: &str) -> Self {
        self.jar = self
            .jar
            .add(
                Cookie::build((LOGGED_IN_COOKIE, "true"))
                    .path("/")
                    .http_only(true)
                    .max_age(time::Duration::days(SESSION_DAYS)),
            )
            .add(
                Cookie::build((TOKEN_COOKIE, token.to_string()))
                    .path("/")
                    .http_only(true)
                    .max_age(time::Duration::days(SESSION_DAYS)),
            );
        self
    }

    pub fn log_out(mut self) -> Self {
        self.jar = clear_cookies(self.jar);
        self.user = None;
        self
    }

    pub fn flash(mut self, level: Level, message: &str) -> Self {
        self.jar = flash::push(self.jar, level, message);
        self
    }

    pub fn redirect(self, to: &str) -> Response {
        (self.jar, Redirect::to(to)).into_response()
    }

    /// Send an anonymous viewer to the login page, remembering where they were.
    pub fn login_redirect(self, next: &str) -> Response {
        let to = format!("/login/?next={}", urlencoding::encode(next));
        self.redirect(&to)
    }

    pub fn not_found(self) -> Response {
        (self.jar, AppError::NotFound).into_response()
    }

    /// Wrap `body` in the site layout, consuming pending flash messages.
    pub fn render(self, title: &str, body: Markup) -> Response {
        let (jar, flashes) = flash::take(self.jar);
        let page = views::layout(title, self.user.as_ref(), &flashes, body);
        (jar, Html(page.into_string())).into_response()
    }
}

fn clear_cookies(jar: SignedCookieJar) -> SignedCookieJar {
    jar.remove(Cookie::build(LOGGED_IN_COOKIE).path("/"))
        .remove(Cookie::build(TOKEN_COOKIE).path("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use inkwell_types::Role;

    fn alice() -> SessionUser {
        SessionUser {
            id: 7,
            username: "alice".into(),
            role: Role::User,
        }
    }

    #[test]
    fn no_claim_is_anonymous() {
        let store = MemorySessionStore::new();
        assert_eq!(reconcile(&store, false, None), Reconciled::Anonymous);
        assert_eq!(reconcile(&store, false, Some("t")), Reconciled::Anonymous);
    }

    #[test]
    fn known_token_authenticates() {
        let store = MemorySessionStore::new();
        store.put("t".into(), alice());
        assert_eq!(
            reconcile(&store, true, Some("t")),
            Reconciled::Authenticated {
                token: "t".into(),
                user: alice()
            }
        );
    }

    #[test]
    fn unknown_or_missing_token_is_stale() {
        let store = MemorySessionStore::new();
        store.put("t".into(), alice());
        assert_eq!(reconcile(&store, true, Some("other")), Reconciled::Stale);
        assert_eq!(reconcile(&store, true, None), Reconciled::Stale);

        store.clear();
        assert_eq!(reconcile(&store, true, Some("t")), Reconciled::Stale);
    }
}
