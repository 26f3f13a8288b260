//! Database row types, mapped directly from SQLite rows.
//! Distinct from inkwell-types so the DB layer stays independent of the web layer.

use inkwell_types::{Role, SessionUser};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: String,
    pub created_at: String,
}

impl UserRow {
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or_else(|e| {
            warn!("User '{}' has {}, treating as User", self.username, e);
            Role::User
        })
    }

    pub fn to_session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id,
            username: self.username.clone(),
            role: self.role(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EntryRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub published: bool,
    pub created_at: String,
    pub author_id: i64,
    pub author_username: String,
}

#[derive(Debug, Clone)]
pub struct ReplyRow {
    pub id: i64,
    pub entry_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub content: String,
    pub created_at: String,
}

/// Input for a new entry. An absent or empty slug is derived from the title.
#[derive(Debug, Clone)]
pub struct NewEntry<'a> {
    pub title: &'a str,
    pub slug: Option<&'a str>,
    pub content: &'a str,
    pub published: bool,
    pub author_id: i64,
}

/// Which entries a slug lookup may resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryScope {
    /// Published entries only.
    Published,
    /// Published entries plus the given author's drafts.
    VisibleTo(i64),
    /// Every entry, drafts included.
    All,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("slug '{0}' is already in use")]
    SlugTaken(String),
    #[error("title does not produce a usable slug")]
    EmptySlug,
    #[error("slug '{0}' is reserved for a fixed route")]
    ReservedSlug(String),
}

/// One page of a listing. `number` is 1-based.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: u32,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn has_prev(&self) -> bool {
        self.number > 1
    }
}
