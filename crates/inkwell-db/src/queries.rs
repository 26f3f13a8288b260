use crate::models::{EntryError, EntryRow, EntryScope, NewEntry, Page, ReplyRow, UserRow};
use crate::Database;
use anyhow::{Result, anyhow};
use inkwell_types::{Role, is_reserved, slugify};
use rusqlite::{Connection, Row};
use tracing::debug;

pub(crate) const ENTRY_SELECT: &str =
    "SELECT e.id, e.title, e.slug, e.content, e.published, e.created_at, e.author_id, u.username
     FROM entries e
     JOIN users u ON u.id = e.author_id";

pub(crate) const USER_SELECT: &str =
    "SELECT id, username, password, role, created_at FROM users";

impl Database {
    // -- Users --

    pub fn create_user(&self, username: &str, password: &str, role: Role) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, role, created_at) VALUES (?1, ?2, ?3, ?4)",
                (username, password, role.as_str(), now()),
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{USER_SELECT} WHERE username = ?1"), [username], map_user)
                .optional()
        })
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{USER_SELECT} WHERE id = ?1"), [id], map_user)
                .optional()
        })
    }

    // -- Entries --

    /// Insert an entry and its search-index row in one transaction.
    pub fn create_entry(&self, new: &NewEntry<'_>) -> Result<EntryRow> {
        let slug = match new.slug.filter(|s| !s.is_empty()) {
            Some(slug) => slug.to_string(),
            None => slugify(new.title),
        };
        if slug.is_empty() {
            return Err(EntryError::EmptySlug.into());
        }
        if is_reserved(&slug) {
            return Err(EntryError::ReservedSlug(slug).into());
        }

        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let taken: Option<i64> = tx
                .query_row("SELECT id FROM entries WHERE slug = ?1", [&slug], |row| row.get(0))
                .optional()?;
            if taken.is_some() {
                return Err(EntryError::SlugTaken(slug).into());
            }

            tx.execute(
                "INSERT INTO entries (title, slug, content, published, created_at, author_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![new.title, slug, new.content, new.published, now(), new.author_id],
            )?;
            let id = tx.last_insert_rowid();
            update_search_index(&tx, id, new.title, new.content)?;

            let entry = query_entry_by_id(&tx, id)?;
            tx.commit()?;

            debug!("Entry {} saved as '{}'", id, entry.slug);
            Ok(entry)
        })
    }

    /// Rewrite title, content and published flag. The slug is kept.
    pub fn update_entry(
        &self,
        id: i64,
        title: &str,
        content: &str,
        published: bool,
    ) -> Result<EntryRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let changed = tx.execute(
                "UPDATE entries SET title = ?1, content = ?2, published = ?3 WHERE id = ?4",
                rusqlite::params![title, content, published, id],
            )?;
            if changed == 0 {
                return Err(anyhow!("Entry not found: {}", id));
            }
            update_search_index(&tx, id, title, content)?;

            let entry = query_entry_by_id(&tx, id)?;
            tx.commit()?;
            Ok(entry)
        })
    }

    pub fn get_entry_by_slug(&self, slug: &str, scope: EntryScope) -> Result<Option<EntryRow>> {
        self.with_conn(|conn| {
            let row = match scope {
                EntryScope::Published => conn.query_row(
                    &format!("{ENTRY_SELECT} WHERE e.slug = ?1 AND e.published = 1"),
                    [slug],
                    map_entry,
                ),
                EntryScope::VisibleTo(viewer_id) => conn.query_row(
                    &format!(
                        "{ENTRY_SELECT} WHERE e.slug = ?1 AND (e.published = 1 OR e.author_id = ?2)"
                    ),
                    rusqlite::params![slug, viewer_id],
                    map_entry,
                ),
                EntryScope::All => conn.query_row(
                    &format!("{ENTRY_SELECT} WHERE e.slug = ?1"),
                    [slug],
                    map_entry,
                ),
            };
            row.optional()
        })
    }

    /// Published entries, newest first.
    pub fn public_entries(&self, page: u32, per_page: u32) -> Result<Page<EntryRow>> {
        let (number, limit, offset) = page_window(page, per_page);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ENTRY_SELECT} WHERE e.published = 1
                 ORDER BY e.created_at DESC, e.id DESC
                 LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt
                .query_map([limit, offset], map_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(into_page(rows, number, per_page))
        })
    }

    /// An author's unpublished entries, newest first.
    pub fn drafts(&self, author_id: i64, page: u32, per_page: u32) -> Result<Page<EntryRow>> {
        let (number, limit, offset) = page_window(page, per_page);
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ENTRY_SELECT} WHERE e.published = 0 AND e.author_id = ?1
                 ORDER BY e.created_at DESC, e.id DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map([author_id, limit, offset], map_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(into_page(rows, number, per_page))
        })
    }

    pub fn entries_by_author(&self, author_id: i64, include_drafts: bool) -> Result<Vec<EntryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{ENTRY_SELECT} WHERE e.author_id = ?1 AND (e.published = 1 OR ?2)
                 ORDER BY e.created_at DESC, e.id DESC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![author_id, include_drafts], map_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Replies --

    pub fn create_reply(&self, entry_id: i64, author_id: i64, content: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO replies (entry_id, author_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![entry_id, author_id, content, now()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Replies on an entry, oldest first.
    pub fn replies_for_entry(&self, entry_id: i64) -> Result<Vec<ReplyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT r.id, r.entry_id, r.author_id, u.username, r.content, r.created_at
                 FROM replies r
                 JOIN users u ON u.id = r.author_id
                 WHERE r.entry_id = ?1
                 ORDER BY r.created_at ASC, r.id ASC",
            )?;
            let rows = stmt
                .query_map([entry_id], |row| {
                    Ok(ReplyRow {
                        id: row.get(0)?,
                        entry_id: row.get(1)?,
                        author_id: row.get(2)?,
                        author_username: row.get(3)?,
                        content: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Follows --

    /// Record `follower_id -> user_id`. Repeating the call adds another edge.
    pub fn follow(&self, follower_id: i64, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO follows (user_id, follower_id, created_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![user_id, follower_id, now()],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Users following `user_id`, one row per edge.
    pub fn followers(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_follow_edges(
                conn,
                "SELECT u.id, u.username, u.password, u.role, u.created_at
                 FROM follows f
                 JOIN users u ON u.id = f.follower_id
                 WHERE f.user_id = ?1
                 ORDER BY f.id",
                user_id,
            )
        })
    }

    /// Users `user_id` follows, one row per edge.
    pub fn following(&self, user_id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            query_follow_edges(
                conn,
                "SELECT u.id, u.username, u.password, u.role, u.created_at
                 FROM follows f
                 JOIN users u ON u.id = f.user_id
                 WHERE f.follower_id = ?1
                 ORDER BY f.id",
                user_id,
            )
        })
    }
}

/// Upsert the full-text row for an entry, keyed by entry id.
fn update_search_index(conn: &Connection, id: i64, title: &str, content: &str) -> Result<()> {
    let text = format!("{}\n{}", title, content);
    let exists: Option<i64> = conn
        .query_row("SELECT rowid FROM entry_fts WHERE rowid = ?1", [id], |row| row.get(0))
        .optional()?;

    if exists.is_some() {
        conn.execute("UPDATE entry_fts SET content = ?1 WHERE rowid = ?2", rusqlite::params![text, id])?;
    } else {
        conn.execute("INSERT INTO entry_fts (rowid, content) VALUES (?1, ?2)", rusqlite::params![id, text])?;
    }
    Ok(())
}

fn query_entry_by_id(conn: &Connection, id: i64) -> Result<EntryRow> {
    conn.query_row(&format!("{ENTRY_SELECT} WHERE e.id = ?1"), [id], map_entry)
        .map_err(|_| anyhow!("Entry not found: {}", id))
}

fn query_follow_edges(conn: &Connection, sql: &str, user_id: i64) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id], map_user)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        role: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub(crate) fn map_entry(row: &Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        content: row.get(3)?,
        published: row.get(4)?,
        created_at: row.get(5)?,
        author_id: row.get(6)?,
        author_username: row.get(7)?,
    })
}

/// Sortable UTC timestamp with microseconds.
fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

/// (1-based page number, limit, offset). Fetches one extra row to detect a next page.
fn page_window(page: u32, per_page: u32) -> (u32, i64, i64) {
    let number = page.max(1);
    let per_page = i64::from(per_page.max(1));
    (number, per_page + 1, i64::from(number - 1) * per_page)
}

fn into_page<T>(mut rows: Vec<T>, number: u32, per_page: u32) -> Page<T> {
    let per_page = per_page.max(1) as usize;
    let has_next = rows.len() > per_page;
    rows.truncate(per_page);
    Page {
        items: rows,
        number,
        has_next,
    }
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
