//! Entry and user search.
//!
//! Users are matched by substring on their name. Entries go through two
//! paths: an exact author-name lookup that, when it finds anything, wins
//! outright, and an FTS5 relevance search over title and content otherwise.
//! The two result sets are never merged.

use anyhow::Result;
use rusqlite::types::ToSql;

use crate::Database;
use crate::models::{EntryRow, UserRow};
use crate::queries::{ENTRY_SELECT, USER_SELECT, map_entry, map_user};

/// Split a query on whitespace. Empty tokens never survive.
pub fn terms(query: &str) -> Vec<&str> {
    query.split_whitespace().collect()
}

#[derive(Debug, Clone)]
pub struct RankedEntry {
    pub entry: EntryRow,
    /// Higher is more relevant (negated BM25).
    pub score: f64,
}

#[derive(Debug, Clone)]
pub enum EntryMatches {
    /// The query had no terms, or nothing matched.
    Empty,
    /// A term named an author; all of their entries, drafts included,
    /// oldest first.
    ByAuthor(Vec<EntryRow>),
    /// Published entries ranked by relevance, best first.
    FullText(Vec<RankedEntry>),
}

impl EntryMatches {
    pub fn entries(&self) -> Vec<&EntryRow> {
        match self {
            EntryMatches::Empty => Vec::new(),
            EntryMatches::ByAuthor(rows) => rows.iter().collect(),
            EntryMatches::FullText(ranked) => ranked.iter().map(|r| &r.entry).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            EntryMatches::Empty => true,
            EntryMatches::ByAuthor(rows) => rows.is_empty(),
            EntryMatches::FullText(ranked) => ranked.is_empty(),
        }
    }
}

impl Database {
    /// Users whose name contains any term, case-insensitively.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserRow>> {
        let terms = terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        self.with_conn(|conn| {
            let clauses: Vec<String> = (1..=terms.len())
                .map(|i| format!("instr(lower(username), lower(?{})) > 0", i))
                .collect();
            let sql = format!("{USER_SELECT} WHERE {} ORDER BY username", clauses.join(" OR "));

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = terms.iter().map(|t| t as &dyn ToSql).collect();
            let rows = stmt
                .query_map(params.as_slice(), map_user)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn search_entries(&self, query: &str) -> Result<EntryMatches> {
        let terms = terms(query);
        if terms.is_empty() {
            return Ok(EntryMatches::Empty);
        }

        let by_author = self.entries_by_author_names(&terms)?;
        if !by_author.is_empty() {
            return Ok(EntryMatches::ByAuthor(by_author));
        }

        let Some(expr) = match_expression(&terms) else {
            return Ok(EntryMatches::Empty);
        };
        let ranked = self.full_text(&expr)?;
        if ranked.is_empty() {
            return Ok(EntryMatches::Empty);
        }
        Ok(EntryMatches::FullText(ranked))
    }

    fn entries_by_author_names(&self, names: &[&str]) -> Result<Vec<EntryRow>> {
        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "{ENTRY_SELECT} WHERE u.username IN ({})
                 ORDER BY e.created_at ASC, e.id ASC",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn ToSql> = names.iter().map(|n| n as &dyn ToSql).collect();
            let rows = stmt
                .query_map(params.as_slice(), map_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn full_text(&self, expr: &str) -> Result<Vec<RankedEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT bm25(entry_fts) AS score,
                        e.id, e.title, e.slug, e.content, e.published, e.created_at, e.author_id, u.username
                 FROM entry_fts
                 JOIN entries e ON e.id = entry_fts.rowid
                 JOIN users u ON u.id = e.author_id
                 WHERE entry_fts MATCH ?1 AND e.published = 1
                 ORDER BY score ASC, e.id ASC",
            )?;

            let rows = stmt
                .query_map([expr], |row| {
                    let score: f64 = row.get(0)?;
                    let entry = EntryRow {
                        id: row.get(1)?,
                        title: row.get(2)?,
                        slug: row.get(3)?,
                        content: row.get(4)?,
                        published: row.get(5)?,
                        created_at: row.get(6)?,
                        author_id: row.get(7)?,
                        author_username: row.get(8)?,
                    };
                    Ok(RankedEntry { entry, score: -score })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// FTS5 expression requiring every term. Each term is quoted as a phrase so
/// punctuation inside it cannot be read as query syntax; terms with no
/// letters or digits are dropped.
fn match_expression(terms: &[&str]) -> Option<String> {
    let phrases: Vec<String> = terms
        .iter()
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();

    if phrases.is_empty() {
        None
    } else {
        Some(phrases.join(" "))
    }
}
