use anyhow::Result;
use inkwell_types::Role;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS roles (
            name        TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS users (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            role        TEXT NOT NULL REFERENCES roles(name),
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS entries (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            slug        TEXT NOT NULL UNIQUE,
            content     TEXT NOT NULL,
            published   INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL,
            author_id   INTEGER NOT NULL REFERENCES users(id)
        );

        CREATE INDEX IF NOT EXISTS idx_entries_published
            ON entries(published, created_at);

        CREATE INDEX IF NOT EXISTS idx_entries_author
            ON entries(author_id, created_at);

        CREATE TABLE IF NOT EXISTS replies (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_id    INTEGER NOT NULL REFERENCES entries(id),
            author_id   INTEGER NOT NULL REFERENCES users(id),
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_replies_entry
            ON replies(entry_id, created_at);

        -- Directed edge follower -> user. Duplicates are allowed.
        CREATE TABLE IF NOT EXISTS follows (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(id),
            follower_id INTEGER NOT NULL REFERENCES users(id),
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_follows_user ON follows(user_id);
        CREATE INDEX IF NOT EXISTS idx_follows_follower ON follows(follower_id);

        -- Full-text index over title + content, rowid = entries.id
        CREATE VIRTUAL TABLE IF NOT EXISTS entry_fts USING fts5(content);
        ",
    )?;

    for role in Role::ALL {
        conn.execute("INSERT OR IGNORE INTO roles (name) VALUES (?1)", [role.as_str()])?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent_and_seed_roles() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let mut stmt = conn.prepare("SELECT name FROM roles ORDER BY name").unwrap();
        let roles: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(roles, vec!["Admin", "Moderator", "User"]);
    }
}
