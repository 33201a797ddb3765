// Librarium - Personal Book Catalogue
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Schema migrations
//!
//! Migrations are plain SQL run at open time and recorded in `_migrations`,
//! so a catalogue file can be created on any machine without a build-time
//! database connection.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};
use tracing::info;

/// Apply every migration not yet recorded in `_migrations`
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_migrations_table(pool).await?;

    run_migration(pool, 1, "initial_schema", create_initial_schema(pool)).await?;
    run_migration(pool, 2, "lookup_indexes", create_lookup_indexes(pool)).await?;

    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;

    Ok(())
}

/// Run one migration unless its id is already recorded
async fn run_migration(
    pool: &SqlitePool,
    id: i32,
    name: &str,
    migration_fn: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if applied.is_some() {
        return Ok(());
    }

    migration_fn.await?;

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    info!(id, migration = name, "applied migration");
    Ok(())
}

/// Entity tables and the two person link tables
async fn create_initial_schema(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
-- ============================================================================
-- LOOKUP ENTITIES
-- ============================================================================

CREATE TABLE IF NOT EXISTS people (
    person_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS publishers (
    publisher_id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS series (
    series_id INTEGER PRIMARY KEY AUTOINCREMENT,
    series_name TEXT NOT NULL UNIQUE CHECK (series_name <> '')
);

-- ============================================================================
-- BOOKS
-- ============================================================================

-- Absent optional values are NULL, never '' or 0
CREATE TABLE IF NOT EXISTS books (
    book_id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL CHECK (title <> ''),
    subtitle TEXT,
    year INTEGER,
    edition INTEGER CHECK (edition IS NULL OR edition > 0),
    publisher_id INTEGER NOT NULL,
    isbn TEXT,
    series_id INTEGER,
    status TEXT NOT NULL CHECK (status <> ''),
    purchased_date TEXT,  -- "2019", "May 2019" or "3 May 2019"
    FOREIGN KEY (publisher_id) REFERENCES publishers(publisher_id) ON DELETE RESTRICT,
    FOREIGN KEY (series_id) REFERENCES series(series_id) ON DELETE RESTRICT
);

-- ============================================================================
-- JUNCTION TABLES (Many-to-Many Relationships)
-- ============================================================================

-- Link rowid order is the display order of a book's authors/editors
CREATE TABLE IF NOT EXISTS book_author (
    book_id INTEGER NOT NULL,
    author_id INTEGER NOT NULL,
    FOREIGN KEY (book_id) REFERENCES books(book_id) ON DELETE CASCADE,
    FOREIGN KEY (author_id) REFERENCES people(person_id) ON DELETE RESTRICT,
    PRIMARY KEY (book_id, author_id)
);

CREATE TABLE IF NOT EXISTS book_editor (
    book_id INTEGER NOT NULL,
    editor_id INTEGER NOT NULL,
    FOREIGN KEY (book_id) REFERENCES books(book_id) ON DELETE CASCADE,
    FOREIGN KEY (editor_id) REFERENCES people(person_id) ON DELETE RESTRICT,
    PRIMARY KEY (book_id, editor_id)
);
        "#,
    )
    .await?;

    Ok(())
}

/// Indexes for the reverse lookups (books by person/publisher/series)
async fn create_lookup_indexes(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
CREATE INDEX IF NOT EXISTS idx_books_title ON books(title);
CREATE INDEX IF NOT EXISTS idx_books_status ON books(status);
CREATE INDEX IF NOT EXISTS idx_books_publisher ON books(publisher_id);
CREATE INDEX IF NOT EXISTS idx_books_series ON books(series_id);
CREATE INDEX IF NOT EXISTS idx_book_author_person ON book_author(author_id);
CREATE INDEX IF NOT EXISTS idx_book_editor_person ON book_editor(editor_id);
        "#,
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    #[tokio::test]
    async fn test_migrations() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_migrations' ORDER BY name",
        )
        .fetch_all(db.pool())
        .await
        .expect("Failed to query tables");

        let expected_tables = vec![
            "book_author",
            "book_editor",
            "books",
            "people",
            "publishers",
            "series",
        ];

        assert_eq!(tables, expected_tables, "Missing or extra tables");
    }

    #[tokio::test]
    async fn test_migration_tracking() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM _migrations ORDER BY id")
            .fetch_all(db.pool())
            .await
            .expect("Failed to query migrations");

        assert_eq!(names, vec!["initial_schema", "lookup_indexes"]);

        // Second run is a no-op
        run_migrations(db.pool()).await.expect("Re-running migrations failed");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _migrations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        let fk_enabled: i32 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(db.pool())
            .await
            .expect("Failed to check foreign keys");

        assert_eq!(fk_enabled, 1, "Foreign keys not enabled");
    }

    #[tokio::test]
    async fn test_link_to_missing_person_rejected() {
        let db = Database::new_in_memory()
            .await
            .expect("Failed to create database");

        sqlx::query("INSERT INTO publishers (name) VALUES ('Eerdmans')")
            .execute(db.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO books (title, publisher_id, status) VALUES ('T', 1, 'Owned')")
            .execute(db.pool())
            .await
            .unwrap();

        let result = sqlx::query("INSERT INTO book_author (book_id, author_id) VALUES (1, 99)")
            .execute(db.pool())
            .await;

        assert!(result.is_err(), "dangling author link accepted");
    }
}
