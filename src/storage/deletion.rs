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


//! Deletion with orphan cleanup
//!
//! People, publishers and series can only be deleted once no book refers to
//! them. Deleting a book removes its links and then tries to delete each
//! person, the publisher and the series it referenced; the ones still used by
//! other books are left alone.

use crate::error::{CatalogError, Result, StoreContext};
use crate::storage::models::*;
use crate::storage::queries;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

// ============================================================================
// LOOKUP ENTITIES
// ============================================================================

/// Delete a person with no books, on a connection the caller holds
pub async fn delete_person_in(conn: &mut SqliteConnection, person_id: i64) -> Result<()> {
    let books = queries::books_by_person(&mut *conn, person_id).await?;
    if !books.is_empty() {
        return Err(CatalogError::InUse {
            kind: EntityKind::Person,
            id: person_id,
            name: queries::person_name(&mut *conn, person_id).await?,
            books,
        });
    }

    sqlx::query("DELETE FROM people WHERE person_id = ?")
        .bind(person_id)
        .execute(&mut *conn)
        .await
        .context("delete_person")?;

    Ok(())
}

/// Delete a publisher with no books, on a connection the caller holds
pub async fn delete_publisher_in(conn: &mut SqliteConnection, publisher_id: i64) -> Result<()> {
    let books = queries::publisher_books(&mut *conn, publisher_id).await?;
    if !books.is_empty() {
        return Err(CatalogError::InUse {
            kind: EntityKind::Publisher,
            id: publisher_id,
            name: queries::publisher_name(&mut *conn, publisher_id).await?,
            books,
        });
    }

    sqlx::query("DELETE FROM publishers WHERE publisher_id = ?")
        .bind(publisher_id)
        .execute(&mut *conn)
        .await
        .context("delete_publisher")?;

    Ok(())
}

/// Delete a series with no books, on a connection the caller holds
pub async fn delete_series_in(conn: &mut SqliteConnection, series_id: i64) -> Result<()> {
    let books = queries::series_books(&mut *conn, series_id).await?;
    if !books.is_empty() {
        return Err(CatalogError::InUse {
            kind: EntityKind::Series,
            id: series_id,
            name: queries::series_name(&mut *conn, series_id).await?,
            books,
        });
    }

    sqlx::query("DELETE FROM series WHERE series_id = ?")
        .bind(series_id)
        .execute(&mut *conn)
        .await
        .context("delete_series")?;

    Ok(())
}

pub async fn delete_person(pool: &SqlitePool, person_id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("delete_person: begin")?;
    delete_person_in(&mut *tx, person_id).await?;
    tx.commit().await.context("delete_person: commit")?;

    info!(person_id, "deleted person");
    Ok(())
}

pub async fn delete_publisher(pool: &SqlitePool, publisher_id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("delete_publisher: begin")?;
    delete_publisher_in(&mut *tx, publisher_id).await?;
    tx.commit().await.context("delete_publisher: commit")?;

    info!(publisher_id, "deleted publisher");
    Ok(())
}

pub async fn delete_series(pool: &SqlitePool, series_id: i64) -> Result<()> {
    let mut tx = pool.begin().await.context("delete_series: begin")?;
    delete_series_in(&mut *tx, series_id).await?;
    tx.commit().await.context("delete_series: commit")?;

    info!(series_id, "deleted series");
    Ok(())
}

/// `Ok(true)` if deleted, `Ok(false)` if still in use, any other error passes through
fn absorb_in_use(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(CatalogError::InUse { kind, id, books, .. }) => {
            debug!(%kind, id, books = books.len(), "kept, still in use");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

// ============================================================================
// BOOKS
// ============================================================================

#[derive(sqlx::FromRow)]
struct BookRefs {
    publisher_id: i64,
    series_id: Option<i64>,
}

/// Delete a book along with any person, publisher or series only it used
///
/// Returns the book as it was before deletion.
pub async fn delete_book(pool: &SqlitePool, book_id: i64) -> Result<Book> {
    let mut tx = pool.begin().await.context("delete_book: begin")?;

    let book = queries::get_book(&mut *tx, book_id).await?;

    let refs = sqlx::query_as::<_, BookRefs>(
        "SELECT publisher_id, series_id FROM books WHERE book_id = ?",
    )
    .bind(book_id)
    .fetch_one(&mut *tx)
    .await
    .context("delete_book: references")?;

    let mut people: Vec<i64> = Vec::new();
    for role in [Role::Author, Role::Editor] {
        for link in queries::book_links(&mut *tx, book_id, role).await? {
            if !people.contains(&link.person_id) {
                people.push(link.person_id);
            }
        }

        sqlx::query(queries::clear_links_sql(role))
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("delete_book: {} links", role))?;
    }

    for person in people {
        absorb_in_use(delete_person_in(&mut *tx, person).await)?;
    }

    sqlx::query("DELETE FROM books WHERE book_id = ?")
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .context("delete_book")?;

    absorb_in_use(delete_publisher_in(&mut *tx, refs.publisher_id).await)?;
    if let Some(series) = refs.series_id {
        absorb_in_use(delete_series_in(&mut *tx, series).await)?;
    }

    tx.commit().await.context("delete_book: commit")?;

    info!(book_id, title = %book.title, "deleted book");
    Ok(book)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;
    use crate::storage::queries::{add_book, count_all_books, list_people, list_publishers, list_series};

    fn book(title: &str, authors: &str, publisher: &str) -> NewBook {
        let mut book = NewBook::new(title.to_string(), publisher.to_string(), "Owned".to_string());
        book.author = NameList::parse(authors);
        book
    }

    #[tokio::test]
    async fn test_delete_book_removes_orphans() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        let mut only = book("Paul and the Faithfulness of God", "N. T. Wright", "Fortress");
        only.series = Some("Christian Origins and the Question of God".to_string());
        only.editor = NameList::parse("N. T. Wright");
        let book_id = add_book(pool, &only).await.unwrap();

        let deleted = delete_book(pool, book_id).await.unwrap();
        assert_eq!(deleted.title, "Paul and the Faithfulness of God");

        assert_eq!(count_all_books(pool).await.unwrap(), 0);
        assert!(list_people(pool).await.unwrap().is_empty());
        assert!(list_publishers(pool).await.unwrap().is_empty());
        assert!(list_series(pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_book_keeps_shared() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        let first = add_book(pool, &book("Old Testament Theology", "Paul R. House and Solo Author", "IVP")).await.unwrap();
        let second = add_book(pool, &book("Zephaniah", "Paul R. House", "IVP")).await.unwrap();

        delete_book(pool, first).await.unwrap();

        let people: Vec<String> = list_people(pool).await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(people, vec!["Paul R. House"]);
        assert_eq!(list_publishers(pool).await.unwrap().len(), 1);
        assert!(queries::book_exists(pool, second).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_unknown_book() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let err = delete_book(db.pool(), 7).await.unwrap_err();
        assert!(err.is_unknown(EntityKind::Book));
    }

    #[tokio::test]
    async fn test_in_use_protection() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        let mut new_book = book("Romans", "Douglas J. Moo", "Eerdmans");
        new_book.series = Some("NICNT".to_string());
        let book_id = add_book(pool, &new_book).await.unwrap();
        let before = queries::get_book(pool, book_id).await.unwrap();

        let moo = queries::find_person_by_name(pool, "Douglas J. Moo").await.unwrap().unwrap();
        let err = delete_person(pool, moo).await.unwrap_err();
        match err {
            CatalogError::InUse { kind, id, name, books } => {
                assert_eq!(kind, EntityKind::Person);
                assert_eq!(id, moo);
                assert_eq!(name, "Douglas J. Moo");
                assert_eq!(books, vec![book_id]);
            }
            other => panic!("expected InUse, got {:?}", other),
        }

        let eerdmans = queries::find_publisher_by_name(pool, "Eerdmans").await.unwrap().unwrap();
        assert!(delete_publisher(pool, eerdmans).await.unwrap_err().is_in_use());

        let nicnt = queries::find_series_by_name(pool, "NICNT").await.unwrap().unwrap();
        assert!(delete_series(pool, nicnt).await.unwrap_err().is_in_use());

        assert!(queries::person_exists(pool, moo).await.unwrap());
        assert_eq!(queries::get_book(pool, book_id).await.unwrap(), before);
        assert!(delete_person(pool, 999).await.unwrap_err().is_unknown(EntityKind::Person));
    }

    #[tokio::test]
    async fn test_delete_unreferenced_person() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        let book_id = add_book(pool, &book("Institutes", "John Calvin and Ford Lewis Battles", "Westminster")).await.unwrap();
        crate::storage::updates::update_book_author(pool, book_id, "John Calvin").await.unwrap();

        let battles = queries::find_person_by_name(pool, "Ford Lewis Battles").await.unwrap().unwrap();
        delete_person(pool, battles).await.unwrap();
        assert!(!queries::person_exists(pool, battles).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_book_rolls_back_on_error() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        let book_id = add_book(pool, &book("Orthodoxy", "G. K. Chesterton", "John Lane")).await.unwrap();

        sqlx::query(
            "CREATE TRIGGER refuse_publisher_delete BEFORE DELETE ON publishers \
             BEGIN SELECT RAISE(ABORT, 'publisher delete refused'); END",
        )
        .execute(pool)
        .await
        .unwrap();

        assert!(delete_book(pool, book_id).await.unwrap_err().is_store_error());

        let restored = queries::get_book(pool, book_id).await.unwrap();
        assert_eq!(restored.author.to_string(), "G. K. Chesterton");
        assert_eq!(list_people(pool).await.unwrap().len(), 1);
    }
}
