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


//! Book and lookup-table updates
//!
//! Every update writes, reads the value back and compares it with what was
//! requested. A mismatch is reported as `ConsistencyCheck`; the write itself
//! is not undone.

use crate::error::{CatalogError, Result, StoreContext};
use crate::storage::models::*;
use crate::storage::queries::{
    self, clear_links_sql, ensure_book, link_people, people_of_book, unlink_sql,
};
use sqlx::{Sqlite, SqlitePool};
use std::fmt::Debug;
use tracing::{debug, warn};

// ============================================================================
// AUTHOR / EDITOR RECONCILIATION
// ============================================================================

/// Replace a book's authors with the formatted list `names`
pub async fn update_book_author(pool: &SqlitePool, book_id: i64, names: &str) -> Result<String> {
    update_book_people(pool, book_id, Role::Author, names).await
}

/// Replace a book's editors with the formatted list `names`
pub async fn update_book_editor(pool: &SqlitePool, book_id: i64, names: &str) -> Result<String> {
    update_book_people(pool, book_id, Role::Editor, names).await
}

/// Make the book's links for `role` match `names`, in order
///
/// Only the difference is written: new names are linked (creating people as
/// needed), dropped names are unlinked. People left without books are kept.
/// Returns the stored list, formatted.
pub async fn update_book_people(
    pool: &SqlitePool,
    book_id: i64,
    role: Role,
    names: &str,
) -> Result<String> {
    let requested = NameList::parse(names);
    if let Some(name) = requested.find_repeated() {
        return Err(CatalogError::invalid_input(format!(
            "{} '{}' listed twice",
            role, name
        )));
    }

    let mut tx = pool.begin().await.context("update_book_people: begin")?;
    ensure_book(&mut *tx, book_id).await?;

    let current = people_of_book(&mut *tx, book_id, role).await?;

    let added: Vec<String> = requested
        .iter()
        .filter(|name| !current.contains(name))
        .cloned()
        .collect();
    let removed: Vec<&String> = current
        .iter()
        .filter(|name| !requested.contains(name))
        .collect();

    debug!(book_id, %role, added = added.len(), removed = removed.len(), "reconciling");

    link_people(&mut *tx, book_id, role, &added).await?;

    for name in removed {
        // Linked names always resolve; a miss means there is nothing to unlink
        if let Some(person) = queries::find_person_by_name(&mut *tx, name).await? {
            sqlx::query(unlink_sql(role))
                .bind(book_id)
                .bind(person)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("unlinking {} '{}' from book #{}", role, name, book_id))?;
        }
    }

    // Surviving links keep their old position; relink when the order changed
    let surviving = people_of_book(&mut *tx, book_id, role).await?;
    if surviving.as_slice() != requested.names() {
        sqlx::query(clear_links_sql(role))
            .bind(book_id)
            .execute(&mut *tx)
            .await
            .context("update_book_people: reorder")?;
        link_people(&mut *tx, book_id, role, requested.names()).await?;
    }

    tx.commit().await.context("update_book_people: commit")?;

    let mut conn = pool.acquire().await?;
    let stored = NameList::new(people_of_book(&mut *conn, book_id, role).await?).to_string();
    if stored != names {
        let operation = format!("update_book_{}", role);
        warn!(book_id, expected = names, actual = %stored, "{} read-back mismatch", operation);
        return Err(CatalogError::mismatch(operation, names, stored));
    }

    Ok(stored)
}

// ============================================================================
// SCALAR BOOK COLUMNS
// ============================================================================

/// Book columns updated in place, with their write and read-back statements
#[derive(Debug, Clone, Copy)]
enum BookColumn {
    Title,
    Subtitle,
    Year,
    Edition,
    Isbn,
    Status,
    PurchasedDate,
    PublisherId,
    SeriesId,
}

impl BookColumn {
    fn update_sql(self) -> &'static str {
        match self {
            BookColumn::Title => "UPDATE books SET title = ? WHERE book_id = ?",
            BookColumn::Subtitle => "UPDATE books SET subtitle = ? WHERE book_id = ?",
            BookColumn::Year => "UPDATE books SET year = ? WHERE book_id = ?",
            BookColumn::Edition => "UPDATE books SET edition = ? WHERE book_id = ?",
            BookColumn::Isbn => "UPDATE books SET isbn = ? WHERE book_id = ?",
            BookColumn::Status => "UPDATE books SET status = ? WHERE book_id = ?",
            BookColumn::PurchasedDate => "UPDATE books SET purchased_date = ? WHERE book_id = ?",
            BookColumn::PublisherId => "UPDATE books SET publisher_id = ? WHERE book_id = ?",
            BookColumn::SeriesId => "UPDATE books SET series_id = ? WHERE book_id = ?",
        }
    }

    fn select_sql(self) -> &'static str {
        match self {
            BookColumn::Title => "SELECT title FROM books WHERE book_id = ?",
            BookColumn::Subtitle => "SELECT subtitle FROM books WHERE book_id = ?",
            BookColumn::Year => "SELECT year FROM books WHERE book_id = ?",
            BookColumn::Edition => "SELECT edition FROM books WHERE book_id = ?",
            BookColumn::Isbn => "SELECT isbn FROM books WHERE book_id = ?",
            BookColumn::Status => "SELECT status FROM books WHERE book_id = ?",
            BookColumn::PurchasedDate => "SELECT purchased_date FROM books WHERE book_id = ?",
            BookColumn::PublisherId => "SELECT publisher_id FROM books WHERE book_id = ?",
            BookColumn::SeriesId => "SELECT series_id FROM books WHERE book_id = ?",
        }
    }

    fn operation(self) -> &'static str {
        match self {
            BookColumn::Title => "update_book_title",
            BookColumn::Subtitle => "update_book_subtitle",
            BookColumn::Year => "update_book_year",
            BookColumn::Edition => "update_book_edition",
            BookColumn::Isbn => "update_book_isbn",
            BookColumn::Status => "update_book_status",
            BookColumn::PurchasedDate => "update_book_purchase_date",
            BookColumn::PublisherId => "update_book_publisher",
            BookColumn::SeriesId => "update_book_series",
        }
    }
}

/// Write one column of an existing book and return what was read back
async fn set_book_column<T>(pool: &SqlitePool, book_id: i64, column: BookColumn, value: T) -> Result<T>
where
    T: for<'q> sqlx::Encode<'q, Sqlite>
        + for<'r> sqlx::Decode<'r, Sqlite>
        + sqlx::Type<Sqlite>
        + PartialEq
        + Debug
        + Clone
        + Send
        + Unpin
        + 'static,
{
    let operation = column.operation();
    let mut conn = pool.acquire().await?;
    ensure_book(&mut *conn, book_id).await?;

    sqlx::query(column.update_sql())
        .bind(value.clone())
        .bind(book_id)
        .execute(&mut *conn)
        .await
        .context(operation)?;

    let stored: T = sqlx::query_scalar(column.select_sql())
        .bind(book_id)
        .fetch_one(&mut *conn)
        .await
        .context(operation)?;

    if stored != value {
        warn!(book_id, ?value, ?stored, "{} read-back mismatch", operation);
        return Err(CatalogError::mismatch(
            operation,
            format!("{:?}", value),
            format!("{:?}", stored),
        ));
    }

    debug!(book_id, ?stored, "{}", operation);
    Ok(stored)
}

pub async fn update_book_title(pool: &SqlitePool, book_id: i64, title: &str) -> Result<String> {
    if title.is_empty() {
        return Err(CatalogError::invalid_input("book title must not be empty"));
    }
    set_book_column(pool, book_id, BookColumn::Title, title.to_string()).await
}

/// `""` clears the subtitle
pub async fn update_book_subtitle(
    pool: &SqlitePool,
    book_id: i64,
    subtitle: &str,
) -> Result<Option<String>> {
    let value = non_empty(Some(subtitle)).map(String::from);
    set_book_column(pool, book_id, BookColumn::Subtitle, value).await
}

pub async fn update_book_year(pool: &SqlitePool, book_id: i64, year: Option<i32>) -> Result<Option<i32>> {
    set_book_column(pool, book_id, BookColumn::Year, year).await
}

/// `None` or `Some(0)` clears the edition; negative editions are rejected
pub async fn update_book_edition(
    pool: &SqlitePool,
    book_id: i64,
    edition: Option<i64>,
) -> Result<Option<i64>> {
    if let Some(e) = edition.filter(|e| *e < 0) {
        return Err(CatalogError::invalid_input(format!(
            "edition must be positive, got {}",
            e
        )));
    }
    set_book_column(pool, book_id, BookColumn::Edition, non_zero(edition)).await
}

/// `""` clears the ISBN
pub async fn update_book_isbn(pool: &SqlitePool, book_id: i64, isbn: &str) -> Result<Option<String>> {
    let value = non_empty(Some(isbn)).map(String::from);
    set_book_column(pool, book_id, BookColumn::Isbn, value).await
}

pub async fn update_book_status(pool: &SqlitePool, book_id: i64, status: &str) -> Result<String> {
    if status.is_empty() {
        return Err(CatalogError::invalid_input("book status must not be empty"));
    }
    set_book_column(pool, book_id, BookColumn::Status, status.to_string()).await
}

pub async fn update_book_purchase_date(
    pool: &SqlitePool,
    book_id: i64,
    date: Option<PurchasedDate>,
) -> Result<Option<PurchasedDate>> {
    set_book_column(
        pool,
        book_id,
        BookColumn::PurchasedDate,
        date.map(|d| d.to_string()),
    )
    .await?;

    Ok(date)
}

// ============================================================================
// PUBLISHER / SERIES OF A BOOK
// ============================================================================

/// Point the book at an existing publisher; returns the publisher's name
pub async fn update_book_publisher_by_id(
    pool: &SqlitePool,
    book_id: i64,
    publisher_id: i64,
) -> Result<String> {
    if !queries::publisher_exists(pool, publisher_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Publisher, publisher_id));
    }

    let stored = set_book_column(pool, book_id, BookColumn::PublisherId, publisher_id).await?;
    queries::publisher_name(pool, stored).await
}

/// Point the book at the named publisher, creating it if needed
pub async fn update_book_publisher_by_name(
    pool: &SqlitePool,
    book_id: i64,
    name: &str,
) -> Result<String> {
    if name.is_empty() {
        return Err(CatalogError::invalid_input("publisher name must not be empty"));
    }
    if !queries::book_exists(pool, book_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Book, book_id));
    }

    let mut tx = pool.begin().await.context("update_book_publisher_by_name: begin")?;
    let publisher = queries::publisher_id(&mut *tx, name).await?;
    sqlx::query(BookColumn::PublisherId.update_sql())
        .bind(publisher)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .context("update_book_publisher_by_name")?;
    tx.commit().await.context("update_book_publisher_by_name: commit")?;

    let stored = queries::get_book(pool, book_id).await?.publisher;
    if stored != name {
        warn!(book_id, expected = name, actual = %stored, "publisher read-back mismatch");
        return Err(CatalogError::mismatch("update_book_publisher_by_name", name, stored));
    }

    Ok(stored)
}

/// Set or clear (`None`) the book's series; returns the series name
pub async fn update_book_series_by_id(
    pool: &SqlitePool,
    book_id: i64,
    series_id: Option<i64>,
) -> Result<Option<String>> {
    if let Some(id) = series_id {
        if !queries::series_exists(pool, id).await? {
            return Err(CatalogError::unknown_id(EntityKind::Series, id));
        }
    }

    match set_book_column(pool, book_id, BookColumn::SeriesId, series_id).await? {
        Some(id) => Ok(Some(queries::series_name(pool, id).await?)),
        None => Ok(None),
    }
}

/// Put the book in the named series (created if needed); `""` clears it
pub async fn update_book_series_by_name(
    pool: &SqlitePool,
    book_id: i64,
    name: &str,
) -> Result<Option<String>> {
    if name.is_empty() {
        return update_book_series_by_id(pool, book_id, None).await;
    }
    if !queries::book_exists(pool, book_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Book, book_id));
    }

    let mut tx = pool.begin().await.context("update_book_series_by_name: begin")?;
    let series = queries::series_id(&mut *tx, name).await?;
    sqlx::query(BookColumn::SeriesId.update_sql())
        .bind(series)
        .bind(book_id)
        .execute(&mut *tx)
        .await
        .context("update_book_series_by_name")?;
    tx.commit().await.context("update_book_series_by_name: commit")?;

    let stored = queries::get_book(pool, book_id).await?.series;
    if stored.as_deref() != Some(name) {
        let actual = stored.unwrap_or_default();
        warn!(book_id, expected = name, actual = %actual, "series read-back mismatch");
        return Err(CatalogError::mismatch("update_book_series_by_name", name, actual));
    }

    Ok(stored)
}

// ============================================================================
// RENAMES
// ============================================================================

pub async fn update_person_name(pool: &SqlitePool, person_id: i64, name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(CatalogError::invalid_input("person name must not be empty"));
    }
    if !queries::person_exists(pool, person_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Person, person_id));
    }
    if let Some(other) = queries::find_person_by_name(pool, name).await? {
        if other != person_id {
            return Err(CatalogError::NameAlreadyExists {
                kind: EntityKind::Person,
                name: name.to_string(),
            });
        }
    }

    sqlx::query("UPDATE people SET name = ? WHERE person_id = ?")
        .bind(name)
        .bind(person_id)
        .execute(pool)
        .await
        .context("update_person_name")?;

    let stored = queries::person_name(pool, person_id).await?;
    if stored != name {
        return Err(CatalogError::mismatch("update_person_name", name, stored));
    }

    Ok(stored)
}

pub async fn update_publisher_name(pool: &SqlitePool, publisher_id: i64, name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(CatalogError::invalid_input("publisher name must not be empty"));
    }
    if !queries::publisher_exists(pool, publisher_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Publisher, publisher_id));
    }
    if let Some(other) = queries::find_publisher_by_name(pool, name).await? {
        if other != publisher_id {
            return Err(CatalogError::NameAlreadyExists {
                kind: EntityKind::Publisher,
                name: name.to_string(),
            });
        }
    }

    sqlx::query("UPDATE publishers SET name = ? WHERE publisher_id = ?")
        .bind(name)
        .bind(publisher_id)
        .execute(pool)
        .await
        .context("update_publisher_name")?;

    let stored = queries::publisher_name(pool, publisher_id).await?;
    if stored != name {
        return Err(CatalogError::mismatch("update_publisher_name", name, stored));
    }

    Ok(stored)
}

pub async fn update_series_name(pool: &SqlitePool, series_id: i64, name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(CatalogError::invalid_input("series name must not be empty"));
    }
    if !queries::series_exists(pool, series_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Series, series_id));
    }
    if let Some(other) = queries::find_series_by_name(pool, name).await? {
        if other != series_id {
            return Err(CatalogError::NameAlreadyExists {
                kind: EntityKind::Series,
                name: name.to_string(),
            });
        }
    }

    sqlx::query("UPDATE series SET series_name = ? WHERE series_id = ?")
        .bind(name)
        .bind(series_id)
        .execute(pool)
        .await
        .context("update_series_name")?;

    let stored = queries::series_name(pool, series_id).await?;
    if stored != name {
        return Err(CatalogError::mismatch("update_series_name", name, stored));
    }

    Ok(stored)
}
