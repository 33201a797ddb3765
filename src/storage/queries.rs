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


//! Catalogue queries
//!
//! Lookups, the get-or-create resolver, book retrieval and book creation.
//!
//! # Handles
//! - Read helpers take any `A: Acquire<'_, Database = Sqlite>`, so they run
//!   on the pool or on a connection/transaction the caller already holds
//! - The resolver writes, so it takes `&mut SqliteConnection`
//!   (pass `&mut *tx` inside a transaction)
//! - Whole operations (`add_book`, counts, listings) take the pool

use crate::error::{CatalogError, Result, StoreContext};
use crate::storage::models::*;
use sqlx::{Acquire, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

// ============================================================================
// ROLE SQL
// ============================================================================

pub(crate) fn people_of_book_sql(role: Role) -> &'static str {
    match role {
        Role::Author => {
            "SELECT people.name FROM book_author \
             INNER JOIN people ON people.person_id = book_author.author_id \
             WHERE book_author.book_id = ? ORDER BY book_author.rowid"
        }
        Role::Editor => {
            "SELECT people.name FROM book_editor \
             INNER JOIN people ON people.person_id = book_editor.editor_id \
             WHERE book_editor.book_id = ? ORDER BY book_editor.rowid"
        }
    }
}

pub(crate) fn link_sql(role: Role) -> &'static str {
    match role {
        Role::Author => "INSERT INTO book_author (book_id, author_id) VALUES (?, ?)",
        Role::Editor => "INSERT INTO book_editor (book_id, editor_id) VALUES (?, ?)",
    }
}

pub(crate) fn unlink_sql(role: Role) -> &'static str {
    match role {
        Role::Author => "DELETE FROM book_author WHERE book_id = ? AND author_id = ?",
        Role::Editor => "DELETE FROM book_editor WHERE book_id = ? AND editor_id = ?",
    }
}

pub(crate) fn clear_links_sql(role: Role) -> &'static str {
    match role {
        Role::Author => "DELETE FROM book_author WHERE book_id = ?",
        Role::Editor => "DELETE FROM book_editor WHERE book_id = ?",
    }
}

fn links_sql(role: Role) -> &'static str {
    match role {
        Role::Author => {
            "SELECT book_id, author_id AS person_id FROM book_author WHERE book_id = ? ORDER BY rowid"
        }
        Role::Editor => {
            "SELECT book_id, editor_id AS person_id FROM book_editor WHERE book_id = ? ORDER BY rowid"
        }
    }
}

// ============================================================================
// ENTITY RESOLVER (get-or-create by name)
// ============================================================================

/// Shared shape of the three resolvers
async fn get_or_create(
    conn: &mut SqliteConnection,
    kind: EntityKind,
    select_sql: &'static str,
    insert_sql: &'static str,
    name: &str,
) -> Result<i64> {
    if name.is_empty() {
        return Err(CatalogError::invalid_input(format!(
            "{} name must not be empty",
            kind.label()
        )));
    }

    let existing: Option<i64> = sqlx::query_scalar(select_sql)
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .with_context(|| format!("looking up {} '{}'", kind, name))?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let result = sqlx::query(insert_sql)
        .bind(name)
        .execute(&mut *conn)
        .await
        .with_context(|| format!("creating {} '{}'", kind, name))?;

    let id = result.last_insert_rowid();
    debug!(%kind, id, entity = name, "created");
    Ok(id)
}

/// Id of the person with this exact name, inserting them if needed
pub async fn person_id(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    get_or_create(
        conn,
        EntityKind::Person,
        "SELECT person_id FROM people WHERE name = ?",
        "INSERT INTO people (name) VALUES (?)",
        name,
    )
    .await
}

/// Id of the publisher with this exact name, inserting it if needed
pub async fn publisher_id(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    get_or_create(
        conn,
        EntityKind::Publisher,
        "SELECT publisher_id FROM publishers WHERE name = ?",
        "INSERT INTO publishers (name) VALUES (?)",
        name,
    )
    .await
}

/// Id of the series with this exact name, inserting it if needed
pub async fn series_id(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    get_or_create(
        conn,
        EntityKind::Series,
        "SELECT series_id FROM series WHERE series_name = ?",
        "INSERT INTO series (series_name) VALUES (?)",
        name,
    )
    .await
}

pub async fn find_person_by_name<'a, A>(db: A, name: &str) -> Result<Option<i64>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    sqlx::query_scalar("SELECT person_id FROM people WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .context("find_person_by_name")
}

pub async fn find_publisher_by_name<'a, A>(db: A, name: &str) -> Result<Option<i64>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    sqlx::query_scalar("SELECT publisher_id FROM publishers WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .context("find_publisher_by_name")
}

pub async fn find_series_by_name<'a, A>(db: A, name: &str) -> Result<Option<i64>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    sqlx::query_scalar("SELECT series_id FROM series WHERE series_name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .context("find_series_by_name")
}

// ============================================================================
// EXISTENCE CHECKS
// ============================================================================

async fn count_where_id<'a, A>(db: A, sql: &'static str, id: i64) -> Result<bool>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    let count: i64 = sqlx::query_scalar(sql)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .context(sql)?;

    Ok(count > 0)
}

pub async fn book_exists<'a, A>(db: A, book_id: i64) -> Result<bool>
where
    A: Acquire<'a, Database = Sqlite>,
{
    count_where_id(db, "SELECT COUNT(*) FROM books WHERE book_id = ?", book_id).await
}

pub async fn person_exists<'a, A>(db: A, person_id: i64) -> Result<bool>
where
    A: Acquire<'a, Database = Sqlite>,
{
    count_where_id(db, "SELECT COUNT(*) FROM people WHERE person_id = ?", person_id).await
}

pub async fn publisher_exists<'a, A>(db: A, publisher_id: i64) -> Result<bool>
where
    A: Acquire<'a, Database = Sqlite>,
{
    count_where_id(
        db,
        "SELECT COUNT(*) FROM publishers WHERE publisher_id = ?",
        publisher_id,
    )
    .await
}

pub async fn series_exists<'a, A>(db: A, series_id: i64) -> Result<bool>
where
    A: Acquire<'a, Database = Sqlite>,
{
    count_where_id(db, "SELECT COUNT(*) FROM series WHERE series_id = ?", series_id).await
}

/// `UnknownId` unless the book exists
pub(crate) async fn ensure_book(conn: &mut SqliteConnection, book_id: i64) -> Result<()> {
    if book_exists(&mut *conn, book_id).await? {
        Ok(())
    } else {
        Err(CatalogError::unknown_id(EntityKind::Book, book_id))
    }
}

// ============================================================================
// REVERSE LOOKUPS
// ============================================================================

pub async fn person_name<'a, A>(db: A, person_id: i64) -> Result<String>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    if !person_exists(&mut *conn, person_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Person, person_id));
    }

    sqlx::query_scalar("SELECT name FROM people WHERE person_id = ?")
        .bind(person_id)
        .fetch_one(&mut *conn)
        .await
        .context("person_name")
}

pub async fn publisher_name<'a, A>(db: A, publisher_id: i64) -> Result<String>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    if !publisher_exists(&mut *conn, publisher_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Publisher, publisher_id));
    }

    sqlx::query_scalar("SELECT name FROM publishers WHERE publisher_id = ?")
        .bind(publisher_id)
        .fetch_one(&mut *conn)
        .await
        .context("publisher_name")
}

pub async fn series_name<'a, A>(db: A, series_id: i64) -> Result<String>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    if !series_exists(&mut *conn, series_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Series, series_id));
    }

    sqlx::query_scalar("SELECT series_name FROM series WHERE series_id = ?")
        .bind(series_id)
        .fetch_one(&mut *conn)
        .await
        .context("series_name")
}

/// Books the person authored or edited, ascending, each id once
pub async fn books_by_person<'a, A>(db: A, person_id: i64) -> Result<Vec<i64>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    if !person_exists(&mut *conn, person_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Person, person_id));
    }

    sqlx::query_scalar(
        r#"
        SELECT book_id FROM book_author WHERE author_id = ?
        UNION
        SELECT book_id FROM book_editor WHERE editor_id = ?
        ORDER BY book_id
        "#,
    )
    .bind(person_id)
    .bind(person_id)
    .fetch_all(&mut *conn)
    .await
    .context("books_by_person")
}

pub async fn publisher_books<'a, A>(db: A, publisher_id: i64) -> Result<Vec<i64>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    if !publisher_exists(&mut *conn, publisher_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Publisher, publisher_id));
    }

    sqlx::query_scalar("SELECT book_id FROM books WHERE publisher_id = ? ORDER BY book_id")
        .bind(publisher_id)
        .fetch_all(&mut *conn)
        .await
        .context("publisher_books")
}

pub async fn series_books<'a, A>(db: A, series_id: i64) -> Result<Vec<i64>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    if !series_exists(&mut *conn, series_id).await? {
        return Err(CatalogError::unknown_id(EntityKind::Series, series_id));
    }

    sqlx::query_scalar("SELECT book_id FROM books WHERE series_id = ? ORDER BY book_id")
        .bind(series_id)
        .fetch_all(&mut *conn)
        .await
        .context("series_books")
}

/// Names linked to a book in one role, in link order. No existence check.
pub(crate) async fn people_of_book(
    conn: &mut SqliteConnection,
    book_id: i64,
    role: Role,
) -> Result<Vec<String>> {
    sqlx::query_scalar(people_of_book_sql(role))
        .bind(book_id)
        .fetch_all(&mut *conn)
        .await
        .with_context(|| format!("reading {}s of book #{}", role, book_id))
}

pub async fn authors_of_book<'a, A>(db: A, book_id: i64) -> Result<Vec<String>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    ensure_book(&mut *conn, book_id).await?;
    people_of_book(&mut *conn, book_id, Role::Author).await
}

pub async fn editors_of_book<'a, A>(db: A, book_id: i64) -> Result<Vec<String>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    ensure_book(&mut *conn, book_id).await?;
    people_of_book(&mut *conn, book_id, Role::Editor).await
}

/// Link rows for one role of a book, in link order
pub async fn book_links<'a, A>(db: A, book_id: i64, role: Role) -> Result<Vec<BookLink>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    sqlx::query_as::<_, BookLink>(links_sql(role))
        .bind(book_id)
        .fetch_all(&mut *conn)
        .await
        .context("book_links")
}

// ============================================================================
// LOOKUP TABLE LISTINGS
// ============================================================================

pub async fn list_people(pool: &SqlitePool) -> Result<Vec<Person>> {
    sqlx::query_as::<_, Person>("SELECT person_id, name FROM people ORDER BY name")
        .fetch_all(pool)
        .await
        .context("list_people")
}

pub async fn list_publishers(pool: &SqlitePool) -> Result<Vec<Publisher>> {
    sqlx::query_as::<_, Publisher>("SELECT publisher_id, name FROM publishers ORDER BY name")
        .fetch_all(pool)
        .await
        .context("list_publishers")
}

pub async fn list_series(pool: &SqlitePool) -> Result<Vec<Series>> {
    sqlx::query_as::<_, Series>("SELECT series_id, series_name FROM series ORDER BY series_name")
        .fetch_all(pool)
        .await
        .context("list_series")
}

// ============================================================================
// BOOK QUERIES
// ============================================================================

/// Scalar columns of a book with publisher/series resolved to names
#[derive(Debug, sqlx::FromRow)]
struct BookRow {
    book_id: i64,
    title: String,
    subtitle: Option<String>,
    year: Option<i32>,
    edition: Option<i64>,
    publisher: String,
    isbn: Option<String>,
    series: Option<String>,
    status: String,
    purchased_date: Option<String>,
}

/// Fetch a book with authors, editors, publisher and series filled in
pub async fn get_book<'a, A>(db: A, book_id: i64) -> Result<Book>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;
    ensure_book(&mut *conn, book_id).await?;

    let row = sqlx::query_as::<_, BookRow>(
        r#"
        SELECT books.book_id, books.title, books.subtitle, books.year, books.edition,
               publishers.name AS publisher, books.isbn,
               series.series_name AS series, books.status, books.purchased_date
        FROM books
        INNER JOIN publishers ON publishers.publisher_id = books.publisher_id
        LEFT JOIN series ON series.series_id = books.series_id
        WHERE books.book_id = ?
        "#,
    )
    .bind(book_id)
    .fetch_optional(&mut *conn)
    .await
    .context("get_book")?
    .ok_or_else(|| {
        CatalogError::InvalidState(format!("book #{} has no publisher row", book_id))
    })?;

    let purchased = row
        .purchased_date
        .as_deref()
        .map(str::parse::<PurchasedDate>)
        .transpose()
        .map_err(|e| {
            CatalogError::InvalidState(format!("book #{} has unreadable purchase date: {}", book_id, e))
        })?;

    let author = NameList::new(people_of_book(&mut *conn, book_id, Role::Author).await?);
    let editor = NameList::new(people_of_book(&mut *conn, book_id, Role::Editor).await?);

    Ok(Book {
        book_id: row.book_id,
        author,
        editor,
        title: row.title,
        subtitle: row.subtitle,
        year: row.year,
        edition: row.edition,
        publisher: row.publisher,
        isbn: row.isbn,
        series: row.series,
        status: row.status,
        purchased,
    })
}

pub async fn count_all_books(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM books")
        .fetch_one(pool)
        .await
        .context("count_all_books")
}

/// Number of books whose status is exactly `status`
pub async fn count_books_by_status(pool: &SqlitePool, status: &str) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE status = ?")
        .bind(status)
        .fetch_one(pool)
        .await
        .context("count_books_by_status")
}

/// Every status in use with its book count, most common first
pub async fn status_counts(pool: &SqlitePool) -> Result<Vec<(String, i64)>> {
    sqlx::query_as::<_, (String, i64)>(
        "SELECT status, COUNT(*) AS n FROM books GROUP BY status ORDER BY n DESC, status",
    )
    .fetch_all(pool)
    .await
    .context("status_counts")
}

pub async fn list_book_ids(pool: &SqlitePool) -> Result<Vec<i64>> {
    sqlx::query_scalar("SELECT book_id FROM books ORDER BY book_id")
        .fetch_all(pool)
        .await
        .context("list_book_ids")
}

/// All books, hydrated, ascending id
pub async fn list_books(pool: &SqlitePool) -> Result<Vec<Book>> {
    let mut conn = pool.acquire().await?;
    let ids: Vec<i64> = sqlx::query_scalar("SELECT book_id FROM books ORDER BY book_id")
        .fetch_all(&mut *conn)
        .await
        .context("list_books")?;

    let mut books = Vec::with_capacity(ids.len());
    for id in ids {
        books.push(get_book(&mut *conn, id).await?);
    }

    Ok(books)
}

// ============================================================================
// BOOK CREATION
// ============================================================================

fn validate_new_book(book: &NewBook) -> Result<()> {
    if book.title.is_empty() {
        return Err(CatalogError::invalid_input("book title must not be empty"));
    }
    if book.status.is_empty() {
        return Err(CatalogError::invalid_input("book status must not be empty"));
    }
    if book.publisher.is_empty() {
        return Err(CatalogError::invalid_input("book publisher must not be empty"));
    }
    if let Some(edition) = book.edition {
        if edition < 0 {
            return Err(CatalogError::invalid_input(format!(
                "edition must be positive, got {}",
                edition
            )));
        }
    }
    for (role, names) in [(Role::Author, &book.author), (Role::Editor, &book.editor)] {
        if let Some(name) = names.find_repeated() {
            return Err(CatalogError::invalid_input(format!(
                "{} '{}' listed twice",
                role, name
            )));
        }
        if names.iter().any(|n| n.is_empty()) {
            return Err(CatalogError::invalid_input(format!("empty {} name", role)));
        }
    }

    Ok(())
}

/// Stored book with the same title whose authors include the candidate's
/// first author, or whose editors include the candidate's first editor
pub async fn find_duplicate<'a, A>(db: A, book: &NewBook) -> Result<Option<i64>>
where
    A: Acquire<'a, Database = Sqlite>,
{
    let mut conn = db.acquire().await?;

    // An absent first name binds NULL, which matches nothing
    sqlx::query_scalar(
        r#"
        SELECT books.book_id AS book_id FROM books
        INNER JOIN book_author ON book_author.book_id = books.book_id
        INNER JOIN people ON people.person_id = book_author.author_id
        WHERE books.title = ? AND people.name = ?
        UNION
        SELECT books.book_id AS book_id FROM books
        INNER JOIN book_editor ON book_editor.book_id = books.book_id
        INNER JOIN people ON people.person_id = book_editor.editor_id
        WHERE books.title = ? AND people.name = ?
        ORDER BY 1
        LIMIT 1
        "#,
    )
    .bind(&book.title)
    .bind(book.author.first())
    .bind(&book.title)
    .bind(book.editor.first())
    .fetch_optional(&mut *conn)
    .await
    .context("find_duplicate")
}

/// Insert a link row for every name, resolving (or creating) each person
pub(crate) async fn link_people(
    conn: &mut SqliteConnection,
    book_id: i64,
    role: Role,
    names: &[String],
) -> Result<()> {
    for name in names {
        let person = person_id(&mut *conn, name).await?;
        sqlx::query(link_sql(role))
            .bind(book_id)
            .bind(person)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("linking {} '{}' to book #{}", role, name, book_id))?;
    }

    Ok(())
}

/// Add a book, creating any people, publisher and series it names
///
/// Returns the new `book_id`. Nothing is written if the book is a duplicate,
/// and a failure part-way through leaves no trace.
pub async fn add_book(pool: &SqlitePool, book: &NewBook) -> Result<i64> {
    validate_new_book(book)?;

    if let Some(existing_id) = find_duplicate(pool, book).await? {
        return Err(CatalogError::DuplicateBook {
            title: book.title.clone(),
            existing_id,
        });
    }

    let mut tx = pool.begin().await.context("add_book: begin")?;

    let publisher = publisher_id(&mut *tx, &book.publisher).await?;
    let series = match non_empty(book.series.as_deref()) {
        Some(name) => Some(series_id(&mut *tx, name).await?),
        None => None,
    };

    let result = sqlx::query(
        r#"
        INSERT INTO books (
            title, subtitle, year, edition, publisher_id,
            isbn, series_id, status, purchased_date
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&book.title)
    .bind(non_empty(book.subtitle.as_deref()))
    .bind(book.year)
    .bind(non_zero(book.edition))
    .bind(publisher)
    .bind(non_empty(book.isbn.as_deref()))
    .bind(series)
    .bind(&book.status)
    .bind(book.purchased.map(|d| d.to_string()))
    .execute(&mut *tx)
    .await
    .context("add_book: insert")?;

    let book_id = result.last_insert_rowid();

    link_people(&mut *tx, book_id, Role::Author, book.author.names()).await?;
    link_people(&mut *tx, book_id, Role::Editor, book.editor.names()).await?;

    tx.commit().await.context("add_book: commit")?;

    info!(book_id, title = %book.title, "added book");
    Ok(book_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::Database;

    fn harrison() -> NewBook {
        let mut book = NewBook::new(
            "Introduction to the Old Testament".to_string(),
            "IVP".to_string(),
            "Owned".to_string(),
        );
        book.author = NameList::parse("R. K. Harrison");
        book.year = Some(1969);
        book
    }

    #[tokio::test]
    async fn test_resolver_is_idempotent() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let mut conn = db.pool().acquire().await.unwrap();

        let first = person_id(&mut *conn, "Simon Gathercole").await.unwrap();
        let second = person_id(&mut *conn, "Simon Gathercole").await.unwrap();
        assert_eq!(first, second);

        let other = person_id(&mut *conn, "N. T. Wright").await.unwrap();
        assert_ne!(first, other);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM people")
            .fetch_one(&mut *conn)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_resolver_rejects_empty_name() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let mut conn = db.pool().acquire().await.unwrap();

        assert!(person_id(&mut *conn, "").await.unwrap_err().is_validation());
        assert!(publisher_id(&mut *conn, "").await.unwrap_err().is_validation());
        assert!(series_id(&mut *conn, "").await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_find_by_name_does_not_create() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        assert_eq!(find_publisher_by_name(db.pool(), "Eerdmans").await.unwrap(), None);
        assert!(list_publishers(db.pool()).await.unwrap().is_empty());

        let mut conn = db.pool().acquire().await.unwrap();
        let id = publisher_id(&mut *conn, "Eerdmans").await.unwrap();
        drop(conn);

        assert_eq!(find_publisher_by_name(db.pool(), "Eerdmans").await.unwrap(), Some(id));
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        assert!(person_name(pool, 9).await.unwrap_err().is_unknown(EntityKind::Person));
        assert!(publisher_name(pool, 9).await.unwrap_err().is_unknown(EntityKind::Publisher));
        assert!(series_name(pool, 9).await.unwrap_err().is_unknown(EntityKind::Series));
        assert!(books_by_person(pool, 9).await.unwrap_err().is_unknown(EntityKind::Person));
        assert!(publisher_books(pool, 9).await.unwrap_err().is_unknown(EntityKind::Publisher));
        assert!(series_books(pool, 9).await.unwrap_err().is_unknown(EntityKind::Series));
        assert!(authors_of_book(pool, 9).await.unwrap_err().is_unknown(EntityKind::Book));
        assert!(get_book(pool, 9).await.unwrap_err().is_unknown(EntityKind::Book));
        assert!(!book_exists(pool, 9).await.unwrap());
    }

    #[tokio::test]
    async fn test_add_and_get_book() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut new_book = NewBook::new(
            "Kingdom through Covenant".to_string(),
            "Crossway".to_string(),
            "Owned".to_string(),
        );
        new_book.author = NameList::parse("Peter J. Gentry and Stephen J. Wellum");
        new_book.subtitle = Some("A Biblical-Theological Understanding of the Covenants".to_string());
        new_book.year = Some(2012);
        new_book.edition = Some(2);
        new_book.series = Some("Biblical Theology".to_string());
        new_book.purchased = Some("December 2021".parse().unwrap());

        let book_id = add_book(db.pool(), &new_book).await.expect("Failed to add book");
        let book = get_book(db.pool(), book_id).await.expect("Failed to get book");

        assert_eq!(book.book_id, book_id);
        assert_eq!(book.author.to_string(), "Peter J. Gentry and Stephen J. Wellum");
        assert!(book.editor.is_empty());
        assert_eq!(book.title, new_book.title);
        assert_eq!(book.subtitle, new_book.subtitle);
        assert_eq!(book.year, Some(2012));
        assert_eq!(book.edition, Some(2));
        assert_eq!(book.publisher, "Crossway");
        assert_eq!(book.isbn, None);
        assert_eq!(book.series.as_deref(), Some("Biblical Theology"));
        assert_eq!(book.status, "Owned");
        assert_eq!(book.purchased, new_book.purchased);
        assert_eq!(NewBook::from(&book).author, new_book.author);
    }

    #[tokio::test]
    async fn test_absent_fields_stored_as_null() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut new_book = harrison();
        new_book.subtitle = Some(String::new());
        new_book.edition = Some(0);
        new_book.isbn = Some(String::new());
        new_book.series = Some(String::new());
        new_book.year = None;

        let book_id = add_book(db.pool(), &new_book).await.unwrap();

        let nulls: i64 = sqlx::query_scalar(
            r#"
            SELECT (subtitle IS NULL) + (year IS NULL) + (edition IS NULL)
                 + (isbn IS NULL) + (series_id IS NULL) + (purchased_date IS NULL)
            FROM books WHERE book_id = ?
            "#,
        )
        .bind(book_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
        assert_eq!(nulls, 6);

        let book = get_book(db.pool(), book_id).await.unwrap();
        assert_eq!(book.to_string(), "R. K. Harrison, Introduction to the Old Testament (n.d.) [Owned]");
        assert!(list_series(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_duplicate_book() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let first = add_book(db.pool(), &harrison()).await.unwrap();

        let err = add_book(db.pool(), &harrison()).await.unwrap_err();
        match err {
            CatalogError::DuplicateBook { existing_id, .. } => assert_eq!(existing_id, first),
            other => panic!("expected DuplicateBook, got {:?}", other),
        }
        assert_eq!(count_all_books(db.pool()).await.unwrap(), 1);

        // Same title, different first author is not a duplicate
        let mut other = harrison();
        other.author = NameList::parse("Tremper Longman III and Raymond B. Dillard");
        add_book(db.pool(), &other).await.expect("distinct author rejected");
    }

    #[tokio::test]
    async fn test_duplicate_by_editor() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut edited = NewBook::new(
            "God and the Problem of Evil".to_string(),
            "IVP Academic".to_string(),
            "Owned".to_string(),
        );
        edited.editor = NameList::parse("Chad Meister and James K. Dew Jr.");
        let first = add_book(db.pool(), &edited).await.unwrap();

        let mut again = edited.clone();
        again.editor = NameList::parse("James K. Dew Jr. and Chad Meister");
        // First editor of the candidate is a stored editor
        let err = add_book(db.pool(), &again).await.unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateBook { existing_id, .. } if existing_id == first));
    }

    #[tokio::test]
    async fn test_duplicate_matching_both_roles_reports_lowest_id() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        let mut by_author = NewBook::new("Romans".to_string(), "Eerdmans".to_string(), "Owned".to_string());
        by_author.author = NameList::parse("Douglas J. Moo");
        let first = add_book(pool, &by_author).await.unwrap();

        let mut by_editor = by_author.clone();
        by_editor.author = NameList::parse("Thomas R. Schreiner");
        by_editor.editor = NameList::parse("Gordon D. Fee");
        let second = add_book(pool, &by_editor).await.unwrap();
        assert!(second > first);

        // Author matches the first book, editor matches the second
        let mut candidate = by_author.clone();
        candidate.editor = NameList::parse("Gordon D. Fee");
        assert_eq!(find_duplicate(pool, &candidate).await.unwrap(), Some(first));

        let mut unrelated = by_author.clone();
        unrelated.author = NameList::parse("N. T. Wright");
        assert_eq!(find_duplicate(pool, &unrelated).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_book_validation() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut no_title = harrison();
        no_title.title.clear();
        assert!(add_book(db.pool(), &no_title).await.unwrap_err().is_validation());

        let mut no_status = harrison();
        no_status.status.clear();
        assert!(add_book(db.pool(), &no_status).await.unwrap_err().is_validation());

        let mut no_publisher = harrison();
        no_publisher.publisher.clear();
        assert!(add_book(db.pool(), &no_publisher).await.unwrap_err().is_validation());

        let mut twice = harrison();
        twice.author = NameList::parse("A. Person, B. Person and A. Person");
        assert!(add_book(db.pool(), &twice).await.unwrap_err().is_validation());

        let mut negative = harrison();
        negative.edition = Some(-1);
        assert!(add_book(db.pool(), &negative).await.unwrap_err().is_validation());

        assert_eq!(count_all_books(db.pool()).await.unwrap(), 0);
        assert!(list_people(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_book_rolls_back_created_rows() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        sqlx::query(
            "CREATE TRIGGER fail_author_link BEFORE INSERT ON book_author \
             BEGIN SELECT RAISE(ABORT, 'link refused'); END",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let err = add_book(db.pool(), &harrison()).await.unwrap_err();
        assert!(err.is_store_error());

        assert_eq!(count_all_books(db.pool()).await.unwrap(), 0);
        assert!(list_people(db.pool()).await.unwrap().is_empty());
        assert!(list_publishers(db.pool()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reverse_lookups() {
        let db = Database::new_in_memory().await.expect("Failed to create database");

        let mut written = harrison();
        written.series = Some("Classic Introductions".to_string());
        let a = add_book(db.pool(), &written).await.unwrap();

        let mut edited = NewBook::new("Festschrift".to_string(), "IVP".to_string(), "Want".to_string());
        edited.editor = NameList::parse("R. K. Harrison");
        let b = add_book(db.pool(), &edited).await.unwrap();

        let pool = db.pool();
        let harrison_id = find_person_by_name(pool, "R. K. Harrison").await.unwrap().unwrap();
        assert_eq!(person_name(pool, harrison_id).await.unwrap(), "R. K. Harrison");
        assert_eq!(books_by_person(pool, harrison_id).await.unwrap(), vec![a, b]);

        let ivp = find_publisher_by_name(pool, "IVP").await.unwrap().unwrap();
        assert_eq!(publisher_name(pool, ivp).await.unwrap(), "IVP");
        assert_eq!(publisher_books(pool, ivp).await.unwrap(), vec![a, b]);

        let series = find_series_by_name(pool, "Classic Introductions").await.unwrap().unwrap();
        assert_eq!(series_books(pool, series).await.unwrap(), vec![a]);

        assert_eq!(authors_of_book(pool, b).await.unwrap(), Vec::<String>::new());
        assert_eq!(editors_of_book(pool, b).await.unwrap(), vec!["R. K. Harrison".to_string()]);

        let links = book_links(pool, a, Role::Author).await.unwrap();
        assert_eq!(links, vec![BookLink { book_id: a, person_id: harrison_id }]);
    }

    #[tokio::test]
    async fn test_counts_and_listing() {
        let db = Database::new_in_memory().await.expect("Failed to create database");
        let pool = db.pool();

        let a = add_book(pool, &harrison()).await.unwrap();
        let mut wanted = harrison();
        wanted.title = "Leviticus".to_string();
        wanted.status = "Want".to_string();
        let b = add_book(pool, &wanted).await.unwrap();

        assert_eq!(count_all_books(pool).await.unwrap(), 2);
        assert_eq!(count_books_by_status(pool, "Owned").await.unwrap(), 1);
        assert_eq!(count_books_by_status(pool, "Want").await.unwrap(), 1);
        assert_eq!(count_books_by_status(pool, "Lent").await.unwrap(), 0);
        assert_eq!(list_book_ids(pool).await.unwrap(), vec![a, b]);

        let statuses = status_counts(pool).await.unwrap();
        let total: i64 = statuses.iter().map(|(_, n)| n).sum();
        assert_eq!(total, count_all_books(pool).await.unwrap());

        let books = list_books(pool).await.unwrap();
        assert_eq!(books.iter().map(|b| b.book_id).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(books[1].title, "Leviticus");
    }
}
