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


//! Catalogue storage
//!
//! SQLite schema and data-access layer, on sqlx.
//!
//! # Database Schema
//! - books: title, subtitle, year, edition, isbn, status, purchase date
//! - people: authors and editors, unique by name
//! - publishers, series: unique by name
//! - book_author, book_editor: book <-> person links, in display order
//!
//! # Usage Example
//! ```no_run
//! use librarium::storage::{queries, updates, Database, NameList, NewBook};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./catalogue.db").await?;
//!
//! let mut book = NewBook::new(
//!     "Introduction to the Old Testament".to_string(),
//!     "Eerdmans".to_string(),
//!     "Owned".to_string(),
//! );
//! book.author = NameList::parse("R. K. Harrison");
//! let book_id = queries::add_book(db.pool(), &book).await?;
//!
//! updates::update_book_status(db.pool(), book_id, "Lent").await?;
//! println!("{}", queries::get_book(db.pool(), book_id).await?);
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod deletion;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod updates;

pub use database::{Database, DatabaseStats};
pub use models::{
    Book, BookLink, EntityKind, NameList, NewBook, Person, PurchasedDate, Publisher, Role, Series,
};
