//! Librarium - personal book catalogue
//!
//! A SQLite catalogue of books, the people who wrote or edited them, their
//! publishers and series. The [`storage`] module holds the schema and every
//! operation; [`error`] the error type they return.

pub mod error;
pub mod storage;

pub use error::{CatalogError, Result};
pub use storage::{Book, Database, NameList, NewBook, PurchasedDate};
