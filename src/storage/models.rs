//! Database models for Librarium
//!
//! This module contains the catalogue entities and the value objects used to
//! move them in and out of SQLite.
//!
//! # SQLite Adaptations
//! - Optional columns are `Option<T>`; `None` is stored as NULL, never as `''` or `0`
//! - Author/editor lists travel as a formatted string ("A, B and C") in
//!   [`NameList`] and are stored one row per person in `book_author`/`book_editor`
//! - Purchase dates are stored as TEXT in their display form ("December 2021")
//! - Many-to-many relationships use junction tables

use crate::error::{CatalogError, Result};
use chrono::{Datelike, Month, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// ENUMS
// ============================================================================

/// Kind of catalogue row an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Book,
    Person,
    Publisher,
    Series,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Book => "book",
            EntityKind::Person => "person",
            EntityKind::Publisher => "publisher",
            EntityKind::Series => "series",
        }
    }

    /// Capitalized form for the start of a sentence
    pub fn label(&self) -> &'static str {
        match self {
            EntityKind::Book => "Book",
            EntityKind::Person => "Person",
            EntityKind::Publisher => "Publisher",
            EntityKind::Series => "Series",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a person plays for a book. Each role has its own junction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Author,
    Editor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Author => "author",
            Role::Editor => "editor",
        }
    }

    /// Junction table holding this role's links
    pub fn table(&self) -> &'static str {
        match self {
            Role::Author => "book_author",
            Role::Editor => "book_editor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// VALUE OBJECTS
// ============================================================================

/// Ordered list of person names with its display/parse convention
///
/// Formatting: no names → `""`, one → `"A"`, two → `"A and B"`,
/// more → `"A, B, …, Y and Z"` (no Oxford comma).
///
/// Parsing is the heuristic inverse: split on `" and "`, then split the first
/// segment on `", "` and append the second segment. Names that themselves
/// contain `" and "` or `", "` do not survive a round trip, and anything after
/// a second `" and "` is dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameList(Vec<String>);

impl NameList {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    /// Parse a formatted name string
    pub fn parse(s: &str) -> Self {
        if s.is_empty() {
            return Self::default();
        }

        let mut split_and = s.split(" and ");
        let head = split_and.next().unwrap_or_default();
        let Some(last) = split_and.next() else {
            return Self(vec![s.to_string()]);
        };

        let mut names: Vec<String> = head.split(", ").map(String::from).collect();
        names.push(last.to_string());
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    /// First-listed name, used by duplicate detection
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    /// First name that appears more than once, if any
    pub fn find_repeated(&self) -> Option<&str> {
        self.0
            .iter()
            .enumerate()
            .find(|(i, name)| self.0[..*i].contains(name))
            .map(|(_, name)| name.as_str())
    }
}

impl fmt::Display for NameList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => Ok(()),
            [only] => f.write_str(only),
            [init @ .., second_last, last] => {
                for name in init {
                    write!(f, "{}, ", name)?;
                }
                write!(f, "{} and {}", second_last, last)
            }
        }
    }
}

impl FromStr for NameList {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for NameList {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl From<Vec<String>> for NameList {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl<'a> IntoIterator for &'a NameList {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Partial date a book was purchased: a year, optionally with month and day
///
/// Textual forms are `"2019"`, `"May 2019"` and `"3 May 2019"` (full English
/// month names). The same form is written to the `purchased_date` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PurchasedDate {
    year: i32,
    month: Option<Month>,
    day: Option<u32>,
}

impl PurchasedDate {
    /// Year only. The year must have four digits.
    pub fn from_year(year: i32) -> Result<Self> {
        Ok(Self {
            year: check_year(year, "year")?,
            month: None,
            day: None,
        })
    }

    pub fn from_month_year(month: Month, year: i32) -> Result<Self> {
        Ok(Self {
            year: check_year(year, "month year")?,
            month: Some(month),
            day: None,
        })
    }

    /// Full calendar date. Fails for days the month does not have.
    pub fn from_ymd(year: i32, month: Month, day: u32) -> Result<Self> {
        check_year(year, "day month year")?;
        NaiveDate::from_ymd_opt(year, month.number_from_month(), day).ok_or_else(|| {
            CatalogError::DateParse {
                format: "day month year".to_string(),
                input: format!("{} {} {}", day, month.name(), year),
                reason: "no such day".to_string(),
            }
        })?;

        Ok(Self {
            year,
            month: Some(month),
            day: Some(day),
        })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Option<Month> {
        self.month
    }

    pub fn day(&self) -> Option<u32> {
        self.day
    }
}

fn date_error(format: &str, input: &str, reason: impl ToString) -> CatalogError {
    CatalogError::DateParse {
        format: format.to_string(),
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// Years `FromStr` can read back
fn check_year(year: i32, format: &str) -> Result<i32> {
    if (1000..=9999).contains(&year) {
        Ok(year)
    } else {
        Err(date_error(format, &year.to_string(), "year must have four digits"))
    }
}

/// Four-digit year token
fn parse_year(token: &str, format: &str, input: &str) -> Result<i32> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(date_error(format, input, "year must have four digits"));
    }
    token.parse().map_err(|e| date_error(format, input, e))
}

/// chrono's `%B` also takes "Dec"; only the full name is accepted here
fn month_of(date: NaiveDate, token: &str, format: &str, input: &str) -> Result<Month> {
    let month = u8::try_from(date.month())
        .ok()
        .and_then(|m| Month::try_from(m).ok())
        .ok_or_else(|| date_error(format, input, "month out of range"))?;

    if !token.eq_ignore_ascii_case(month.name()) {
        return Err(date_error(format, input, "month must be a full English name"));
    }
    Ok(month)
}

impl FromStr for PurchasedDate {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        let params: Vec<&str> = s.split(' ').collect();

        match params.as_slice() {
            [year] => Self::from_year(parse_year(year, "year", s)?),
            [month, year] => {
                let format = "month year";
                parse_year(year, format, s)?;
                let date = NaiveDate::parse_from_str(&format!("1 {}", s), "%d %B %Y")
                    .map_err(|e| date_error(format, s, e))?;
                Self::from_month_year(month_of(date, month, format, s)?, date.year())
            }
            [_, month, year] => {
                let format = "day month year";
                parse_year(year, format, s)?;
                let date = NaiveDate::parse_from_str(s, "%d %B %Y")
                    .map_err(|e| date_error(format, s, e))?;
                Ok(Self {
                    year: check_year(date.year(), format)?,
                    month: Some(month_of(date, month, format, s)?),
                    day: Some(date.day()),
                })
            }
            _ => Err(date_error("unknown", s, "expected 'YYYY', 'Month YYYY' or 'D Month YYYY'")),
        }
    }
}

impl fmt::Display for PurchasedDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.day, self.month) {
            (Some(day), Some(month)) => write!(f, "{} {} {}", day, month.name(), self.year),
            (_, Some(month)) => write!(f, "{} {}", month.name(), self.year),
            _ => write!(f, "{}", self.year),
        }
    }
}

impl Serialize for PurchasedDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PurchasedDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// MAIN ENTITIES
// ============================================================================

/// Book with its relationships resolved to names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: i64,
    pub author: NameList,
    pub editor: NameList,
    pub title: String,
    pub subtitle: Option<String>,
    pub year: Option<i32>,
    pub edition: Option<i64>,
    pub publisher: String,
    pub isbn: Option<String>,
    pub series: Option<String>,
    /// Free-form label such as "Owned" or "Want"
    pub status: String,
    pub purchased: Option<PurchasedDate>,
}

impl Book {
    /// Authors if any, otherwise editors marked "(ed.)"
    pub fn author_editor(&self) -> String {
        if !self.author.is_empty() {
            self.author.to_string()
        } else if !self.editor.is_empty() {
            format!("{} (ed.)", self.editor)
        } else {
            "[No author]".to_string()
        }
    }

    /// Get title with subtitle
    pub fn full_title(&self) -> String {
        match &self.subtitle {
            Some(sub) if !sub.is_empty() => format!("{}: {}", self.title, sub),
            _ => self.title.clone(),
        }
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {} (", self.author_editor(), self.full_title())?;
        match self.year {
            Some(year) => write!(f, "{}", year)?,
            None => f.write_str("n.d.")?,
        }
        write!(f, ") [{}]", self.status)
    }
}

/// Person - author and/or editor
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Person {
    pub person_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Publisher {
    pub publisher_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Series {
    pub series_id: i64,
    pub series_name: String,
}

// ============================================================================
// JUNCTION TABLES (Many-to-Many Relationships)
// ============================================================================

/// Row of `book_author` or `book_editor`
///
/// Composite primary key: (book_id, person_id). The person column is
/// `author_id` or `editor_id` in the table and aliased on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct BookLink {
    pub book_id: i64,
    pub person_id: i64,
}

// ============================================================================
// NEW RECORD STRUCTS (for inserts)
// ============================================================================

/// New book record for insertion
///
/// People, publisher and series are given by name and resolved (or created)
/// when the book is added.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBook {
    pub author: NameList,
    pub editor: NameList,
    pub title: String,
    pub subtitle: Option<String>,
    pub year: Option<i32>,
    pub edition: Option<i64>,
    pub publisher: String,
    pub isbn: Option<String>,
    pub series: Option<String>,
    pub status: String,
    pub purchased: Option<PurchasedDate>,
}

impl NewBook {
    pub fn new(title: String, publisher: String, status: String) -> Self {
        Self {
            author: NameList::default(),
            editor: NameList::default(),
            title,
            subtitle: None,
            year: None,
            edition: None,
            publisher,
            isbn: None,
            series: None,
            status,
            purchased: None,
        }
    }
}

impl From<&Book> for NewBook {
    fn from(book: &Book) -> Self {
        Self {
            author: book.author.clone(),
            editor: book.editor.clone(),
            title: book.title.clone(),
            subtitle: book.subtitle.clone(),
            year: book.year,
            edition: book.edition,
            publisher: book.publisher.clone(),
            isbn: book.isbn.clone(),
            series: book.series.clone(),
            status: book.status.clone(),
            purchased: book.purchased,
        }
    }
}

/// Empty strings and zero editions mean "absent"
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}

pub(crate) fn non_zero(value: Option<i64>) -> Option<i64> {
    value.filter(|v| *v != 0)
}
