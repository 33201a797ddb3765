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


use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use librarium::storage::{deletion, queries, updates, Database, NameList, NewBook, PurchasedDate};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "librarium-cli")]
#[command(about = "Librarium CLI - manage a personal book catalogue", long_about = None)]
struct Cli {
    /// Catalogue file (defaults to the platform data directory)
    #[arg(long, global = true, env = "LIBRARIUM_DB")]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Book counts and catalogue file statistics
    Stats,
    /// List books
    List {
        /// Only books with this status
        #[arg(short, long)]
        status: Option<String>,
    },
    /// Show one book
    Show {
        id: i64,
    },
    /// Add a book
    Add {
        title: String,
        /// Authors as "A, B and C"
        #[arg(short, long, default_value = "")]
        author: String,
        /// Editors as "A, B and C"
        #[arg(short, long, default_value = "")]
        editor: String,
        #[arg(long)]
        subtitle: Option<String>,
        #[arg(short, long)]
        year: Option<i32>,
        #[arg(long)]
        edition: Option<i64>,
        #[arg(short, long)]
        publisher: String,
        #[arg(long)]
        isbn: Option<String>,
        #[arg(long)]
        series: Option<String>,
        #[arg(short, long, default_value = "Owned")]
        status: String,
        /// "2019", "May 2019" or "3 May 2019"
        #[arg(long)]
        purchased: Option<PurchasedDate>,
    },
    /// Replace a book's authors
    SetAuthor {
        id: i64,
        names: String,
    },
    /// Replace a book's editors
    SetEditor {
        id: i64,
        names: String,
    },
    /// Change a book's status
    SetStatus {
        id: i64,
        status: String,
    },
    /// Delete a book and any people, publisher or series only it used
    Delete {
        id: i64,
    },
    /// List people
    People,
    /// List publishers
    Publishers,
    /// List series
    Series,
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = cli.database.unwrap_or_else(Database::get_default_path);
    let db = Database::new(&path)
        .await
        .with_context(|| format!("opening catalogue {}", path.display()))?;
    let pool = db.pool();

    match cli.command {
        Commands::Stats => {
            #[derive(Serialize)]
            struct Stats {
                books: i64,
                by_status: Vec<(String, i64)>,
                file: librarium::storage::DatabaseStats,
            }

            let stats = Stats {
                books: queries::count_all_books(pool).await?,
                by_status: queries::status_counts(pool).await?,
                file: db.get_stats().await?,
            };
            emit(cli.json, &stats, || {
                let mut out = format!("{} book(s) in {}", stats.books, path.display());
                for (status, n) in &stats.by_status {
                    out.push_str(&format!("\n  {:<12} {}", status, n));
                }
                out.push_str(&format!(
                    "\n  {} KiB, {:.1}% unused",
                    stats.file.total_size() / 1024,
                    stats.file.unused_percentage()
                ));
                out
            })?;
        }
        Commands::List { status } => {
            let mut books = queries::list_books(pool).await?;
            if let Some(status) = status {
                books.retain(|b| b.status == status);
            }
            emit(cli.json, &books, || {
                books
                    .iter()
                    .map(|b| format!("#{:<5} {}", b.book_id, b))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::Show { id } => {
            let book = queries::get_book(pool, id).await?;
            emit(cli.json, &book, || {
                let mut out = format!("#{} {}", book.book_id, book);
                out.push_str(&format!("\n  Publisher: {}", book.publisher));
                if let Some(series) = &book.series {
                    out.push_str(&format!("\n  Series:    {}", series));
                }
                if let Some(edition) = book.edition {
                    out.push_str(&format!("\n  Edition:   {}", edition));
                }
                if let Some(isbn) = &book.isbn {
                    out.push_str(&format!("\n  ISBN:      {}", isbn));
                }
                if let Some(date) = &book.purchased {
                    out.push_str(&format!("\n  Purchased: {}", date));
                }
                out
            })?;
        }
        Commands::Add {
            title,
            author,
            editor,
            subtitle,
            year,
            edition,
            publisher,
            isbn,
            series,
            status,
            purchased,
        } => {
            let mut book = NewBook::new(title, publisher, status);
            book.author = NameList::parse(&author);
            book.editor = NameList::parse(&editor);
            book.subtitle = subtitle;
            book.year = year;
            book.edition = edition;
            book.isbn = isbn;
            book.series = series;
            book.purchased = purchased;

            let id = queries::add_book(pool, &book).await?;
            emit(cli.json, &id, || format!("Added book #{}", id))?;
        }
        Commands::SetAuthor { id, names } => {
            let stored = updates::update_book_author(pool, id, &names).await?;
            emit(cli.json, &stored, || format!("Authors of #{}: {}", id, stored))?;
        }
        Commands::SetEditor { id, names } => {
            let stored = updates::update_book_editor(pool, id, &names).await?;
            emit(cli.json, &stored, || format!("Editors of #{}: {}", id, stored))?;
        }
        Commands::SetStatus { id, status } => {
            let stored = updates::update_book_status(pool, id, &status).await?;
            emit(cli.json, &stored, || format!("Status of #{}: {}", id, stored))?;
        }
        Commands::Delete { id } => {
            let book = deletion::delete_book(pool, id).await?;
            emit(cli.json, &book, || format!("Deleted #{} {}", id, book))?;
        }
        Commands::People => {
            let people = queries::list_people(pool).await?;
            emit(cli.json, &people, || {
                people
                    .iter()
                    .map(|p| format!("#{:<5} {}", p.person_id, p.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::Publishers => {
            let publishers = queries::list_publishers(pool).await?;
            emit(cli.json, &publishers, || {
                publishers
                    .iter()
                    .map(|p| format!("#{:<5} {}", p.publisher_id, p.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
        Commands::Series => {
            let series = queries::list_series(pool).await?;
            emit(cli.json, &series, || {
                series
                    .iter()
                    .map(|s| format!("#{:<5} {}", s.series_id, s.series_name))
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }
    }

    db.close().await?;
    Ok(())
}
