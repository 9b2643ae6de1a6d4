//! SQLite backend for the reconciliation store.
mod sqlite_impl;

pub mod db;
pub use db::{db_url, new_pool};
pub use sqlite_impl::SqliteDatabase;
