//! # chatarral-db-backends
//!
//! The two concrete [`Storage`](chatarral_db::Storage) implementations
//! (SQLite via `rusqlite`, PostgreSQL via `tokio-postgres` +
//! `deadpool-postgres`) plus the schema bootstrap that creates tables,
//! indexes, and the initial catalogs.

pub mod bootstrap;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use chatarral_core::settings::{DatabaseEngine, DatabaseSettings};
use chatarral_core::Result;
use chatarral_db::Storage;

pub use postgres::PostgresStorage;
pub use sqlite::SqliteStorage;

/// Opens the storage backend selected by the settings.
pub fn open_storage(settings: &DatabaseSettings) -> Result<Arc<dyn Storage>> {
    match settings.engine {
        DatabaseEngine::Sqlite => Ok(Arc::new(SqliteStorage::open(&settings.path)?)),
        DatabaseEngine::Postgres => Ok(Arc::new(PostgresStorage::connect(settings)?)),
    }
}
