//! SQLite storage via `rusqlite`.
//!
//! The connection lives behind an async `Mutex` and every operation
//! runs inside `tokio::task::spawn_blocking` so the driver never
//! blocks the runtime. `:memory:` paths open an in-memory database,
//! which the test suites lean on heavily.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chatarral_core::{Error, Result};
use chatarral_db::dialect::Dialect;
use chatarral_db::storage::{ExecResult, Statement, Storage};
use chatarral_db::value::Value;
use chatarral_db::Row;
use tokio::sync::Mutex;

/// SQLite-backed [`Storage`].
pub struct SqliteStorage {
    path: PathBuf,
    conn: Arc<Mutex<rusqlite::Connection>>,
}

/// Re-tags a driver error into the shared taxonomy. Unique-constraint
/// violations carry the column list SQLite reports ("tabla.columna").
fn map_err(e: &rusqlite::Error) -> Error {
    if let rusqlite::Error::SqliteFailure(code, Some(msg)) = e {
        if code.code == rusqlite::ErrorCode::ConstraintViolation {
            if let Some(constraint) = msg.strip_prefix("UNIQUE constraint failed: ") {
                return Error::Conflict {
                    constraint: constraint.to_string(),
                };
            }
            return Error::Conflict {
                constraint: msg.clone(),
            };
        }
    }
    Error::Storage(e.to_string())
}

impl SqliteStorage {
    /// Opens (creating if needed) the database at `path`, or an
    /// in-memory database for `:memory:`. Sets WAL journal mode,
    /// foreign-key enforcement, and a busy timeout.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = if path.to_str() == Some(":memory:") {
            rusqlite::Connection::open_in_memory()
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| Error::Storage(format!("no se pudo crear {parent:?}: {e}")))?;
                }
            }
            rusqlite::Connection::open(&path)
        }
        .map_err(|e| Error::Storage(format!("no se pudo abrir SQLite: {e}")))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )
        .map_err(|e| Error::Storage(format!("fallo al fijar pragmas: {e}")))?;

        Ok(Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, for tests.
    pub fn memory() -> Result<Self> {
        Self::open(":memory:")
    }

    /// The database file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn bind_params(stmt: &mut rusqlite::Statement<'_>, params: &[Value]) -> Result<()> {
        for (i, param) in params.iter().enumerate() {
            let idx = i + 1;
            match param {
                Value::Null => stmt.raw_bind_parameter(idx, rusqlite::types::Null),
                Value::Bool(b) => stmt.raw_bind_parameter(idx, i64::from(*b)),
                Value::Int(v) => stmt.raw_bind_parameter(idx, v),
                Value::Float(v) => stmt.raw_bind_parameter(idx, v),
                Value::String(s) => stmt.raw_bind_parameter(idx, s.as_str()),
                Value::Date(d) => stmt.raw_bind_parameter(idx, d.to_string().as_str()),
                Value::DateTime(dt) => {
                    stmt.raw_bind_parameter(idx, dt.format("%Y-%m-%d %H:%M:%S").to_string().as_str())
                }
            }
            .map_err(|e| Error::Storage(format!("error al enlazar parámetro {idx}: {e}")))?;
        }
        Ok(())
    }

    fn convert_row(sqlite_row: &rusqlite::Row<'_>, column_names: &[String]) -> Row {
        let values: Vec<Value> = (0..column_names.len())
            .map(|i| {
                let val_ref = sqlite_row
                    .get_ref(i)
                    .unwrap_or(rusqlite::types::ValueRef::Null);
                match val_ref {
                    rusqlite::types::ValueRef::Null => Value::Null,
                    rusqlite::types::ValueRef::Integer(v) => Value::Int(v),
                    rusqlite::types::ValueRef::Real(v) => Value::Float(v),
                    rusqlite::types::ValueRef::Text(b) | rusqlite::types::ValueRef::Blob(b) => {
                        Value::String(String::from_utf8_lossy(b).to_string())
                    }
                }
            })
            .collect();
        Row::new(column_names.to_vec(), values).canonicalize()
    }

    async fn run_blocking<T, F>(&self, stmt: Statement, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection, Statement) -> Result<T> + Send + 'static,
    {
        // The placeholder check happens before anything executes.
        Dialect::Sqlite.translate(&stmt.sql, stmt.params.len())?;
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn.blocking_lock();
            f(&conn, stmt)
        })
        .await
        .map_err(|e| Error::Storage(format!("error de tarea: {e}")))?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_all(&self, stmt: Statement) -> Result<Vec<Row>> {
        self.run_blocking(stmt, |conn, stmt| {
            let mut prepared = conn.prepare(&stmt.sql).map_err(|e| map_err(&e))?;
            let column_names: Vec<String> = prepared
                .column_names()
                .into_iter()
                .map(String::from)
                .collect();
            Self::bind_params(&mut prepared, &stmt.params)?;
            let mut raw_rows = prepared.raw_query();
            let mut rows = Vec::new();
            while let Some(row) = raw_rows.next().map_err(|e| map_err(&e))? {
                rows.push(Self::convert_row(row, &column_names));
            }
            Ok(rows)
        })
        .await
    }

    async fn fetch_one(&self, stmt: Statement) -> Result<Option<Row>> {
        let rows = self.fetch_all(stmt).await?;
        Ok(rows.into_iter().next())
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult> {
        self.run_blocking(stmt, |conn, stmt| {
            let mut prepared = conn.prepare(&stmt.sql).map_err(|e| map_err(&e))?;
            Self::bind_params(&mut prepared, &stmt.params)?;
            let count = prepared.raw_execute().map_err(|e| map_err(&e))?;
            Ok(ExecResult {
                last_insert_id: Some(conn.last_insert_rowid()),
                rows_affected: count as u64,
            })
        })
        .await
    }

    async fn insert_returning_id(&self, stmt: Statement) -> Result<i64> {
        self.run_blocking(stmt, |conn, stmt| {
            let mut prepared = conn.prepare(&stmt.sql).map_err(|e| map_err(&e))?;
            Self::bind_params(&mut prepared, &stmt.params)?;
            prepared.raw_execute().map_err(|e| map_err(&e))?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }
}
