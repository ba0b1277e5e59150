//! PostgreSQL storage via `tokio-postgres` and `deadpool-postgres`.
//!
//! Statements arrive in logical `?` form and are translated to `$n`
//! right before execution. Inserts append `RETURNING id` so id
//! retrieval is atomic with the insert.

use async_trait::async_trait;
use chatarral_core::settings::DatabaseSettings;
use chatarral_core::{Error, Result};
use chatarral_db::dialect::Dialect;
use chatarral_db::storage::{ExecResult, Statement, Storage};
use chatarral_db::value::Value;
use chatarral_db::Row;

/// PostgreSQL-backed [`Storage`].
pub struct PostgresStorage {
    pool: deadpool_postgres::Pool,
}

fn map_pg_err(e: &tokio_postgres::Error) -> Error {
    if let Some(db_err) = e.as_db_error() {
        if db_err.code() == &tokio_postgres::error::SqlState::UNIQUE_VIOLATION {
            return Error::Conflict {
                constraint: db_err.constraint().unwrap_or("unique").to_string(),
            };
        }
    }
    Error::Storage(e.to_string())
}

fn map_pool_err(e: &deadpool_postgres::PoolError) -> Error {
    Error::ResourceExhausted(e.to_string())
}

impl PostgresStorage {
    /// Builds the connection pool from the settings. Pool size and
    /// acquire timeout come from configuration; an acquire that times
    /// out surfaces as `ResourceExhausted`.
    pub fn connect(settings: &DatabaseSettings) -> Result<Self> {
        let mut config = deadpool_postgres::Config::new();
        config.dbname = Some(settings.name.clone());
        config.host = Some(settings.host.clone());
        config.port = Some(settings.port);
        config.user = Some(settings.user.clone());
        config.password = Some(settings.password.clone());
        config.pool = Some(deadpool_postgres::PoolConfig {
            max_size: settings.pool_size,
            timeouts: deadpool_postgres::Timeouts {
                wait: Some(std::time::Duration::from_secs(settings.acquire_timeout_secs)),
                ..deadpool_postgres::Timeouts::default()
            },
            ..deadpool_postgres::PoolConfig::default()
        });

        let pool = config
            .create_pool(
                Some(deadpool_postgres::Runtime::Tokio1),
                tokio_postgres::NoTls,
            )
            .map_err(|e| Error::Storage(format!("no se pudo crear el pool: {e}")))?;

        Ok(Self { pool })
    }

    fn to_sql_params(
        params: &[Value],
    ) -> Vec<Box<dyn tokio_postgres::types::ToSql + Sync + Send>> {
        params
            .iter()
            .map(|v| -> Box<dyn tokio_postgres::types::ToSql + Sync + Send> {
                match v {
                    Value::Null => Box::new(Option::<String>::None),
                    Value::Bool(b) => Box::new(*b),
                    Value::Int(i) => Box::new(*i),
                    Value::Float(f) => Box::new(*f),
                    Value::String(s) => Box::new(s.clone()),
                    Value::Date(d) => Box::new(*d),
                    Value::DateTime(dt) => Box::new(*dt),
                }
            })
            .collect()
    }

    fn convert_row(pg_row: &tokio_postgres::Row) -> Row {
        use tokio_postgres::types::Type;

        let columns: Vec<String> = pg_row
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let values: Vec<Value> = pg_row
            .columns()
            .iter()
            .enumerate()
            .map(|(i, col)| match *col.type_() {
                Type::BOOL => pg_row
                    .try_get::<_, Option<bool>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Bool),
                Type::INT2 => pg_row
                    .try_get::<_, Option<i16>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT4 => pg_row
                    .try_get::<_, Option<i32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Int(i64::from(v))),
                Type::INT8 => pg_row
                    .try_get::<_, Option<i64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Int),
                Type::FLOAT4 => pg_row
                    .try_get::<_, Option<f32>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |v| Value::Float(f64::from(v))),
                Type::FLOAT8 => pg_row
                    .try_get::<_, Option<f64>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Float),
                Type::DATE => pg_row
                    .try_get::<_, Option<chrono::NaiveDate>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::Date),
                Type::TIMESTAMP => pg_row
                    .try_get::<_, Option<chrono::NaiveDateTime>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::DateTime),
                // NUMERIC and anything else falls back to text, which
                // canonicalization turns back into a number for amount
                // columns.
                _ => pg_row
                    .try_get::<_, Option<String>>(i)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, Value::String),
            })
            .collect();

        Row::new(columns, values).canonicalize()
    }

    async fn query_translated(&self, stmt: &Statement) -> Result<Vec<tokio_postgres::Row>> {
        let sql = Dialect::Postgres.translate(&stmt.sql, stmt.params.len())?;
        let client = self.pool.get().await.map_err(|e| map_pool_err(&e))?;
        let sql_params = Self::to_sql_params(&stmt.params);
        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();
        client
            .query(&sql, &param_refs)
            .await
            .map_err(|e| map_pg_err(&e))
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn fetch_all(&self, stmt: Statement) -> Result<Vec<Row>> {
        let rows = self.query_translated(&stmt).await?;
        Ok(rows.iter().map(Self::convert_row).collect())
    }

    async fn fetch_one(&self, stmt: Statement) -> Result<Option<Row>> {
        let rows = self.fetch_all(stmt).await?;
        Ok(rows.into_iter().next())
    }

    async fn execute(&self, stmt: Statement) -> Result<ExecResult> {
        let sql = Dialect::Postgres.translate(&stmt.sql, stmt.params.len())?;
        let client = self.pool.get().await.map_err(|e| map_pool_err(&e))?;
        let sql_params = Self::to_sql_params(&stmt.params);
        let param_refs: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = sql_params
            .iter()
            .map(|p| p.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync))
            .collect();
        let count = client
            .execute(&sql, &param_refs)
            .await
            .map_err(|e| map_pg_err(&e))?;
        Ok(ExecResult {
            last_insert_id: None,
            rows_affected: count,
        })
    }

    async fn insert_returning_id(&self, stmt: Statement) -> Result<i64> {
        let with_returning = Statement::new(format!("{} RETURNING id", stmt.sql), stmt.params);
        let rows = self.query_translated(&with_returning).await?;
        let row = rows
            .first()
            .ok_or_else(|| Error::Storage("INSERT no devolvió ninguna fila".to_string()))?;
        // SERIAL is INT4.
        let id: i32 = row.try_get("id").map_err(|e| map_pg_err(&e))?;
        Ok(i64::from(id))
    }
}
