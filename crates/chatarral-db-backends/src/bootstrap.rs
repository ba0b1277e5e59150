//! Schema bootstrap and initial catalogs.
//!
//! Runs at startup against whichever backend is configured. DDL is
//! best-effort: an individual statement failing (typically because the
//! object already exists on an engine without IF NOT EXISTS support
//! for it) is logged and skipped. Seeding is idempotent: catalogs are
//! only inserted into empty tables.

use chatarral_core::Result;
use chatarral_db::schema;
use chatarral_db::storage::{Statement, Storage};
use chatarral_db::value::Value;
use tracing::{info, warn};

/// Creates tables and indexes, then seeds the initial catalogs.
pub async fn initialize(storage: &dyn Storage) -> Result<()> {
    let dialect = storage.dialect();

    for ddl in schema::create_tables(dialect) {
        if let Err(e) = storage.execute(Statement::new(ddl.clone(), vec![])).await {
            warn!(error = %e, "sentencia DDL omitida");
        }
    }
    for ddl in schema::create_indexes(dialect) {
        if let Err(e) = storage.execute(Statement::new(ddl, vec![])).await {
            warn!(error = %e, "índice omitido");
        }
    }
    info!("esquema verificado");

    seed_catalogs(storage).await
}

/// Inserts the material and expense-category catalogs when their
/// tables are empty. Safe to call on every startup.
pub async fn seed_catalogs(storage: &dyn Storage) -> Result<()> {
    let count = table_count(storage, "categorias_gastos").await?;
    if count == 0 {
        for (nombre, descripcion) in schema::SEED_CATEGORIAS_GASTOS {
            storage
                .execute(Statement::new(
                    "INSERT INTO categorias_gastos (nombre, descripcion) VALUES (?, ?)",
                    vec![Value::from(*nombre), Value::from(*descripcion)],
                ))
                .await?;
        }
        info!(
            categorias = schema::SEED_CATEGORIAS_GASTOS.len(),
            "categorías de gastos iniciales creadas"
        );
    }

    let count = table_count(storage, "materiales").await?;
    if count == 0 {
        for (nombre, categoria) in schema::SEED_MATERIALES {
            storage
                .execute(Statement::new(
                    "INSERT INTO materiales (nombre, categoria) VALUES (?, ?)",
                    vec![Value::from(*nombre), Value::from(*categoria)],
                ))
                .await?;
        }
        info!(
            materiales = schema::SEED_MATERIALES.len(),
            "catálogo de materiales inicial creado"
        );
    }

    Ok(())
}

async fn table_count(storage: &dyn Storage, table: &str) -> Result<i64> {
    // `table` is always one of our fixed catalog names.
    let row = storage
        .fetch_one(Statement::new(
            format!("SELECT COUNT(*) AS total FROM {table}"),
            vec![],
        ))
        .await?;
    Ok(row.map_or(0, |r| r.get_int_or_zero("total")))
}
