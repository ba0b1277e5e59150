//! Administrator account seeding.

use chatarral_core::Result;
use chatarral_db::{build_insert, Statement, Storage, Value};

const ADMIN_EMAIL: &str = "admin@reciclaje.com";
const ADMIN_PASSWORD: &str = "admin123";

/// Creates the default administrator account if no user with its email
/// exists yet. Unlike a delete-and-recreate seed, this never touches an
/// existing account, so a changed admin password survives restarts.
pub async fn ensure_admin(storage: &dyn Storage) -> Result<()> {
    let existing = storage
        .fetch_one(Statement::new(
            "SELECT id FROM usuarios WHERE email = ?",
            vec![Value::from(ADMIN_EMAIL)],
        ))
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let hash = chatarral_auth::hash_password(ADMIN_PASSWORD)?;
    let id = storage
        .insert_returning_id(build_insert(
            "usuarios",
            vec![
                ("nombre", Value::from("Administrador")),
                ("email", Value::from(ADMIN_EMAIL)),
                ("password_hash", Value::from(hash)),
                ("rol", Value::from("administrador")),
                ("activo", Value::Bool(true)),
            ],
        ))
        .await?;
    tracing::info!(id, email = ADMIN_EMAIL, "usuario administrador creado");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatarral_db_backends::sqlite::SqliteStorage;

    async fn storage() -> SqliteStorage {
        let s = SqliteStorage::memory().unwrap();
        chatarral_db_backends::bootstrap::initialize(&s).await.unwrap();
        s
    }

    #[tokio::test]
    async fn test_creates_admin_once() {
        let s = storage().await;
        ensure_admin(&s).await.unwrap();
        ensure_admin(&s).await.unwrap();
        let rows = s
            .fetch_all(Statement::new(
                "SELECT nombre, rol, activo FROM usuarios WHERE email = ?",
                vec![Value::from(ADMIN_EMAIL)],
            ))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_str("nombre"), Some("Administrador"));
        assert_eq!(rows[0].get_str("rol"), Some("administrador"));
        assert_eq!(rows[0].get_bool("activo"), Some(true));
    }

    #[tokio::test]
    async fn test_does_not_clobber_changed_password() {
        let s = storage().await;
        ensure_admin(&s).await.unwrap();
        s.execute(Statement::new(
            "UPDATE usuarios SET password_hash = ? WHERE email = ?",
            vec![Value::from("hash-cambiado"), Value::from(ADMIN_EMAIL)],
        ))
        .await
        .unwrap();
        ensure_admin(&s).await.unwrap();
        let row = s
            .fetch_one(Statement::new(
                "SELECT password_hash FROM usuarios WHERE email = ?",
                vec![Value::from(ADMIN_EMAIL)],
            ))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get_str("password_hash"), Some("hash-cambiado"));
    }

    #[tokio::test]
    async fn test_stored_password_verifies() {
        let s = storage().await;
        ensure_admin(&s).await.unwrap();
        let row = s
            .fetch_one(Statement::new(
                "SELECT password_hash FROM usuarios WHERE email = ?",
                vec![Value::from(ADMIN_EMAIL)],
            ))
            .await
            .unwrap()
            .unwrap();
        assert!(chatarral_auth::verify_password(
            ADMIN_PASSWORD,
            row.get_str("password_hash").unwrap()
        ));
    }
}
