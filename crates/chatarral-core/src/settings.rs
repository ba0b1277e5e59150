//! Application settings.
//!
//! Settings come from three layers, later layers winning: built-in
//! defaults, an optional TOML file, and environment variables. The
//! result is an explicitly constructed value passed down to the
//! storage layer and the server — there is no process-wide static.

use std::path::Path;

use crate::error::{Error, Result};

/// Which relational backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    /// SQLite file or in-memory database.
    Sqlite,
    /// PostgreSQL over a bounded connection pool.
    Postgres,
}

/// Connection parameters for the configured backend.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// The backend engine.
    pub engine: DatabaseEngine,
    /// SQLite file path (or `:memory:`). Ignored by PostgreSQL.
    pub path: String,
    /// Database name (PostgreSQL).
    pub name: String,
    /// Host (PostgreSQL).
    pub host: String,
    /// Port (PostgreSQL).
    pub port: u16,
    /// User (PostgreSQL).
    pub user: String,
    /// Password (PostgreSQL).
    pub password: String,
    /// Maximum concurrent pooled connections.
    pub pool_size: usize,
    /// Seconds to wait for a pooled connection before failing with
    /// `ResourceExhausted`.
    pub acquire_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            engine: DatabaseEngine::Sqlite,
            path: "database/reciclaje.db".to_string(),
            name: "reciclaje".to_string(),
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            password: String::new(),
            pool_size: 8,
            acquire_timeout_secs: 10,
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Debug mode switches logging to a human-readable format.
    pub debug: bool,
    /// Address the HTTP server binds to.
    pub bind: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Database configuration.
    pub database: DatabaseSettings,
    /// Secret used to sign JWTs. Must be overridden in production.
    pub jwt_secret: String,
    /// Access-token lifetime in hours.
    pub token_hours: i64,
    /// Refresh-token lifetime in days.
    pub refresh_days: i64,
    /// `tracing` filter directive, e.g. "info" or "chatarral=debug".
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: true,
            bind: "0.0.0.0".to_string(),
            port: 5000,
            database: DatabaseSettings::default(),
            jwt_secret: "clave_secreta_muy_segura_reciclaje_2024".to_string(),
            token_hours: 24,
            refresh_days: 7,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file.
    pub fn from_toml(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::validation(format!("no se pudo leer la configuración: {e}")))?;
        toml::from_str(&text)
            .map_err(|e| Error::validation(format!("configuración inválida: {e}")))
    }

    /// Applies environment-variable overrides on top of `self`.
    ///
    /// Recognized variables: `PORT`, `JWT_SECRET`, `DATABASE_ENGINE`
    /// (`sqlite`/`postgres`), `DATABASE_PATH`, `DATABASE_HOST`,
    /// `DATABASE_NAME`, `DATABASE_USER`, `DATABASE_PASSWORD`,
    /// `LOG_LEVEL`.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.jwt_secret = secret;
        }
        if let Ok(engine) = std::env::var("DATABASE_ENGINE") {
            match engine.as_str() {
                "sqlite" => self.database.engine = DatabaseEngine::Sqlite,
                "postgres" | "postgresql" => self.database.engine = DatabaseEngine::Postgres,
                _ => {}
            }
        }
        if let Ok(path) = std::env::var("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Ok(host) = std::env::var("DATABASE_HOST") {
            self.database.host = host;
        }
        if let Ok(name) = std::env::var("DATABASE_NAME") {
            self.database.name = name;
        }
        if let Ok(user) = std::env::var("DATABASE_USER") {
            self.database.user = user;
        }
        if let Ok(password) = std::env::var("DATABASE_PASSWORD") {
            self.database.password = password;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.log_level = level;
        }
        self
    }

    /// Loads from `chatarral.toml` when present, defaults otherwise,
    /// and applies environment overrides in both cases.
    pub fn load() -> Result<Self> {
        let base = if Path::new("chatarral.toml").exists() {
            Self::from_toml("chatarral.toml")?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.port, 5000);
        assert_eq!(s.database.engine, DatabaseEngine::Sqlite);
        assert_eq!(s.token_hours, 24);
        assert_eq!(s.refresh_days, 7);
        assert_eq!(s.database.pool_size, 8);
    }

    #[test]
    fn test_from_toml() {
        let dir = std::env::temp_dir().join("chatarral-settings-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("settings.toml");
        std::fs::write(
            &path,
            r#"
debug = false
port = 8080
jwt_secret = "s3cret"

[database]
engine = "postgres"
name = "chatarra"
host = "db.internal"
pool_size = 4
"#,
        )
        .unwrap();

        let s = Settings::from_toml(&path).unwrap();
        assert!(!s.debug);
        assert_eq!(s.port, 8080);
        assert_eq!(s.jwt_secret, "s3cret");
        assert_eq!(s.database.engine, DatabaseEngine::Postgres);
        assert_eq!(s.database.name, "chatarra");
        assert_eq!(s.database.pool_size, 4);
        // Unspecified keys keep their defaults.
        assert_eq!(s.database.port, 5432);
    }

    #[test]
    fn test_from_toml_missing_file() {
        let err = Settings::from_toml("/nonexistent/chatarral.toml");
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_toml() {
        let dir = std::env::temp_dir().join("chatarral-settings-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("broken.toml");
        std::fs::write(&path, "port = \"not a number").unwrap();
        assert!(Settings::from_toml(&path).is_err());
    }
}
