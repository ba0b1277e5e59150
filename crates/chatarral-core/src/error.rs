//! The application-wide error taxonomy.
//!
//! Every layer of chatarral returns this one enum. Storage backends
//! re-tag driver errors into it at the adapter boundary so that route
//! code never sees a backend-specific error shape; the server crate
//! maps each variant onto an HTTP status and a JSON body.

use std::fmt;

/// A convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable machine-readable codes attached to authentication failures.
///
/// These are part of the API contract: clients dispatch on them to
/// decide between re-login and token refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum AuthCode {
    /// No `Authorization` header was supplied.
    TokenRequerido,
    /// The token was malformed, had a bad signature, or the bearer
    /// format was wrong.
    TokenInvalido,
    /// The token was valid but its expiry has passed.
    TokenExpirado,
}

impl AuthCode {
    /// The wire representation sent in the `codigo` field.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TokenRequerido => "TOKEN_REQUERIDO",
            Self::TokenInvalido => "TOKEN_INVALIDO",
            Self::TokenExpirado => "TOKEN_EXPIRADO",
        }
    }
}

impl fmt::Display for AuthCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The chatarral error taxonomy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Bad or missing input. Maps to HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// A referenced row is absent or inactive. Maps to HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// A unique constraint was violated. Maps to HTTP 409. The
    /// constraint name lets the route layer produce a precise message.
    #[error("restricción violada: {constraint}")]
    Conflict {
        /// Name of the violated constraint as reported by the backend.
        constraint: String,
    },

    /// The connection pool is exhausted or an acquire timed out.
    /// Maps to HTTP 503.
    #[error("sin conexiones disponibles: {0}")]
    ResourceExhausted(String),

    /// Any other backend failure, opaque-wrapped. The original message
    /// is kept for logging only and never shown to clients. Maps to
    /// HTTP 500.
    #[error("error de almacenamiento: {0}")]
    Storage(String),

    /// A statement's placeholders and its bound values disagree. This
    /// is a programming error in the query catalog, not a runtime
    /// condition; it fails fast before anything executes.
    #[error("consulta mal formada: {0}")]
    QueryShape(String),

    /// Token absent/invalid/expired. Maps to HTTP 401 with a stable
    /// `codigo`.
    #[error("{message}")]
    Auth {
        /// Machine-readable code.
        code: AuthCode,
        /// Human-readable message.
        message: String,
    },

    /// The authenticated user lacks a required role. Maps to HTTP 403.
    #[error("permisos insuficientes")]
    Forbidden {
        /// Roles that would have been accepted.
        required: Vec<String>,
        /// The caller's actual role.
        actual: String,
    },

    /// Account temporarily locked after repeated failed logins.
    /// Maps to HTTP 429.
    #[error("cuenta temporalmente bloqueada")]
    Locked {
        /// ISO timestamp until which the account stays locked.
        until: String,
    },
}

impl Error {
    /// Shorthand for a validation failure.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a not-found failure.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Builds an auth error with the given code and message.
    pub fn auth(code: AuthCode, message: impl Into<String>) -> Self {
        Self::Auth {
            code,
            message: message.into(),
        }
    }

    /// Returns `true` for variants the server should log at error level
    /// (unexpected failures) as opposed to ordinary client mistakes.
    pub const fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Storage(_) | Self::QueryShape(_) | Self::ResourceExhausted(_)
        )
    }
}
