//! Error-to-HTTP mapping.
//!
//! Handlers return `Result<_, ApiError>`; the conversion from the
//! shared taxonomy happens once here, so status codes and body shapes
//! stay consistent across every route. Internal failures are logged
//! with their real message and answered with a generic body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chatarral_core::Error;
use serde_json::json;

/// The handler-facing error type.
pub enum ApiError {
    /// An error from the shared taxonomy.
    Taxonomy(Error),
    /// A response body built by the handler itself (login lockout
    /// counters and the like).
    Custom(StatusCode, serde_json::Value),
}

impl ApiError {
    pub fn custom(status: StatusCode, body: serde_json::Value) -> Self {
        Self::Custom(status, body)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Taxonomy(err)
    }
}

/// Human messages for the unique constraints the schema declares.
fn conflict_message(constraint: &str) -> String {
    if constraint.contains("materiales.nombre") {
        "Ya existe un material con ese nombre".to_string()
    } else if constraint.contains("categorias_gastos.nombre") {
        "Ya existe una categoría con ese nombre".to_string()
    } else if constraint.contains("usuarios.email") {
        "Ya existe un usuario con este email".to_string()
    } else {
        format!("Registro duplicado ({constraint})")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Custom(status, body) => (status, body),
            Self::Taxonomy(err) => {
                if err.is_internal() {
                    tracing::error!(error = %err, "fallo interno");
                }
                match err {
                    Error::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
                    Error::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
                    Error::Conflict { constraint } => (
                        StatusCode::CONFLICT,
                        json!({ "error": conflict_message(&constraint) }),
                    ),
                    Error::ResourceExhausted(_) => (
                        StatusCode::SERVICE_UNAVAILABLE,
                        json!({ "error": "Servicio no disponible temporalmente" }),
                    ),
                    Error::Storage(_) | Error::QueryShape(_) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        json!({ "error": "Error interno del servidor" }),
                    ),
                    Error::Auth { code, message } => (
                        StatusCode::UNAUTHORIZED,
                        json!({ "error": message, "codigo": code.as_str() }),
                    ),
                    Error::Forbidden { required, actual } => (
                        StatusCode::FORBIDDEN,
                        json!({
                            "error": "Permisos insuficientes",
                            "codigo": "PERMISOS_INSUFICIENTES",
                            "rol_requerido": required,
                            "rol_actual": actual,
                        }),
                    ),
                    Error::Locked { until } => (
                        StatusCode::TOO_MANY_REQUESTS,
                        json!({
                            "error": "Cuenta temporalmente bloqueada. Intenta más tarde",
                            "bloqueado_hasta": until,
                        }),
                    ),
                }
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatarral_core::AuthCode;

    fn status_of(err: Error) -> StatusCode {
        ApiError::from(err).into_response().status()
    }

    #[test]
    fn test_taxonomy_status_mapping() {
        assert_eq!(
            status_of(Error::validation("x")),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(Error::not_found("x")), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(Error::Conflict {
                constraint: "materiales.nombre".into()
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(Error::ResourceExhausted("pool".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(Error::Storage("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(Error::QueryShape("bad".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(Error::auth(AuthCode::TokenExpirado, "Token expirado")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(Error::Forbidden {
                required: vec!["administrador".into()],
                actual: "usuario".into()
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(Error::Locked {
                until: "2024-01-01T00:00:00Z".into()
            }),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_conflict_messages() {
        assert_eq!(
            conflict_message("materiales.nombre"),
            "Ya existe un material con ese nombre"
        );
        assert_eq!(
            conflict_message("usuarios.email"),
            "Ya existe un usuario con este email"
        );
        assert!(conflict_message("otra_cosa").contains("otra_cosa"));
    }
}
