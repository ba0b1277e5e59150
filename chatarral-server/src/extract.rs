//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chatarral_core::{AuthCode, Error};

use crate::error::ApiError;
use crate::state::AppState;

/// The authenticated caller, decoded from the `Authorization` header.
///
/// Adding this extractor to a handler is what makes the route
/// protected: missing or malformed credentials reject the request
/// before the handler body runs.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub email: String,
    pub nombre: String,
    pub rol: String,
}

impl CurrentUser {
    /// Rejects callers that are not administrators.
    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.rol == "administrador" {
            Ok(())
        } else {
            Err(Error::Forbidden {
                required: vec!["administrador".to_string()],
                actual: self.rol.clone(),
            }
            .into())
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                Error::auth(AuthCode::TokenRequerido, "Token de acceso requerido")
            })?;

        let token = header.strip_prefix("Bearer ").ok_or_else(|| {
            Error::auth(AuthCode::TokenInvalido, "Formato de token inválido")
        })?;

        let claims = state.tokens.verify_access(token)?;
        Ok(Self {
            id: claims.id,
            email: claims.email,
            nombre: claims.nombre,
            rol: claims.rol,
        })
    }
}
