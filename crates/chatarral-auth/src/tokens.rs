//! JWT issuance and verification.
//!
//! Two token kinds share the signing secret but differ in audience:
//! access tokens (`usuario-reciclaje`) carry the user's identity and
//! role, refresh tokens (`refresh-reciclaje`) carry only the user id
//! and a `tipo` marker. Verification errors map onto the stable
//! `codigo` values clients dispatch on.

use chatarral_core::{AuthCode, Error, Result};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

const ISSUER: &str = "sistema-reciclaje";
const ACCESS_AUDIENCE: &str = "usuario-reciclaje";
const REFRESH_AUDIENCE: &str = "refresh-reciclaje";

/// Claims carried by an access token.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AccessClaims {
    pub id: i64,
    pub email: String,
    pub nombre: String,
    pub rol: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
}

/// Claims carried by a refresh token.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RefreshClaims {
    pub id: i64,
    pub tipo: String,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
    pub aud: String,
}

/// Signs and verifies both token kinds with one secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    token_hours: i64,
    refresh_days: i64,
}

fn map_jwt_err(e: &jsonwebtoken::errors::Error) -> Error {
    match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            Error::auth(AuthCode::TokenExpirado, "Token expirado")
        }
        _ => Error::auth(AuthCode::TokenInvalido, "Token inválido"),
    }
}

impl TokenService {
    pub fn new(secret: &str, token_hours: i64, refresh_days: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            token_hours,
            refresh_days,
        }
    }

    /// Issues an access token for the given user.
    pub fn issue_access(&self, id: i64, email: &str, nombre: &str, rol: &str) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = AccessClaims {
            id,
            email: email.to_string(),
            nombre: nombre.to_string(),
            rol: rol.to_string(),
            exp: (now + chrono::Duration::hours(self.token_hours)).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            aud: ACCESS_AUDIENCE.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Storage(format!("no se pudo firmar el token: {e}")))
    }

    /// Issues a refresh token for the given user id.
    pub fn issue_refresh(&self, id: i64) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = RefreshClaims {
            id,
            tipo: "refresh".to_string(),
            exp: (now + chrono::Duration::days(self.refresh_days)).timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
            aud: REFRESH_AUDIENCE.to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| Error::Storage(format!("no se pudo firmar el token: {e}")))
    }

    /// Verifies an access token, returning its claims.
    pub fn verify_access(&self, token: &str) -> Result<AccessClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[ACCESS_AUDIENCE]);
        decode::<AccessClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| map_jwt_err(&e))
    }

    /// Verifies a refresh token, checking the `tipo` marker as well.
    pub fn verify_refresh(&self, token: &str) -> Result<RefreshClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[REFRESH_AUDIENCE]);
        let claims = decode::<RefreshClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| map_jwt_err(&e))?;
        if claims.tipo != "refresh" {
            return Err(Error::auth(AuthCode::TokenInvalido, "Token inválido"));
        }
        Ok(claims)
    }
}
