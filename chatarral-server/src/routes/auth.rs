//! `/api/auth`: registration, login with lockout, token refresh and
//! profile management.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chatarral_core::{AuthCode, Error};
use chatarral_db::{build_insert, build_update, Statement, Value};
use chrono::NaiveDateTime;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

/// Failed attempts that trigger a temporary lock.
const MAX_ATTEMPTS: i64 = 5;
/// How long a locked account stays locked.
const LOCK_MINUTES: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/registro", post(registro))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/perfil", get(perfil).put(actualizar_perfil))
        .route("/cambiar-password", put(cambiar_password))
        .route("/logout", post(logout))
        .route("/verificar", get(verificar))
}

type ApiResult<T> = Result<T, ApiError>;

fn email_valido(email: &str) -> bool {
    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        _ => false,
    }
}

fn now() -> NaiveDateTime {
    chrono::Utc::now().naive_utc()
}

/// Lenient read of a timestamp cell; both engines can hand these back
/// as strings.
fn datetime_cell(value: Option<&Value>) -> Option<NaiveDateTime> {
    match value {
        Some(Value::DateTime(dt)) => Some(*dt),
        Some(Value::String(s)) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok(),
        _ => None,
    }
}

fn usuario_json(row: &chatarral_db::Row) -> serde_json::Value {
    json!({
        "id": row.get_int_or_zero("id"),
        "nombre": row.get_str("nombre").unwrap_or_default(),
        "email": row.get_str("email").unwrap_or_default(),
        "rol": row.get_str("rol").unwrap_or_default(),
    })
}

async fn buscar_por_email(
    state: &AppState,
    email: &str,
) -> Result<Option<chatarral_db::Row>, Error> {
    state
        .storage
        .fetch_one(Statement::new(
            "SELECT * FROM usuarios WHERE email = ?",
            vec![Value::from(email)],
        ))
        .await
}

async fn buscar_por_id(state: &AppState, id: i64) -> Result<Option<chatarral_db::Row>, Error> {
    state
        .storage
        .fetch_one(Statement::new(
            "SELECT * FROM usuarios WHERE id = ?",
            vec![Value::Int(id)],
        ))
        .await
}

#[derive(serde::Deserialize)]
struct Registro {
    nombre: Option<String>,
    email: Option<String>,
    password: Option<String>,
    #[serde(rename = "confirmarPassword")]
    confirmar_password: Option<String>,
}

async fn registro(
    State(state): State<AppState>,
    Json(body): Json<Registro>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let nombre = body.nombre.as_deref().map(str::trim).unwrap_or_default();
    let email = body
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();
    let password = body.password.as_deref().unwrap_or_default();
    let confirmar = body.confirmar_password.as_deref().unwrap_or_default();

    if nombre.is_empty() || email.is_empty() || password.is_empty() {
        return Err(Error::validation("Todos los campos son requeridos").into());
    }
    if password != confirmar {
        return Err(Error::validation("Las contraseñas no coinciden").into());
    }
    if password.len() < 6 {
        return Err(Error::validation("La contraseña debe tener al menos 6 caracteres").into());
    }
    if !email_valido(&email) {
        return Err(Error::validation("El formato del email no es válido").into());
    }

    let hash = chatarral_auth::hash_password(password)?;
    let id = state
        .storage
        .insert_returning_id(build_insert(
            "usuarios",
            vec![
                ("nombre", Value::from(nombre)),
                ("email", Value::from(email.as_str())),
                ("password_hash", Value::from(hash)),
                ("rol", Value::from("usuario")),
                ("activo", Value::Bool(true)),
            ],
        ))
        .await?;

    let token = state.tokens.issue_access(id, &email, nombre, "usuario")?;
    let refresh_token = state.tokens.issue_refresh(id)?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Usuario registrado exitosamente",
            "usuario": { "id": id, "nombre": nombre, "email": email, "rol": "usuario" },
            "token": token,
            "refreshToken": refresh_token,
        })),
    ))
}

#[derive(serde::Deserialize)]
struct Login {
    email: Option<String>,
    password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<Login>,
) -> ApiResult<Json<serde_json::Value>> {
    let email = body
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .unwrap_or_default();
    let password = body.password.as_deref().unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(Error::validation("Email y contraseña son requeridos").into());
    }

    let Some(usuario) = buscar_por_email(&state, &email).await? else {
        return Err(ApiError::custom(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "Credenciales inválidas" }),
        ));
    };
    let id = usuario.get_int_or_zero("id");

    if let Some(hasta) = datetime_cell(usuario.get("bloqueado_hasta")) {
        if hasta > now() {
            return Err(Error::Locked {
                until: hasta.format("%Y-%m-%dT%H:%M:%S").to_string(),
            }
            .into());
        }
    }

    if usuario.get_bool("activo") != Some(true) {
        return Err(ApiError::custom(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "Cuenta desactivada. Contacta al administrador" }),
        ));
    }

    let hash = usuario.get_str("password_hash").unwrap_or_default();
    if !chatarral_auth::verify_password(password, hash) {
        let intentos = usuario.get_int_or_zero("intentos_fallidos") + 1;
        let mut sets = vec![("intentos_fallidos", Value::Int(intentos))];
        if intentos >= MAX_ATTEMPTS {
            let hasta = now() + chrono::Duration::minutes(LOCK_MINUTES);
            sets.push(("bloqueado_hasta", Value::DateTime(hasta)));
        }
        state.storage.execute(build_update("usuarios", sets, id)).await?;
        return Err(ApiError::custom(
            StatusCode::UNAUTHORIZED,
            json!({
                "error": "Credenciales inválidas",
                "intentos_restantes": (MAX_ATTEMPTS - intentos).max(0),
            }),
        ));
    }

    state
        .storage
        .execute(build_update(
            "usuarios",
            vec![
                ("intentos_fallidos", Value::Int(0)),
                ("bloqueado_hasta", Value::Null),
                ("ultimo_acceso", Value::DateTime(now())),
            ],
            id,
        ))
        .await?;

    let nombre = usuario.get_str("nombre").unwrap_or_default();
    let rol = usuario.get_str("rol").unwrap_or("usuario");
    let token = state.tokens.issue_access(id, &email, nombre, rol)?;
    let refresh_token = state.tokens.issue_refresh(id)?;
    Ok(Json(json!({
        "message": "Inicio de sesión exitoso",
        "usuario": { "id": id, "nombre": nombre, "email": email, "rol": rol },
        "token": token,
        "refreshToken": refresh_token,
    })))
}

#[derive(serde::Deserialize)]
struct Refresh {
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<Refresh>,
) -> ApiResult<Json<serde_json::Value>> {
    let token = body
        .refresh_token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::auth(AuthCode::TokenRequerido, "Refresh token requerido"))?;

    let claims = state.tokens.verify_refresh(token)?;
    let usuario = buscar_por_id(&state, claims.id)
        .await?
        .filter(|u| u.get_bool("activo") == Some(true))
        .ok_or_else(|| Error::auth(AuthCode::TokenInvalido, "Usuario no válido"))?;

    let email = usuario.get_str("email").unwrap_or_default();
    let nombre = usuario.get_str("nombre").unwrap_or_default();
    let rol = usuario.get_str("rol").unwrap_or("usuario");
    let nuevo = state.tokens.issue_access(claims.id, email, nombre, rol)?;
    let nuevo_refresh = state.tokens.issue_refresh(claims.id)?;
    Ok(Json(json!({
        "message": "Token renovado exitosamente",
        "token": nuevo,
        "refreshToken": nuevo_refresh,
    })))
}

async fn perfil(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<serde_json::Value>> {
    let usuario = buscar_por_id(&state, user.id)
        .await?
        .ok_or_else(|| Error::not_found("Usuario no encontrado"))?;
    let mut cuerpo = usuario_json(&usuario);
    cuerpo["fecha_creacion"] = usuario
        .get("fecha_creacion")
        .map_or(serde_json::Value::Null, Value::to_json);
    cuerpo["ultimo_acceso"] = usuario
        .get("ultimo_acceso")
        .map_or(serde_json::Value::Null, Value::to_json);
    Ok(Json(json!({ "usuario": cuerpo })))
}

#[derive(serde::Deserialize)]
struct ActualizarPerfil {
    nombre: Option<String>,
}

async fn actualizar_perfil(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<ActualizarPerfil>,
) -> ApiResult<Json<serde_json::Value>> {
    let nombre = body.nombre.as_deref().map(str::trim).unwrap_or_default();
    if nombre.is_empty() {
        return Err(Error::validation("El nombre es requerido").into());
    }
    state
        .storage
        .execute(build_update(
            "usuarios",
            vec![
                ("nombre", Value::from(nombre)),
                ("fecha_actualizacion", Value::DateTime(now())),
            ],
            user.id,
        ))
        .await?;
    Ok(Json(json!({
        "message": "Perfil actualizado exitosamente",
        "usuario": { "id": user.id, "nombre": nombre, "email": user.email, "rol": user.rol },
    })))
}

#[derive(serde::Deserialize)]
struct CambiarPassword {
    #[serde(rename = "passwordActual")]
    password_actual: Option<String>,
    #[serde(rename = "passwordNueva")]
    password_nueva: Option<String>,
    #[serde(rename = "confirmarPassword")]
    confirmar_password: Option<String>,
}

async fn cambiar_password(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(body): Json<CambiarPassword>,
) -> ApiResult<Json<serde_json::Value>> {
    let actual = body.password_actual.as_deref().unwrap_or_default();
    let nueva = body.password_nueva.as_deref().unwrap_or_default();
    let confirmar = body.confirmar_password.as_deref().unwrap_or_default();

    if actual.is_empty() || nueva.is_empty() || confirmar.is_empty() {
        return Err(Error::validation("Todos los campos son requeridos").into());
    }
    if nueva != confirmar {
        return Err(Error::validation("Las contraseñas nuevas no coinciden").into());
    }
    if nueva.len() < 6 {
        return Err(
            Error::validation("La nueva contraseña debe tener al menos 6 caracteres").into(),
        );
    }

    let usuario = buscar_por_id(&state, user.id)
        .await?
        .ok_or_else(|| Error::not_found("Usuario no encontrado"))?;
    if !chatarral_auth::verify_password(actual, usuario.get_str("password_hash").unwrap_or_default()) {
        return Err(ApiError::custom(
            StatusCode::UNAUTHORIZED,
            json!({ "error": "Contraseña actual incorrecta" }),
        ));
    }

    let hash = chatarral_auth::hash_password(nueva)?;
    state
        .storage
        .execute(build_update(
            "usuarios",
            vec![
                ("password_hash", Value::from(hash)),
                ("fecha_actualizacion", Value::DateTime(now())),
            ],
            user.id,
        ))
        .await?;
    Ok(Json(json!({ "message": "Contraseña actualizada exitosamente" })))
}

async fn logout(_user: CurrentUser) -> Json<serde_json::Value> {
    Json(json!({ "message": "Sesión cerrada exitosamente" }))
}

async fn verificar(user: CurrentUser) -> Json<serde_json::Value> {
    Json(json!({
        "valido": true,
        "usuario": {
            "id": user.id,
            "email": user.email,
            "nombre": user.nombre,
            "rol": user.rol,
        },
    }))
}
