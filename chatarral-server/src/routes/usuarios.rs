//! `/api/usuarios`: account administration, administrators only.

use axum::extract::{Path, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use chatarral_core::Error;
use chatarral_db::{build_update, Row, Statement, Value};
use serde_json::json;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(listar))
        .route("/{id}/toggle", put(toggle))
}

type ApiResult<T> = Result<T, ApiError>;

async fn listar(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    user.require_admin()?;
    let rows = state
        .storage
        .fetch_all(Statement::new(
            "SELECT id, nombre, email, rol, activo, fecha_creacion, ultimo_acceso \
             FROM usuarios ORDER BY fecha_creacion DESC",
            vec![],
        ))
        .await?;
    Ok(Json(rows.iter().map(Row::to_json).collect()))
}

async fn toggle(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    user.require_admin()?;
    if id == user.id {
        return Err(Error::validation("No puedes desactivar tu propia cuenta").into());
    }

    let objetivo = state
        .storage
        .fetch_one(Statement::new(
            "SELECT id, activo FROM usuarios WHERE id = ?",
            vec![Value::Int(id)],
        ))
        .await?
        .ok_or_else(|| Error::not_found("Usuario no encontrado"))?;

    let nuevo_estado = objetivo.get_bool("activo") != Some(true);
    state
        .storage
        .execute(build_update(
            "usuarios",
            vec![
                ("activo", Value::Bool(nuevo_estado)),
                (
                    "fecha_actualizacion",
                    Value::DateTime(chrono::Utc::now().naive_utc()),
                ),
            ],
            id,
        ))
        .await?;

    let message = if nuevo_estado {
        "Usuario activado exitosamente"
    } else {
        "Usuario desactivado exitosamente"
    };
    Ok(Json(json!({ "message": message, "activo": nuevo_estado })))
}
