//! `/api/materiales`: the material catalog.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, put};
use axum::{Json, Router};
use chatarral_core::Error;
use chatarral_db::{
    build_delete, build_get, build_insert, build_list_all, build_update, ListFilter,
    RawListParams, Row, Statement, TableSpec, Value,
};

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(listar).post(crear))
        .route("/{id}", get(obtener).put(actualizar).delete(eliminar))
        .route("/categorias/lista", get(categorias))
        .route("/buscar/{termino}", get(buscar))
        .route("/categoria/{categoria}/precios", put(ajustar_precios))
}

type ApiResult<T> = Result<T, ApiError>;

fn ahora() -> Value {
    Value::DateTime(chrono::Utc::now().naive_utc())
}

async fn obtener_fila(state: &AppState, id: i64) -> Result<Option<Row>, Error> {
    state
        .storage
        .fetch_one(build_get(&TableSpec::materiales(), id))
        .await
}

/// Case-insensitive duplicate lookup, optionally excluding one row.
async fn nombre_duplicado(
    state: &AppState,
    nombre: &str,
    excluir_id: Option<i64>,
) -> Result<bool, Error> {
    let stmt = match excluir_id {
        Some(id) => Statement::new(
            "SELECT id FROM materiales WHERE LOWER(nombre) = LOWER(?) AND id != ?",
            vec![Value::from(nombre), Value::Int(id)],
        ),
        None => Statement::new(
            "SELECT id FROM materiales WHERE LOWER(nombre) = LOWER(?)",
            vec![Value::from(nombre)],
        ),
    };
    Ok(state.storage.fetch_one(stmt).await?.is_some())
}

async fn listar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let filter = ListFilter::from_raw(&raw)?;
    // Catalog endpoint: the whole filtered set, no pagination.
    let rows = state
        .storage
        .fetch_all(build_list_all(
            &TableSpec::materiales(),
            &filter,
            Some("categoria, nombre"),
        ))
        .await?;
    Ok(Json(rows.iter().map(Row::to_json).collect()))
}

async fn obtener(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let material = obtener_fila(&state, id)
        .await?
        .ok_or_else(|| Error::not_found("Material no encontrado"))?;
    Ok(Json(material.to_json()))
}

#[derive(serde::Deserialize)]
struct NuevoMaterial {
    nombre: Option<String>,
    categoria: Option<String>,
    #[serde(default)]
    precio_ordinario: Option<f64>,
    #[serde(default)]
    precio_camion: Option<f64>,
    #[serde(default)]
    precio_noche: Option<f64>,
}

async fn crear(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(body): Json<NuevoMaterial>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let nombre = body.nombre.as_deref().map(str::trim).unwrap_or_default();
    let categoria = body.categoria.as_deref().map(str::trim).unwrap_or_default();
    if nombre.is_empty() || categoria.is_empty() {
        return Err(Error::validation("Nombre y categoría son requeridos").into());
    }
    if nombre_duplicado(&state, nombre, None).await? {
        return Err(Error::Conflict {
            constraint: "materiales.nombre".to_string(),
        }
        .into());
    }

    let id = state
        .storage
        .insert_returning_id(build_insert(
            "materiales",
            vec![
                ("nombre", Value::from(nombre)),
                ("categoria", Value::from(categoria)),
                ("precio_ordinario", Value::Float(body.precio_ordinario.unwrap_or(0.0))),
                ("precio_camion", Value::Float(body.precio_camion.unwrap_or(0.0))),
                ("precio_noche", Value::Float(body.precio_noche.unwrap_or(0.0))),
                ("activo", Value::Bool(true)),
            ],
        ))
        .await?;

    let creado = obtener_fila(&state, id)
        .await?
        .ok_or_else(|| Error::Storage("material recién creado ausente".to_string()))?;
    Ok((StatusCode::CREATED, Json(creado.to_json())))
}

#[derive(serde::Deserialize)]
struct ActualizarMaterial {
    nombre: Option<String>,
    categoria: Option<String>,
    precio_ordinario: Option<f64>,
    precio_camion: Option<f64>,
    precio_noche: Option<f64>,
    activo: Option<bool>,
}

async fn actualizar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ActualizarMaterial>,
) -> ApiResult<Json<serde_json::Value>> {
    let existente = obtener_fila(&state, id)
        .await?
        .ok_or_else(|| Error::not_found("Material no encontrado"))?;

    if let Some(nombre) = body.nombre.as_deref() {
        if Some(nombre) != existente.get_str("nombre")
            && nombre_duplicado(&state, nombre, Some(id)).await?
        {
            return Err(Error::Conflict {
                constraint: "materiales.nombre".to_string(),
            }
            .into());
        }
    }

    let mut sets: Vec<(&str, Value)> = vec![("fecha_actualizacion", ahora())];
    if let Some(nombre) = body.nombre.as_deref() {
        sets.push(("nombre", Value::from(nombre)));
    }
    if let Some(categoria) = body.categoria.as_deref() {
        sets.push(("categoria", Value::from(categoria)));
    }
    if let Some(p) = body.precio_ordinario {
        sets.push(("precio_ordinario", Value::Float(p)));
    }
    if let Some(p) = body.precio_camion {
        sets.push(("precio_camion", Value::Float(p)));
    }
    if let Some(p) = body.precio_noche {
        sets.push(("precio_noche", Value::Float(p)));
    }
    if let Some(activo) = body.activo {
        sets.push(("activo", Value::Bool(activo)));
    }

    state.storage.execute(build_update("materiales", sets, id)).await?;
    let actualizado = obtener_fila(&state, id)
        .await?
        .ok_or_else(|| Error::not_found("Material no encontrado"))?;
    Ok(Json(actualizado.to_json()))
}

async fn eliminar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    obtener_fila(&state, id)
        .await?
        .ok_or_else(|| Error::not_found("Material no encontrado"))?;

    let referencias = state
        .storage
        .fetch_one(Statement::new(
            "SELECT (SELECT COUNT(*) FROM compras_materiales WHERE material_id = ?) + \
             (SELECT COUNT(*) FROM ventas WHERE material_id = ?) AS total",
            vec![Value::Int(id), Value::Int(id)],
        ))
        .await?
        .map_or(0, |r| r.get_int_or_zero("total"));

    if referencias > 0 {
        state
            .storage
            .execute(build_update(
                "materiales",
                vec![("activo", Value::Bool(false)), ("fecha_actualizacion", ahora())],
                id,
            ))
            .await?;
        Ok(Json(serde_json::json!({
            "message": "Material desactivado (tiene transacciones asociadas)",
            "action": "deactivated",
        })))
    } else {
        state.storage.execute(build_delete("materiales", id)).await?;
        Ok(Json(serde_json::json!({
            "message": "Material eliminado completamente",
            "action": "deleted",
        })))
    }
}

async fn categorias(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> ApiResult<Json<Vec<String>>> {
    let activo = state.storage.dialect().bool_literal(true);
    let rows = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT DISTINCT categoria FROM materiales WHERE activo = {activo} \
                 ORDER BY categoria"
            ),
            vec![],
        ))
        .await?;
    Ok(Json(
        rows.iter()
            .filter_map(|r| r.get_str("categoria").map(ToString::to_string))
            .collect(),
    ))
}

#[derive(serde::Deserialize, Default)]
struct BuscarParams {
    limite: Option<u32>,
}

async fn buscar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(termino): Path<String>,
    Query(params): Query<BuscarParams>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let termino = termino.trim();
    if termino.chars().count() < 2 {
        return Err(
            Error::validation("El término de búsqueda debe tener al menos 2 caracteres").into(),
        );
    }
    let limite = params.limite.unwrap_or(10).min(100);
    let activo = state.storage.dialect().bool_literal(true);
    let rows = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT * FROM materiales WHERE activo = {activo} \
                 AND (LOWER(nombre) LIKE LOWER(?) OR LOWER(categoria) LIKE LOWER(?)) \
                 ORDER BY CASE WHEN LOWER(nombre) LIKE LOWER(?) THEN 1 ELSE 2 END, nombre \
                 LIMIT ?"
            ),
            vec![
                Value::String(format!("%{termino}%")),
                Value::String(format!("%{termino}%")),
                Value::String(format!("{termino}%")),
                Value::from(limite),
            ],
        ))
        .await?;
    Ok(Json(rows.iter().map(Row::to_json).collect()))
}

#[derive(serde::Deserialize)]
struct AjustePrecios {
    precio_ordinario_incremento: Option<f64>,
    precio_camion_incremento: Option<f64>,
    precio_noche_incremento: Option<f64>,
    tipo_incremento: Option<String>,
}

async fn ajustar_precios(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(categoria): Path<String>,
    Json(body): Json<AjustePrecios>,
) -> ApiResult<Json<serde_json::Value>> {
    let porcentaje = match body.tipo_incremento.as_deref().unwrap_or("porcentaje") {
        "porcentaje" => true,
        "valor_fijo" => false,
        otro => {
            return Err(Error::validation(format!(
                "tipo_incremento inválido: '{otro}' (use porcentaje o valor_fijo)"
            ))
            .into())
        }
    };

    let incrementos = [
        ("precio_ordinario", body.precio_ordinario_incremento),
        ("precio_camion", body.precio_camion_incremento),
        ("precio_noche", body.precio_noche_incremento),
    ];
    if incrementos.iter().all(|(_, v)| v.is_none()) {
        return Err(Error::validation("Debe indicar al menos un incremento de precio").into());
    }

    let mut sql = "UPDATE materiales SET fecha_actualizacion = ?".to_string();
    let mut params = vec![ahora()];
    for (columna, incremento) in incrementos {
        if let Some(valor) = incremento {
            if porcentaje {
                sql.push_str(&format!(", {columna} = {columna} * (1 + ? / 100)"));
            } else {
                sql.push_str(&format!(", {columna} = {columna} + ?"));
            }
            params.push(Value::Float(valor));
        }
    }
    let activo = state.storage.dialect().bool_literal(true);
    sql.push_str(&format!(" WHERE categoria = ? AND activo = {activo}"));
    params.push(Value::from(categoria.as_str()));

    let resultado = state.storage.execute(Statement::new(sql, params)).await?;
    Ok(Json(serde_json::json!({
        "message": format!(
            "Precios actualizados para {} materiales en la categoría {categoria}",
            resultado.rows_affected
        ),
        "materialesActualizados": resultado.rows_affected,
    })))
}
