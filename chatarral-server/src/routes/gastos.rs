//! `/api/gastos`: expenses and their categories.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chatarral_core::Error;
use chatarral_db::{
    build_count, build_delete, build_get, build_insert, build_list, build_list_all, build_update,
    ListFilter, RawListParams, Row, Statement, TableSpec, Value,
};
use chrono::NaiveDate;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::pagination::Paginacion;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(listar).post(crear))
        .route("/categorias", get(listar_categorias).post(crear_categoria))
        .route("/{id}", get(obtener).put(actualizar).delete(eliminar))
        .route("/estadisticas/resumen", get(estadisticas))
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_fecha(raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("fecha inválida: '{raw}' (use YYYY-MM-DD)")))
}

async fn categoria_activa(state: &AppState, categoria_id: i64) -> Result<Row, ApiError> {
    let activo = state.storage.dialect().bool_literal(true);
    state
        .storage
        .fetch_one(Statement::new(
            format!("SELECT * FROM categorias_gastos WHERE id = ? AND activo = {activo}"),
            vec![Value::Int(categoria_id)],
        ))
        .await?
        .ok_or_else(|| Error::not_found("Categoría no encontrada o inactiva").into())
}

// -------- categorías --------

async fn listar_categorias(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<Vec<serde_json::Value>>> {
    let filter = ListFilter::from_raw(&raw)?;
    // Catalog endpoint: the whole filtered set, no pagination.
    let rows = state
        .storage
        .fetch_all(build_list_all(
            &TableSpec::categorias_gastos(),
            &filter,
            Some("nombre"),
        ))
        .await?;
    Ok(Json(rows.iter().map(Row::to_json).collect()))
}

#[derive(serde::Deserialize)]
struct NuevaCategoria {
    nombre: Option<String>,
    descripcion: Option<String>,
}

async fn crear_categoria(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(body): Json<NuevaCategoria>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let nombre = body.nombre.as_deref().map(str::trim).unwrap_or_default();
    if nombre.is_empty() {
        return Err(Error::validation("El nombre es requerido").into());
    }

    let id = state
        .storage
        .insert_returning_id(build_insert(
            "categorias_gastos",
            vec![
                ("nombre", Value::from(nombre)),
                ("descripcion", Value::from(body.descripcion)),
                ("activo", Value::Bool(true)),
            ],
        ))
        .await?;

    let creada = state
        .storage
        .fetch_one(build_get(&TableSpec::categorias_gastos(), id))
        .await?
        .ok_or_else(|| Error::Storage("categoría recién creada ausente".to_string()))?;
    Ok((StatusCode::CREATED, Json(creada.to_json())))
}

// -------- gastos --------

async fn listar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let spec = TableSpec::gastos();
    let filter = ListFilter::from_raw(&raw)?;
    let rows = state.storage.fetch_all(build_list(&spec, &filter, None)).await?;
    let total = state
        .storage
        .fetch_one(build_count(&spec, &filter))
        .await?
        .map_or(0, |r| r.get_int_or_zero("total"));
    Ok(Json(json!({
        "gastos": rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        "paginacion": Paginacion::new(&filter, total),
    })))
}

async fn obtener(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let gasto = state
        .storage
        .fetch_one(build_get(&TableSpec::gastos(), id))
        .await?
        .ok_or_else(|| Error::not_found("Gasto no encontrado"))?;
    Ok(Json(gasto.to_json()))
}

#[derive(serde::Deserialize)]
struct NuevoGasto {
    categoria_id: Option<i64>,
    fecha: Option<String>,
    concepto: Option<String>,
    valor: Option<f64>,
    observaciones: Option<String>,
}

async fn crear(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(body): Json<NuevoGasto>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (Some(categoria_id), Some(fecha), Some(concepto), Some(valor)) = (
        body.categoria_id,
        body.fecha.as_deref(),
        body.concepto.as_deref().map(str::trim).filter(|c| !c.is_empty()),
        body.valor,
    ) else {
        return Err(
            Error::validation("Categoría, fecha, concepto y valor son requeridos").into(),
        );
    };
    categoria_activa(&state, categoria_id).await?;
    let fecha = parse_fecha(fecha)?;
    if valor <= 0.0 {
        return Err(Error::validation("El valor debe ser un número mayor a cero").into());
    }

    let id = state
        .storage
        .insert_returning_id(build_insert(
            "gastos",
            vec![
                ("categoria_id", Value::Int(categoria_id)),
                ("fecha", Value::Date(fecha)),
                ("concepto", Value::from(concepto)),
                ("valor", Value::Float(valor)),
                ("observaciones", Value::from(body.observaciones)),
            ],
        ))
        .await?;

    let creado = state
        .storage
        .fetch_one(build_get(&TableSpec::gastos(), id))
        .await?
        .ok_or_else(|| Error::Storage("gasto recién creado ausente".to_string()))?;
    Ok((StatusCode::CREATED, Json(creado.to_json())))
}

#[derive(serde::Deserialize)]
struct ActualizarGasto {
    categoria_id: Option<i64>,
    fecha: Option<String>,
    concepto: Option<String>,
    valor: Option<f64>,
    observaciones: Option<String>,
}

async fn actualizar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ActualizarGasto>,
) -> ApiResult<Json<serde_json::Value>> {
    if let Some(categoria_id) = body.categoria_id {
        categoria_activa(&state, categoria_id).await?;
    }
    if matches!(body.valor, Some(v) if v <= 0.0) {
        return Err(Error::validation("El valor debe ser mayor a cero").into());
    }

    let mut sets: Vec<(&str, Value)> = Vec::new();
    if let Some(categoria_id) = body.categoria_id {
        sets.push(("categoria_id", Value::Int(categoria_id)));
    }
    if let Some(fecha) = body.fecha.as_deref() {
        sets.push(("fecha", Value::Date(parse_fecha(fecha)?)));
    }
    if let Some(concepto) = body.concepto {
        sets.push(("concepto", Value::from(concepto)));
    }
    if let Some(valor) = body.valor {
        sets.push(("valor", Value::Float(valor)));
    }
    if let Some(obs) = body.observaciones {
        sets.push(("observaciones", Value::from(obs)));
    }
    if sets.is_empty() {
        return Err(Error::validation("No se enviaron campos para actualizar").into());
    }

    let resultado = state.storage.execute(build_update("gastos", sets, id)).await?;
    if resultado.rows_affected == 0 {
        return Err(Error::not_found("Gasto no encontrado").into());
    }
    let actualizado = state
        .storage
        .fetch_one(build_get(&TableSpec::gastos(), id))
        .await?
        .ok_or_else(|| Error::not_found("Gasto no encontrado"))?;
    Ok(Json(actualizado.to_json()))
}

async fn eliminar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let resultado = state.storage.execute(build_delete("gastos", id)).await?;
    if resultado.rows_affected == 0 {
        return Err(Error::not_found("Gasto no encontrado").into());
    }
    Ok(Json(json!({ "message": "Gasto eliminado correctamente" })))
}

// -------- estadísticas --------

async fn estadisticas(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let filter = ListFilter::from_raw(&raw)?;
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(inicio) = filter.fecha_inicio {
        clauses.push("g.fecha >= ?");
        params.push(Value::Date(inicio));
    }
    if let Some(fin) = filter.fecha_fin {
        clauses.push("g.fecha <= ?");
        params.push(Value::Date(fin));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };

    let generales = state
        .storage
        .fetch_one(Statement::new(
            format!(
                "SELECT COUNT(*) AS total_transacciones, \
                 COALESCE(SUM(valor), 0) AS total_gastos, \
                 COALESCE(AVG(valor), 0) AS promedio_gasto \
                 FROM gastos g{where_sql}"
            ),
            params.clone(),
        ))
        .await?;

    let por_categoria = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT c.nombre AS categoria, c.descripcion, \
                 SUM(g.valor) AS total_gastos, COUNT(*) AS transacciones, \
                 AVG(g.valor) AS promedio \
                 FROM gastos g JOIN categorias_gastos c ON g.categoria_id = c.id{where_sql} \
                 GROUP BY c.id, c.nombre, c.descripcion \
                 ORDER BY total_gastos DESC"
            ),
            params,
        ))
        .await?;

    Ok(Json(json!({
        "estadisticas_generales": generales.as_ref().map_or(json!({}), Row::to_json),
        "gastos_por_categoria": por_categoria.iter().map(Row::to_json).collect::<Vec<_>>(),
    })))
}
