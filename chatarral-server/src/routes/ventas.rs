//! `/api/ventas`: material sales.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chatarral_core::Error;
use chatarral_db::{
    build_count, build_delete, build_get, build_insert, build_list, build_update, ListFilter,
    RawListParams, Row, Statement, TableSpec, Value,
};
use chrono::NaiveDate;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::pagination::Paginacion;
use crate::routes::compras::material_activo;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(listar).post(crear))
        .route("/{id}", get(obtener).put(actualizar).delete(eliminar))
        .route("/estadisticas/resumen", get(estadisticas))
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_fecha(raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("fecha inválida: '{raw}' (use YYYY-MM-DD)")))
}

async fn listar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let spec = TableSpec::ventas();
    let filter = ListFilter::from_raw(&raw)?;
    let rows = state.storage.fetch_all(build_list(&spec, &filter, None)).await?;
    let total = state
        .storage
        .fetch_one(build_count(&spec, &filter))
        .await?
        .map_or(0, |r| r.get_int_or_zero("total"));
    Ok(Json(json!({
        "ventas": rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        "paginacion": Paginacion::new(&filter, total),
    })))
}

async fn obtener(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let venta = state
        .storage
        .fetch_one(build_get(&TableSpec::ventas(), id))
        .await?
        .ok_or_else(|| Error::not_found("Venta no encontrada"))?;
    Ok(Json(venta.to_json()))
}

#[derive(serde::Deserialize)]
struct NuevaVenta {
    material_id: Option<i64>,
    fecha: Option<String>,
    kilos: Option<f64>,
    precio_kilo: Option<f64>,
    cliente: Option<String>,
    observaciones: Option<String>,
}

async fn crear(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(body): Json<NuevaVenta>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (Some(material_id), Some(fecha), Some(kilos), Some(precio_kilo)) =
        (body.material_id, body.fecha.as_deref(), body.kilos, body.precio_kilo)
    else {
        return Err(Error::validation(
            "Material, fecha, kilos y precio por kilo son requeridos",
        )
        .into());
    };
    material_activo(&state, material_id).await?;
    let fecha = parse_fecha(fecha)?;
    if kilos <= 0.0 || precio_kilo <= 0.0 {
        return Err(Error::validation("Los kilos y el precio deben ser mayores a cero").into());
    }
    let total_pesos = kilos * precio_kilo;

    let id = state
        .storage
        .insert_returning_id(build_insert(
            "ventas",
            vec![
                ("material_id", Value::Int(material_id)),
                ("fecha", Value::Date(fecha)),
                ("kilos", Value::Float(kilos)),
                ("precio_kilo", Value::Float(precio_kilo)),
                ("total_pesos", Value::Float(total_pesos)),
                ("cliente", Value::from(body.cliente)),
                ("observaciones", Value::from(body.observaciones)),
            ],
        ))
        .await?;

    let creada = state
        .storage
        .fetch_one(build_get(&TableSpec::ventas(), id))
        .await?
        .ok_or_else(|| Error::Storage("venta recién creada ausente".to_string()))?;
    Ok((StatusCode::CREATED, Json(creada.to_json())))
}

#[derive(serde::Deserialize)]
struct ActualizarVenta {
    material_id: Option<i64>,
    fecha: Option<String>,
    kilos: Option<f64>,
    precio_kilo: Option<f64>,
    cliente: Option<String>,
    observaciones: Option<String>,
}

async fn actualizar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ActualizarVenta>,
) -> ApiResult<Json<serde_json::Value>> {
    let existente = state
        .storage
        .fetch_one(Statement::new(
            "SELECT * FROM ventas WHERE id = ?",
            vec![Value::Int(id)],
        ))
        .await?
        .ok_or_else(|| Error::not_found("Venta no encontrada"))?;

    if let Some(material_id) = body.material_id {
        material_activo(&state, material_id).await?;
    }
    if matches!(body.kilos, Some(k) if k <= 0.0)
        || matches!(body.precio_kilo, Some(p) if p <= 0.0)
    {
        return Err(Error::validation("Los kilos y el precio deben ser mayores a cero").into());
    }

    let mut sets: Vec<(&str, Value)> = Vec::new();
    if let Some(material_id) = body.material_id {
        sets.push(("material_id", Value::Int(material_id)));
    }
    if let Some(fecha) = body.fecha.as_deref() {
        sets.push(("fecha", Value::Date(parse_fecha(fecha)?)));
    }
    if let Some(kilos) = body.kilos {
        sets.push(("kilos", Value::Float(kilos)));
    }
    if let Some(precio) = body.precio_kilo {
        sets.push(("precio_kilo", Value::Float(precio)));
    }
    if let Some(cliente) = body.cliente {
        sets.push(("cliente", Value::from(cliente)));
    }
    if let Some(obs) = body.observaciones {
        sets.push(("observaciones", Value::from(obs)));
    }
    if sets.is_empty() {
        return Err(Error::validation("No se enviaron campos para actualizar").into());
    }

    // The stored total always equals kilos × precio_kilo.
    if body.kilos.is_some() || body.precio_kilo.is_some() {
        let kilos = body
            .kilos
            .or_else(|| existente.get_float("kilos"))
            .unwrap_or(0.0);
        let precio = body
            .precio_kilo
            .or_else(|| existente.get_float("precio_kilo"))
            .unwrap_or(0.0);
        sets.push(("total_pesos", Value::Float(kilos * precio)));
    }

    state.storage.execute(build_update("ventas", sets, id)).await?;
    let actualizada = state
        .storage
        .fetch_one(build_get(&TableSpec::ventas(), id))
        .await?
        .ok_or_else(|| Error::not_found("Venta no encontrada"))?;
    Ok(Json(actualizada.to_json()))
}

async fn eliminar(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let resultado = state.storage.execute(build_delete("ventas", id)).await?;
    if resultado.rows_affected == 0 {
        return Err(Error::not_found("Venta no encontrada").into());
    }
    Ok(Json(json!({ "message": "Venta eliminada exitosamente" })))
}

fn rango(raw: &RawListParams) -> Result<(Vec<String>, Vec<Value>), Error> {
    let filter = ListFilter::from_raw(raw)?;
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(inicio) = filter.fecha_inicio {
        clauses.push("v.fecha >= ?".to_string());
        params.push(Value::Date(inicio));
    }
    if let Some(fin) = filter.fecha_fin {
        clauses.push("v.fecha <= ?".to_string());
        params.push(Value::Date(fin));
    }
    Ok((clauses, params))
}

fn where_sql(clauses: &[String]) -> String {
    if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    }
}

async fn estadisticas(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let (clauses, params) = rango(&raw)?;

    let generales = state
        .storage
        .fetch_one(Statement::new(
            format!(
                "SELECT COUNT(*) AS total_transacciones, \
                 COALESCE(SUM(total_pesos), 0) AS total_pesos, \
                 COALESCE(SUM(kilos), 0) AS total_kilos, \
                 COALESCE(AVG(total_pesos), 0) AS promedio_venta, \
                 COALESCE(AVG(precio_kilo), 0) AS precio_promedio_kilo \
                 FROM ventas v{}",
                where_sql(&clauses),
            ),
            params.clone(),
        ))
        .await?;

    let top_materiales = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT m.nombre, m.categoria, SUM(v.kilos) AS total_kilos, \
                 SUM(v.total_pesos) AS total_pesos, AVG(v.precio_kilo) AS precio_promedio, \
                 COUNT(*) AS transacciones \
                 FROM ventas v JOIN materiales m ON v.material_id = m.id{} \
                 GROUP BY m.id, m.nombre, m.categoria \
                 ORDER BY total_pesos DESC LIMIT 10",
                where_sql(&clauses),
            ),
            params.clone(),
        ))
        .await?;

    let mut clauses_clientes = clauses;
    clauses_clientes.push("cliente IS NOT NULL".to_string());
    clauses_clientes.push("cliente != ''".to_string());
    let top_clientes = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT cliente, COUNT(*) AS transacciones, \
                 SUM(total_pesos) AS total_pesos, SUM(kilos) AS total_kilos \
                 FROM ventas v{} \
                 GROUP BY cliente ORDER BY total_pesos DESC LIMIT 10",
                where_sql(&clauses_clientes),
            ),
            params,
        ))
        .await?;

    Ok(Json(json!({
        "estadisticas_generales": generales.as_ref().map_or(json!({}), Row::to_json),
        "top_materiales": top_materiales.iter().map(Row::to_json).collect::<Vec<_>>(),
        "top_clientes": top_clientes.iter().map(Row::to_json).collect::<Vec<_>>(),
    })))
}
