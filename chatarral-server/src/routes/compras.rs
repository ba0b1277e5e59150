//! `/api/compras`: general purchases, per-material purchases, the
//! client autocomplete and the purchase statistics summary.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chatarral_core::Error;
use chatarral_db::{
    build_count, build_delete, build_get, build_insert, build_list, build_update, ListFilter,
    RawListParams, Row, Statement, TableSpec, TipoPrecio, Value,
};
use chrono::NaiveDate;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::pagination::Paginacion;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/clientes/lista", get(clientes_lista))
        .route("/generales", get(listar_generales).post(crear_general))
        .route(
            "/generales/{id}",
            get(obtener_general).put(actualizar_general).delete(eliminar_general),
        )
        .route("/materiales", get(listar_materiales).post(crear_material))
        .route(
            "/materiales/{id}",
            get(obtener_material).put(actualizar_material).delete(eliminar_material),
        )
        .route("/estadisticas/resumen", get(estadisticas))
}

type ApiResult<T> = Result<T, ApiError>;

fn parse_fecha(raw: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("fecha inválida: '{raw}' (use YYYY-MM-DD)")))
}

/// Material lookup used before inserting or repointing a transaction.
pub(crate) async fn material_activo(state: &AppState, material_id: i64) -> Result<Row, ApiError> {
    let activo = state.storage.dialect().bool_literal(true);
    state
        .storage
        .fetch_one(Statement::new(
            format!("SELECT * FROM materiales WHERE id = ? AND activo = {activo}"),
            vec![Value::Int(material_id)],
        ))
        .await?
        .ok_or_else(|| Error::not_found("Material no encontrado o inactivo").into())
}

async fn lista_paginada(
    state: &AppState,
    spec: &TableSpec,
    raw: &RawListParams,
) -> Result<(Vec<Row>, Paginacion), ApiError> {
    let filter = ListFilter::from_raw(raw)?;
    let rows = state.storage.fetch_all(build_list(spec, &filter, None)).await?;
    let total = state
        .storage
        .fetch_one(build_count(spec, &filter))
        .await?
        .map_or(0, |r| r.get_int_or_zero("total"));
    Ok((rows, Paginacion::new(&filter, total)))
}

#[derive(serde::Deserialize, Default)]
struct ClientesParams {
    buscar: Option<String>,
    tipo: Option<String>,
}

async fn clientes_en(
    state: &AppState,
    tabla: &str,
    patron: &str,
    limite: u32,
) -> Result<Vec<String>, Error> {
    let rows = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT DISTINCT cliente FROM {tabla} \
                 WHERE cliente IS NOT NULL AND cliente != '' \
                 AND LOWER(cliente) LIKE LOWER(?) \
                 ORDER BY cliente ASC LIMIT ?"
            ),
            vec![Value::from(patron), Value::from(limite)],
        ))
        .await?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get_str("cliente").map(ToString::to_string))
        .collect())
}

async fn clientes_lista(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<ClientesParams>,
) -> ApiResult<Json<Vec<String>>> {
    let buscar = params.buscar.as_deref().map(str::trim).unwrap_or_default();
    if buscar.chars().count() < 2 {
        return Err(
            Error::validation("Parámetro buscar debe tener al menos 2 caracteres").into(),
        );
    }
    let patron = format!("%{buscar}%");

    let clientes = match params.tipo.as_deref() {
        Some("material") => clientes_en(&state, "compras_materiales", &patron, 10).await?,
        Some("general") => clientes_en(&state, "compras_generales", &patron, 10).await?,
        None | Some("") => {
            let mut unidos = clientes_en(&state, "compras_materiales", &patron, 5).await?;
            for c in clientes_en(&state, "compras_generales", &patron, 5).await? {
                if !unidos.contains(&c) {
                    unidos.push(c);
                }
            }
            unidos.truncate(10);
            unidos
        }
        Some(_) => {
            return Err(Error::validation("Tipo debe ser \"general\" o \"material\"").into());
        }
    };
    Ok(Json(clientes))
}

// -------- compras generales --------

async fn listar_generales(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let (rows, paginacion) =
        lista_paginada(&state, &TableSpec::compras_generales(), &raw).await?;
    Ok(Json(json!({
        "compras": rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        "paginacion": paginacion,
    })))
}

#[derive(serde::Deserialize)]
struct NuevaCompraGeneral {
    fecha: Option<String>,
    total_pesos: Option<f64>,
    tipo_precio: Option<String>,
    cliente: Option<String>,
    observaciones: Option<String>,
}

async fn crear_general(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(body): Json<NuevaCompraGeneral>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (Some(fecha), Some(total_pesos), Some(tipo)) =
        (body.fecha.as_deref(), body.total_pesos, body.tipo_precio.as_deref())
    else {
        return Err(
            Error::validation("Fecha, total en pesos y tipo de precio son requeridos").into(),
        );
    };
    let fecha = parse_fecha(fecha)?;
    let tipo = TipoPrecio::parse(tipo)?;
    if total_pesos <= 0.0 {
        return Err(Error::validation("El total debe ser mayor a cero").into());
    }

    let id = state
        .storage
        .insert_returning_id(build_insert(
            "compras_generales",
            vec![
                ("fecha", Value::Date(fecha)),
                ("total_pesos", Value::Float(total_pesos)),
                ("tipo_precio", Value::from(tipo.as_str())),
                ("cliente", Value::from(body.cliente)),
                ("observaciones", Value::from(body.observaciones)),
            ],
        ))
        .await?;

    let creada = state
        .storage
        .fetch_one(build_get(&TableSpec::compras_generales(), id))
        .await?
        .ok_or_else(|| Error::Storage("compra recién creada ausente".to_string()))?;
    Ok((StatusCode::CREATED, Json(creada.to_json())))
}

async fn obtener_general(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let compra = state
        .storage
        .fetch_one(build_get(&TableSpec::compras_generales(), id))
        .await?
        .ok_or_else(|| Error::not_found("Compra no encontrada"))?;
    Ok(Json(compra.to_json()))
}

#[derive(serde::Deserialize)]
struct ActualizarCompraGeneral {
    fecha: Option<String>,
    total_pesos: Option<f64>,
    tipo_precio: Option<String>,
    cliente: Option<String>,
    observaciones: Option<String>,
}

async fn actualizar_general(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ActualizarCompraGeneral>,
) -> ApiResult<Json<serde_json::Value>> {
    let mut sets: Vec<(&str, Value)> = Vec::new();
    if let Some(fecha) = body.fecha.as_deref() {
        sets.push(("fecha", Value::Date(parse_fecha(fecha)?)));
    }
    if let Some(total) = body.total_pesos {
        if total <= 0.0 {
            return Err(Error::validation("El total debe ser mayor a cero").into());
        }
        sets.push(("total_pesos", Value::Float(total)));
    }
    if let Some(tipo) = body.tipo_precio.as_deref() {
        sets.push(("tipo_precio", Value::from(TipoPrecio::parse(tipo)?.as_str())));
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

    let resultado = state
        .storage
        .execute(build_update("compras_generales", sets, id))
        .await?;
    if resultado.rows_affected == 0 {
        return Err(Error::not_found("Compra no encontrada").into());
    }
    let actualizada = state
        .storage
        .fetch_one(build_get(&TableSpec::compras_generales(), id))
        .await?
        .ok_or_else(|| Error::not_found("Compra no encontrada"))?;
    Ok(Json(actualizada.to_json()))
}

async fn eliminar_general(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let resultado = state
        .storage
        .execute(build_delete("compras_generales", id))
        .await?;
    if resultado.rows_affected == 0 {
        return Err(Error::not_found("Compra no encontrada").into());
    }
    Ok(Json(json!({ "message": "Compra eliminada exitosamente" })))
}

// -------- compras por material --------

async fn listar_materiales(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let (rows, paginacion) =
        lista_paginada(&state, &TableSpec::compras_materiales(), &raw).await?;
    Ok(Json(json!({
        "compras": rows.iter().map(Row::to_json).collect::<Vec<_>>(),
        "paginacion": paginacion,
    })))
}

#[derive(serde::Deserialize)]
struct NuevaCompraMaterial {
    material_id: Option<i64>,
    fecha: Option<String>,
    kilos: Option<f64>,
    precio_kilo: Option<f64>,
    tipo_precio: Option<String>,
    cliente: Option<String>,
    observaciones: Option<String>,
}

async fn crear_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(body): Json<NuevaCompraMaterial>,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let (Some(material_id), Some(fecha), Some(kilos), Some(precio_kilo), Some(tipo)) = (
        body.material_id,
        body.fecha.as_deref(),
        body.kilos,
        body.precio_kilo,
        body.tipo_precio.as_deref(),
    ) else {
        return Err(Error::validation(
            "Material, fecha, kilos, precio por kilo y tipo de precio son requeridos",
        )
        .into());
    };
    material_activo(&state, material_id).await?;
    let fecha = parse_fecha(fecha)?;
    let tipo = TipoPrecio::parse(tipo)?;
    if kilos <= 0.0 || precio_kilo <= 0.0 {
        return Err(Error::validation("Los kilos y el precio deben ser mayores a cero").into());
    }
    let total_pesos = kilos * precio_kilo;

    let id = state
        .storage
        .insert_returning_id(build_insert(
            "compras_materiales",
            vec![
                ("material_id", Value::Int(material_id)),
                ("fecha", Value::Date(fecha)),
                ("kilos", Value::Float(kilos)),
                ("precio_kilo", Value::Float(precio_kilo)),
                ("total_pesos", Value::Float(total_pesos)),
                ("tipo_precio", Value::from(tipo.as_str())),
                ("cliente", Value::from(body.cliente)),
                ("observaciones", Value::from(body.observaciones)),
            ],
        ))
        .await?;

    let creada = state
        .storage
        .fetch_one(build_get(&TableSpec::compras_materiales(), id))
        .await?
        .ok_or_else(|| Error::Storage("compra recién creada ausente".to_string()))?;
    Ok((StatusCode::CREATED, Json(creada.to_json())))
}

async fn obtener_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let compra = state
        .storage
        .fetch_one(build_get(&TableSpec::compras_materiales(), id))
        .await?
        .ok_or_else(|| Error::not_found("Compra no encontrada"))?;
    Ok(Json(compra.to_json()))
}

#[derive(serde::Deserialize)]
struct ActualizarCompraMaterial {
    material_id: Option<i64>,
    fecha: Option<String>,
    kilos: Option<f64>,
    precio_kilo: Option<f64>,
    tipo_precio: Option<String>,
    cliente: Option<String>,
    observaciones: Option<String>,
}

async fn actualizar_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(body): Json<ActualizarCompraMaterial>,
) -> ApiResult<Json<serde_json::Value>> {
    let existente = state
        .storage
        .fetch_one(Statement::new(
            "SELECT * FROM compras_materiales WHERE id = ?",
            vec![Value::Int(id)],
        ))
        .await?
        .ok_or_else(|| Error::not_found("Compra no encontrada"))?;

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
    if let Some(tipo) = body.tipo_precio.as_deref() {
        sets.push(("tipo_precio", Value::from(TipoPrecio::parse(tipo)?.as_str())));
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

    state
        .storage
        .execute(build_update("compras_materiales", sets, id))
        .await?;
    let actualizada = state
        .storage
        .fetch_one(build_get(&TableSpec::compras_materiales(), id))
        .await?
        .ok_or_else(|| Error::not_found("Compra no encontrada"))?;
    Ok(Json(actualizada.to_json()))
}

async fn eliminar_material(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let resultado = state
        .storage
        .execute(build_delete("compras_materiales", id))
        .await?;
    if resultado.rows_affected == 0 {
        return Err(Error::not_found("Compra no encontrada").into());
    }
    Ok(Json(json!({ "message": "Compra eliminada exitosamente" })))
}

// -------- estadísticas --------

fn rango(raw: &RawListParams) -> Result<(String, Vec<Value>), Error> {
    let filter = ListFilter::from_raw(raw)?;
    let mut clauses = Vec::new();
    let mut params = Vec::new();
    if let Some(inicio) = filter.fecha_inicio {
        clauses.push("fecha >= ?".to_string());
        params.push(Value::Date(inicio));
    }
    if let Some(fin) = filter.fecha_fin {
        clauses.push("fecha <= ?".to_string());
        params.push(Value::Date(fin));
    }
    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    Ok((where_sql, params))
}

async fn estadisticas(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let (where_sql, params) = rango(&raw)?;

    let generales = state
        .storage
        .fetch_one(Statement::new(
            format!(
                "SELECT COUNT(*) AS total_transacciones, \
                 COALESCE(SUM(total_pesos), 0) AS total_pesos, \
                 COALESCE(AVG(total_pesos), 0) AS promedio_compra, \
                 COUNT(CASE WHEN tipo_precio = 'ordinario' THEN 1 END) AS compras_ordinario, \
                 COUNT(CASE WHEN tipo_precio = 'camion' THEN 1 END) AS compras_camion, \
                 COUNT(CASE WHEN tipo_precio = 'noche' THEN 1 END) AS compras_noche \
                 FROM compras_generales{where_sql}"
            ),
            params.clone(),
        ))
        .await?;

    let materiales = state
        .storage
        .fetch_one(Statement::new(
            format!(
                "SELECT COUNT(*) AS total_transacciones, \
                 COALESCE(SUM(total_pesos), 0) AS total_pesos, \
                 COALESCE(SUM(kilos), 0) AS total_kilos, \
                 COALESCE(AVG(total_pesos), 0) AS promedio_compra, \
                 COALESCE(AVG(precio_kilo), 0) AS precio_promedio_kilo \
                 FROM compras_materiales{where_sql}"
            ),
            params.clone(),
        ))
        .await?;

    let where_top = where_sql.replace("fecha", "cm.fecha");
    let top = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT m.nombre, m.categoria, SUM(cm.kilos) AS total_kilos, \
                 SUM(cm.total_pesos) AS total_pesos, AVG(cm.precio_kilo) AS precio_promedio \
                 FROM compras_materiales cm JOIN materiales m ON cm.material_id = m.id\
                 {where_top} GROUP BY m.id, m.nombre, m.categoria \
                 ORDER BY total_kilos DESC LIMIT 10"
            ),
            params,
        ))
        .await?;

    let total_generales = generales
        .as_ref()
        .map_or(0.0, |r| r.get_float_or_zero("total_pesos"));
    let total_materiales = materiales
        .as_ref()
        .map_or(0.0, |r| r.get_float_or_zero("total_pesos"));

    Ok(Json(json!({
        "compras_generales": generales.as_ref().map_or(json!({}), Row::to_json),
        "compras_materiales": materiales.as_ref().map_or(json!({}), Row::to_json),
        "top_materiales": top.iter().map(Row::to_json).collect::<Vec<_>>(),
        "total_compras": total_generales + total_materiales,
    })))
}
