//! `/api/reportes`: the fixed report catalog.
//!
//! Every query here is assembled from whitelisted fragments and the
//! dialect's date expressions; period merging happens in Rust so the
//! response always carries explicit zeros for empty buckets.

use std::collections::BTreeMap;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use chatarral_core::Error;
use chatarral_db::{DateGrain, ListFilter, RawListParams, Row, Statement, Value};
use chrono::NaiveDate;
use serde_json::json;

use crate::error::ApiError;
use crate::extract::CurrentUser;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/ganancias", get(ganancias))
        .route("/materiales", get(materiales))
        .route("/promedios-compra", get(promedios_compra))
        .route("/export/backup", get(export_backup))
}

type ApiResult<T> = Result<T, ApiError>;

/// Reports over a range require both ends.
fn rango_requerido(raw: &RawListParams) -> Result<(NaiveDate, NaiveDate), Error> {
    let filter = ListFilter::from_raw(raw)?;
    match (filter.fecha_inicio, filter.fecha_fin) {
        (Some(inicio), Some(fin)) => Ok((inicio, fin)),
        _ => Err(Error::validation("Fecha de inicio y fin son requeridas")),
    }
}

fn fechas(inicio: NaiveDate, fin: NaiveDate) -> Vec<Value> {
    vec![Value::Date(inicio), Value::Date(fin)]
}

// -------- dashboard --------

#[derive(serde::Deserialize, Default)]
struct DashboardParams {
    periodo: Option<String>,
}

fn inicio_de_periodo(periodo: &str, hoy: NaiveDate) -> Result<NaiveDate, Error> {
    let inicio = match periodo {
        "dia" => hoy,
        "semana" => hoy - chrono::Duration::days(7),
        "mes" => hoy - chrono::Months::new(1),
        "trimestre" => hoy - chrono::Months::new(3),
        "año" => hoy - chrono::Months::new(12),
        otro => {
            return Err(Error::validation(format!(
                "periodo inválido: '{otro}' (use dia, semana, mes, trimestre o año)"
            )))
        }
    };
    Ok(inicio)
}

async fn suma(state: &AppState, sql: String, params: Vec<Value>) -> Result<f64, Error> {
    Ok(state
        .storage
        .fetch_one(Statement::new(sql, params))
        .await?
        .map_or(0.0, |r| r.get_float_or_zero("total")))
}

async fn dashboard(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<DashboardParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let periodo = params.periodo.as_deref().unwrap_or("mes").to_string();
    let hoy = chrono::Utc::now().date_naive();
    let inicio = inicio_de_periodo(&periodo, hoy)?;

    let compras_generales = suma(
        &state,
        "SELECT COALESCE(SUM(total_pesos), 0) AS total FROM compras_generales \
         WHERE fecha BETWEEN ? AND ?"
            .to_string(),
        fechas(inicio, hoy),
    )
    .await?;
    let compras_materiales = suma(
        &state,
        "SELECT COALESCE(SUM(total_pesos), 0) AS total FROM compras_materiales \
         WHERE fecha BETWEEN ? AND ?"
            .to_string(),
        fechas(inicio, hoy),
    )
    .await?;
    let ventas = state
        .storage
        .fetch_one(Statement::new(
            "SELECT COALESCE(SUM(total_pesos), 0) AS total, \
             COALESCE(SUM(kilos), 0) AS kilos \
             FROM ventas WHERE fecha BETWEEN ? AND ?",
            fechas(inicio, hoy),
        ))
        .await?;
    let total_gastos = suma(
        &state,
        "SELECT COALESCE(SUM(valor), 0) AS total FROM gastos WHERE fecha BETWEEN ? AND ?"
            .to_string(),
        fechas(inicio, hoy),
    )
    .await?;

    let total_compras = compras_generales + compras_materiales;
    let total_ventas = ventas.as_ref().map_or(0.0, |r| r.get_float_or_zero("total"));
    let total_kilos = ventas.as_ref().map_or(0.0, |r| r.get_float_or_zero("kilos"));
    let ganancia_bruta = total_ventas - total_compras;
    let ganancia_neta = ganancia_bruta - total_gastos;
    let margen = if total_ventas > 0.0 {
        ganancia_bruta / total_ventas * 100.0
    } else {
        0.0
    };

    let mas_vendidos = state
        .storage
        .fetch_all(Statement::new(
            "SELECT m.nombre, m.categoria, SUM(v.kilos) AS total_kilos, \
             SUM(v.total_pesos) AS total_pesos, COUNT(*) AS transacciones \
             FROM ventas v JOIN materiales m ON v.material_id = m.id \
             WHERE v.fecha BETWEEN ? AND ? \
             GROUP BY m.id, m.nombre, m.categoria \
             ORDER BY total_pesos DESC LIMIT 5",
            fechas(inicio, hoy),
        ))
        .await?;

    let evolucion = state
        .storage
        .fetch_all(Statement::new(
            "SELECT fecha, COALESCE(SUM(total_pesos), 0) AS ventas_dia \
             FROM ventas WHERE fecha BETWEEN ? AND ? \
             GROUP BY fecha ORDER BY fecha",
            fechas(inicio, hoy),
        ))
        .await?;

    Ok(Json(json!({
        "periodo": periodo,
        "fecha_inicio": inicio.to_string(),
        "fecha_fin": hoy.to_string(),
        "resumen": {
            "total_compras": total_compras,
            "total_ventas": total_ventas,
            "total_gastos": total_gastos,
            "ganancia_bruta": ganancia_bruta,
            "ganancia_neta": ganancia_neta,
            "margen_ganancia": margen,
            "total_kilos_vendidos": total_kilos,
        },
        "materiales_mas_vendidos": mas_vendidos.iter().map(Row::to_json).collect::<Vec<_>>(),
        "evolucion_diaria": evolucion.iter().map(Row::to_json).collect::<Vec<_>>(),
    })))
}

// -------- ganancias --------

#[derive(serde::Deserialize, Default)]
struct GananciasParams {
    fecha_inicio: Option<String>,
    fecha_fin: Option<String>,
    agrupar_por: Option<String>,
}

fn grano(agrupar_por: &str) -> Result<DateGrain, Error> {
    match agrupar_por {
        "dia" => Ok(DateGrain::Day),
        "semana" => Ok(DateGrain::Week),
        "mes" => Ok(DateGrain::Month),
        otro => Err(Error::validation(format!(
            "agrupar_por inválido: '{otro}' (use dia, semana o mes)"
        ))),
    }
}

#[derive(Default, Clone, Copy)]
struct Bucket {
    compras: f64,
    ventas: f64,
    gastos: f64,
    kilos: f64,
}

async fn ganancias(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<GananciasParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let raw = RawListParams {
        fecha_inicio: params.fecha_inicio.clone(),
        fecha_fin: params.fecha_fin.clone(),
        ..RawListParams::default()
    };
    let (inicio, fin) = rango_requerido(&raw)?;
    let agrupacion = params.agrupar_por.as_deref().unwrap_or("dia").to_string();
    let grain = grano(&agrupacion)?;
    let dialect = state.storage.dialect();
    let bucket_expr = dialect.date_format(grain, "fecha");

    let compras = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT {bucket_expr} AS periodo, SUM(total_pesos) AS total_compras \
                 FROM (SELECT fecha, total_pesos FROM compras_generales \
                       WHERE fecha BETWEEN ? AND ? \
                       UNION ALL \
                       SELECT fecha, total_pesos FROM compras_materiales \
                       WHERE fecha BETWEEN ? AND ?) AS compras_unidas \
                 GROUP BY periodo ORDER BY periodo"
            ),
            vec![
                Value::Date(inicio),
                Value::Date(fin),
                Value::Date(inicio),
                Value::Date(fin),
            ],
        ))
        .await?;
    let ventas = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT {bucket_expr} AS periodo, SUM(total_pesos) AS total_ventas, \
                 SUM(kilos) AS total_kilos FROM ventas WHERE fecha BETWEEN ? AND ? \
                 GROUP BY periodo ORDER BY periodo"
            ),
            fechas(inicio, fin),
        ))
        .await?;
    let gastos = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT {bucket_expr} AS periodo, SUM(valor) AS total_gastos \
                 FROM gastos WHERE fecha BETWEEN ? AND ? \
                 GROUP BY periodo ORDER BY periodo"
            ),
            fechas(inicio, fin),
        ))
        .await?;

    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    for row in &compras {
        if let Some(p) = row.get_str("periodo") {
            buckets.entry(p.to_string()).or_default().compras =
                row.get_float_or_zero("total_compras");
        }
    }
    for row in &ventas {
        if let Some(p) = row.get_str("periodo") {
            let b = buckets.entry(p.to_string()).or_default();
            b.ventas = row.get_float_or_zero("total_ventas");
            b.kilos = row.get_float_or_zero("total_kilos");
        }
    }
    for row in &gastos {
        if let Some(p) = row.get_str("periodo") {
            buckets.entry(p.to_string()).or_default().gastos =
                row.get_float_or_zero("total_gastos");
        }
    }

    let reporte: Vec<serde_json::Value> = buckets
        .iter()
        .map(|(periodo, b)| {
            let ganancia_bruta = b.ventas - b.compras;
            let margen = if b.ventas > 0.0 {
                ganancia_bruta / b.ventas * 100.0
            } else {
                0.0
            };
            json!({
                "periodo": periodo,
                "compras": b.compras,
                "ventas": b.ventas,
                "gastos": b.gastos,
                "ganancia_bruta": ganancia_bruta,
                "ganancia_neta": ganancia_bruta - b.gastos,
                "margen": margen,
                "kilos_vendidos": b.kilos,
            })
        })
        .collect();

    Ok(Json(json!({
        "fecha_inicio": inicio.to_string(),
        "fecha_fin": fin.to_string(),
        "agrupacion": agrupacion,
        "reporte": reporte,
    })))
}

// -------- materiales --------

async fn materiales(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let (inicio, fin) = rango_requerido(&raw)?;
    let filter = ListFilter::from_raw(&raw)?;
    let categoria = filter.categoria.clone();

    let mut params_ventas = fechas(inicio, fin);
    let mut where_ventas = "WHERE v.fecha BETWEEN ? AND ?".to_string();
    if let Some(cat) = &categoria {
        where_ventas.push_str(" AND m.categoria = ?");
        params_ventas.push(Value::from(cat.as_str()));
    }
    let ventas = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT m.nombre, m.categoria, SUM(v.kilos) AS total_kilos_vendidos, \
                 SUM(v.total_pesos) AS total_ventas, \
                 AVG(v.precio_kilo) AS precio_promedio_venta, \
                 COUNT(*) AS transacciones_venta, \
                 MAX(v.precio_kilo) AS precio_maximo, MIN(v.precio_kilo) AS precio_minimo \
                 FROM ventas v JOIN materiales m ON v.material_id = m.id {where_ventas} \
                 GROUP BY m.id, m.nombre, m.categoria ORDER BY total_ventas DESC"
            ),
            params_ventas,
        ))
        .await?;

    let mut params_compras = fechas(inicio, fin);
    let mut where_compras = "WHERE cm.fecha BETWEEN ? AND ?".to_string();
    if let Some(cat) = &categoria {
        where_compras.push_str(" AND m.categoria = ?");
        params_compras.push(Value::from(cat.as_str()));
    }
    let compras = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT m.nombre, m.categoria, SUM(cm.kilos) AS total_kilos_comprados, \
                 SUM(cm.total_pesos) AS total_compras, \
                 AVG(cm.precio_kilo) AS precio_promedio_compra, \
                 COUNT(*) AS transacciones_compra \
                 FROM compras_materiales cm JOIN materiales m ON cm.material_id = m.id \
                 {where_compras} GROUP BY m.id, m.nombre, m.categoria \
                 ORDER BY total_compras DESC"
            ),
            params_compras,
        ))
        .await?;

    let completo: Vec<serde_json::Value> = ventas
        .iter()
        .map(|venta| {
            let nombre = venta.get_str("nombre").unwrap_or_default();
            let compra = compras.iter().find(|c| c.get_str("nombre") == Some(nombre));
            let total_ventas = venta.get_float_or_zero("total_ventas");
            let total_compras = compra.map_or(0.0, |c| c.get_float_or_zero("total_compras"));
            let ganancia = total_ventas - total_compras;
            let margen = if total_ventas > 0.0 {
                ganancia / total_ventas * 100.0
            } else {
                0.0
            };
            let mut cuerpo = venta.to_json();
            cuerpo["total_kilos_comprados"] = json!(
                compra.map_or(0.0, |c| c.get_float_or_zero("total_kilos_comprados"))
            );
            cuerpo["total_compras"] = json!(total_compras);
            cuerpo["precio_promedio_compra"] = json!(
                compra.map_or(0.0, |c| c.get_float_or_zero("precio_promedio_compra"))
            );
            cuerpo["transacciones_compra"] =
                json!(compra.map_or(0, |c| c.get_int_or_zero("transacciones_compra")));
            cuerpo["ganancia_material"] = json!(ganancia);
            cuerpo["margen_material"] = json!(margen);
            cuerpo
        })
        .collect();

    Ok(Json(json!({
        "fecha_inicio": inicio.to_string(),
        "fecha_fin": fin.to_string(),
        "categoria": categoria.unwrap_or_else(|| "Todas".to_string()),
        "materiales": completo,
    })))
}

// -------- promedios de compra --------

const DIAS_SEMANA: [&str; 7] = [
    "Domingo", "Lunes", "Martes", "Miércoles", "Jueves", "Viernes", "Sábado",
];

async fn promedios_compra(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(raw): Query<RawListParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let (inicio, fin) = rango_requerido(&raw)?;

    let generales = state
        .storage
        .fetch_one(Statement::new(
            "SELECT COUNT(DISTINCT fecha) AS dias_con_compras, \
             COALESCE(SUM(total_pesos), 0) AS total_compras, \
             COALESCE(AVG(total_pesos), 0) AS promedio_por_transaccion, \
             COUNT(*) AS total_transacciones \
             FROM compras_generales WHERE fecha BETWEEN ? AND ?",
            fechas(inicio, fin),
        ))
        .await?;
    let materiales = state
        .storage
        .fetch_one(Statement::new(
            "SELECT COUNT(DISTINCT fecha) AS dias_con_compras, \
             COALESCE(SUM(total_pesos), 0) AS total_compras, \
             COALESCE(SUM(kilos), 0) AS total_kilos, \
             COALESCE(AVG(total_pesos), 0) AS promedio_por_transaccion, \
             COALESCE(AVG(precio_kilo), 0) AS precio_promedio_kilo, \
             COUNT(*) AS total_transacciones \
             FROM compras_materiales WHERE fecha BETWEEN ? AND ?",
            fechas(inicio, fin),
        ))
        .await?;

    let dia_expr = state.storage.dialect().weekday("fecha");
    let mut casos = String::new();
    for (numero, nombre) in DIAS_SEMANA.iter().enumerate() {
        casos.push_str(&format!(" WHEN {numero} THEN '{nombre}'"));
    }
    let por_dia = state
        .storage
        .fetch_all(Statement::new(
            format!(
                "SELECT CASE {dia_expr}{casos} END AS dia_semana, \
                 {dia_expr} AS dia_numero, COUNT(*) AS transacciones, \
                 COALESCE(SUM(total_pesos), 0) AS total_compras, \
                 COALESCE(AVG(total_pesos), 0) AS promedio_dia \
                 FROM (SELECT fecha, total_pesos FROM compras_generales \
                       WHERE fecha BETWEEN ? AND ? \
                       UNION ALL \
                       SELECT fecha, total_pesos FROM compras_materiales \
                       WHERE fecha BETWEEN ? AND ?) AS compras_unidas \
                 GROUP BY dia_numero, dia_semana ORDER BY dia_numero"
            ),
            vec![
                Value::Date(inicio),
                Value::Date(fin),
                Value::Date(inicio),
                Value::Date(fin),
            ],
        ))
        .await?;

    let total_generales = generales
        .as_ref()
        .map_or(0.0, |r| r.get_float_or_zero("total_compras"));
    let total_materiales = materiales
        .as_ref()
        .map_or(0.0, |r| r.get_float_or_zero("total_compras"));
    let total_compras = total_generales + total_materiales;
    let total_transacciones = generales
        .as_ref()
        .map_or(0, |r| r.get_int_or_zero("total_transacciones"))
        + materiales
            .as_ref()
            .map_or(0, |r| r.get_int_or_zero("total_transacciones"));
    let dias_totales = (fin - inicio).num_days() + 1;
    let promedio_por_transaccion = if total_transacciones > 0 {
        total_compras / total_transacciones as f64
    } else {
        0.0
    };

    Ok(Json(json!({
        "fecha_inicio": inicio.to_string(),
        "fecha_fin": fin.to_string(),
        "resumen": {
            "total_compras": total_compras,
            "total_transacciones": total_transacciones,
            "dias_totales": dias_totales,
            "promedio_diario": total_compras / dias_totales as f64,
            "promedio_por_transaccion": promedio_por_transaccion,
        },
        "compras_generales": generales.as_ref().map_or(json!({}), Row::to_json),
        "compras_materiales": materiales.as_ref().map_or(json!({}), Row::to_json),
        "compras_por_dia_semana": por_dia.iter().map(Row::to_json).collect::<Vec<_>>(),
    })))
}

// -------- export --------

const TABLAS_PERMITIDAS: [&str; 5] = [
    "materiales",
    "compras_generales",
    "compras_materiales",
    "ventas",
    "gastos",
];

#[derive(serde::Deserialize, Default)]
struct ExportParams {
    tabla: Option<String>,
    fecha_inicio: Option<String>,
    fecha_fin: Option<String>,
}

async fn volcar(
    state: &AppState,
    sql_base: &str,
    fecha_col: Option<&str>,
    orden: &str,
    rango: Option<(NaiveDate, NaiveDate)>,
) -> Result<Vec<serde_json::Value>, Error> {
    let mut sql = sql_base.to_string();
    let mut params = Vec::new();
    if let (Some(col), Some((inicio, fin))) = (fecha_col, rango) {
        sql.push_str(&format!(" WHERE {col} BETWEEN ? AND ?"));
        params.push(Value::Date(inicio));
        params.push(Value::Date(fin));
    }
    sql.push_str(&format!(" ORDER BY {orden}"));
    let rows = state.storage.fetch_all(Statement::new(sql, params)).await?;
    Ok(rows.iter().map(Row::to_json).collect())
}

async fn export_backup(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(params): Query<ExportParams>,
) -> ApiResult<Json<serde_json::Value>> {
    let tabla = params.tabla.as_deref().filter(|t| !t.is_empty());
    if let Some(t) = tabla {
        if !TABLAS_PERMITIDAS.contains(&t) {
            return Err(Error::validation("Tabla no válida").into());
        }
    }
    let rango = match (params.fecha_inicio.as_deref(), params.fecha_fin.as_deref()) {
        (Some(inicio), Some(fin)) => {
            let raw = RawListParams {
                fecha_inicio: Some(inicio.to_string()),
                fecha_fin: Some(fin.to_string()),
                ..RawListParams::default()
            };
            Some(rango_requerido(&raw)?)
        }
        _ => None,
    };

    let incluir = |nombre: &str| tabla.is_none() || tabla == Some(nombre);
    let mut datos = serde_json::Map::new();

    if incluir("materiales") {
        datos.insert(
            "materiales".to_string(),
            json!(volcar(&state, "SELECT * FROM materiales", None, "categoria, nombre", None).await?),
        );
    }
    if incluir("compras_generales") {
        datos.insert(
            "compras_generales".to_string(),
            json!(
                volcar(
                    &state,
                    "SELECT * FROM compras_generales",
                    Some("fecha"),
                    "fecha DESC",
                    rango,
                )
                .await?
            ),
        );
    }
    if incluir("compras_materiales") {
        datos.insert(
            "compras_materiales".to_string(),
            json!(
                volcar(
                    &state,
                    "SELECT cm.*, m.nombre AS material_nombre FROM compras_materiales cm \
                     JOIN materiales m ON cm.material_id = m.id",
                    Some("cm.fecha"),
                    "cm.fecha DESC",
                    rango,
                )
                .await?
            ),
        );
    }
    if incluir("ventas") {
        datos.insert(
            "ventas".to_string(),
            json!(
                volcar(
                    &state,
                    "SELECT v.*, m.nombre AS material_nombre FROM ventas v \
                     JOIN materiales m ON v.material_id = m.id",
                    Some("v.fecha"),
                    "v.fecha DESC",
                    rango,
                )
                .await?
            ),
        );
    }
    if incluir("gastos") {
        datos.insert(
            "gastos".to_string(),
            json!(
                volcar(
                    &state,
                    "SELECT g.*, c.nombre AS categoria_nombre FROM gastos g \
                     JOIN categorias_gastos c ON g.categoria_id = c.id",
                    Some("g.fecha"),
                    "g.fecha DESC",
                    rango,
                )
                .await?
            ),
        );
    }

    Ok(Json(json!({
        "fecha_exportacion": chrono::Utc::now().to_rfc3339(),
        "filtros": {
            "tabla": tabla.unwrap_or("todas"),
            "fecha_inicio": rango.map(|(i, _)| i.to_string()),
            "fecha_fin": rango.map(|(_, f)| f.to_string()),
        },
        "datos": datos,
    })))
}
