//! End-to-end tests over the full router and an in-memory SQLite
//! database.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chatarral_core::Settings;
use chatarral_db::Storage;
use chatarral_db_backends::sqlite::SqliteStorage;
use chatarral_server::{api_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn app() -> Router {
    let storage = SqliteStorage::memory().unwrap();
    chatarral_db_backends::bootstrap::initialize(&storage)
        .await
        .unwrap();
    let storage: Arc<dyn Storage> = Arc::new(storage);
    chatarral_server::seed::ensure_admin(storage.as_ref())
        .await
        .unwrap();
    api_router(AppState::new(storage, &Settings::default()))
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn login_admin(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "admin@reciclaje.com", "password": "admin123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["token"].as_str().unwrap().to_string()
}

async fn crear_material(app: &Router, token: &str, nombre: &str, categoria: &str) -> i64 {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/materiales",
        Some(token),
        Some(json!({ "nombre": nombre, "categoria": categoria, "precio_ordinario": 525.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["auth_enabled"], true);
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = app().await;
    let (status, body) = send(&app, Method::GET, "/api/materiales", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["codigo"], "TOKEN_REQUERIDO");
}

#[tokio::test]
async fn test_garbage_token_is_invalid() {
    let app = app().await;
    let (status, body) =
        send(&app, Method::GET, "/api/materiales", Some("no.es.jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["codigo"], "TOKEN_INVALIDO");
}

#[tokio::test]
async fn test_login_and_verify() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, body) =
        send(&app, Method::GET, "/api/auth/verificar", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valido"], true);
    assert_eq!(body["usuario"]["rol"], "administrador");
}

#[tokio::test]
async fn test_failed_login_reports_remaining_attempts() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "admin@reciclaje.com", "password": "incorrecta" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["intentos_restantes"], 4);
}

#[tokio::test]
async fn test_refresh_issues_new_pair() {
    let app = app().await;
    let (_, login) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "email": "admin@reciclaje.com", "password": "admin123" })),
    )
    .await;
    let refresh = login["refreshToken"].as_str().unwrap();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/refresh",
        None,
        Some(json!({ "refreshToken": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["token"].as_str().is_some());
    assert!(body["refreshToken"].as_str().is_some());
}

#[tokio::test]
async fn test_seeded_catalog_is_listed() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/materiales?limite=500",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 61);
}

#[tokio::test]
async fn test_purchase_total_is_kilos_times_price() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Cobre de prueba", "Cobre").await;

    let (status, compra) = send(
        &app,
        Method::POST,
        "/api/compras/materiales",
        Some(&token),
        Some(json!({
            "material_id": material_id,
            "fecha": "2024-03-15",
            "kilos": 40.0,
            "precio_kilo": 525.0,
            "tipo_precio": "ordinario",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{compra}");
    assert_eq!(compra["total_pesos"], 21000.0);
    assert_eq!(compra["material_nombre"], "Cobre de prueba");
}

#[tokio::test]
async fn test_partial_update_recomputes_total() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Bronce de prueba", "Bronce").await;

    let (_, compra) = send(
        &app,
        Method::POST,
        "/api/compras/materiales",
        Some(&token),
        Some(json!({
            "material_id": material_id,
            "fecha": "2024-03-15",
            "kilos": 10.0,
            "precio_kilo": 100.0,
            "tipo_precio": "ordinario",
        })),
    )
    .await;
    let id = compra["id"].as_i64().unwrap();

    let (status, actualizada) = send(
        &app,
        Method::PUT,
        &format!("/api/compras/materiales/{id}"),
        Some(&token),
        Some(json!({ "kilos": 20.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{actualizada}");
    assert_eq!(actualizada["total_pesos"], 2000.0);
}

#[tokio::test]
async fn test_purchase_against_inactive_material_is_404() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Material apagado", "Chatarra").await;
    send(
        &app,
        Method::PUT,
        &format!("/api/materiales/{material_id}"),
        Some(&token),
        Some(json!({ "activo": false })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/compras/materiales",
        Some(&token),
        Some(json!({
            "material_id": material_id,
            "fecha": "2024-03-15",
            "kilos": 5.0,
            "precio_kilo": 10.0,
            "tipo_precio": "ordinario",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Material no encontrado o inactivo");
}

#[tokio::test]
async fn test_case_insensitive_duplicate_material_is_409() {
    let app = app().await;
    let token = login_admin(&app).await;
    crear_material(&app, &token, "Niquel especial", "Otros").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/materiales",
        Some(&token),
        Some(json!({ "nombre": "NIQUEL ESPECIAL", "categoria": "Otros" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Ya existe un material con ese nombre");
}

#[tokio::test]
async fn test_catalog_listing_returns_every_material() {
    let app = app().await;
    let token = login_admin(&app).await;

    // Grow the catalog past a hundred rows on top of the seeded set.
    for n in 0..45 {
        crear_material(&app, &token, &format!("Material extra {n}"), "Otros").await;
    }

    let (status, body) = send(&app, Method::GET, "/api/materiales", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let lista = body.as_array().unwrap();
    assert_eq!(lista.len(), 61 + 45);
}

#[tokio::test]
async fn test_referenced_material_is_soft_deleted() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Aluminio de prueba", "Aluminio").await;
    send(
        &app,
        Method::POST,
        "/api/compras/materiales",
        Some(&token),
        Some(json!({
            "material_id": material_id,
            "fecha": "2024-03-15",
            "kilos": 3.0,
            "precio_kilo": 8.0,
            "tipo_precio": "ordinario",
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/materiales/{material_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "deactivated");

    // The row survives, just deactivated.
    let (status, material) = send(
        &app,
        Method::GET,
        &format!("/api/materiales/{material_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(material["activo"], false);
}

#[tokio::test]
async fn test_unreferenced_material_is_hard_deleted() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Material efimero", "Otros").await;

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/materiales/{material_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"], "deleted");

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/materiales/{material_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_pagination_union_covers_all_rows() {
    let app = app().await;
    let token = login_admin(&app).await;
    for dia in 1..=5 {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/compras/generales",
            Some(&token),
            Some(json!({
                "fecha": format!("2024-03-{dia:02}"),
                "total_pesos": f64::from(dia) * 100.0,
                "tipo_precio": "ordinario",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let mut ids = Vec::new();
    for pagina in 1..=3 {
        let (status, body) = send(
            &app,
            Method::GET,
            &format!("/api/compras/generales?limite=2&pagina={pagina}"),
            Some(&token),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["paginacion"]["total"], 5);
        assert_eq!(body["paginacion"]["total_paginas"], 3);
        for compra in body["compras"].as_array().unwrap() {
            ids.push(compra["id"].as_i64().unwrap());
        }
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 5);
}

#[tokio::test]
async fn test_empty_range_statistics_are_zero() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/compras/estadisticas/resumen?fecha_inicio=2030-01-01&fecha_fin=2030-01-31",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_compras"], 0.0);
    assert_eq!(body["compras_generales"]["total_pesos"], 0.0);
    assert_eq!(body["compras_materiales"]["total_kilos"], 0.0);
    assert_eq!(body["top_materiales"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_dashboard_margin_is_zero_without_sales() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/reportes/dashboard?periodo=mes",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resumen"]["total_ventas"], 0.0);
    assert_eq!(body["resumen"]["margen_ganancia"], 0.0);
}

#[tokio::test]
async fn test_ganancias_requires_range() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/reportes/ganancias",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Fecha de inicio y fin son requeridas");
}

#[tokio::test]
async fn test_ganancias_merges_periods_with_zero_defaults() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Cobre para ventas", "Cobre").await;

    // A sale on one day and an expense category purchase on another.
    send(
        &app,
        Method::POST,
        "/api/ventas",
        Some(&token),
        Some(json!({
            "material_id": material_id,
            "fecha": "2024-04-10",
            "kilos": 10.0,
            "precio_kilo": 50.0,
        })),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/api/compras/generales",
        Some(&token),
        Some(json!({
            "fecha": "2024-04-11",
            "total_pesos": 200.0,
            "tipo_precio": "camion",
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/reportes/ganancias?fecha_inicio=2024-04-01&fecha_fin=2024-04-30&agrupar_por=dia",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let reporte = body["reporte"].as_array().unwrap();
    assert_eq!(reporte.len(), 2);

    let dia_venta = &reporte[0];
    assert_eq!(dia_venta["periodo"], "2024-04-10");
    assert_eq!(dia_venta["ventas"], 500.0);
    assert_eq!(dia_venta["compras"], 0.0);
    assert_eq!(dia_venta["margen"], 100.0);

    let dia_compra = &reporte[1];
    assert_eq!(dia_compra["ventas"], 0.0);
    assert_eq!(dia_compra["compras"], 200.0);
    // No sales in this bucket: margin stays zero instead of dividing by zero.
    assert_eq!(dia_compra["margen"], 0.0);
}

#[tokio::test]
async fn test_clientes_autocomplete_requires_two_chars() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/compras/clientes/lista?buscar=x",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_clientes_autocomplete_merges_both_kinds() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Hierro de prueba", "Hierro").await;
    send(
        &app,
        Method::POST,
        "/api/compras/materiales",
        Some(&token),
        Some(json!({
            "material_id": material_id,
            "fecha": "2024-05-01",
            "kilos": 1.0,
            "precio_kilo": 2.0,
            "tipo_precio": "ordinario",
            "cliente": "Pérez Hermanos",
        })),
    )
    .await;
    send(
        &app,
        Method::POST,
        "/api/compras/generales",
        Some(&token),
        Some(json!({
            "fecha": "2024-05-02",
            "total_pesos": 100.0,
            "tipo_precio": "ordinario",
            "cliente": "Pérez y Cía",
        })),
    )
    .await;

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/compras/clientes/lista?buscar=P%C3%A9rez",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let clientes = body.as_array().unwrap();
    assert_eq!(clientes.len(), 2);
}

#[tokio::test]
async fn test_gasto_requires_active_category() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/gastos",
        Some(&token),
        Some(json!({
            "categoria_id": 9999,
            "fecha": "2024-05-01",
            "concepto": "Prueba",
            "valor": 50.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Categoría no encontrada o inactiva");
}

#[tokio::test]
async fn test_gasto_lifecycle() {
    let app = app().await;
    let token = login_admin(&app).await;
    // Seeded categories include "Sueldos" with id 1.
    let (status, gasto) = send(
        &app,
        Method::POST,
        "/api/gastos",
        Some(&token),
        Some(json!({
            "categoria_id": 1,
            "fecha": "2024-05-01",
            "concepto": "Nómina semanal",
            "valor": 1200.0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{gasto}");
    assert_eq!(gasto["categoria_nombre"], "Sueldos");
    let id = gasto["id"].as_i64().unwrap();

    let (status, resumen) = send(
        &app,
        Method::GET,
        "/api/gastos/estadisticas/resumen",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resumen["estadisticas_generales"]["total_gastos"], 1200.0);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/gastos/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_usuarios_requires_admin_role() {
    let app = app().await;
    let (_, registro) = send(
        &app,
        Method::POST,
        "/api/auth/registro",
        None,
        Some(json!({
            "nombre": "Ana",
            "email": "ana@reciclaje.com",
            "password": "clave123",
            "confirmarPassword": "clave123",
        })),
    )
    .await;
    let token = registro["token"].as_str().unwrap();

    let (status, body) = send(&app, Method::GET, "/api/usuarios", Some(token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["codigo"], "PERMISOS_INSUFICIENTES");
    assert_eq!(body["rol_actual"], "usuario");
}

#[tokio::test]
async fn test_admin_cannot_toggle_self() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (_, verificacion) =
        send(&app, Method::GET, "/api/auth/verificar", Some(&token), None).await;
    let admin_id = verificacion["usuario"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/usuarios/{admin_id}/toggle"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No puedes desactivar tu propia cuenta");
}

#[tokio::test]
async fn test_admin_can_toggle_other_users() {
    let app = app().await;
    let admin = login_admin(&app).await;
    let (_, registro) = send(
        &app,
        Method::POST,
        "/api/auth/registro",
        None,
        Some(json!({
            "nombre": "Luis",
            "email": "luis@reciclaje.com",
            "password": "clave123",
            "confirmarPassword": "clave123",
        })),
    )
    .await;
    let user_id = registro["usuario"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/usuarios/{user_id}/toggle"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["activo"], false);
}

#[tokio::test]
async fn test_duplicate_registration_is_conflict() {
    let app = app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/auth/registro",
        None,
        Some(json!({
            "nombre": "Otro Admin",
            "email": "admin@reciclaje.com",
            "password": "clave123",
            "confirmarPassword": "clave123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Ya existe un usuario con este email");
}

#[tokio::test]
async fn test_materiales_buscar_prefers_name_prefix() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/materiales/buscar/cobre",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let resultados = body.as_array().unwrap();
    assert!(!resultados.is_empty());
    // Prefix matches come before substring matches.
    assert!(resultados[0]["nombre"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .starts_with("cobre"));

    let (status, _) = send(&app, Method::GET, "/api/materiales/buscar/c", Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_bulk_price_adjustment_by_percentage() {
    let app = app().await;
    let token = login_admin(&app).await;
    let material_id = crear_material(&app, &token, "Zinc de prueba", "CategoriaPrueba").await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/materiales/categoria/CategoriaPrueba/precios",
        Some(&token),
        Some(json!({
            "precio_ordinario_incremento": 10.0,
            "tipo_incremento": "porcentaje",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["materialesActualizados"], 1);

    let (_, material) = send(
        &app,
        Method::GET,
        &format!("/api/materiales/{material_id}"),
        Some(&token),
        None,
    )
    .await;
    let precio = material["precio_ordinario"].as_f64().unwrap();
    assert!((precio - 577.5).abs() < 1e-6);
}

#[tokio::test]
async fn test_export_backup_whitelists_tables() {
    let app = app().await;
    let token = login_admin(&app).await;
    let (status, _) = send(
        &app,
        Method::GET,
        "/api/reportes/export/backup?tabla=usuarios",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        Method::GET,
        "/api/reportes/export/backup?tabla=materiales",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filtros"]["tabla"], "materiales");
    assert_eq!(body["datos"]["materiales"].as_array().unwrap().len(), 61);
    assert!(body["datos"].get("ventas").is_none());
}
