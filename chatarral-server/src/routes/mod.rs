//! Route catalog.
//!
//! Each submodule owns one `/api/...` prefix and exposes a `router()`
//! the top-level [`api_router`] nests. Protection is per handler: a
//! route takes a [`CurrentUser`](crate::extract::CurrentUser) argument
//! or it is public.

pub mod auth;
pub mod compras;
pub mod gastos;
pub mod materiales;
pub mod reportes;
pub mod usuarios;
pub mod ventas;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assembles the full application router.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .nest("/api/auth", auth::router())
        .nest("/api/materiales", materiales::router())
        .nest("/api/compras", compras::router())
        .nest("/api/ventas", ventas::router())
        .nest("/api/gastos", gastos::router())
        .nest("/api/reportes", reportes::router())
        .nest("/api/usuarios", usuarios::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
        "auth_enabled": true,
    }))
}
