//! # chatarral-server
//!
//! The HTTP application: axum routes over the storage layer, JWT
//! authentication, and the report catalog. `main.rs` wires settings,
//! logging, storage bootstrap, and graceful shutdown around
//! [`routes::api_router`].

pub mod error;
pub mod extract;
pub mod pagination;
pub mod routes;
pub mod seed;
pub mod state;

pub use routes::api_router;
pub use state::AppState;
