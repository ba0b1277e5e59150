//! # chatarral-core
//!
//! Core types shared by every chatarral crate: the application-wide
//! [`Error`](error::Error) taxonomy, [`Settings`](settings::Settings)
//! loading, and `tracing` setup.

pub mod error;
pub mod logging;
pub mod settings;

pub use error::{AuthCode, Error, Result};
pub use settings::{DatabaseEngine, DatabaseSettings, Settings};
