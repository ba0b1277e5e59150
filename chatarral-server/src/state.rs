//! Shared application state.

use std::sync::Arc;

use chatarral_auth::TokenService;
use chatarral_core::Settings;
use chatarral_db::Storage;

/// Handed to every handler through axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub tokens: TokenService,
}

impl AppState {
    pub fn new(storage: Arc<dyn Storage>, settings: &Settings) -> Self {
        Self {
            storage,
            tokens: TokenService::new(
                &settings.jwt_secret,
                settings.token_hours,
                settings.refresh_days,
            ),
        }
    }
}
