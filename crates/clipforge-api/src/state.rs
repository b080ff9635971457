//! Application state.

use std::sync::Arc;

use clipforge_worker::Dispatcher;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(config: ApiConfig, dispatcher: Arc<Dispatcher>) -> Self {
        Self { config, dispatcher }
    }
}
