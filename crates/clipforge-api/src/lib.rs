//! HTTP API for ClipForge.
//!
//! A thin axum layer over the worker's dispatcher: submit a job, poll its
//! status, delete it.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
