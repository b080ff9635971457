//! Client for the external speech-to-text and clip-finding service.
//!
//! The service exposes `/transcribe`, `/find-clips` and `/health`. The worker
//! wraps this client in its transcriber and clip detector adapters.

pub mod client;
pub mod error;
pub mod types;

pub use client::{MlClient, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::ClipBoundary;
