//! HTTP handlers.

pub mod clips;
pub mod health;

pub use health::health;
