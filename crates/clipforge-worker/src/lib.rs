//! Clip generation pipeline.
//!
//! This crate provides:
//! - The Job Store contract and an in-memory store
//! - Stage adapter traits with ML-service and FFmpeg implementations
//! - The per-job orchestrator and the dispatcher that runs jobs concurrently
//! - Clip output storage and periodic cache eviction

pub mod adapters;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod storage;
pub mod store;
pub mod sweeper;

pub use adapters::{ClipDetector, FfmpegTrimmer, MlClipDetector, MlTranscriber, StageAdapters, Transcriber, Trimmer};
pub use config::WorkerConfig;
pub use dispatcher::Dispatcher;
pub use error::{PipelineError, Stage, StoreError, StoreResult, WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::{Orchestrator, StageTimeouts};
pub use storage::StorageManager;
pub use store::{InMemoryJobStore, JobStore};
pub use sweeper::CacheSweeper;
