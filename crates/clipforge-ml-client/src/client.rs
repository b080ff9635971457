//! ML service HTTP client.

use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use clipforge_models::{TimeRange, Transcript};

use crate::error::{MlError, MlResult};
use crate::types::{FindClipsRequest, FindClipsResponse, HealthResponse, TranscribeRequest};

/// Configuration for ML client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of ML service
    pub base_url: String,
    /// Request timeout; transcription of long media is slow
    pub timeout: Duration,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(3600),
        }
    }
}

impl MlClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("ML_SERVICE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            timeout: std::env::var("ML_SERVICE_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Client for the speech-to-text and clip-finding service.
///
/// Requests are attempted once; retry policy belongs to the caller.
pub struct MlClient {
    http: Client,
    config: MlClientConfig,
}

impl MlClient {
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(MlClientConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Check if ML service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response
                    .json()
                    .await
                    .map_err(|e| MlError::InvalidResponse(e.to_string()))?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Transcribe the audio track of a local media file.
    pub async fn transcribe(&self, media_path: &Path, language: Option<&str>) -> MlResult<Transcript> {
        let request = TranscribeRequest {
            media_path: media_path.to_string_lossy().to_string(),
            language: language.map(str::to_string),
        };
        let transcript: Transcript = self.post("transcribe", &request).await?;
        debug!(
            "Transcribed {} into {} segments",
            media_path.display(),
            transcript.segments.len()
        );
        Ok(transcript)
    }

    /// Find clip boundaries in a transcript, in the order the service returns them.
    pub async fn find_clips(&self, transcript: &Transcript) -> MlResult<Vec<TimeRange>> {
        let request = FindClipsRequest {
            transcript: transcript.clone(),
        };
        let response: FindClipsResponse = self.post("find-clips", &request).await?;
        Ok(response.clips.into_iter().map(TimeRange::from).collect())
    }

    async fn post<Req, Resp>(&self, endpoint: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.base_url, endpoint);
        let timeout_secs = self.config.timeout.as_secs();
        debug!("POST {}", url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| MlError::from_reqwest(e, timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "ML service returned {}: {}",
                status,
                body.trim()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| MlError::from_reqwest(e, timeout_secs))?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
