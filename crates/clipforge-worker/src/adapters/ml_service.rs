use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use clipforge_ml_client::MlClient;
use clipforge_models::{TimeRange, Transcript};

use super::{ClipDetector, Transcriber};

/// Transcription through the ML service.
pub struct MlTranscriber {
    client: Arc<MlClient>,
    language: Option<String>,
}

impl MlTranscriber {
    pub fn new(client: Arc<MlClient>) -> Self {
        Self {
            client,
            language: None,
        }
    }

    /// Skip language detection and transcribe as `language`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

#[async_trait]
impl Transcriber for MlTranscriber {
    async fn transcribe(&self, media: &Path) -> anyhow::Result<Transcript> {
        let transcript = self
            .client
            .transcribe(media, self.language.as_deref())
            .await
            .with_context(|| format!("transcription of {} failed", media.display()))?;
        Ok(transcript)
    }
}

/// Clip boundary detection through the ML service.
pub struct MlClipDetector {
    client: Arc<MlClient>,
}

impl MlClipDetector {
    pub fn new(client: Arc<MlClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClipDetector for MlClipDetector {
    async fn detect_clips(&self, transcript: &Transcript) -> anyhow::Result<Vec<TimeRange>> {
        if transcript.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self.client.find_clips(transcript).await?)
    }
}
