//! Resolving a job's input reference to a local media file.
//!
//! Local paths are used as they are. HTTP(S) URLs go through the download
//! cache: a live entry is reused, otherwise the media is streamed to a
//! partial file under a size cap and a wall-clock timeout, then committed.
//! Concurrent requests for the same URL share a single download.

use futures_util::StreamExt;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use url::Url;

use crate::cache::{cache_key, CacheEntry, CacheStore};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_if_exists;
use crate::metrics;

/// Extension used when neither the URL nor the content type names one.
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Limits applied to remote fetches.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Largest accepted download, in bytes
    pub max_download_bytes: u64,
    /// Wall-clock limit for one download
    pub download_timeout: Duration,
    /// Cache entries older than this are downloaded again
    pub cache_max_age: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_download_bytes: 2 * 1024 * 1024 * 1024,
            download_timeout: Duration::from_secs(300),
            cache_max_age: Duration::from_secs(24 * 3600),
        }
    }
}

/// How a reference was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedOrigin {
    Local,
    CacheHit,
    Downloaded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedMedia {
    pub path: PathBuf,
    pub origin: ResolvedOrigin,
}

/// Whether `reference` names remote media (http or https, any case).
pub fn is_remote_reference(reference: &str) -> bool {
    let lower = reference.trim_start().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Running total of bytes received against the configured cap.
#[derive(Debug, Clone, Copy)]
pub struct ByteBudget {
    limit: u64,
    received: u64,
}

impl ByteBudget {
    pub fn new(limit: u64) -> Self {
        Self { limit, received: 0 }
    }

    /// Reject a declared length that is already over the cap.
    pub fn check_declared(&self, declared: u64) -> MediaResult<()> {
        if declared > self.limit {
            return Err(MediaError::DownloadTooLarge {
                size: declared,
                limit: self.limit,
            });
        }
        Ok(())
    }

    /// Account for a received chunk.
    pub fn consume(&mut self, bytes: u64) -> MediaResult<()> {
        self.received = self.received.saturating_add(bytes);
        if self.received > self.limit {
            return Err(MediaError::DownloadTooLarge {
                size: self.received,
                limit: self.limit,
            });
        }
        Ok(())
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Pick a file extension for a download.
///
/// The URL path wins when it carries a short alphanumeric extension;
/// otherwise the content type is mapped, falling back to mp4.
pub fn choose_extension(url: &Url, content_type: Option<&str>) -> String {
    let from_path = Path::new(url.path())
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| (1..=5).contains(&e.len()) && e.bytes().all(|b| b.is_ascii_alphanumeric()));
    if let Some(ext) = from_path {
        return ext.to_ascii_lowercase();
    }

    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let ext = if content_type.contains("quicktime") {
        "mov"
    } else if content_type.contains("x-msvideo") || content_type.contains("avi") {
        "avi"
    } else if content_type.contains("matroska") {
        "mkv"
    } else if content_type.contains("webm") {
        "webm"
    } else if content_type.contains("mpeg") {
        "mpeg"
    } else {
        DEFAULT_EXTENSION
    };
    ext.to_string()
}

/// Browser-like headers; some hosts refuse requests without them.
fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
        ),
    );
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("video/*,application/octet-stream;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_static("en-US,en;q=0.9"),
    );
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    headers.insert(header::DNT, HeaderValue::from_static("1"));
    headers
}

/// Resolves input references, downloading through the cache when needed.
pub struct Fetcher {
    cache: Arc<CacheStore>,
    http: reqwest::Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(cache: Arc<CacheStore>, config: FetchConfig) -> MediaResult<Self> {
        let http = reqwest::Client::builder()
            .default_headers(browser_headers())
            .build()
            .map_err(|e| MediaError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            cache,
            http,
            config,
        })
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolve `reference` to a readable local file.
    pub async fn resolve(&self, reference: &str) -> MediaResult<ResolvedMedia> {
        if reference.trim().is_empty() {
            return Err(MediaError::invalid_reference("empty reference"));
        }

        if !is_remote_reference(reference) {
            return resolve_local(reference).await;
        }

        let reference = reference.trim();
        let url = Url::parse(reference)
            .map_err(|e| MediaError::invalid_reference(format!("{}: {}", reference, e)))?;
        if url.host_str().is_none() {
            return Err(MediaError::invalid_reference(format!(
                "{}: missing host",
                reference
            )));
        }

        let key = cache_key(reference);
        if let Some(entry) = self.cache.live_entry(&key, self.config.cache_max_age).await {
            return Ok(cache_hit(entry));
        }

        let _guard = self.cache.lock_key(&key).await;

        // Someone else may have finished the same download while we waited.
        if let Some(entry) = self.cache.live_entry(&key, self.config.cache_max_age).await {
            return Ok(cache_hit(entry));
        }

        let entry = self.download(&url, &key).await?;
        Ok(ResolvedMedia {
            path: entry.local_path,
            origin: ResolvedOrigin::Downloaded,
        })
    }

    /// Download `url` into the cache. The caller holds the key lock.
    async fn download(&self, url: &Url, key: &str) -> MediaResult<CacheEntry> {
        let partial = self.cache.partial_path(key);
        let started = Instant::now();
        info!("Downloading {}", url);

        let outcome =
            match tokio::time::timeout(self.config.download_timeout, self.stream_to(url, &partial))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(MediaError::DownloadTimeout(
                    self.config.download_timeout.as_secs(),
                )),
            };

        let committed = match outcome {
            Ok((extension, _)) => self.cache.commit(key, &partial, &extension).await,
            Err(e) => Err(e),
        };

        let elapsed = started.elapsed().as_secs_f64();
        match committed {
            Ok(entry) => {
                info!(
                    "Downloaded {} ({} bytes) in {:.1}s",
                    url, entry.size_bytes, elapsed
                );
                metrics::record_download("success", entry.size_bytes, elapsed);
                Ok(entry)
            }
            Err(e) => {
                remove_if_exists(&partial).await;
                warn!("Download of {} failed: {}", url, e);
                metrics::record_download("failure", 0, elapsed);
                Err(e)
            }
        }
    }

    /// Stream the response body to `partial`, returning the chosen extension
    /// and the number of bytes written.
    async fn stream_to(&self, url: &Url, partial: &Path) -> MediaResult<(String, u64)> {
        let response = self.http.get(url.clone()).send().await?.error_for_status()?;

        let mut budget = ByteBudget::new(self.config.max_download_bytes);
        if let Some(declared) = response.content_length() {
            budget.check_declared(declared)?;
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let extension = choose_extension(url, content_type.as_deref());

        let mut file = tokio::fs::File::create(partial).await?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            budget.consume(chunk.len() as u64)?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;

        Ok((extension, budget.received()))
    }
}

fn cache_hit(entry: CacheEntry) -> ResolvedMedia {
    metrics::record_cache_hit();
    info!("Using cached download {}", entry.local_path.display());
    ResolvedMedia {
        path: entry.local_path,
        origin: ResolvedOrigin::CacheHit,
    }
}

async fn resolve_local(reference: &str) -> MediaResult<ResolvedMedia> {
    let path = PathBuf::from(reference);
    match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => Ok(ResolvedMedia {
            path,
            origin: ResolvedOrigin::Local,
        }),
        Ok(_) => Err(MediaError::invalid_reference(format!(
            "{}: not a regular file",
            reference
        ))),
        Err(_) => Err(MediaError::invalid_reference(format!(
            "file not found: {}",
            reference
        ))),
    }
}
