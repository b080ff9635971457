//! End-to-end pipeline scenarios with fake stage adapters.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use clipforge_models::{Job, JobId, JobStage, JobView, PublicStatus, TimeRange, Transcript, TranscriptSegment};
use clipforge_worker::{
    ClipDetector, Dispatcher, InMemoryJobStore, JobStore, StageAdapters, StoreError, Transcriber,
    Trimmer, WorkerConfig, WorkerError,
};

struct FakeTranscriber {
    delay: Duration,
    fail: bool,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _media: &Path) -> anyhow::Result<Transcript> {
        tokio::time::sleep(self.delay).await;
        if self.fail {
            anyhow::bail!("speech model unavailable");
        }
        Ok(Transcript {
            language: Some("en".into()),
            segments: vec![TranscriptSegment {
                start: 0.0,
                end: 90.0,
                text: "a long talk".into(),
            }],
        })
    }
}

struct FakeDetector {
    ranges: Vec<TimeRange>,
    delay: Duration,
}

#[async_trait]
impl ClipDetector for FakeDetector {
    async fn detect_clips(&self, _transcript: &Transcript) -> anyhow::Result<Vec<TimeRange>> {
        tokio::time::sleep(self.delay).await;
        Ok(self.ranges.clone())
    }
}

/// Writes a small file per clip; optionally fails on the n-th call (1-based).
#[derive(Default)]
struct FakeTrimmer {
    fail_on: Option<usize>,
    calls: AtomicUsize,
}

#[async_trait]
impl Trimmer for FakeTrimmer {
    async fn trim(&self, _media: &Path, range: TimeRange, output: &Path) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            anyhow::bail!("encoder crashed");
        }
        tokio::fs::write(output, format!("{}-{}", range.start, range.end)).await?;
        Ok(())
    }
}

fn ranges(spans: &[(f64, f64)]) -> Vec<TimeRange> {
    spans
        .iter()
        .map(|&(s, e)| TimeRange::new(s, e).unwrap())
        .collect()
}

fn adapters(detected: Vec<TimeRange>, trimmer: Arc<FakeTrimmer>) -> StageAdapters {
    adapters_with(detected, trimmer)
}

fn adapters_with(detected: Vec<TimeRange>, trimmer: Arc<dyn Trimmer>) -> StageAdapters {
    StageAdapters::new(
        Arc::new(FakeTranscriber {
            delay: Duration::ZERO,
            fail: false,
        }),
        Arc::new(FakeDetector {
            ranges: detected,
            delay: Duration::ZERO,
        }),
        trimmer,
    )
}

struct Harness {
    dir: TempDir,
    config: WorkerConfig,
    store: Arc<InMemoryJobStore>,
    dispatcher: Dispatcher,
}

impl Harness {
    async fn new(adapters: StageAdapters, tweak: impl FnOnce(&mut WorkerConfig)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = WorkerConfig {
            cache_dir: dir.path().join("cache"),
            output_dir: dir.path().join("clips"),
            ..Default::default()
        };
        tweak(&mut config);

        let store = Arc::new(InMemoryJobStore::new());
        let dispatcher = Dispatcher::from_config(&config, store.clone(), adapters)
            .await
            .unwrap();

        Self {
            dir,
            config,
            store,
            dispatcher,
        }
    }

    async fn local_media(&self, name: &str) -> String {
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, b"not really a video").await.unwrap();
        path.to_string_lossy().to_string()
    }

    async fn wait_terminal(&self, job_id: &JobId) -> Job {
        for _ in 0..250 {
            let job = self.dispatcher.lookup(job_id).await.unwrap();
            if job.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("job {job_id} did not finish");
    }

    fn cache_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.config.cache_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }
}

#[tokio::test]
async fn local_input_produces_one_clip_per_range() {
    let trimmer = Arc::new(FakeTrimmer::default());
    let h = Harness::new(
        adapters(ranges(&[(0.0, 10.0), (20.0, 35.5), (40.0, 41.0)]), trimmer.clone()),
        |_| {},
    )
    .await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(job.stage, JobStage::Completed);
    assert_eq!(job.resolved_media_path.as_deref(), Some(input.as_str()));
    assert_eq!(job.status_message, "completed: 3 clips generated");
    assert!(job.error_message.is_none());
    assert!(job.completed_at.is_some());
    assert_eq!(trimmer.calls.load(Ordering::SeqCst), 3);

    assert_eq!(job.clips.len(), 3);
    for (i, clip) in job.clips.iter().enumerate() {
        assert!(clip.duration > 0.0);
        assert_eq!(clip.duration, clip.end_time - clip.start_time);
        assert_eq!(clip.filename, format!("clip_{}_{:03}.mp4", job_id, i + 1));
        assert!(Path::new(&clip.path).exists());
    }
    assert_eq!(job.clips[1].start_time, 20.0);
    assert_eq!(job.clips[1].duration, 15.5);
    assert!(h.cache_files().is_empty());
}

#[tokio::test]
async fn zero_detected_ranges_is_a_success() {
    let h = Harness::new(adapters(Vec::new(), Arc::default()), |_| {}).await;
    let input = h.local_media("quiet.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(job.stage, JobStage::Completed);
    assert!(job.clips.is_empty());

    let view = JobView::from(&job);
    assert_eq!(view.status, PublicStatus::Completed);
    assert_eq!(view.generated_clips, Some(Vec::new()));
}

#[tokio::test]
async fn missing_local_file_fails_as_invalid_reference() {
    let trimmer = Arc::new(FakeTrimmer::default());
    let h = Harness::new(adapters(ranges(&[(0.0, 1.0)]), trimmer.clone()), |_| {}).await;

    let job_id = h.dispatcher.submit("/definitely/not/here.mp4").await.unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(job.stage, JobStage::Failed);
    let error = job.error_message.unwrap();
    assert!(error.starts_with("input: "), "{error}");
    assert_eq!(job.status_message, format!("error: {error}"));
    assert_eq!(trimmer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn oversized_download_fails_and_leaves_no_cache_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 8192]))
        .mount(&server)
        .await;

    let h = Harness::new(adapters(ranges(&[(0.0, 1.0)]), Arc::default()), |c| {
        c.max_download_bytes = 4096;
    })
    .await;

    let job_id = h
        .dispatcher
        .submit(&format!("{}/v.mp4", server.uri()))
        .await
        .unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(job.stage, JobStage::Failed);
    let error = job.error_message.unwrap();
    assert!(error.starts_with("download: "), "{error}");
    assert!(error.contains("size limit"), "{error}");
    assert!(job.resolved_media_path.is_none());
    assert!(job.clips.is_empty());
    assert!(h.cache_files().is_empty());
}

#[tokio::test]
async fn concurrent_jobs_for_one_url_share_a_download() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/shared.mp4"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(vec![1u8; 1024])
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = Harness::new(adapters(ranges(&[(0.0, 5.0)]), Arc::default()), |_| {}).await;
    let url = format!("{}/shared.mp4", server.uri());

    let first = h.dispatcher.submit(&url).await.unwrap();
    let second = h.dispatcher.submit(&url).await.unwrap();
    let first = h.wait_terminal(&first).await;
    let second = h.wait_terminal(&second).await;

    assert_eq!(first.stage, JobStage::Completed);
    assert_eq!(second.stage, JobStage::Completed);
    assert!(first.resolved_media_path.is_some());
    assert_eq!(first.resolved_media_path, second.resolved_media_path);
    assert_eq!(h.cache_files().len(), 1);
}

#[tokio::test]
async fn failed_trim_discards_earlier_clips() {
    let trimmer = Arc::new(FakeTrimmer {
        fail_on: Some(2),
        ..Default::default()
    });
    let h = Harness::new(
        adapters(ranges(&[(0.0, 5.0), (5.0, 9.0), (9.0, 12.0)]), trimmer.clone()),
        |_| {},
    )
    .await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(job.stage, JobStage::Failed);
    let error = job.error_message.clone().unwrap();
    assert!(error.starts_with("trim: "), "{error}");
    assert!(error.contains("encoder crashed"), "{error}");
    assert!(job.clips.is_empty());
    assert_eq!(JobView::from(&job).generated_clips, None);

    // The third range is never attempted.
    assert_eq!(trimmer.calls.load(Ordering::SeqCst), 2);
    assert!(!h.config.output_dir.join(job_id.as_str()).exists());
}

#[tokio::test]
async fn transcriber_error_is_a_stage_failure() {
    let trimmer = Arc::new(FakeTrimmer::default());
    let adapters = StageAdapters::new(
        Arc::new(FakeTranscriber {
            delay: Duration::ZERO,
            fail: true,
        }),
        Arc::new(FakeDetector {
            ranges: ranges(&[(0.0, 1.0)]),
            delay: Duration::ZERO,
        }),
        trimmer.clone(),
    );
    let h = Harness::new(adapters, |_| {}).await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(
        job.error_message.as_deref(),
        Some("transcribe: speech model unavailable")
    );
    assert_eq!(job.resolved_media_path.as_deref(), Some(input.as_str()));
    assert_eq!(trimmer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn slow_detector_times_out() {
    let adapters = StageAdapters::new(
        Arc::new(FakeTranscriber {
            delay: Duration::ZERO,
            fail: false,
        }),
        Arc::new(FakeDetector {
            ranges: ranges(&[(0.0, 1.0)]),
            delay: Duration::from_secs(10),
        }),
        Arc::new(FakeTrimmer::default()),
    );
    let h = Harness::new(adapters, |c| c.detect_timeout = Duration::from_millis(100)).await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(job.stage, JobStage::Failed);
    assert_eq!(
        job.error_message.as_deref(),
        Some("detect: timed out after 100 ms")
    );
}

#[tokio::test]
async fn invalid_detected_range_fails_detection() {
    let bad = TimeRange {
        start: 10.0,
        end: 4.0,
    };
    let h = Harness::new(adapters(vec![bad], Arc::default()), |_| {}).await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.wait_terminal(&job_id).await;

    assert_eq!(job.stage, JobStage::Failed);
    assert!(job.error_message.unwrap().starts_with("detect: invalid clip range"));
}

#[tokio::test]
async fn terminal_jobs_are_never_rewritten() {
    let h = Harness::new(adapters(ranges(&[(0.0, 2.0)]), Arc::default()), |_| {}).await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let done = h.wait_terminal(&job_id).await;

    let mut tampered = done.clone();
    tampered.stage = JobStage::Failed;
    tampered.clips.clear();
    tampered.error_message = Some("late write".into());
    assert!(matches!(
        h.store.update(&tampered).await,
        Err(StoreError::Terminal(_))
    ));

    let mut reopened = done.clone();
    assert!(reopened.fail("again").is_err());

    let stored = h.dispatcher.lookup(&job_id).await.unwrap();
    assert_eq!(stored, done);
}

#[tokio::test]
async fn delete_removes_record_and_artifacts() {
    let h = Harness::new(adapters(ranges(&[(0.0, 2.0)]), Arc::default()), |_| {}).await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.wait_terminal(&job_id).await;
    let clip_path = PathBuf::from(&job.clips[0].path);
    assert!(clip_path.exists());

    h.dispatcher.delete(&job_id).await.unwrap();

    assert!(!clip_path.exists());
    assert!(matches!(
        h.dispatcher.lookup(&job_id).await,
        Err(WorkerError::JobNotFound(_))
    ));
    assert!(matches!(
        h.dispatcher.delete(&job_id).await,
        Err(WorkerError::JobNotFound(_))
    ));
}

/// Deletes the job record mid-trim and leaves a plain file where the job's
/// output directory was, so the cleanup after the failed final write errors.
#[derive(Default)]
struct RecordDeletingTrimmer {
    store: std::sync::OnceLock<Arc<InMemoryJobStore>>,
}

#[async_trait]
impl Trimmer for RecordDeletingTrimmer {
    async fn trim(&self, _media: &Path, _range: TimeRange, output: &Path) -> anyhow::Result<()> {
        let job_dir = output.parent().unwrap();
        let job_id = JobId::from_string(job_dir.file_name().unwrap().to_string_lossy());
        tokio::fs::remove_dir_all(job_dir).await?;
        tokio::fs::write(job_dir, b"in the way").await?;
        self.store.get().unwrap().delete(&job_id).await?;
        Ok(())
    }
}

#[tokio::test]
async fn abandoned_job_survives_failed_artifact_cleanup() {
    let trimmer = Arc::new(RecordDeletingTrimmer::default());
    let h = Harness::new(adapters_with(ranges(&[(0.0, 2.0)]), trimmer.clone()), |_| {}).await;
    assert!(trimmer.store.set(h.store.clone()).is_ok());
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    assert!(h.dispatcher.shutdown().await);

    assert_eq!(h.dispatcher.running_jobs(), 0);
    assert!(h.store.is_empty().await);
    let job_dir = h.config.output_dir.join(job_id.as_str());
    assert!(job_dir.is_file());
}

#[tokio::test]
async fn empty_reference_is_rejected_at_submission() {
    let h = Harness::new(adapters(Vec::new(), Arc::default()), |_| {}).await;

    assert!(matches!(
        h.dispatcher.submit("   ").await,
        Err(WorkerError::InvalidRequest(_))
    ));
    assert!(h.store.is_empty().await);
}

#[tokio::test]
async fn submit_returns_before_the_pipeline_finishes() {
    let adapters = StageAdapters::new(
        Arc::new(FakeTranscriber {
            delay: Duration::from_millis(300),
            fail: false,
        }),
        Arc::new(FakeDetector {
            ranges: Vec::new(),
            delay: Duration::ZERO,
        }),
        Arc::new(FakeTrimmer::default()),
    );
    let h = Harness::new(adapters, |_| {}).await;
    let input = h.local_media("a.mp4").await;

    let job_id = h.dispatcher.submit(&input).await.unwrap();
    let job = h.dispatcher.lookup(&job_id).await.unwrap();
    assert!(!job.is_terminal());
    assert_eq!(h.dispatcher.running_jobs(), 1);

    assert!(h.dispatcher.shutdown().await);
    assert_eq!(h.dispatcher.running_jobs(), 0);
    assert_eq!(
        h.dispatcher.lookup(&job_id).await.unwrap().stage,
        JobStage::Completed
    );
}
