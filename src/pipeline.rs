use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use url::Url;
use uuid::Uuid;

use crate::artifact::{Artifact, ArtifactTracker};
use crate::config::Config;
use crate::download::{Downloader, YtDlpDownloader};
use crate::error::{JimakuError, Result};
use crate::media::{Embedder, FfmpegEmbedder};
use crate::subtitle;
use crate::transcribe::{Transcriber, WhisperTranscriber};
use crate::translate::{LlmTranslator, Translator};

/// One pipeline step with its own failure domain. Stages run strictly in
/// order; none is ever re-entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Downloading,
    Transcribing,
    Translating,
    Embedding,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Downloading => "Downloading",
            Stage::Transcribing => "Transcribing",
            Stage::Translating => "Translating",
            Stage::Embedding => "Embedding",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Success,
    Partial,
    Failure,
}

/// Terminal report of one job. Owned solely by the pipeline; not persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub output_path: Option<PathBuf>,
    pub error_detail: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl JobResult {
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Run a stage future under its configured deadline. A limit of 0 disables
/// the deadline. Expiry is a distinct error kind, not a stage failure.
pub(crate) async fn with_deadline<T>(
    stage: Stage,
    limit_secs: u64,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    if limit_secs == 0 {
        return fut.await;
    }

    match tokio::time::timeout(Duration::from_secs(limit_secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(JimakuError::Timeout { stage, limit_secs }),
    }
}

/// Sequences download, transcription, translation, and embedding over one
/// video, tracking artifacts across stages. All working paths are scoped by
/// a per-job id so concurrent manual invocations cannot collide.
pub struct Pipeline {
    config: Config,
    downloader: Box<dyn Downloader>,
    transcriber: Box<dyn Transcriber>,
    translator: Box<dyn Translator>,
    embedder: Box<dyn Embedder>,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        let downloader = Box::new(YtDlpDownloader::new(config.download.clone()));
        let transcriber = Box::new(WhisperTranscriber::new(
            config.whisper.clone(),
            config.media.clone(),
        ));
        let translator = Box::new(LlmTranslator::new(config.translate.clone())?);

        let embedder = FfmpegEmbedder::new(config.media.clone(), config.subtitle.clone());
        embedder.check_availability()?;

        Ok(Self::with_components(
            config,
            downloader,
            transcriber,
            translator,
            Box::new(embedder),
        ))
    }

    pub fn with_components(
        config: Config,
        downloader: Box<dyn Downloader>,
        transcriber: Box<dyn Transcriber>,
        translator: Box<dyn Translator>,
        embedder: Box<dyn Embedder>,
    ) -> Self {
        Self {
            config,
            downloader,
            transcriber,
            translator,
            embedder,
        }
    }

    /// Run one job to a terminal state. Never returns an error: failures are
    /// folded into the JobResult after cleanup has had its chance to run.
    pub async fn run_job(&self, url: &Url, target_lang: &str, cleanup: bool) -> JobResult {
        let job_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("Job {} started: {} -> {}", job_id, url, target_lang);

        let mut tracker = ArtifactTracker::new();
        let outcome = self.execute(job_id, url, target_lang, &mut tracker).await;

        let result = match outcome {
            Ok(output_path) => {
                info!("Job {} completed: {}", job_id, output_path.display());
                JobResult {
                    job_id,
                    status: JobStatus::Success,
                    output_path: Some(output_path),
                    error_detail: None,
                    started_at,
                    finished_at: Utc::now(),
                }
            }
            Err(e) => {
                match e.stage() {
                    Some(stage) => error!("Job {} failed at {}: {}", job_id, stage, e),
                    None => error!("Job {} failed: {}", job_id, e),
                }
                JobResult {
                    job_id,
                    status: JobStatus::Failure,
                    output_path: None,
                    error_detail: Some(e.to_string()),
                    started_at,
                    finished_at: Utc::now(),
                }
            }
        };

        if cleanup {
            let removed = tracker.remove_temporary().await;
            info!("Job {}: cleanup removed {} temporary artifacts", job_id, removed);
        }

        result
    }

    async fn execute(
        &self,
        job_id: Uuid,
        url: &Url,
        target_lang: &str,
        tracker: &mut ArtifactTracker,
    ) -> Result<PathBuf> {
        let timeouts = &self.config.timeouts;

        // Downloading
        let download_dir = self.config.paths.downloads.join(job_id.to_string());
        tokio::fs::create_dir_all(&download_dir)
            .await
            .map_err(|e| JimakuError::from(e).at_stage(Stage::Downloading))?;
        tracker.add(Artifact::temporary(&download_dir, Stage::Downloading));

        let video_path = with_deadline(
            Stage::Downloading,
            timeouts.download_secs,
            self.downloader.download(url, &download_dir),
        )
        .await
        .map_err(|e| e.at_stage(Stage::Downloading))?;

        // Transcribing
        let work_dir = self.config.paths.temp.join(job_id.to_string());
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| JimakuError::from(e).at_stage(Stage::Transcribing))?;
        tracker.add(Artifact::temporary(&work_dir, Stage::Transcribing));

        let language_hint = self.config.whisper.language_hint.clone();
        let transcript = with_deadline(
            Stage::Transcribing,
            timeouts.transcribe_secs,
            self.transcriber.transcribe(&video_path, &work_dir, language_hint),
        )
        .await
        .map_err(|e| e.at_stage(Stage::Transcribing))?;

        // Translating
        let translated = with_deadline(
            Stage::Translating,
            timeouts.translate_secs,
            self.translator.translate(&transcript.segments, target_lang),
        )
        .await
        .map_err(|e| e.at_stage(Stage::Translating))?;

        // Embedding
        let stem = video_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| job_id.to_string());

        let srt_path = work_dir.join(format!("{}_{}.srt", stem, target_lang));
        subtitle::write_srt(&translated, &srt_path)
            .await
            .map_err(|e| e.at_stage(Stage::Embedding))?;

        let output_path = self
            .config
            .paths
            .output
            .join(format!("{}_{}.mp4", stem, target_lang));
        tokio::fs::create_dir_all(&self.config.paths.output)
            .await
            .map_err(|e| JimakuError::from(e).at_stage(Stage::Embedding))?;

        with_deadline(
            Stage::Embedding,
            timeouts.embed_secs,
            self.embedder.embed(
                &video_path,
                &srt_path,
                &output_path,
                self.config.subtitle.method,
            ),
        )
        .await
        .map_err(|e| e.at_stage(Stage::Embedding))?;

        tracker.add(Artifact::final_output(&output_path, Stage::Embedding));

        Ok(output_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::MockDownloader;
    use crate::media::MockEmbedder;
    use crate::transcribe::MockTranscriber;
    use crate::translate::MockTranslator;
    use crate::transcript::{Segment, Transcript, TranslatedSegment};

    fn test_config(root: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.paths.downloads = root.join("downloads");
        config.paths.output = root.join("output");
        config.paths.temp = root.join("temp");
        config.paths.logs = root.join("logs");
        config
    }

    fn sample_transcript() -> Transcript {
        Transcript {
            language: "en".to_string(),
            segments: vec![
                Segment {
                    start: 0.0,
                    end: 2.0,
                    text: "hello".to_string(),
                },
                Segment {
                    start: 2.0,
                    end: 4.5,
                    text: "world".to_string(),
                },
            ],
        }
    }

    fn happy_path_pipeline(config: Config) -> Pipeline {
        let mut downloader = MockDownloader::new();
        downloader.expect_download().returning(|_, dest| {
            let path = dest.join("clip.mp4");
            std::fs::write(&path, b"video bytes").unwrap();
            Ok(path)
        });

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _, _| Ok(sample_transcript()));

        let mut translator = MockTranslator::new();
        translator.expect_translate().returning(|segments, _| {
            Ok(segments
                .iter()
                .map(|s| TranslatedSegment::from_segment(s, format!("[ko] {}", s.text)))
                .collect())
        });

        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_, _, output, _| {
            std::fs::write(output, b"subtitled video").unwrap();
            Ok(())
        });

        Pipeline::with_components(
            config,
            Box::new(downloader),
            Box::new(transcriber),
            Box::new(translator),
            Box::new(embedder),
        )
    }

    #[tokio::test]
    async fn successful_job_names_output_after_stem_and_language() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let pipeline = happy_path_pipeline(config);

        let url = Url::parse("https://example.com/watch?v=ABC").unwrap();
        let result = pipeline.run_job(&url, "ko", false).await;

        assert!(result.is_success());
        let output = result.output_path.unwrap();
        assert_eq!(output.file_name().unwrap(), "clip_ko.mp4");
        assert!(output.exists());
    }

    #[tokio::test]
    async fn success_with_cleanup_keeps_final_output_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let pipeline = happy_path_pipeline(config);

        let url = Url::parse("https://example.com/watch?v=ABC").unwrap();
        let result = pipeline.run_job(&url, "ko", true).await;

        assert!(result.is_success());
        assert!(result.output_path.unwrap().exists());

        // Job-scoped working directories must be gone.
        let job_dir = dir.path().join("downloads").join(result.job_id.to_string());
        assert!(!job_dir.exists());
        let work_dir = dir.path().join("temp").join(result.job_id.to_string());
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn success_without_cleanup_keeps_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let pipeline = happy_path_pipeline(config);

        let url = Url::parse("https://example.com/watch?v=ABC").unwrap();
        let result = pipeline.run_job(&url, "ko", false).await;

        assert!(result.is_success());
        let downloaded = dir
            .path()
            .join("downloads")
            .join(result.job_id.to_string())
            .join("clip.mp4");
        assert!(downloaded.exists());
    }

    #[tokio::test]
    async fn download_failure_stops_the_job_before_later_stages() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let mut downloader = MockDownloader::new();
        downloader
            .expect_download()
            .returning(|_, _| Err(JimakuError::Download("Video unavailable".to_string())));

        let mut transcriber = MockTranscriber::new();
        transcriber.expect_transcribe().times(0);
        let mut translator = MockTranslator::new();
        translator.expect_translate().times(0);
        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().times(0);

        let pipeline = Pipeline::with_components(
            config,
            Box::new(downloader),
            Box::new(transcriber),
            Box::new(translator),
            Box::new(embedder),
        );

        let url = Url::parse("https://example.com/watch?v=GONE").unwrap();
        let result = pipeline.run_job(&url, "ja", true).await;

        assert_eq!(result.status, JobStatus::Failure);
        assert!(result.output_path.is_none());
        let detail = result.error_detail.unwrap();
        assert!(detail.contains("Downloading"), "detail was: {}", detail);
        assert!(detail.contains("Video unavailable"));

        // Cleanup was requested, so the job left nothing behind.
        let job_dir = dir.path().join("downloads").join(result.job_id.to_string());
        assert!(!job_dir.exists());
    }

    #[tokio::test]
    async fn language_hint_from_config_reaches_the_transcriber() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.whisper.language_hint = Some("en".to_string());

        let mut downloader = MockDownloader::new();
        downloader.expect_download().returning(|_, dest| {
            let path = dest.join("clip.mp4");
            std::fs::write(&path, b"video").unwrap();
            Ok(path)
        });

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .withf(|_, _, hint| hint.as_deref() == Some("en"))
            .returning(|_, _, _| Ok(sample_transcript()));

        let mut translator = MockTranslator::new();
        translator.expect_translate().returning(|segments, _| {
            Ok(segments
                .iter()
                .map(|s| TranslatedSegment::from_segment(s, s.text.clone()))
                .collect())
        });

        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().returning(|_, _, output, _| {
            std::fs::write(output, b"subtitled").unwrap();
            Ok(())
        });

        let pipeline = Pipeline::with_components(
            config,
            Box::new(downloader),
            Box::new(transcriber),
            Box::new(translator),
            Box::new(embedder),
        );

        let url = Url::parse("https://example.com/watch?v=ABC").unwrap();
        let result = pipeline.run_job(&url, "ja", false).await;
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn cleanup_after_translation_failure_removes_earlier_stage_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let mut downloader = MockDownloader::new();
        downloader.expect_download().returning(|_, dest| {
            let path = dest.join("clip.mp4");
            std::fs::write(&path, b"video").unwrap();
            Ok(path)
        });

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _, _| Ok(sample_transcript()));

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|_, _| Err(JimakuError::Translation("quota exhausted".to_string())));

        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().times(0);

        let pipeline = Pipeline::with_components(
            config,
            Box::new(downloader),
            Box::new(transcriber),
            Box::new(translator),
            Box::new(embedder),
        );

        let url = Url::parse("https://example.com/watch?v=ABC").unwrap();
        let result = pipeline.run_job(&url, "ja", true).await;

        assert_eq!(result.status, JobStatus::Failure);

        // Both completed-stage working directories must be gone.
        let job_dir = dir.path().join("downloads").join(result.job_id.to_string());
        assert!(!job_dir.exists());
        let work_dir = dir.path().join("temp").join(result.job_id.to_string());
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn translation_failure_reports_its_stage() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        let mut downloader = MockDownloader::new();
        downloader.expect_download().returning(|_, dest| {
            let path = dest.join("clip.mp4");
            std::fs::write(&path, b"video").unwrap();
            Ok(path)
        });

        let mut transcriber = MockTranscriber::new();
        transcriber
            .expect_transcribe()
            .returning(|_, _, _| Ok(sample_transcript()));

        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .returning(|_, _| Err(JimakuError::Translation("quota exhausted".to_string())));

        let mut embedder = MockEmbedder::new();
        embedder.expect_embed().times(0);

        let pipeline = Pipeline::with_components(
            config,
            Box::new(downloader),
            Box::new(transcriber),
            Box::new(translator),
            Box::new(embedder),
        );

        let url = Url::parse("https://example.com/watch?v=ABC").unwrap();
        let result = pipeline.run_job(&url, "ja", false).await;

        assert_eq!(result.status, JobStatus::Failure);
        let detail = result.error_detail.unwrap();
        assert!(detail.contains("Translating"), "detail was: {}", detail);
    }

    #[tokio::test]
    async fn timing_is_preserved_through_the_translated_subtitles() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let pipeline = happy_path_pipeline(config);

        let url = Url::parse("https://example.com/watch?v=ABC").unwrap();
        let result = pipeline.run_job(&url, "ko", false).await;
        assert!(result.is_success());

        let srt_path = dir
            .path()
            .join("temp")
            .join(result.job_id.to_string())
            .join("clip_ko.srt");
        let parsed = crate::subtitle::read_srt(&srt_path).await.unwrap();

        let source = sample_transcript();
        assert_eq!(parsed.len(), source.segments.len());
        for (original, translated) in source.segments.iter().zip(&parsed) {
            assert_eq!(translated.start, original.start);
            assert_eq!(translated.end, original.end);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn expired_deadline_is_a_timeout_not_a_stage_failure() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        };

        let err = with_deadline(Stage::Downloading, 1, slow).await.unwrap_err();
        match err {
            JimakuError::Timeout { stage, limit_secs } => {
                assert_eq!(stage, Stage::Downloading);
                assert_eq!(limit_secs, 1);
            }
            other => panic!("expected timeout, got: {}", other),
        }
    }

    #[tokio::test]
    async fn zero_deadline_disables_the_timeout() {
        let result = with_deadline(Stage::Embedding, 0, async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
