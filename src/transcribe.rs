use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{MediaConfig, WhisperConfig};
use crate::error::{JimakuError, Result};
use crate::media::FfmpegBuilder;
use crate::transcript::{Segment, Transcript};

/// Seam for the speech-to-text collaborator. Takes the downloaded video;
/// audio extraction is part of the transcription stage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Extract the audio track of `video_path` into `work_dir` and
    /// transcribe it into ordered, timed segments.
    async fn transcribe(
        &self,
        video_path: &Path,
        work_dir: &Path,
        language_hint: Option<String>,
    ) -> Result<Transcript>;
}

/// JSON output shape of the whisper CLI. Unknown fields are ignored.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    segments: Vec<WhisperJsonSegment>,
    language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WhisperJsonSegment {
    start: f64,
    end: f64,
    text: String,
}

impl From<WhisperOutput> for Transcript {
    fn from(output: WhisperOutput) -> Self {
        let segments = output
            .segments
            .into_iter()
            .map(|seg| Segment {
                start: seg.start,
                end: seg.end,
                text: seg.text.trim().to_string(),
            })
            .filter(|seg| !seg.text.is_empty())
            .collect();

        Transcript {
            language: output.language.unwrap_or_else(|| "unknown".to_string()),
            segments,
        }
    }
}

/// Whisper-CLI-backed transcriber. Model size is a pure configuration knob.
pub struct WhisperTranscriber {
    whisper: WhisperConfig,
    ffmpeg: FfmpegBuilder,
}

impl WhisperTranscriber {
    pub fn new(whisper: WhisperConfig, media: MediaConfig) -> Self {
        let ffmpeg = FfmpegBuilder::new(&media.binary_path);
        Self { whisper, ffmpeg }
    }

    async fn run_whisper(
        &self,
        audio_path: &Path,
        work_dir: &Path,
        language_hint: Option<&str>,
    ) -> Result<Transcript> {
        let mut cmd = tokio::process::Command::new(&self.whisper.binary_path);
        cmd.arg(audio_path)
            .arg("--model")
            .arg(&self.whisper.model)
            .arg("--output_dir")
            .arg(work_dir)
            .arg("--output_format")
            .arg("json");

        if let Some(lang) = language_hint {
            cmd.arg("--language").arg(lang);
        }

        debug!("Invoking speech-to-text engine: {:?}", cmd);

        let output = cmd.output().await.map_err(|e| {
            JimakuError::Transcription(format!(
                "Failed to execute speech-to-text engine '{}': {}",
                self.whisper.binary_path, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if let Some(lang) = language_hint {
                if stderr.to_lowercase().contains("language") {
                    return Err(JimakuError::Transcription(format!(
                        "Unsupported language '{}': {}",
                        lang,
                        stderr.trim()
                    )));
                }
            }
            return Err(JimakuError::Transcription(format!(
                "Speech-to-text engine failed: {}",
                stderr.trim()
            )));
        }

        let audio_stem = audio_path
            .file_stem()
            .ok_or_else(|| JimakuError::Transcription("Invalid audio filename".to_string()))?;
        let json_path = work_dir.join(format!("{}.json", audio_stem.to_string_lossy()));

        let json_content = tokio::fs::read_to_string(&json_path).await.map_err(|e| {
            JimakuError::Transcription(format!(
                "Failed to read transcription output {}: {}",
                json_path.display(),
                e
            ))
        })?;

        let whisper_output: WhisperOutput = serde_json::from_str(&json_content)
            .map_err(|e| JimakuError::Transcription(format!("Failed to parse transcription JSON: {}", e)))?;

        Ok(whisper_output.into())
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(
        &self,
        video_path: &Path,
        work_dir: &Path,
        language_hint: Option<String>,
    ) -> Result<Transcript> {
        if !video_path.exists() {
            return Err(JimakuError::FileNotFound(video_path.display().to_string()));
        }
        tokio::fs::create_dir_all(work_dir).await?;

        let audio_path = work_dir.join("audio.wav");
        info!(
            "Extracting audio: {} -> {}",
            video_path.display(),
            audio_path.display()
        );

        self.ffmpeg
            .extract_audio(video_path, audio_path.as_path())
            .run()
            .await
            .map_err(JimakuError::Transcription)?;

        info!(
            "Transcribing {} with model '{}'",
            audio_path.display(),
            self.whisper.model
        );

        let transcript = self
            .run_whisper(&audio_path, work_dir, language_hint.as_deref())
            .await?;

        if transcript.segments.is_empty() {
            return Err(JimakuError::Transcription(
                "Transcription produced no segments (unreadable or silent audio?)".to_string(),
            ));
        }

        info!(
            "Transcription completed: {} segments, detected language '{}'",
            transcript.segments.len(),
            transcript.language
        );
        Ok(transcript)
    }
}
