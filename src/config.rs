use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{JimakuError, Result};

fn default_download_binary() -> String {
    "yt-dlp".to_string()
}

fn default_quality() -> String {
    "best".to_string()
}

fn default_download_attempts() -> u32 {
    3
}

fn default_download_backoff() -> f64 {
    2.0
}

fn default_whisper_binary() -> String {
    "whisper".to_string()
}

fn default_whisper_model() -> String {
    "base".to_string()
}

fn default_translate_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_translate_model() -> String {
    "llama3.2:3b".to_string()
}

fn default_translate_retries() -> u32 {
    3
}

fn default_translate_retry_delay() -> f64 {
    2.0
}

fn default_batch_chars() -> usize {
    4000
}

fn default_subtitle_method() -> SubtitleMethod {
    SubtitleMethod::Burn
}

fn default_font() -> String {
    "Arial".to_string()
}

fn default_font_size() -> u32 {
    20
}

fn default_fill_color() -> String {
    "&H00FFFFFF".to_string()
}

fn default_outline_color() -> String {
    "&H00000000".to_string()
}

fn default_outline_width() -> u32 {
    2
}

fn default_media_binary() -> String {
    "ffmpeg".to_string()
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_download_timeout() -> u64 {
    900
}

fn default_transcribe_timeout() -> u64 {
    1800
}

fn default_translate_timeout() -> u64 {
    900
}

fn default_embed_timeout() -> u64 {
    1800
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub whisper: WhisperConfig,
    #[serde(default)]
    pub translate: TranslateConfig,
    #[serde(default)]
    pub subtitle: SubtitleConfig,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Delete intermediate artifacts after the job reaches a terminal state.
    /// OR-ed with the `--cleanup` command line flag.
    #[serde(default)]
    pub cleanup_temp_files: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Path to the download engine binary
    #[serde(default = "default_download_binary")]
    pub binary_path: String,
    /// Requested quality: best, worst, 1080p, 720p, 480p
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Optional proxy URL passed to the download engine
    #[serde(default)]
    pub proxy: Option<String>,
    /// Maximum download attempts before the job fails
    #[serde(default = "default_download_attempts")]
    pub max_attempts: u32,
    /// Initial backoff between attempts in seconds, doubled per retry
    #[serde(default = "default_download_backoff")]
    pub backoff_secs: f64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            binary_path: default_download_binary(),
            quality: default_quality(),
            proxy: None,
            max_attempts: default_download_attempts(),
            backoff_secs: default_download_backoff(),
        }
    }
}

impl DownloadConfig {
    /// Map the configured quality to a download engine format selector.
    /// Unknown values fall back to the default selector.
    pub fn format_selector(&self) -> &'static str {
        match self.quality.as_str() {
            "best" => "best[ext=mp4]/best",
            "worst" => "worst[ext=mp4]/worst",
            "1080p" => "best[height<=1080][ext=mp4]/best[height<=1080]",
            "720p" => "best[height<=720][ext=mp4]/best[height<=720]",
            "480p" => "best[height<=480][ext=mp4]/best[height<=480]",
            _ => "best[ext=mp4]/best",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhisperConfig {
    /// Path to the speech-to-text binary
    #[serde(default = "default_whisper_binary")]
    pub binary_path: String,
    /// Model size: tiny, base, small, medium, large. Larger models trade
    /// latency for accuracy.
    #[serde(default = "default_whisper_model")]
    pub model: String,
    /// Optional source language hint, autodetected when unset
    #[serde(default)]
    pub language_hint: Option<String>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            binary_path: default_whisper_binary(),
            model: default_whisper_model(),
            language_hint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    /// Translation endpoint URL (Ollama-compatible API)
    #[serde(default = "default_translate_endpoint")]
    pub endpoint: String,
    /// LLM model used for translation
    #[serde(default = "default_translate_model")]
    pub model: String,
    /// Maximum retries for a failed translation request
    #[serde(default = "default_translate_retries")]
    pub max_retries: u32,
    /// Initial delay between retries in seconds
    #[serde(default = "default_translate_retry_delay")]
    pub retry_delay_secs: f64,
    /// Character budget per batched translation request
    #[serde(default = "default_batch_chars")]
    pub batch_chars: usize,
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            endpoint: default_translate_endpoint(),
            model: default_translate_model(),
            max_retries: default_translate_retries(),
            retry_delay_secs: default_translate_retry_delay(),
            batch_chars: default_batch_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleMethod {
    /// Render subtitles into the video frames. Irreversible, requires a
    /// re-encode of the video stream.
    Burn,
    /// Attach a selectable subtitle stream. The video stream is copied
    /// untouched.
    Soft,
}

impl std::fmt::Display for SubtitleMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubtitleMethod::Burn => write!(f, "burn"),
            SubtitleMethod::Soft => write!(f, "soft"),
        }
    }
}

impl std::str::FromStr for SubtitleMethod {
    type Err = JimakuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "burn" => Ok(SubtitleMethod::Burn),
            "soft" => Ok(SubtitleMethod::Soft),
            other => Err(JimakuError::Config(format!(
                "Invalid subtitle method '{}'. Valid methods: burn, soft",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubtitleConfig {
    /// Embedding method, burn or soft. No implicit fallback between the two.
    #[serde(default = "default_subtitle_method")]
    pub method: SubtitleMethod,
    /// Font family name
    #[serde(default = "default_font")]
    pub font: String,
    /// Font size in points
    #[serde(default = "default_font_size")]
    pub font_size: u32,
    /// Fill color in ASS &HAABBGGRR notation
    #[serde(default = "default_fill_color")]
    pub fill_color: String,
    /// Outline color in ASS &HAABBGGRR notation
    #[serde(default = "default_outline_color")]
    pub outline_color: String,
    /// Outline width in pixels
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            method: default_subtitle_method(),
            font: default_font(),
            font_size: default_font_size(),
            fill_color: default_fill_color(),
            outline_color: default_outline_color(),
            outline_width: default_outline_width(),
        }
    }
}

impl SubtitleConfig {
    /// Render the style fields as an ASS force_style argument for the
    /// subtitles video filter.
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},OutlineColour={},Outline={}",
            self.font, self.font_size, self.fill_color, self.outline_color, self.outline_width
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to the encoding engine binary
    #[serde(default = "default_media_binary")]
    pub binary_path: String,
    /// Additional encoding options for the burn re-encode, e.g.
    /// ["-preset", "medium", "-crf", "23"]
    #[serde(default)]
    pub encode_options: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: default_media_binary(),
            encode_options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_downloads_dir")]
    pub downloads: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output: PathBuf,
    #[serde(default = "default_temp_dir")]
    pub temp: PathBuf,
    #[serde(default = "default_logs_dir")]
    pub logs: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            downloads: default_downloads_dir(),
            output: default_output_dir(),
            temp: default_temp_dir(),
            logs: default_logs_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Per-stage deadlines in seconds. A value of 0 disables the deadline.
    #[serde(default = "default_download_timeout")]
    pub download_secs: u64,
    #[serde(default = "default_transcribe_timeout")]
    pub transcribe_secs: u64,
    #[serde(default = "default_translate_timeout")]
    pub translate_secs: u64,
    #[serde(default = "default_embed_timeout")]
    pub embed_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            download_secs: default_download_timeout(),
            transcribe_secs: default_transcribe_timeout(),
            translate_secs: default_translate_timeout(),
            embed_secs: default_embed_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            download: DownloadConfig::default(),
            whisper: WhisperConfig::default(),
            translate: TranslateConfig::default(),
            subtitle: SubtitleConfig::default(),
            media: MediaConfig::default(),
            paths: PathsConfig::default(),
            timeouts: TimeoutConfig::default(),
            cleanup_temp_files: false,
        }
    }
}

impl Config {
    /// Load a configuration document, merging it over the defaults
    /// key-by-key. Missing keys never fail, they resolve to their defaults.
    /// A malformed document is a configuration error and aborts startup.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| {
            JimakuError::Config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        serde_yaml::from_str(&content)
            .map_err(|e| JimakuError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Write the resolved configuration back out, for first-run
    /// bootstrapping.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let content = serde_yaml::to_string(self)
            .map_err(|e| JimakuError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(&path, content)
            .map_err(|e| JimakuError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Pre-create the working directory layout.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.paths.downloads,
            &self.paths.output,
            &self.paths.temp,
            &self.paths.logs,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
