// Thin command-building layer over the encoding engine (ffmpeg). All
// invocations go through FfmpegCommand so callers wrap the raw failure text
// in their own error domain.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use crate::config::{MediaConfig, SubtitleConfig, SubtitleMethod};
use crate::error::{JimakuError, Result};

/// A single encoding engine invocation.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    binary_path: String,
    args: Vec<String>,
    description: String,
}

impl FfmpegCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn video_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:v").arg(codec)
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    pub fn subtitle_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:s").arg(codec)
    }

    pub fn copy_streams(self) -> Self {
        self.arg("-c").arg("copy")
    }

    pub fn copy_audio(self) -> Self {
        self.audio_codec("copy")
    }

    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    pub fn video_filter<S: Into<String>>(self, filter: S) -> Self {
        self.arg("-vf").arg(filter)
    }

    /// Execute the command. Failure returns the engine's stderr as a plain
    /// string so the caller can wrap it in the right error domain.
    pub async fn run(&self) -> std::result::Result<(), String> {
        debug!("Executing {}: {} {:?}", self.description, self.binary_path, self.args);

        let output = tokio::process::Command::new(&self.binary_path)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| format!("{}: failed to execute {}: {}", self.description, self.binary_path, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} failed: {}", self.description, stderr.trim()));
        }

        Ok(())
    }
}

/// Quote a path for use inside a filter argument. A quoted filter section
/// cannot contain a quote character, so a literal one is spliced in as \'
/// between two quoted runs. Colons and commas are covered by the quoting.
fn escape_filter_path(path: &Path) -> String {
    path.display().to_string().replace('\'', r"'\''")
}

/// Builder for the encoding operations the pipeline needs.
#[derive(Debug, Clone)]
pub struct FfmpegBuilder {
    binary_path: String,
}

impl FfmpegBuilder {
    pub fn new<S: Into<String>>(binary_path: S) -> Self {
        Self {
            binary_path: binary_path.into(),
        }
    }

    /// 16 kHz mono PCM extraction, the input format the speech-to-text
    /// engine expects.
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> FfmpegCommand {
        FfmpegCommand::new(&self.binary_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_codec("pcm_s16le")
            .audio_sample_rate(16000)
            .audio_channels(1)
            .overwrite()
            .output(audio_path)
    }

    /// Burn subtitles into the video frames. Re-encodes the video stream,
    /// copies the audio stream.
    pub fn burn_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
        force_style: &str,
        encode_options: &[String],
    ) -> FfmpegCommand {
        let filter = format!(
            "subtitles='{}':force_style='{}'",
            escape_filter_path(subtitle_path.as_ref()),
            force_style
        );

        let mut cmd = FfmpegCommand::new(&self.binary_path, "Subtitle burn-in")
            .overwrite()
            .input(&video_path)
            .video_filter(filter)
            .video_codec("libx264")
            .copy_audio();

        for option in encode_options {
            cmd = cmd.arg(option);
        }

        cmd.output(output_path)
    }

    /// Attach a selectable subtitle stream. Both media streams are copied,
    /// the video stream is left bit-identical.
    pub fn soft_subtitles<P: AsRef<Path>>(
        &self,
        video_path: P,
        subtitle_path: P,
        output_path: P,
    ) -> FfmpegCommand {
        FfmpegCommand::new(&self.binary_path, "Soft subtitle mux")
            .overwrite()
            .input(&video_path)
            .input(&subtitle_path)
            .copy_streams()
            .subtitle_codec("mov_text")
            .output(output_path)
    }
}

/// Seam for the subtitle embedding collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a subtitle file into a video, producing `output_path`.
    async fn embed(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        method: SubtitleMethod,
    ) -> Result<()>;
}

/// Encoding-engine-backed embedder.
pub struct FfmpegEmbedder {
    builder: FfmpegBuilder,
    media: MediaConfig,
    style: SubtitleConfig,
}

impl FfmpegEmbedder {
    pub fn new(media: MediaConfig, style: SubtitleConfig) -> Self {
        let builder = FfmpegBuilder::new(&media.binary_path);
        Self {
            builder,
            media,
            style,
        }
    }

    /// Verify the encoding engine is on the path before any job starts.
    pub fn check_availability(&self) -> Result<()> {
        let output = std::process::Command::new(&self.media.binary_path)
            .arg("-version")
            .output()
            .map_err(|e| {
                JimakuError::Embedding(format!(
                    "Encoding engine '{}' not found: {}",
                    self.media.binary_path, e
                ))
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(JimakuError::Embedding(
                "Encoding engine version check failed".to_string(),
            ))
        }
    }
}

#[async_trait]
impl Embedder for FfmpegEmbedder {
    async fn embed(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        output_path: &Path,
        method: SubtitleMethod,
    ) -> Result<()> {
        if !video_path.exists() {
            return Err(JimakuError::FileNotFound(video_path.display().to_string()));
        }
        if !subtitle_path.exists() {
            return Err(JimakuError::FileNotFound(
                subtitle_path.display().to_string(),
            ));
        }

        info!(
            "Embedding subtitles ({}) from {} into {} -> {}",
            method,
            subtitle_path.display(),
            video_path.display(),
            output_path.display()
        );

        let command = match method {
            SubtitleMethod::Burn => self.builder.burn_subtitles(
                video_path,
                subtitle_path,
                output_path,
                &self.style.force_style(),
                &self.media.encode_options,
            ),
            SubtitleMethod::Soft => {
                self.builder.soft_subtitles(video_path, subtitle_path, output_path)
            }
        };

        command.run().await.map_err(JimakuError::Embedding)?;

        info!("Subtitle embedding completed: {}", output_path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_of(cmd: &FfmpegCommand) -> &[String] {
        &cmd.args
    }

    #[test]
    fn extract_audio_requests_mono_16khz_pcm() {
        let builder = FfmpegBuilder::new("ffmpeg");
        let cmd = builder.extract_audio(Path::new("in.mp4"), Path::new("out.wav"));
        let args = args_of(&cmd);

        assert!(args.windows(2).any(|w| w == ["-c:a", "pcm_s16le"]));
        assert!(args.windows(2).any(|w| w == ["-ar", "16000"]));
        assert!(args.windows(2).any(|w| w == ["-ac", "1"]));
        assert!(args.contains(&"-vn".to_string()));
    }

    #[test]
    fn burn_command_carries_force_style_and_reencodes() {
        let builder = FfmpegBuilder::new("ffmpeg");
        let cmd = builder.burn_subtitles(
            Path::new("in.mp4"),
            Path::new("subs.srt"),
            Path::new("out.mp4"),
            "FontSize=20",
            &["-crf".to_string(), "23".to_string()],
        );
        let args = args_of(&cmd);

        let filter_pos = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[filter_pos + 1], "subtitles='subs.srt':force_style='FontSize=20'");
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-c:a", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "23"]));
    }

    #[test]
    fn burn_filter_survives_quotes_in_the_subtitle_path() {
        let builder = FfmpegBuilder::new("ffmpeg");
        let cmd = builder.burn_subtitles(
            Path::new("in.mp4"),
            Path::new("it's a title_ja.srt"),
            Path::new("out.mp4"),
            "FontSize=20",
            &[],
        );
        let args = args_of(&cmd);

        let filter_pos = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(
            args[filter_pos + 1],
            r"subtitles='it'\''s a title_ja.srt':force_style='FontSize=20'"
        );
    }

    #[test]
    fn soft_command_copies_streams() {
        let builder = FfmpegBuilder::new("ffmpeg");
        let cmd = builder.soft_subtitles(
            Path::new("in.mp4"),
            Path::new("subs.srt"),
            Path::new("out.mp4"),
        );
        let args = args_of(&cmd);

        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(args.windows(2).any(|w| w == ["-c:s", "mov_text"]));
        // A soft mux must never re-encode the video stream.
        assert!(!args.contains(&"libx264".to_string()));
    }
}
