use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

use crate::config::DownloadConfig;
use crate::error::{JimakuError, Result};
use crate::retry::RetryPolicy;

/// Seam for the download collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Fetch the video behind `url` into `dest_dir` and return the local
    /// file path.
    async fn download(&self, url: &Url, dest_dir: &Path) -> Result<PathBuf>;
}

/// Validate the URL shape before dispatching to the download engine.
pub fn validate_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| JimakuError::Download(format!("Invalid URL '{}': {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(JimakuError::Download(format!(
            "Unsupported URL scheme '{}': only http and https are accepted",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(JimakuError::Download(format!("URL '{}' has no host", raw)));
    }

    Ok(url)
}

/// yt-dlp-backed downloader with a bounded retry-with-backoff policy around
/// each engine invocation.
pub struct YtDlpDownloader {
    config: DownloadConfig,
    policy: RetryPolicy,
}

impl YtDlpDownloader {
    pub fn new(config: DownloadConfig) -> Self {
        let policy = RetryPolicy::from_secs(config.max_attempts, config.backoff_secs);
        Self { config, policy }
    }

    /// Permanent availability failures must not burn retry budget.
    fn is_transient(error: &JimakuError) -> bool {
        let message = error.to_string().to_lowercase();

        let permanent = ["unavailable", "private video", "has been removed", "not available in your country"];
        if permanent.iter().any(|needle| message.contains(needle)) {
            return false;
        }

        true
    }

    async fn attempt(&self, url: &Url, dest_dir: &Path) -> Result<PathBuf> {
        let output_template = dest_dir.join("%(title)s.%(ext)s");

        let mut cmd = tokio::process::Command::new(&self.config.binary_path);
        cmd.arg("--no-playlist")
            .arg("-f")
            .arg(self.config.format_selector())
            .arg("-o")
            .arg(&output_template)
            .arg("--no-simulate")
            .arg("--print")
            .arg("after_move:filepath");

        if let Some(proxy) = &self.config.proxy {
            cmd.arg("--proxy").arg(proxy);
        }

        cmd.arg(url.as_str());

        debug!("Invoking download engine: {:?}", cmd);

        let output = cmd.output().await.map_err(|e| {
            JimakuError::Download(format!(
                "Failed to execute download engine '{}': {}",
                self.config.binary_path, e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(JimakuError::Download(format!(
                "Download engine failed for {}: {}",
                url,
                stderr.trim()
            )));
        }

        // The engine prints the final file path per downloaded entry.
        let stdout = String::from_utf8_lossy(&output.stdout);
        let path = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                JimakuError::Download(format!(
                    "Download engine reported no output file for {}",
                    url
                ))
            })?;

        if !path.exists() {
            return Err(JimakuError::Download(format!(
                "Downloaded file not found at reported path {}",
                path.display()
            )));
        }

        Ok(path)
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn download(&self, url: &Url, dest_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dest_dir).await?;

        info!(
            "Downloading {} (quality: {}) into {}",
            url,
            self.config.quality,
            dest_dir.display()
        );

        let path = self
            .policy
            .run("download", Self::is_transient, || {
                self.attempt(url, dest_dir)
            })
            .await?;

        info!("Download completed: {}", path.display());
        Ok(path)
    }
}
