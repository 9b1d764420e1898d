//! Jimaku - Automated Video Translation Pipeline
//!
//! Entry point: parses the command line, loads and resolves configuration,
//! sets up logging, and dispatches to the pipeline or to one of the
//! standalone stage commands.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{Level, error, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use jimaku::cli::{Args, Commands};
use jimaku::config::{Config, SubtitleMethod};
use jimaku::download::{Downloader, YtDlpDownloader, validate_url};
use jimaku::media::{Embedder, FfmpegEmbedder};
use jimaku::pipeline::Pipeline;
use jimaku::subtitle;
use jimaku::transcribe::{Transcriber, WhisperTranscriber};
use jimaku::transcript::TranslatedSegment;
use jimaku::translate::{LlmTranslator, Translator};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Bootstrapping must work before any config file exists.
    if let Commands::InitConfig { path } = &args.command {
        let config = Config::default();
        config.save_to_file(path)?;
        config.ensure_directories()?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    let mut config = if args.config.exists() {
        Config::from_file(&args.config)?
    } else {
        Config::default()
    };
    config.ensure_directories()?;

    setup_logging(args.verbose, &config.paths.logs)?;

    match args.command {
        Commands::Run {
            urls,
            lang,
            quality,
            method,
            cleanup,
        } => {
            if let Some(quality) = quality {
                config.download.quality = quality;
            }
            if let Some(method) = method {
                config.subtitle.method = method.parse()?;
            }
            let cleanup = cleanup || config.cleanup_temp_files;

            let pipeline = Pipeline::new(config)?;
            let total = urls.len();
            let mut failed = 0usize;

            for raw_url in &urls {
                let url = match validate_url(raw_url) {
                    Ok(url) => url,
                    Err(e) => {
                        failed += 1;
                        error!("{}: {}", raw_url, e);
                        eprintln!("{}: {}", raw_url, e);
                        continue;
                    }
                };
                let result = pipeline.run_job(&url, &lang, cleanup).await;

                if result.is_success() {
                    let output = result.output_path.expect("successful job has an output");
                    println!("{}", output.display());
                } else {
                    failed += 1;
                    let detail = result
                        .error_detail
                        .unwrap_or_else(|| "unknown error".to_string());
                    error!("{}: {}", raw_url, detail);
                    eprintln!("{}: {}", raw_url, detail);
                }
            }

            if failed > 0 {
                anyhow::bail!("{} of {} jobs failed", failed, total);
            }
        }

        Commands::Download {
            url,
            output_dir,
            quality,
        } => {
            let mut download_config = config.download.clone();
            if let Some(quality) = quality {
                download_config.quality = quality;
            }

            let downloader = YtDlpDownloader::new(download_config);
            let url = validate_url(&url)?;
            let path = downloader.download(&url, &output_dir).await?;
            println!("{}", path.display());
        }

        Commands::Transcribe {
            input,
            output,
            language,
        } => {
            let transcriber =
                WhisperTranscriber::new(config.whisper.clone(), config.media.clone());
            let work_dir = tempfile::tempdir()?;

            let transcript = transcriber
                .transcribe(&input, work_dir.path(), language)
                .await?;

            info!(
                "Transcribed {} segments (language: {})",
                transcript.segments.len(),
                transcript.language
            );

            let lines: Vec<TranslatedSegment> = transcript
                .segments
                .iter()
                .map(|s| TranslatedSegment::from_segment(s, s.text.clone()))
                .collect();
            subtitle::write_srt(&lines, &output).await?;
            println!("{}", output.display());
        }

        Commands::Translate {
            input,
            output,
            lang,
        } => {
            let translator = LlmTranslator::new(config.translate.clone())?;
            let segments = subtitle::read_srt(&input).await?;
            let translated = translator.translate(&segments, &lang).await?;
            subtitle::write_srt(&translated, &output).await?;
            println!("{}", output.display());
        }

        Commands::Embed {
            video,
            subtitles,
            output,
            method,
        } => {
            let method = match method {
                Some(m) => m.parse::<SubtitleMethod>()?,
                None => config.subtitle.method,
            };

            let embedder = FfmpegEmbedder::new(config.media.clone(), config.subtitle.clone());
            embedder.check_availability()?;
            embedder.embed(&video, &subtitles, &output, method).await?;
            println!("{}", output.display());
        }

        Commands::InitConfig { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

/// Set up logging to both the console and a daily-rolling file under the
/// configured logs directory.
fn setup_logging(verbose: bool, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = rolling::daily(log_dir, "jimaku.log");
    let (non_blocking_file, guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
