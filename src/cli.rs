use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download, transcribe, translate, and subtitle one or more videos
    Run {
        /// Video URLs, processed sequentially as independent jobs
        #[arg(required = true)]
        urls: Vec<String>,

        /// Target language code for the subtitles
        #[arg(short, long, default_value = "ja")]
        lang: String,

        /// Override the configured download quality
        #[arg(short, long)]
        quality: Option<String>,

        /// Override the configured subtitle method (burn or soft)
        #[arg(short, long)]
        method: Option<String>,

        /// Delete intermediate artifacts once the job reaches a terminal state
        #[arg(long)]
        cleanup: bool,
    },

    /// Download a video without running the rest of the pipeline
    Download {
        /// Video URL
        #[arg(short, long)]
        url: String,

        /// Directory to download into
        #[arg(short, long, default_value = "downloads")]
        output_dir: PathBuf,

        /// Override the configured download quality
        #[arg(short, long)]
        quality: Option<String>,
    },

    /// Transcribe a local video or audio file to an SRT file
    Transcribe {
        /// Input media file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Source language hint
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Translate an SRT subtitle file to another language
    Translate {
        /// Input SRT file
        #[arg(short, long)]
        input: PathBuf,

        /// Output SRT file
        #[arg(short, long)]
        output: PathBuf,

        /// Target language code
        #[arg(short, long, default_value = "ja")]
        lang: String,
    },

    /// Embed a subtitle file into a video
    Embed {
        /// Input video file
        #[arg(long)]
        video: PathBuf,

        /// Subtitle file
        #[arg(short, long)]
        subtitles: PathBuf,

        /// Output video file
        #[arg(short, long)]
        output: PathBuf,

        /// Override the configured subtitle method (burn or soft)
        #[arg(short, long)]
        method: Option<String>,
    },

    /// Write the default configuration file for first-run bootstrapping
    InitConfig {
        /// Where to write the configuration
        #[arg(short, long, default_value = "config/config.yaml")]
        path: PathBuf,
    },
}
