//! Jimaku - Automated Video Translation Pipeline
//!
//! Downloads a video by URL, transcribes its audio, translates the
//! transcript, and burns or attaches subtitles into the output file using
//! yt-dlp, whisper, an LLM translation endpoint, and ffmpeg.

pub mod artifact;
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod retry;
pub mod subtitle;
pub mod transcribe;
pub mod transcript;
pub mod translate;
