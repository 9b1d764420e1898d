use std::path::Path;
use tokio::fs;
use tracing::info;

use crate::error::{JimakuError, Result};
use crate::transcript::{Segment, TranslatedSegment};

/// Write translated segments out as an SRT subtitle file.
pub async fn write_srt<P: AsRef<Path>>(
    segments: &[TranslatedSegment],
    output_path: P,
) -> Result<()> {
    let output_path = output_path.as_ref();
    info!("Generating SRT file: {}", output_path.display());

    let mut srt_content = String::new();

    for (index, segment) in segments.iter().enumerate() {
        let start_time = format_srt_time(segment.start);
        let end_time = format_srt_time(segment.end);

        srt_content.push_str(&format!(
            "{}\n{} --> {}\n{}\n\n",
            index + 1,
            start_time,
            end_time,
            segment.text.trim()
        ));
    }

    fs::write(output_path, srt_content)
        .await
        .map_err(JimakuError::Io)?;

    Ok(())
}

/// Read an SRT subtitle file back into timed segments. Used by the
/// standalone translate subcommand.
pub async fn read_srt<P: AsRef<Path>>(path: P) -> Result<Vec<Segment>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .map_err(|_| JimakuError::FileNotFound(path.display().to_string()))?;

    let mut segments = Vec::new();

    for block in content.replace("\r\n", "\n").split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());

        // Index line, ignored. Blocks without one are tolerated.
        let first = match lines.next() {
            Some(line) => line,
            None => continue,
        };

        let timing_line = if first.contains("-->") {
            first
        } else {
            match lines.next() {
                Some(line) => line,
                None => continue,
            }
        };

        let (start_raw, end_raw) = timing_line.split_once("-->").ok_or_else(|| {
            JimakuError::Embedding(format!("Malformed SRT timing line: {}", timing_line))
        })?;

        let start = parse_srt_time(start_raw.trim())?;
        let end = parse_srt_time(end_raw.trim())?;
        let text = lines.collect::<Vec<_>>().join("\n");

        if !text.is_empty() {
            segments.push(Segment { start, end, text });
        }
    }

    Ok(segments)
}

/// Format time in seconds to SRT time format (HH:MM:SS,mmm)
pub fn format_srt_time(seconds: f64) -> String {
    let total_milliseconds = (seconds * 1000.0).round() as u64;
    let hours = total_milliseconds / 3_600_000;
    let minutes = (total_milliseconds % 3_600_000) / 60_000;
    let secs = (total_milliseconds % 60_000) / 1_000;
    let millis = total_milliseconds % 1_000;

    format!("{:02}:{:02}:{:02},{:03}", hours, minutes, secs, millis)
}

fn parse_srt_time(raw: &str) -> Result<f64> {
    let malformed = || JimakuError::Embedding(format!("Malformed SRT timestamp: {}", raw));

    let (clock, millis) = raw.split_once(',').ok_or_else(malformed)?;
    let parts: Vec<&str> = clock.split(':').collect();
    if parts.len() != 3 {
        return Err(malformed());
    }

    let hours: u64 = parts[0].parse().map_err(|_| malformed())?;
    let minutes: u64 = parts[1].parse().map_err(|_| malformed())?;
    let secs: u64 = parts[2].parse().map_err(|_| malformed())?;
    let millis: u64 = millis.parse().map_err(|_| malformed())?;

    Ok((hours * 3600 + minutes * 60 + secs) as f64 + millis as f64 / 1000.0)
}
