use serde::{Deserialize, Serialize};

/// A single timed transcript unit. The unit of translation and subtitle
/// rendering. Start and end are in seconds from the beginning of the media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Ordered transcription of one audio track. Segments are ordered by start
/// time and assumed non-overlapping by the transcription engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transcript {
    pub language: String,
    pub segments: Vec<Segment>,
}

/// A transcript segment after translation. Timing and ordering are carried
/// over from the source segment unchanged; only the text differs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslatedSegment {
    pub start: f64,
    pub end: f64,
    pub source_text: String,
    pub text: String,
}

impl TranslatedSegment {
    pub fn from_segment(segment: &Segment, text: String) -> Self {
        Self {
            start: segment.start,
            end: segment.end,
            source_text: segment.text.clone(),
            text,
        }
    }
}
