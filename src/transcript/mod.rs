// Transcript segmentation module
// Converts time-coded caption entries into fixed-duration, embeddable segments

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::ClipseekError;

/// Default window length for a segment, in seconds
pub const DEFAULT_SEGMENT_INTERVAL: f64 = 45.0;

/// A single time-coded caption entry as returned by a transcript provider.
///
/// Entries are ordered by `start` ascending; the sequence may contain gaps
/// or overlaps and the segmenter tolerates both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Offset from the beginning of the source, in seconds
    pub start: f64,
    /// How long this caption stays on screen, in seconds
    #[serde(default)]
    pub duration: f64,
    /// The caption text
    pub text: String,
}

/// A fixed-duration slice of a transcript with joined text content and a
/// deep link back to its source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    /// Caption texts of the window, joined with single spaces
    pub content: String,
    /// Source URL parameterized with `&start=..&end=..` for this window
    pub url: String,
    pub title: String,
}

/// Partition a transcript into fixed-duration segments.
///
/// A window `[window_start, window_start + interval)` opens at the first
/// entry's start. Entries whose `start` falls inside the window are joined
/// into one segment; the first entry at or past the window end flushes the
/// buffer and opens a new window at its own start. The trailing buffer is
/// always flushed, so the final segment may cover fewer than `interval`
/// seconds of captions while keeping its full window end.
#[inline]
pub fn segment_transcript(
    entries: &[TranscriptEntry],
    source_url: &str,
    title: &str,
    interval: f64,
) -> Result<Vec<Segment>, ClipseekError> {
    if entries.is_empty() {
        return Err(ClipseekError::InvalidInput(
            "cannot segment an empty transcript".to_string(),
        ));
    }
    if !interval.is_finite() || interval <= 0.0 {
        return Err(ClipseekError::InvalidInput(format!(
            "segment interval must be a positive number of seconds, got {interval}"
        )));
    }

    let mut segments = Vec::new();
    let mut window_start = entries[0].start;
    let mut window_end = window_start + interval;
    let mut buffer: Vec<&str> = Vec::new();

    for entry in entries {
        if entry.start < window_end {
            buffer.push(&entry.text);
        } else {
            segments.push(flush_window(
                &buffer,
                window_start,
                window_end,
                source_url,
                title,
            ));
            window_start = entry.start;
            window_end = window_start + interval;
            buffer.clear();
            buffer.push(&entry.text);
        }
    }

    if !buffer.is_empty() {
        segments.push(flush_window(
            &buffer,
            window_start,
            window_end,
            source_url,
            title,
        ));
    }

    debug!(
        "Segmented transcript '{}' into {} windows of {}s",
        title,
        segments.len(),
        interval
    );

    Ok(segments)
}

fn flush_window(
    buffer: &[&str],
    window_start: f64,
    window_end: f64,
    source_url: &str,
    title: &str,
) -> Segment {
    Segment {
        start: window_start,
        end: window_end,
        content: buffer.join(" "),
        url: timestamp_url(source_url, window_start, window_end),
        title: title.to_string(),
    }
}

/// Deep link to a window of the source, truncating boundaries to whole seconds
fn timestamp_url(source_url: &str, start: f64, end: f64) -> String {
    format!(
        "{}&start={}&end={}",
        source_url,
        start.floor() as i64,
        end.floor() as i64
    )
}

/// Write a source's segments to `path` as an ordered JSON array.
///
/// Persisted files allow re-upserting a source out of band without
/// refetching its transcript.
#[inline]
pub fn write_segments(path: &Path, segments: &[Segment]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create transcript directory: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(segments).context("Failed to serialize segments")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write segment file: {}", path.display()))?;

    debug!("Wrote {} segments to {}", segments.len(), path.display());
    Ok(())
}

/// Read a previously persisted segment file.
#[inline]
pub fn read_segments(path: &Path) -> Result<Vec<Segment>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read segment file: {}", path.display()))?;

    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse segment file: {}", path.display()))
}
