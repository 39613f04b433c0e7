use super::*;
use crate::ClipseekError;
use tempfile::TempDir;

fn entry(start: f64, duration: f64, text: &str) -> TranscriptEntry {
    TranscriptEntry {
        start,
        duration,
        text: text.to_string(),
    }
}

const URL: &str = "https://www.youtube.com/watch?v=abc123";

#[test]
fn windows_split_at_interval_boundaries() {
    // Example from the original pipeline: entry "b" starts inside the first
    // window even though it runs past it, so the second window opens at "c".
    let entries = vec![entry(0.0, 40.0, "a"), entry(40.0, 10.0, "b"), entry(50.0, 40.0, "c")];

    let segments = segment_transcript(&entries, URL, "Episode 1", 45.0).expect("should segment");

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].start, 0.0);
    assert_eq!(segments[0].end, 45.0);
    assert_eq!(segments[0].content, "a b");
    assert_eq!(segments[1].start, 50.0);
    assert_eq!(segments[1].end, 95.0);
    assert_eq!(segments[1].content, "c");
}

#[test]
fn content_is_preserved_across_windows() {
    let entries: Vec<TranscriptEntry> = (0..37)
        .map(|i| entry(i as f64 * 7.3, 7.0, &format!("word{i}")))
        .collect();

    let segments = segment_transcript(&entries, URL, "Episode", 45.0).expect("should segment");

    // Joining all segment contents reproduces the original caption stream
    // with no loss or duplication.
    let rejoined = segments
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let original = entries
        .iter()
        .map(|e| e.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    assert_eq!(rejoined, original);
}

#[test]
fn every_window_spans_at_most_interval() {
    let entries: Vec<TranscriptEntry> = (0..50)
        .map(|i| entry(i as f64 * 11.0, 10.0, "text"))
        .collect();

    let segments = segment_transcript(&entries, URL, "Episode", 45.0).expect("should segment");

    for segment in &segments {
        assert!(segment.start < segment.end);
        assert!(segment.end - segment.start <= 45.0 + f64::EPSILON);
    }
}

#[test]
fn empty_transcript_is_invalid_input() {
    let result = segment_transcript(&[], URL, "Episode", 45.0);

    assert!(matches!(result, Err(ClipseekError::InvalidInput(_))));
}

#[test]
fn non_positive_interval_is_invalid_input() {
    let entries = vec![entry(0.0, 5.0, "a")];

    assert!(matches!(
        segment_transcript(&entries, URL, "Episode", 0.0),
        Err(ClipseekError::InvalidInput(_))
    ));
    assert!(matches!(
        segment_transcript(&entries, URL, "Episode", f64::NAN),
        Err(ClipseekError::InvalidInput(_))
    ));
}

#[test]
fn single_entry_longer_than_interval_yields_one_segment() {
    let entries = vec![entry(12.0, 300.0, "a very long monologue")];

    let segments = segment_transcript(&entries, URL, "Episode", 45.0).expect("should segment");

    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].start, 12.0);
    assert_eq!(segments[0].end, 57.0);
    assert_eq!(segments[0].content, "a very long monologue");
}

#[test]
fn windows_tolerate_gaps_and_overlaps() {
    // Gap between 10s and 200s, then two entries overlapping in time.
    let entries = vec![
        entry(0.0, 10.0, "before the gap"),
        entry(200.0, 5.0, "after the gap"),
        entry(202.0, 5.0, "overlapping"),
    ];

    let segments = segment_transcript(&entries, URL, "Episode", 45.0).expect("should segment");

    assert_eq!(segments.len(), 2);
    assert_eq!(segments[0].content, "before the gap");
    assert_eq!(segments[1].start, 200.0);
    assert_eq!(segments[1].content, "after the gap overlapping");
}

#[test]
fn segment_urls_use_floored_window_bounds() {
    let entries = vec![entry(1.7, 5.0, "a"), entry(50.2, 5.0, "b")];

    let segments = segment_transcript(&entries, URL, "Episode", 45.0).expect("should segment");

    assert_eq!(segments[0].url, format!("{URL}&start=1&end=46"));
    assert_eq!(segments[1].url, format!("{URL}&start=50&end=95"));
}

#[test]
fn segments_round_trip_through_json_files() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("transcripts").join("transcript_abc123.json");

    let entries = vec![entry(0.0, 40.0, "a"), entry(50.0, 40.0, "b")];
    let segments = segment_transcript(&entries, URL, "Episode", 45.0).expect("should segment");

    write_segments(&path, &segments).expect("should write segments");
    let loaded = read_segments(&path).expect("should read segments");

    assert_eq!(loaded, segments);
}

#[test]
fn reading_a_missing_segment_file_fails() {
    let temp_dir = TempDir::new().expect("should create temp dir");

    let result = read_segments(&temp_dir.path().join("nope.json"));

    assert!(result.is_err());
}
