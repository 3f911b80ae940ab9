//! Transcript cleanup for replayed utterances

use std::sync::LazyLock;

use regex::Regex;

/// Clock times with a 12-hour suffix as rendered by chat transcripts,
/// e.g. `3:57 p. m.`, `10:05pm`, `9:00 A.M.`
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}:\d{2}\s*[ap]\.?\s*m\b\.?").expect("valid clock time regex")
});

/// Strip clock-time artifacts and normalize whitespace
///
/// Timestamps are removed wherever they appear. Text without a timestamp
/// is returned with runs of whitespace collapsed and ends trimmed.
#[must_use]
pub fn clean_transcript(text: &str) -> String {
    let stripped = CLOCK_TIME.replace_all(text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Join transcript segments into one string, skipping blank segments
#[must_use]
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(AsRef::as_ref)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
