//! Fixtures shared across the engine's unit tests.

use mixplay_types::{MixConfig, TranscriptionSource, WordOccurrence};

use crate::index::IndexSnapshot;
use crate::normalize::normalize_word;

/// Build a source from `(text, start, end, confidence, speaker)` rows.
pub(crate) fn source(id: &str, words: &[(&str, f64, f64, f32, &str)]) -> TranscriptionSource {
    let occurrences = words
        .iter()
        .map(|(text, start, end, confidence, speaker)| WordOccurrence {
            text: text.to_string(),
            normalized_text: normalize_word(text),
            start: *start,
            end: *end,
            confidence: *confidence,
            speaker: speaker.to_string(),
            source_id: id.to_string(),
            file_name: format!("{id}.mp3"),
            audio_path: format!("audio/{id}.mp3"),
        })
        .collect();

    TranscriptionSource {
        source_id: id.to_string(),
        file_name: format!("{id}.mp3"),
        audio_path: format!("audio/{id}.mp3"),
        words: occurrences,
    }
}

pub(crate) fn snapshot_from(sources: &[TranscriptionSource]) -> IndexSnapshot {
    IndexSnapshot::build(sources, &MixConfig::default())
}
