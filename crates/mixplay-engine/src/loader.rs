//! Transcription document loading.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mixplay_types::{TranscriptionDocument, TranscriptionSource, WordOccurrence};

use crate::normalize::normalize_word;

/// Speaker label used when a source carries no diarization at all.
const IMPLICIT_SPEAKER: &str = "speaker_0";

/// Load every `*.json` transcription document under `dir`.
///
/// Documents are visited in path order so repeated loads of an unchanged
/// directory build identical sources. Returns the loaded sources plus a
/// list of `(file name, reason)` for documents that failed to parse; the
/// caller decides whether failures abort the reload.
pub fn load_sources(dir: &Path) -> Result<(Vec<TranscriptionSource>, Vec<(String, String)>)> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read transcription directory {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    let mut sources = Vec::new();
    let mut failures = Vec::new();

    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        match load_document(&path) {
            Ok(source) => {
                tracing::debug!(
                    "Loaded {}: {} words from {}",
                    name,
                    source.words.len(),
                    source.file_name
                );
                sources.push(source);
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {:#}", name, e);
                failures.push((name, format!("{e:#}")));
            }
        }
    }

    Ok((sources, failures))
}

/// Parse one transcription document into an immutable source record.
pub fn load_document(path: &Path) -> Result<TranscriptionSource> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let doc: TranscriptionDocument =
        serde_json::from_str(&raw).context("malformed transcription document")?;

    let source_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    Ok(source_from_document(source_id, &doc))
}

/// Flatten a parsed document into an ordered word sequence.
///
/// Words that normalize to nothing are skipped. A missing word-level
/// speaker falls back to the segment label, then to one implicit speaker
/// for the whole source.
pub fn source_from_document(source_id: String, doc: &TranscriptionDocument) -> TranscriptionSource {
    let mut words = Vec::new();

    for segment in &doc.transcription.segments {
        for word in &segment.words {
            let normalized = normalize_word(&word.word);
            if normalized.is_empty() {
                continue;
            }

            let speaker = word
                .speaker
                .clone()
                .or_else(|| segment.speaker.clone())
                .unwrap_or_else(|| IMPLICIT_SPEAKER.to_string());

            words.push(WordOccurrence {
                text: word.word.trim().to_string(),
                normalized_text: normalized,
                start: word.start,
                end: word.end.max(word.start),
                confidence: word.confidence.clamp(0.0, 1.0),
                speaker,
                source_id: source_id.clone(),
                file_name: doc.metadata.file.clone(),
                audio_path: doc.metadata.path.clone(),
            });
        }
    }

    TranscriptionSource {
        source_id,
        file_name: doc.metadata.file.clone(),
        audio_path: doc.metadata.path.clone(),
        words,
    }
}
