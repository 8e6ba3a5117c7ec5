//! Word and chunk indexes over the loaded corpus.
//!
//! A snapshot is immutable once built. `IndexHandle` publishes snapshots
//! behind a read-write lock holding an `Arc`: readers clone the `Arc`
//! and keep one consistent index for their whole request, while a reload
//! builds the replacement off to the side and swaps it in atomically.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use mixplay_types::{
    ChunkOccurrence, IndexStats, MixConfig, TranscriptionSource, WordOccurrence,
};

use crate::normalize::join_normalized;

/// Immutable index over one loaded set of sources.
#[derive(Debug, Default)]
pub struct IndexSnapshot {
    words: HashMap<String, Vec<WordOccurrence>>,
    chunks: HashMap<String, Vec<ChunkOccurrence>>,
    source_count: usize,
    total_words: usize,
    total_chunks: usize,
}

impl IndexSnapshot {
    /// Build both indexes from the current source set.
    ///
    /// Deterministic given a fixed source order: per-key candidate lists
    /// preserve insertion order, which the matcher uses as its stable
    /// tie-break.
    pub fn build(sources: &[TranscriptionSource], config: &MixConfig) -> Self {
        let mut words: HashMap<String, Vec<WordOccurrence>> = HashMap::new();
        let mut total_words = 0;

        for source in sources {
            for occurrence in &source.words {
                words
                    .entry(occurrence.normalized_text.clone())
                    .or_default()
                    .push(occurrence.clone());
                total_words += 1;
            }
        }

        let min_len = config.chunk_min_words.max(2);
        let max_len = config.chunk_max_words.max(min_len);

        let mut chunks: HashMap<String, Vec<ChunkOccurrence>> = HashMap::new();
        let mut total_chunks = 0;

        for source in sources {
            for len in min_len..=max_len {
                if source.words.len() < len {
                    continue;
                }
                for window in source.words.windows(len) {
                    let mean_confidence =
                        window.iter().map(|w| w.confidence).sum::<f32>() / len as f32;
                    let key =
                        join_normalized(window.iter().map(|w| w.normalized_text.as_str()));

                    chunks.entry(key.clone()).or_default().push(ChunkOccurrence {
                        source_id: source.source_id.clone(),
                        words: window.to_vec(),
                        normalized_text: key,
                        start: window[0].start,
                        end: window[len - 1].end,
                        mean_confidence,
                    });
                    total_chunks += 1;
                }
            }
        }

        tracing::info!(
            "Indexed {} words ({} unique) and {} chunks ({} unique texts) from {} sources",
            total_words,
            words.len(),
            total_chunks,
            chunks.len(),
            sources.len()
        );

        Self {
            words,
            chunks,
            source_count: sources.len(),
            total_words,
            total_chunks,
        }
    }

    /// All occurrences of one normalized word, in source order.
    pub fn word_candidates(&self, normalized: &str) -> &[WordOccurrence] {
        self.words.get(normalized).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All chunks whose normalized text equals `normalized`.
    pub fn chunk_candidates(&self, normalized: &str) -> &[ChunkOccurrence] {
        self.chunks
            .get(normalized)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Every distinct normalized word in the corpus. Iteration order is
    /// unspecified; callers needing determinism must sort.
    pub fn word_keys(&self) -> impl Iterator<Item = &str> {
        self.words.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.total_words == 0
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            sources: self.source_count,
            total_words: self.total_words,
            unique_words: self.words.len(),
            total_chunks: self.total_chunks,
            unique_chunk_texts: self.chunks.len(),
        }
    }
}

/// Published handle requests take snapshots from.
#[derive(Debug, Default)]
pub struct IndexHandle {
    inner: RwLock<Option<Arc<IndexSnapshot>>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the published snapshot.
    pub fn publish(&self, snapshot: IndexSnapshot) {
        *self.inner.write() = Some(Arc::new(snapshot));
    }

    /// The currently published snapshot, if a load has completed.
    /// In-flight requests keep their clone across concurrent reloads.
    pub fn snapshot(&self) -> Option<Arc<IndexSnapshot>> {
        self.inner.read().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.read().is_some()
    }
}
