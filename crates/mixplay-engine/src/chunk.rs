//! Chunk-based selection.
//!
//! Greedily consumes the token stream left to right, trying the longest
//! indexed window first. Chunks splice a naturally spoken run of words,
//! so fewer seams reach the renderer; coverage falls back to per-word
//! matching whenever the corpus holds no exact multi-word sequence.

use mixplay_types::{ChunkOccurrence, ComposedUnit, Composition, MixConfig, UnitSelection, UnresolvedToken};

use crate::index::IndexSnapshot;
use crate::matcher;
use crate::strategy::{apply_speaker_preference, pick_word, SelectionStrategy, UsageTracker};

#[derive(Debug, Default)]
pub struct ChunkStrategy;

impl ChunkStrategy {
    /// Best chunk for an exact normalized text, if any clears the
    /// confidence floor. Prefers higher mean confidence, then shorter
    /// duration, then source order.
    fn best_chunk<'a>(
        snapshot: &'a IndexSnapshot,
        normalized: &str,
        config: &MixConfig,
    ) -> Option<&'a ChunkOccurrence> {
        let mut candidates: Vec<&ChunkOccurrence> = snapshot
            .chunk_candidates(normalized)
            .iter()
            .filter(|c| c.mean_confidence >= config.min_confidence)
            .collect();

        candidates.sort_by(|a, b| {
            b.mean_confidence
                .partial_cmp(&a.mean_confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    a.duration()
                        .partial_cmp(&b.duration())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .then_with(|| a.source_id.cmp(&b.source_id))
        });

        candidates.into_iter().next()
    }
}

impl SelectionStrategy for ChunkStrategy {
    fn name(&self) -> &'static str {
        "chunk"
    }

    fn select(
        &self,
        tokens: &[String],
        snapshot: &IndexSnapshot,
        config: &MixConfig,
    ) -> Composition {
        let mut units = Vec::new();
        let mut unresolved = Vec::new();
        let mut usage = UsageTracker::default();

        let min_len = config.chunk_min_words.max(2);
        let max_len = config.chunk_max_words.max(min_len);

        let mut position = 0;
        while position < tokens.len() {
            let longest = max_len.min(tokens.len() - position);
            let mut matched_len = 0;

            for len in (min_len..=longest).rev() {
                let window = &tokens[position..position + len];
                let key = window.join(" ");

                if let Some(chunk) = Self::best_chunk(snapshot, &key, config) {
                    tracing::debug!(
                        "Chunk \"{}\" covers {} tokens (confidence {:.2})",
                        key,
                        len,
                        chunk.mean_confidence
                    );
                    for word in &chunk.words {
                        usage.record(word);
                    }
                    units.push(ComposedUnit {
                        tokens: window.to_vec(),
                        selection: UnitSelection::Chunk(chunk.clone()),
                    });
                    matched_len = len;
                    break;
                }
            }

            if matched_len > 0 {
                position += matched_len;
                continue;
            }

            // Per-word fallback for the token no chunk covers.
            let token = &tokens[position];
            let candidates = matcher::search(snapshot, token, config);
            let candidates = apply_speaker_preference(candidates, config);
            match pick_word(&candidates, &usage, config) {
                Some(occurrence) => {
                    usage.record(occurrence);
                    units.push(ComposedUnit {
                        tokens: vec![token.clone()],
                        selection: UnitSelection::Word(occurrence.clone()),
                    });
                }
                None => {
                    tracing::debug!("No chunk or word for token \"{}\"", token);
                    unresolved.push(UnresolvedToken {
                        index: position,
                        token: token.clone(),
                    });
                }
            }
            position += 1;
        }

        Composition {
            units,
            unresolved,
            token_count: tokens.len(),
            score: None,
        }
    }
}
