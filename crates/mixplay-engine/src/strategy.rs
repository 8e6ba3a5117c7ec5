//! Selection strategy contract and shared candidate-picking helpers.

use std::collections::HashMap;

use mixplay_types::{Composition, MixConfig, WordOccurrence};

use crate::index::IndexSnapshot;

/// A phrase-planning algorithm.
///
/// Implementations consume the tokenized target phrase plus one index
/// snapshot and produce a composition covering as much of the phrase as
/// the corpus allows. Tokens that resolve to nothing are recorded on the
/// composition, never turned into a hard failure here.
pub trait SelectionStrategy: Send + Sync {
    /// Name referenced by compose requests.
    fn name(&self) -> &'static str;

    fn select(
        &self,
        tokens: &[String],
        snapshot: &IndexSnapshot,
        config: &MixConfig,
    ) -> Composition;
}

/// Occurrence identity: source plus start rounded to the millisecond.
type OccurrenceKey = (String, i64);

/// Tracks how often occurrences and source/speaker pairs have been used
/// within one composition.
#[derive(Debug, Default)]
pub(crate) struct UsageTracker {
    occurrences: HashMap<OccurrenceKey, usize>,
    sources: HashMap<String, usize>,
}

impl UsageTracker {
    fn occurrence_key(occurrence: &WordOccurrence) -> OccurrenceKey {
        (
            occurrence.source_id.clone(),
            (occurrence.start * 1000.0).round() as i64,
        )
    }

    fn source_key(occurrence: &WordOccurrence) -> String {
        format!("{}_{}", occurrence.source_id, occurrence.speaker)
    }

    pub fn occurrence_count(&self, occurrence: &WordOccurrence) -> usize {
        self.occurrences
            .get(&Self::occurrence_key(occurrence))
            .copied()
            .unwrap_or(0)
    }

    pub fn source_count(&self, occurrence: &WordOccurrence) -> usize {
        self.sources
            .get(&Self::source_key(occurrence))
            .copied()
            .unwrap_or(0)
    }

    pub fn record(&mut self, occurrence: &WordOccurrence) {
        *self
            .occurrences
            .entry(Self::occurrence_key(occurrence))
            .or_insert(0) += 1;
        *self.sources.entry(Self::source_key(occurrence)).or_insert(0) += 1;
    }
}

/// Apply the preferred-speaker allow-list. Falls back to the unfiltered
/// list when no candidate matches, so a narrow preference never empties
/// an otherwise resolvable token.
pub(crate) fn apply_speaker_preference<'a>(
    candidates: Vec<&'a WordOccurrence>,
    config: &MixConfig,
) -> Vec<&'a WordOccurrence> {
    if config.preferred_speakers.is_empty() {
        return candidates;
    }
    let preferred: Vec<&WordOccurrence> = candidates
        .iter()
        .copied()
        .filter(|c| config.preferred_speakers.iter().any(|s| s == &c.speaker))
        .collect();
    if preferred.is_empty() {
        candidates
    } else {
        preferred
    }
}

/// Pick the best candidate not yet overused past the repetition cap,
/// preferring lightly used source/speaker pairs at similar confidence.
pub(crate) fn pick_word<'a>(
    candidates: &[&'a WordOccurrence],
    usage: &UsageTracker,
    config: &MixConfig,
) -> Option<&'a WordOccurrence> {
    let mut best: Option<(&WordOccurrence, f32)> = None;
    for &candidate in candidates {
        if usage.occurrence_count(candidate) >= config.repetition_cap.max(1) {
            continue;
        }
        let diversity = 1.0 / (1.0 + 0.3 * usage.source_count(candidate) as f32);
        let score = candidate.confidence * diversity;
        // Strictly-greater keeps the first (highest-ranked) candidate on ties
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate)
}
