//! Contextual selection.
//!
//! Per-word matching with same-token candidates re-ranked by locality:
//! staying with the previous unit's speaker earns a bonus, drifting far
//! from its timeline costs a penalty that saturates at `max_time_gap`.
//! Keeps a composition inside one source and voice whenever the corpus
//! allows, which noticeably improves timbral consistency of the splice.

use mixplay_types::{ComposedUnit, Composition, MixConfig, UnitSelection, UnresolvedToken, WordOccurrence};

use crate::index::IndexSnapshot;
use crate::matcher;
use crate::strategy::{apply_speaker_preference, SelectionStrategy, UsageTracker};

/// Weight of the saturated time-gap penalty relative to confidence.
const DISTANCE_PENALTY_WEIGHT: f32 = 0.2;

#[derive(Debug, Default)]
pub struct ContextualStrategy;

/// Locality anchor: where the previously chosen unit came from.
struct Anchor {
    source_id: String,
    speaker: String,
    end: f64,
}

impl ContextualStrategy {
    fn locality_score(candidate: &WordOccurrence, anchor: Option<&Anchor>, config: &MixConfig) -> f32 {
        let Some(anchor) = anchor else {
            return candidate.confidence;
        };

        let same_source = candidate.source_id == anchor.source_id;

        // Speaker labels are opaque per source; a cross-source label
        // match means nothing.
        let bonus = if same_source && candidate.speaker == anchor.speaker {
            config.same_speaker_bonus
        } else {
            0.0
        };

        let gap_ratio = if same_source && config.max_time_gap > 0.0 {
            ((candidate.start - anchor.end).abs() / config.max_time_gap).min(1.0) as f32
        } else {
            1.0
        };

        candidate.confidence + bonus - gap_ratio * DISTANCE_PENALTY_WEIGHT
    }
}

impl SelectionStrategy for ContextualStrategy {
    fn name(&self) -> &'static str {
        "contextual"
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
        let mut anchor: Option<Anchor> = None;

        for (index, token) in tokens.iter().enumerate() {
            let candidates = matcher::search(snapshot, token, config);
            let candidates = apply_speaker_preference(candidates, config);

            let mut best: Option<(&WordOccurrence, f32)> = None;
            for &candidate in &candidates {
                if usage.occurrence_count(candidate) >= config.repetition_cap.max(1) {
                    continue;
                }
                let score = Self::locality_score(candidate, anchor.as_ref(), config);
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((candidate, score));
                }
            }

            match best {
                Some((occurrence, _)) => {
                    usage.record(occurrence);
                    anchor = Some(Anchor {
                        source_id: occurrence.source_id.clone(),
                        speaker: occurrence.speaker.clone(),
                        end: occurrence.end,
                    });
                    units.push(ComposedUnit {
                        tokens: vec![token.clone()],
                        selection: UnitSelection::Word(occurrence.clone()),
                    });
                }
                None => {
                    unresolved.push(UnresolvedToken {
                        index,
                        token: token.clone(),
                    });
                }
            }
        }

        Composition {
            units,
            unresolved,
            token_count: tokens.len(),
            score: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{snapshot_from, source};

    fn phrase(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn stays_with_the_previous_voice() {
        // "mon" exists in both sources with the better confidence far
        // away in source B; locality must keep the composition in A.
        let snapshot = snapshot_from(&[
            source(
                "a",
                &[("tout", 0.3, 0.6, 0.9, "spk1"), ("mon", 0.8, 1.0, 0.85, "spk1")],
            ),
            source("b", &[("mon", 50.0, 50.2, 0.9, "spk2")]),
        ]);
        let config = MixConfig::default();

        let composition =
            ContextualStrategy.select(&phrase(&["tout", "mon"]), &snapshot, &config);

        assert_eq!(composition.units.len(), 2);
        assert_eq!(composition.units[1].source_id(), "a");
        assert_eq!(composition.speakers_used(), vec!["spk1".to_string()]);
    }

    #[test]
    fn first_token_is_plain_confidence() {
        let snapshot = snapshot_from(&[
            source("a", &[("oui", 0.0, 0.3, 0.8, "spk1")]),
            source("b", &[("oui", 1.0, 1.3, 0.95, "spk2")]),
        ]);
        let composition =
            ContextualStrategy.select(&phrase(&["oui"]), &snapshot, &MixConfig::default());
        assert_eq!(composition.units[0].source_id(), "b");
    }

    #[test]
    fn distant_same_source_candidate_pays_the_saturated_penalty() {
        // Both candidates sit in the anchor's source; the nearby one wins
        // even though the distant one is slightly more confident.
        let snapshot = snapshot_from(&[source(
            "a",
            &[
                ("tout", 0.3, 0.6, 0.9, "spk1"),
                ("mon", 1.0, 1.2, 0.82, "spk1"),
                ("mon", 300.0, 300.2, 0.88, "spk1"),
            ],
        )]);
        let config = MixConfig::default();

        let composition =
            ContextualStrategy.select(&phrase(&["tout", "mon"]), &snapshot, &config);

        let second = &composition.units[1];
        assert!((second.start() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unresolved_tokens_are_recorded() {
        let snapshot = snapshot_from(&[source("a", &[("oui", 0.0, 0.3, 0.9, "spk1")])]);
        let composition = ContextualStrategy.select(
            &phrase(&["oui", "xyzzy"]),
            &snapshot,
            &MixConfig::default(),
        );
        assert_eq!(composition.units.len(), 1);
        assert_eq!(composition.unresolved.len(), 1);
    }
}
