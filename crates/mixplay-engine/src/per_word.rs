//! Per-word selection.
//!
//! Each token independently takes the matcher's best candidate that has
//! not been overused, with a mild preference for sources the composition
//! has not drawn from yet.

use mixplay_types::{ComposedUnit, Composition, MixConfig, UnitSelection, UnresolvedToken};

use crate::index::IndexSnapshot;
use crate::matcher;
use crate::strategy::{apply_speaker_preference, pick_word, SelectionStrategy, UsageTracker};

#[derive(Debug, Default)]
pub struct PerWordStrategy;

impl SelectionStrategy for PerWordStrategy {
    fn name(&self) -> &'static str {
        "per_word"
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

        for (index, token) in tokens.iter().enumerate() {
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
                    tracing::debug!("No candidate for token \"{}\"", token);
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

    #[test]
    fn full_phrase_from_single_source() {
        // Spec scenario: source A holds the whole phrase at high
        // confidence, source B a low-confidence "avec" that must lose.
        let snapshot = snapshot_from(&[
            source(
                "a",
                &[
                    ("avec", 0.0, 0.3, 0.95, "spk1"),
                    ("tout", 0.3, 0.6, 0.9, "spk1"),
                    ("mon", 0.6, 0.8, 0.9, "spk1"),
                    ("amour", 0.8, 1.3, 0.97, "spk1"),
                ],
            ),
            source("b", &[("avec", 2.0, 2.3, 0.6, "spk2")]),
        ]);
        let config = MixConfig {
            min_confidence: 0.7,
            ..MixConfig::default()
        };

        let tokens: Vec<String> = ["avec", "tout", "mon", "amour"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let composition = PerWordStrategy.select(&tokens, &snapshot, &config);

        assert_eq!(composition.units.len(), 4);
        assert!(composition.unresolved.is_empty());
        assert!((composition.coverage() - 1.0).abs() < 1e-6);
        assert_eq!(composition.speakers_used(), vec!["spk1".to_string()]);
        assert_eq!(composition.files_used(), vec!["a.mp3".to_string()]);
        for unit in &composition.units {
            assert_eq!(unit.source_id(), "a");
        }
    }

    #[test]
    fn unknown_token_is_soft_failure() {
        let snapshot = snapshot_from(&[source(
            "a",
            &[("avec", 0.0, 0.3, 0.95, "spk1"), ("amour", 0.8, 1.3, 0.97, "spk1")],
        )]);
        let config = MixConfig::default();

        let tokens: Vec<String> = ["avec", "xyzzy", "amour"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let composition = PerWordStrategy.select(&tokens, &snapshot, &config);

        assert_eq!(composition.units.len(), 2);
        assert_eq!(composition.unresolved.len(), 1);
        assert_eq!(composition.unresolved[0].token, "xyzzy");
        assert_eq!(composition.unresolved[0].index, 1);
        assert!(composition.coverage() < 1.0);
    }

    #[test]
    fn repeated_token_rotates_once_capped() {
        let snapshot = snapshot_from(&[
            source("a", &[("oui", 0.0, 0.3, 0.95, "spk1")]),
            source("b", &[("oui", 1.0, 1.3, 0.9, "spk2")]),
        ]);
        let config = MixConfig {
            repetition_cap: 1,
            ..MixConfig::default()
        };

        let tokens: Vec<String> = ["oui", "oui", "oui"].iter().map(|s| s.to_string()).collect();
        let composition = PerWordStrategy.select(&tokens, &snapshot, &config);

        // Two distinct occurrences satisfy two tokens; the third finds
        // everything exhausted and goes unresolved.
        assert_eq!(composition.units.len(), 2);
        assert_eq!(composition.units[0].source_id(), "a");
        assert_eq!(composition.units[1].source_id(), "b");
        assert_eq!(composition.unresolved.len(), 1);
    }

    #[test]
    fn preferred_speakers_win_over_confidence() {
        let snapshot = snapshot_from(&[
            source("a", &[("oui", 0.0, 0.3, 0.95, "spk1")]),
            source("b", &[("oui", 1.0, 1.3, 0.8, "spk2")]),
        ]);
        let config = MixConfig {
            preferred_speakers: vec!["spk2".into()],
            ..MixConfig::default()
        };

        let composition = PerWordStrategy.select(&["oui".to_string()], &snapshot, &config);
        assert_eq!(composition.units[0].speaker(), "spk2");
    }

    #[test]
    fn deterministic_over_repeated_runs() {
        let snapshot = snapshot_from(&[
            source("a", &[("oui", 0.0, 0.3, 0.9, "spk1")]),
            source("b", &[("oui", 1.0, 1.3, 0.9, "spk2")]),
        ]);
        let config = MixConfig::default();
        let tokens = vec!["oui".to_string(), "oui".to_string()];

        let first = PerWordStrategy.select(&tokens, &snapshot, &config);
        for _ in 0..5 {
            let again = PerWordStrategy.select(&tokens, &snapshot, &config);
            assert_eq!(first.units, again.units);
        }
    }
}
