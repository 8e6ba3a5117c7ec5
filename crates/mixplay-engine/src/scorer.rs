//! Composite quality scoring.

use mixplay_types::{Composition, MixConfig, QualityScore, ScoreWeights};

/// Scores candidate compositions so alternates from one strategy, or the
/// strategies themselves, can be ranked head to head.
#[derive(Debug, Clone, Copy)]
pub struct QualityScorer {
    weights: ScoreWeights,
}

impl QualityScorer {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    /// `w1·coverage + w2·mean_confidence − w3·diversity − w4·time_gap`.
    pub fn score(&self, composition: &Composition, config: &MixConfig) -> QualityScore {
        let coverage = composition.coverage();
        let mean_confidence = composition.mean_confidence();
        let source_diversity_penalty = Self::diversity_penalty(composition);
        let time_gap_penalty = Self::time_gap_penalty(composition, config);

        let total = self.weights.coverage * coverage
            + self.weights.confidence * mean_confidence
            - self.weights.diversity * source_diversity_penalty
            - self.weights.time_gap * time_gap_penalty;

        QualityScore {
            coverage,
            mean_confidence,
            source_diversity_penalty,
            time_gap_penalty,
            total,
        }
    }

    /// Index of the winning composition: highest total, earliest on ties.
    pub fn best_index(scores: &[QualityScore]) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (index, score) in scores.iter().enumerate() {
            if best.map_or(true, |(_, s)| score.total > s) {
                best = Some((index, score.total));
            }
        }
        best.map(|(index, _)| index)
    }

    /// Extra sources beyond the first, relative to unit count. A
    /// single-source composition pays nothing.
    fn diversity_penalty(composition: &Composition) -> f32 {
        if composition.units.len() < 2 {
            return 0.0;
        }
        let sources = composition.files_used().len();
        sources.saturating_sub(1) as f32 / composition.units.len() as f32
    }

    /// Mean saturated time gap between consecutive units. Cross-source
    /// neighbors count as a full gap.
    fn time_gap_penalty(composition: &Composition, config: &MixConfig) -> f32 {
        if composition.units.len() < 2 || config.max_time_gap <= 0.0 {
            return 0.0;
        }

        let mut sum = 0.0f32;
        let mut pairs = 0usize;
        for pair in composition.units.windows(2) {
            let (previous, next) = (&pair[0], &pair[1]);
            let ratio = if previous.source_id() == next.source_id() {
                ((next.start() - previous.end()).abs() / config.max_time_gap).min(1.0) as f32
            } else {
                1.0
            };
            sum += ratio;
            pairs += 1;
        }
        sum / pairs as f32
    }
}

impl Default for QualityScorer {
    fn default() -> Self {
        Self::new(ScoreWeights::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixplay_types::{ComposedUnit, UnitSelection, UnresolvedToken, WordOccurrence};

    fn unit(source: &str, start: f64, confidence: f32) -> ComposedUnit {
        ComposedUnit {
            tokens: vec!["mot".into()],
            selection: UnitSelection::Word(WordOccurrence {
                text: "mot".into(),
                normalized_text: "mot".into(),
                start,
                end: start + 0.3,
                confidence,
                speaker: "spk1".into(),
                source_id: source.into(),
                file_name: format!("{source}.mp3"),
                audio_path: format!("audio/{source}.mp3"),
            }),
        }
    }

    fn composition(units: Vec<ComposedUnit>, unresolved: usize, token_count: usize) -> Composition {
        Composition {
            units,
            unresolved: (0..unresolved)
                .map(|i| UnresolvedToken {
                    index: i,
                    token: format!("t{i}"),
                })
                .collect(),
            token_count,
            score: None,
        }
    }

    #[test]
    fn single_source_adjacent_units_score_highest() {
        let scorer = QualityScorer::default();
        let config = MixConfig::default();

        let tight = composition(vec![unit("a", 0.0, 0.9), unit("a", 0.3, 0.9)], 0, 2);
        let scattered = composition(vec![unit("a", 0.0, 0.9), unit("b", 50.0, 0.9)], 0, 2);

        let tight_score = scorer.score(&tight, &config);
        let scattered_score = scorer.score(&scattered, &config);

        assert!(tight_score.total > scattered_score.total);
        assert_eq!(tight_score.source_diversity_penalty, 0.0);
        assert_eq!(scattered_score.source_diversity_penalty, 0.5);
        assert_eq!(scattered_score.time_gap_penalty, 1.0);
    }

    #[test]
    fn unresolved_tokens_lower_coverage_and_total() {
        let scorer = QualityScorer::default();
        let config = MixConfig::default();

        let full = composition(vec![unit("a", 0.0, 0.9), unit("a", 0.3, 0.9)], 0, 2);
        let partial = composition(vec![unit("a", 0.0, 0.9)], 1, 2);

        assert!(scorer.score(&full, &config).total > scorer.score(&partial, &config).total);
        assert_eq!(scorer.score(&partial, &config).coverage, 0.5);
    }

    #[test]
    fn ties_go_to_the_earliest_candidate() {
        let score = QualityScore {
            coverage: 1.0,
            mean_confidence: 0.9,
            source_diversity_penalty: 0.0,
            time_gap_penalty: 0.0,
            total: 0.93,
        };
        assert_eq!(QualityScorer::best_index(&[score, score, score]), Some(0));
        assert_eq!(QualityScorer::best_index(&[]), None);
    }
}
