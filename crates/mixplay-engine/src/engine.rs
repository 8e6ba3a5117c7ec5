//! Engine facade: corpus lifecycle and composition requests.

use std::path::PathBuf;
use std::sync::Arc;

use mixplay_types::{Composition, IndexStats, MixConfig, StrategyChoice};

use crate::chunk::ChunkStrategy;
use crate::contextual::ContextualStrategy;
use crate::error::EngineError;
use crate::index::{IndexHandle, IndexSnapshot};
use crate::loader;
use crate::normalize;
use crate::per_word::PerWordStrategy;
use crate::scorer::QualityScorer;
use crate::strategy::SelectionStrategy;

/// Cross-recording composition engine.
///
/// Owns the published index handle; composition requests are independent
/// and may run concurrently from separate threads, each against the
/// snapshot current when it started.
pub struct MixPlayer {
    transcription_dir: PathBuf,
    config: MixConfig,
    index: IndexHandle,
    strategies: Vec<Box<dyn SelectionStrategy>>,
    scorer: QualityScorer,
}

impl MixPlayer {
    pub fn new(transcription_dir: impl Into<PathBuf>, config: MixConfig) -> Self {
        let scorer = QualityScorer::new(config.score_weights);
        Self {
            transcription_dir: transcription_dir.into(),
            config,
            index: IndexHandle::new(),
            strategies: vec![
                Box::new(PerWordStrategy),
                Box::new(ChunkStrategy),
                Box::new(ContextualStrategy),
            ],
            scorer,
        }
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_ready()
    }

    /// Load or rebuild the index from the transcription directory and
    /// publish the new snapshot.
    ///
    /// A malformed document aborts the whole reload under
    /// `strict_reload`; otherwise it is skipped with a warning. Either
    /// way a failed rebuild leaves the previous snapshot published.
    pub fn reload(&self) -> Result<IndexStats, EngineError> {
        let (sources, failures) =
            loader::load_sources(&self.transcription_dir).map_err(EngineError::Other)?;

        if let Some((source, reason)) = failures.first() {
            if self.config.strict_reload {
                return Err(EngineError::ReloadFailed {
                    source_doc: source.clone(),
                    reason: reason.clone(),
                });
            }
            tracing::warn!(
                "Reload continuing without {} malformed source(s)",
                failures.len()
            );
        }

        if sources.is_empty() {
            return Err(EngineError::NoSources {
                dir: self.transcription_dir.display().to_string(),
            });
        }

        let snapshot = IndexSnapshot::build(&sources, &self.config);
        let stats = snapshot.stats();
        self.index.publish(snapshot);
        Ok(stats)
    }

    /// The snapshot current requests should read.
    pub fn snapshot(&self) -> Result<Arc<IndexSnapshot>, EngineError> {
        self.index.snapshot().ok_or(EngineError::IndexNotReady)
    }

    pub fn stats(&self) -> Result<IndexStats, EngineError> {
        Ok(self.snapshot()?.stats())
    }

    /// Compose `phrase` with the engine configuration.
    pub fn compose(
        &self,
        phrase: &str,
        choice: StrategyChoice,
    ) -> Result<Composition, EngineError> {
        self.compose_with(phrase, choice, &self.config)
    }

    /// Compose `phrase` with a request-scoped configuration.
    ///
    /// Partial resolution succeeds: the composition carries its
    /// unresolved tokens and a correspondingly lowered score. Only a
    /// phrase where nothing resolves is an error.
    pub fn compose_with(
        &self,
        phrase: &str,
        choice: StrategyChoice,
        config: &MixConfig,
    ) -> Result<Composition, EngineError> {
        let snapshot = self.snapshot()?;
        let tokens = normalize::tokenize_phrase(phrase);
        if tokens.is_empty() {
            return Err(EngineError::CompositionEmpty {
                phrase: phrase.to_string(),
            });
        }

        let composition = match choice {
            StrategyChoice::Best => self.select_best(&tokens, &snapshot, config),
            named => {
                let strategy = self.strategy_for(named)?;
                let mut composition = strategy.select(&tokens, &snapshot, config);
                composition.score = Some(self.scorer.score(&composition, config));
                composition
            }
        };

        if composition.is_empty() {
            return Err(EngineError::CompositionEmpty {
                phrase: phrase.to_string(),
            });
        }

        tracing::info!(
            "Composed \"{}\": {} units, {} unresolved, score {:.3}",
            phrase,
            composition.units.len(),
            composition.unresolved.len(),
            composition.score.map(|s| s.total).unwrap_or(0.0)
        );
        Ok(composition)
    }

    /// Run every strategy and keep the highest-scoring candidate; ties go
    /// to the earliest strategy in registration order.
    fn select_best(
        &self,
        tokens: &[String],
        snapshot: &IndexSnapshot,
        config: &MixConfig,
    ) -> Composition {
        let mut candidates = Vec::with_capacity(self.strategies.len());
        let mut scores = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let mut composition = strategy.select(tokens, snapshot, config);
            let score = self.scorer.score(&composition, config);
            composition.score = Some(score);
            tracing::debug!(
                "Strategy {} scored {:.3} (coverage {:.2})",
                strategy.name(),
                score.total,
                score.coverage
            );
            scores.push(score);
            candidates.push(composition);
        }

        let winner = QualityScorer::best_index(&scores).unwrap_or(0);
        candidates.swap_remove(winner)
    }

    fn strategy_for(
        &self,
        choice: StrategyChoice,
    ) -> Result<&dyn SelectionStrategy, EngineError> {
        let name = match choice {
            StrategyChoice::PerWord => "per_word",
            StrategyChoice::Chunk => "chunk",
            StrategyChoice::Contextual => "contextual",
            StrategyChoice::Best => {
                return Err(EngineError::UnknownStrategy("best".to_string()))
            }
        };
        self.strategies
            .iter()
            .map(|s| s.as_ref())
            .find(|s| s.name() == name)
            .ok_or_else(|| EngineError::UnknownStrategy(name.to_string()))
    }
}
