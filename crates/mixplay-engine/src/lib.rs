//! Composition engine for Mixplay
//!
//! Loads word-level transcription documents, indexes every word and
//! multi-word chunk across the corpus, resolves query tokens through a
//! tiered matcher, and plans compositions with interchangeable selection
//! strategies ranked by a composite quality score.
//!
//! The index is published as an immutable snapshot: readers clone an
//! `Arc` and keep it for the whole request, reloads build a new snapshot
//! off to the side and swap it in atomically.

pub mod engine;
pub mod error;
pub mod index;
pub mod loader;
pub mod matcher;
pub mod normalize;
pub mod scorer;
pub mod strategy;

mod chunk;
mod contextual;
mod per_word;

#[cfg(test)]
pub(crate) mod testutil;

pub use chunk::ChunkStrategy;
pub use contextual::ContextualStrategy;
pub use engine::MixPlayer;
pub use error::EngineError;
pub use index::{IndexHandle, IndexSnapshot};
pub use per_word::PerWordStrategy;
pub use scorer::QualityScorer;
pub use strategy::SelectionStrategy;
