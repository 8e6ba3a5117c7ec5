//! Engine error taxonomy.
//!
//! Unresolvable tokens are not errors: they are recorded on the
//! composition and only become `CompositionEmpty` when nothing at all
//! resolved.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Query arrived before the first successful corpus load.
    #[error("index not ready: no corpus has been loaded")]
    IndexNotReady,

    /// No token of the phrase resolved to any occurrence.
    #[error("no token of \"{phrase}\" could be resolved")]
    CompositionEmpty { phrase: String },

    /// The transcription directory yielded no valid source document.
    #[error("no valid transcription sources in {dir}")]
    NoSources { dir: String },

    /// Strict reload aborted on a malformed source document. The
    /// previously published snapshot stays in place.
    #[error("reload failed on source {source_doc}: {reason}")]
    ReloadFailed { source_doc: String, reason: String },

    #[error("unknown strategy \"{0}\"")]
    UnknownStrategy(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
