//! Rendering error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// A chosen unit's source asset could not be decoded. The renderer
    /// drops the unit and carries on; this only surfaces when nothing
    /// is left to render.
    #[error("source audio unavailable for {source_doc}: {reason}")]
    SourceAssetUnavailable { source_doc: String, reason: String },

    /// The composition contained no renderable unit.
    #[error("composition has no renderable units")]
    NothingToRender,
}
