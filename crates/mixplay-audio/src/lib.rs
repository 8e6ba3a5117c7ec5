//! Audio rendering crate for Mixplay
//!
//! Decodes source recordings once into a shared cache, extracts each
//! composed unit with contextual padding, joins units with fades,
//! crossfades and silence gaps, normalizes loudness, and writes the
//! final clip as WAV or MP3 with its sidecar manifest.

pub mod cache;
pub mod decode;
pub mod encode;
pub mod error;
pub mod render;

pub use cache::AudioCache;
pub use decode::{decode_file, DecodedAudio};
pub use encode::{write_manifest, write_mp3, write_wav};
pub use error::RenderError;
pub use render::{RenderedClip, Renderer};
