//! Decode-once cache of source audio.
//!
//! Shared read-only across concurrent render requests. Each entry is a
//! once-cell: the first request to reach a source decodes it, any
//! concurrent request for the same source blocks on that cell instead of
//! decoding again, and later requests get the cached `Arc`. A failed
//! decode leaves the cell empty so the source can be retried.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::decode::{decode_file, DecodedAudio};
use crate::error::RenderError;

type Entry = Arc<OnceCell<Arc<DecodedAudio>>>;

pub struct AudioCache {
    target_rate: u32,
    entries: RwLock<HashMap<String, Entry>>,
}

impl AudioCache {
    pub fn new(target_rate: u32) -> Self {
        Self {
            target_rate,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// Decoded audio for an asset path, decoding on first access.
    pub fn get_or_decode(&self, audio_path: &str) -> Result<Arc<DecodedAudio>, RenderError> {
        let cell = self.entry(audio_path);

        cell.get_or_try_init(|| {
            tracing::debug!("Decoding source asset {}", audio_path);
            decode_file(Path::new(audio_path), self.target_rate)
                .map(Arc::new)
                .map_err(|e| RenderError::SourceAssetUnavailable {
                    source_doc: audio_path.to_string(),
                    reason: format!("{e:#}"),
                })
        })
        .cloned()
    }

    /// Number of sources with a completed decode.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, audio_path: &str) -> Entry {
        if let Some(cell) = self.entries.read().get(audio_path) {
            return cell.clone();
        }
        self.entries
            .write()
            .entry(audio_path.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_tone(path: &Path, seconds: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..(seconds * 16000.0) as usize {
            let t = i as f32 / 16000.0;
            let value = (t * 220.0 * 2.0 * std::f32::consts::PI).sin() * 0.4;
            writer
                .write_sample((value * i16::MAX as f32) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn second_access_returns_the_same_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_tone(&path, 0.5);
        let key = path.to_string_lossy().into_owned();

        let cache = AudioCache::new(16000);
        let first = cache.get_or_decode(&key).unwrap();
        let second = cache.get_or_decode(&key).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_first_accesses_decode_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_tone(&path, 0.5);
        let key = path.to_string_lossy().into_owned();

        let cache = Arc::new(AudioCache::new(16000));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            handles.push(std::thread::spawn(move || {
                cache.get_or_decode(&key).unwrap()
            }));
        }

        let decoded: Vec<Arc<DecodedAudio>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();
        // All threads observe one shared decode.
        for audio in &decoded[1..] {
            assert!(Arc::ptr_eq(&decoded[0], audio));
        }
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn missing_asset_is_unavailable_not_cached() {
        let cache = AudioCache::new(16000);
        let err = cache.get_or_decode("audio/does_not_exist.wav").unwrap_err();
        assert!(matches!(err, RenderError::SourceAssetUnavailable { .. }));
        assert!(cache.is_empty());
    }
}
