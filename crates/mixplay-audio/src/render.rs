//! Composition rendering.
//!
//! For each composed unit: extract the padded sample range from the
//! cached source decode and fade the cut edges. Between units: crossfade
//! when the neighbors are local to each other (same source, close in
//! time), otherwise insert the configured silence gap. The assembled
//! buffer is loudness-normalized as a whole.

use std::sync::Arc;

use chrono::Utc;
use mixplay_types::{
    ComposedUnit, Composition, CompositionManifest, ManifestMetadata, ManifestWord, MixConfig,
    NormalizationMode, UnitSelection,
};

use crate::cache::AudioCache;
use crate::decode::DecodedAudio;
use crate::error::RenderError;

/// Boundary fade cap (milliseconds); short clips fade over a quarter of
/// their length instead.
const EDGE_FADE_MS: f64 = 50.0;

/// Peak target leaving headroom below full scale.
const PEAK_TARGET: f32 = 0.95;

/// RMS target for perceived-loudness normalization.
const RMS_TARGET: f32 = 0.1;

/// Final rendered buffer plus what happened on the way.
#[derive(Debug, Clone)]
pub struct RenderedClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    /// True when at least one unit was dropped for an unavailable source
    pub partial: bool,
    /// Text of each dropped unit, in composition order
    pub dropped: Vec<String>,
}

impl RenderedClip {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

pub struct Renderer {
    cache: Arc<AudioCache>,
}

impl Renderer {
    pub fn new(cache: Arc<AudioCache>) -> Self {
        Self { cache }
    }

    /// Render a composition into one clip and its sidecar manifest.
    ///
    /// Units whose source cannot be decoded are dropped and the result
    /// is flagged partial; the manifest lists only what was rendered.
    pub fn render(
        &self,
        composition: &Composition,
        config: &MixConfig,
    ) -> Result<(RenderedClip, CompositionManifest), RenderError> {
        if composition.units.is_empty() {
            return Err(RenderError::NothingToRender);
        }

        let sample_rate = self.cache.target_rate();
        let mut kept: Vec<(&ComposedUnit, Vec<f32>)> = Vec::new();
        let mut dropped = Vec::new();

        for unit in &composition.units {
            match self.cache.get_or_decode(unit.audio_path()) {
                Ok(audio) => {
                    let clip = extract_unit(&audio, unit, config);
                    if clip.is_empty() {
                        tracing::warn!(
                            "Unit \"{}\" lies outside its asset, dropping",
                            unit.text()
                        );
                        dropped.push(unit.text());
                    } else {
                        kept.push((unit, clip));
                    }
                }
                Err(e) => {
                    tracing::warn!("Dropping unit \"{}\": {}", unit.text(), e);
                    dropped.push(unit.text());
                }
            }
        }

        if kept.is_empty() {
            return Err(RenderError::NothingToRender);
        }

        let mut samples = kept[0].1.clone();
        let mut previous_len = kept[0].1.len();
        let mut previous_unit = kept[0].0;

        for (unit, clip) in &kept[1..] {
            let unit = *unit;
            if should_crossfade(previous_unit, unit, config) {
                let requested = ms_to_samples(config.crossfade_ms as f64, sample_rate);
                // Never longer than either adjacent clip.
                let overlap = requested.min(previous_len).min(clip.len());
                crossfade_append(&mut samples, clip, overlap);
            } else {
                let gap = (config.gap_duration.max(0.0) * sample_rate as f64) as usize;
                samples.extend(std::iter::repeat(0.0f32).take(gap));
                samples.extend_from_slice(clip);
            }
            previous_len = clip.len();
            previous_unit = unit;
        }

        if config.normalize_volume {
            match config.normalization {
                NormalizationMode::Peak => peak_normalize(&mut samples),
                NormalizationMode::Rms => rms_normalize(&mut samples),
            }
        }

        let clip = RenderedClip {
            samples,
            sample_rate,
            partial: !dropped.is_empty(),
            dropped,
        };

        let kept_units: Vec<&ComposedUnit> = kept.iter().map(|(unit, _)| *unit).collect();
        let manifest = build_manifest(&kept_units, clip.duration());

        tracing::info!(
            "Rendered {} units into {:.2}s of audio{}",
            kept_units.len(),
            clip.duration(),
            if clip.partial { " (partial)" } else { "" }
        );

        Ok((clip, manifest))
    }
}

/// Extract the padded, clamped sample range of a unit and fade its edges.
fn extract_unit(audio: &DecodedAudio, unit: &ComposedUnit, config: &MixConfig) -> Vec<f32> {
    let padding = match unit.selection {
        UnitSelection::Word(_) => config.word_padding,
        UnitSelection::Chunk(_) => config.chunk_padding,
    };
    let rate = audio.sample_rate as f64;

    let start = (((unit.start() - padding).max(0.0)) * rate) as usize;
    let end = (((unit.end() + padding) * rate) as usize).min(audio.samples.len());
    if start >= end {
        return Vec::new();
    }

    let mut clip = audio.samples[start..end].to_vec();
    apply_edge_fades(&mut clip, audio.sample_rate);
    clip
}

/// Linear fade-in and fade-out at the cut boundaries to avoid clicks.
fn apply_edge_fades(clip: &mut [f32], sample_rate: u32) {
    let fade = ms_to_samples(EDGE_FADE_MS, sample_rate).min(clip.len() / 4);
    if fade == 0 {
        return;
    }
    let len = clip.len();
    for i in 0..fade {
        let gain = i as f32 / fade as f32;
        clip[i] *= gain;
        clip[len - 1 - i] *= gain;
    }
}

/// Crossfade policy mirrors the contextual strategy's locality
/// heuristic: only units from the same source close in time blend into
/// each other; everything else gets a hard gap.
fn should_crossfade(previous: &ComposedUnit, next: &ComposedUnit, config: &MixConfig) -> bool {
    config.crossfade_ms > 0
        && previous.source_id() == next.source_id()
        && (next.start() - previous.end()).abs() <= config.max_time_gap
}

/// Append `next` onto `out`, overlapping the last `overlap` samples with
/// complementary linear ramps.
fn crossfade_append(out: &mut Vec<f32>, next: &[f32], overlap: usize) {
    if overlap == 0 {
        out.extend_from_slice(next);
        return;
    }
    let tail = out.len() - overlap;
    for i in 0..overlap {
        let ramp = (i + 1) as f32 / (overlap + 1) as f32;
        out[tail + i] = out[tail + i] * (1.0 - ramp) + next[i] * ramp;
    }
    out.extend_from_slice(&next[overlap..]);
}

/// Scale so the absolute peak hits the target.
fn peak_normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    if peak < 1e-6 {
        return;
    }
    let gain = PEAK_TARGET / peak;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

/// Scale toward the RMS target, capped so the peak stays below full
/// scale.
fn rms_normalize(samples: &mut [f32]) {
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    let rms = (sum_squares / samples.len().max(1) as f32).sqrt();
    if rms < 1e-6 {
        return;
    }
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    let mut gain = RMS_TARGET / rms;
    if peak * gain > PEAK_TARGET {
        gain = PEAK_TARGET / peak;
    }
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
}

fn ms_to_samples(ms: f64, sample_rate: u32) -> usize {
    (ms / 1000.0 * sample_rate as f64).round() as usize
}

/// Sidecar metadata for the rendered clip, listing every spliced word.
fn build_manifest(units: &[&ComposedUnit], total_duration: f64) -> CompositionManifest {
    let mut words = Vec::new();
    let mut speakers = Vec::new();
    let mut files = Vec::new();
    let mut text_parts = Vec::new();

    for unit in units {
        text_parts.push(unit.text());
        let speaker = unit.speaker().to_string();
        if !speakers.contains(&speaker) {
            speakers.push(speaker);
        }
        let file = unit.file_name().to_string();
        if !files.contains(&file) {
            files.push(file);
        }
        for word in unit.word_occurrences() {
            words.push(ManifestWord {
                word: word.text.clone(),
                start: word.start,
                end: word.end,
                confidence: word.confidence,
                speaker: word.speaker.clone(),
                file_name: word.file_name.clone(),
            });
        }
    }

    CompositionManifest {
        metadata: ManifestMetadata {
            text: text_parts.join(" "),
            total_duration,
            speakers_used: speakers,
            files_used: files,
            words_count: words.len(),
            created_at: Utc::now().to_rfc3339(),
        },
        words,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixplay_types::WordOccurrence;
    use std::path::Path;

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

    fn word_unit(path: &str, source: &str, text: &str, start: f64, end: f64) -> ComposedUnit {
        ComposedUnit {
            tokens: vec![text.to_string()],
            selection: UnitSelection::Word(WordOccurrence {
                text: text.to_string(),
                normalized_text: text.to_string(),
                start,
                end,
                confidence: 0.9,
                speaker: "spk1".into(),
                source_id: source.into(),
                file_name: format!("{source}.wav"),
                audio_path: path.to_string(),
            }),
        }
    }

    fn composition(units: Vec<ComposedUnit>) -> Composition {
        let token_count = units.len();
        Composition {
            units,
            unresolved: Vec::new(),
            token_count,
            score: None,
        }
    }

    #[test]
    fn gap_silence_separates_non_local_units() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        let b = dir.path().join("b.wav");
        write_tone(&a, 2.0);
        write_tone(&b, 2.0);

        let config = MixConfig {
            word_padding: 0.0,
            gap_duration: 0.5,
            normalize_volume: false,
            ..MixConfig::default()
        };
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));

        let composition = composition(vec![
            word_unit(&a.to_string_lossy(), "a", "un", 0.0, 1.0),
            word_unit(&b.to_string_lossy(), "b", "deux", 0.0, 1.0),
        ]);
        let (clip, manifest) = renderer.render(&composition, &config).unwrap();

        // 1s + 0.5s gap + 1s
        assert_eq!(clip.samples.len(), 16000 + 8000 + 16000);
        assert!(!clip.partial);
        assert_eq!(manifest.words.len(), 2);
        assert_eq!(manifest.metadata.words_count, 2);

        // The gap really is silence.
        let gap = &clip.samples[16000..24000];
        assert!(gap.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn local_units_crossfade_instead_of_gapping() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        write_tone(&a, 4.0);

        let config = MixConfig {
            word_padding: 0.0,
            gap_duration: 0.5,
            crossfade_ms: 40,
            normalize_volume: false,
            ..MixConfig::default()
        };
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));

        // Adjacent in the same source: locality policy applies.
        let composition = composition(vec![
            word_unit(&a.to_string_lossy(), "a", "un", 0.0, 1.0),
            word_unit(&a.to_string_lossy(), "a", "deux", 1.1, 2.1),
        ]);
        let (clip, _) = renderer.render(&composition, &config).unwrap();

        let overlap = 16000 * 40 / 1000;
        assert_eq!(clip.samples.len(), 16000 + 16000 - overlap);
    }

    #[test]
    fn crossfade_never_exceeds_the_shorter_clip() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        write_tone(&a, 4.0);

        let config = MixConfig {
            word_padding: 0.0,
            crossfade_ms: 10_000,
            normalize_volume: false,
            ..MixConfig::default()
        };
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));

        // 0.2s and 1.0s clips; a 10s crossfade must clamp to 0.2s.
        let composition = composition(vec![
            word_unit(&a.to_string_lossy(), "a", "un", 0.0, 0.2),
            word_unit(&a.to_string_lossy(), "a", "deux", 0.5, 1.5),
        ]);
        let (clip, _) = renderer.render(&composition, &config).unwrap();

        let short = (0.2 * 16000.0) as usize;
        let long = 16000;
        assert_eq!(clip.samples.len(), short + long - short);
    }

    #[test]
    fn extraction_clamps_to_asset_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        write_tone(&a, 1.0);

        let config = MixConfig {
            word_padding: 0.5,
            normalize_volume: false,
            ..MixConfig::default()
        };
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));

        // Padding extends past both ends of the 1s asset.
        let composition = composition(vec![word_unit(
            &a.to_string_lossy(),
            "a",
            "tout",
            0.2,
            0.9,
        )]);
        let (clip, _) = renderer.render(&composition, &config).unwrap();
        assert_eq!(clip.samples.len(), 16000);
    }

    #[test]
    fn unavailable_source_is_dropped_and_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        write_tone(&a, 2.0);

        let config = MixConfig {
            normalize_volume: false,
            ..MixConfig::default()
        };
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));

        let composition = composition(vec![
            word_unit(&a.to_string_lossy(), "a", "un", 0.0, 1.0),
            word_unit("missing/nope.wav", "b", "deux", 0.0, 1.0),
        ]);
        let (clip, manifest) = renderer.render(&composition, &config).unwrap();

        assert!(clip.partial);
        assert_eq!(clip.dropped, vec!["deux".to_string()]);
        assert_eq!(manifest.words.len(), 1);
        assert_eq!(manifest.metadata.text, "un");
    }

    #[test]
    fn all_sources_unavailable_is_an_error() {
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));
        let composition = composition(vec![word_unit("missing/a.wav", "a", "un", 0.0, 1.0)]);
        let err = renderer
            .render(&composition, &MixConfig::default())
            .unwrap_err();
        assert!(matches!(err, RenderError::NothingToRender));
    }

    #[test]
    fn peak_normalization_hits_the_target() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        write_tone(&a, 2.0);

        let config = MixConfig {
            word_padding: 0.0,
            normalize_volume: true,
            ..MixConfig::default()
        };
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));

        let composition = composition(vec![word_unit(
            &a.to_string_lossy(),
            "a",
            "un",
            0.2,
            1.8,
        )]);
        let (clip, _) = renderer.render(&composition, &config).unwrap();

        let peak = clip.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - PEAK_TARGET).abs() < 1e-3);
    }

    #[test]
    fn repeated_renders_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.wav");
        write_tone(&a, 2.0);

        let config = MixConfig::default();
        let renderer = Renderer::new(Arc::new(AudioCache::new(16000)));
        let composition = composition(vec![
            word_unit(&a.to_string_lossy(), "a", "un", 0.0, 0.8),
            word_unit(&a.to_string_lossy(), "a", "deux", 1.0, 1.8),
        ]);

        let (first, _) = renderer.render(&composition, &config).unwrap();
        for _ in 0..3 {
            let (again, _) = renderer.render(&composition, &config).unwrap();
            assert_eq!(first.samples, again.samples);
        }
    }

    #[test]
    fn edge_fades_start_and_end_at_silence() {
        let mut clip = vec![1.0f32; 16000];
        apply_edge_fades(&mut clip, 16000);
        assert_eq!(clip[0], 0.0);
        assert!(clip[16000 - 1] < 1e-6);
        // The middle is untouched.
        assert_eq!(clip[8000], 1.0);
    }
}
