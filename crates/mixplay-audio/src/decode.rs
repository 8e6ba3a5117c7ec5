//! Source asset decoding.
//!
//! Every source is decoded to mono f32 at the engine sample rate so
//! extraction and splicing work in one uniform domain.

use std::path::Path;

use anyhow::{Context, Result};
use hound::WavReader;

/// Mono samples at a known rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an audio asset to mono samples at `target_rate`.
pub fn decode_file(path: &Path, target_rate: u32) -> Result<DecodedAudio> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let (samples, source_rate) = match ext.as_str() {
        "wav" => decode_wav(path)?,
        "mp3" | "m4a" | "mp4" | "ogg" | "flac" => decode_with_symphonia(path)?,
        other => anyhow::bail!("unsupported audio format: {other:?}"),
    };

    let samples = if source_rate != target_rate {
        resample(&samples, source_rate, target_rate)
            .with_context(|| format!("resampling {} -> {} Hz", source_rate, target_rate))?
    } else {
        samples
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: target_rate,
    })
}

/// Decode a WAV file using hound.
fn decode_wav(path: &Path) -> Result<(Vec<f32>, u32)> {
    let reader = WavReader::open(path)
        .with_context(|| format!("failed to open WAV file {}", path.display()))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .filter_map(|s| s.ok())
            .collect(),
        hound::SampleFormat::Int => {
            let bits = spec.bits_per_sample;
            let max_val = (1i64 << (bits - 1)) as f32;
            reader
                .into_samples::<i32>()
                .filter_map(|s| s.ok())
                .map(|s| s as f32 / max_val)
                .collect()
        }
    };

    Ok((downmix(samples, channels), sample_rate))
}

/// Decode a compressed container using symphonia.
fn decode_with_symphonia(path: &Path) -> Result<(Vec<f32>, u32)> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("unrecognized audio container")?;

    let mut format = probed.format;
    let track = format.default_track().context("no audio track found")?;

    let sample_rate = track
        .codec_params
        .sample_rate
        .context("unknown sample rate")?;
    let channels = track
        .codec_params
        .channels
        .context("unknown channel count")?
        .count();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("no decoder for track")?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(_) => break,
        };

        let decoded = decoder.decode(&packet).context("decode error")?;
        let spec = *decoded.spec();

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    Ok((downmix(samples, channels), sample_rate))
}

/// Average interleaved channels down to mono.
fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio with a windowed-sinc filter.
fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        2.0,
        params,
        samples.len(),
        1,
    )?;

    let output = resampler.process(&[samples.to_vec()], None)?;
    Ok(output.into_iter().next().unwrap_or_default())
}
