//! Rendered clip output.
//!
//! WAV is written directly with hound. MP3 goes through an FFmpeg pipe
//! (libmp3lame); samples are converted to signed 16-bit little-endian on
//! the way into the encoder's stdin.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use mixplay_types::CompositionManifest;

use crate::render::RenderedClip;

/// Write a rendered clip as 16-bit PCM WAV.
pub fn write_wav(path: &Path, clip: &RenderedClip) -> Result<()> {
    ensure_parent(path)?;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for &sample in &clip.samples {
        writer.write_sample(f32_to_i16(sample))?;
    }
    writer.finalize()?;

    tracing::info!("Wrote {} ({:.2}s)", path.display(), clip.duration());
    Ok(())
}

/// Encode a rendered clip to MP3 through an FFmpeg pipe.
pub fn write_mp3(path: &Path, clip: &RenderedClip, bitrate: &str) -> Result<()> {
    ensure_parent(path)?;
    let ffmpeg = find_ffmpeg()?;

    let mut child = Command::new(&ffmpeg)
        .args([
            "-y",
            "-f",
            "s16le",
            "-ar",
            &clip.sample_rate.to_string(),
            "-ac",
            "1",
            "-i",
            "pipe:0",
            "-c:a",
            "libmp3lame",
            "-b:a",
            bitrate,
            "-f",
            "mp3",
        ])
        .arg(path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to start FFmpeg: {}", ffmpeg.display()))?;

    {
        let stdin = child.stdin.as_mut().context("failed to get FFmpeg stdin")?;
        let mut buffer = Vec::with_capacity(clip.samples.len() * 2);
        for &sample in &clip.samples {
            buffer.extend_from_slice(&f32_to_i16(sample).to_le_bytes());
        }
        stdin.write_all(&buffer)?;
    }
    drop(child.stdin.take());

    let status = child.wait().context("FFmpeg did not finish")?;
    if !status.success() {
        anyhow::bail!("FFmpeg exited with {status}");
    }

    tracing::info!(
        "Wrote {} ({:.2}s at {})",
        path.display(),
        clip.duration(),
        bitrate
    );
    Ok(())
}

/// Serialize the sidecar metadata document.
pub fn write_manifest(path: &Path, manifest: &CompositionManifest) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(manifest)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn find_ffmpeg() -> Result<PathBuf> {
    which::which("ffmpeg").context("ffmpeg not found in PATH, required for MP3 output")
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}
