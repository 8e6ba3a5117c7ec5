//! Mixplay batch worker.
//!
//! Composition requests arrive as JSON lines on stdin and answers leave
//! on stdout, one JSON object per line. Logging goes to stderr so stdout
//! stays clean for IPC.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixplay_audio::{write_manifest, write_mp3, write_wav, AudioCache, Renderer};
use mixplay_engine::MixPlayer;
use mixplay_types::{MixConfig, OutputFormat, StrategyChoice, WorkerCommand, WorkerResponse};

fn main() {
    // Initialize tracing to stderr (stdout is for IPC)
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    tracing::info!("Mixplay worker starting");

    if let Err(e) = run_worker() {
        tracing::error!("Worker error: {}", e);
        std::process::exit(1);
    }
}

/// Engine state once a corpus has been loaded.
struct LoadedEngine {
    player: MixPlayer,
    cache: Arc<AudioCache>,
}

fn run_worker() -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut engine: Option<LoadedEngine> = None;

    tracing::info!("Worker ready, listening for commands");

    for line in stdin.lock().lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }

        let command: WorkerCommand = match serde_json::from_str(&line) {
            Ok(command) => command,
            Err(e) => {
                let response = WorkerResponse::Error {
                    message: format!("Invalid command: {e}"),
                };
                writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
                stdout.flush()?;
                continue;
            }
        };

        let response = match command {
            WorkerCommand::Load { dir } => handle_load(&mut engine, dir),

            WorkerCommand::Reload => match engine.as_ref() {
                Some(loaded) => match loaded.player.reload() {
                    Ok(stats) => WorkerResponse::Loaded(stats),
                    Err(e) => WorkerResponse::Error {
                        message: e.to_string(),
                    },
                },
                None => WorkerResponse::Error {
                    message: "No corpus loaded".to_string(),
                },
            },

            WorkerCommand::Compose {
                phrase,
                strategy,
                output,
                format,
                config,
            } => match engine.as_ref() {
                Some(loaded) => {
                    match handle_compose(loaded, &phrase, strategy, output, format, config) {
                        Ok(response) => response,
                        Err(e) => WorkerResponse::Error {
                            message: format!("{e:#}"),
                        },
                    }
                }
                None => WorkerResponse::Error {
                    message: "No corpus loaded".to_string(),
                },
            },

            WorkerCommand::Stats => match engine.as_ref() {
                Some(loaded) => match loaded.player.stats() {
                    Ok(stats) => WorkerResponse::Stats(stats),
                    Err(e) => WorkerResponse::Error {
                        message: e.to_string(),
                    },
                },
                None => WorkerResponse::Error {
                    message: "No corpus loaded".to_string(),
                },
            },

            WorkerCommand::Shutdown => {
                tracing::info!("Shutdown command received");
                let response = WorkerResponse::Ok;
                writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
                stdout.flush()?;
                break;
            }
        };

        writeln!(stdout, "{}", serde_json::to_string(&response)?)?;
        stdout.flush()?;
    }

    tracing::info!("Worker shutting down");
    Ok(())
}

fn handle_load(engine: &mut Option<LoadedEngine>, dir: String) -> WorkerResponse {
    let config = MixConfig::default();
    let player = MixPlayer::new(PathBuf::from(&dir), config);

    match player.reload() {
        Ok(stats) => {
            tracing::info!(
                "Loaded {} sources, {} words from {}",
                stats.sources,
                stats.total_words,
                dir
            );
            let cache = Arc::new(AudioCache::new(player.config().sample_rate));
            *engine = Some(LoadedEngine { player, cache });
            WorkerResponse::Loaded(stats)
        }
        Err(e) => WorkerResponse::Error {
            message: e.to_string(),
        },
    }
}

/// Resolve, render, encode, and write the sidecar manifest.
///
/// Phrase resolution runs first so an unresolvable request fails before
/// any audio is decoded.
fn handle_compose(
    engine: &LoadedEngine,
    phrase: &str,
    strategy: StrategyChoice,
    output: Option<String>,
    format: OutputFormat,
    config: Option<MixConfig>,
) -> Result<WorkerResponse> {
    let config = config.unwrap_or_else(|| engine.player.config().clone());

    let composition = engine.player.compose_with(phrase, strategy, &config)?;

    let renderer = Renderer::new(Arc::clone(&engine.cache));
    let (clip, manifest) = renderer.render(&composition, &config)?;

    let extension = match format {
        OutputFormat::Wav => "wav",
        OutputFormat::Mp3 => "mp3",
    };
    let audio_path = match output {
        Some(path) => PathBuf::from(path),
        None => PathBuf::from(format!("mixplay_{}.{extension}", uuid::Uuid::new_v4())),
    };

    match format {
        OutputFormat::Wav => write_wav(&audio_path, &clip)?,
        OutputFormat::Mp3 => write_mp3(&audio_path, &clip, &config.mp3_bitrate)?,
    }

    let manifest_path = audio_path.with_extension("json");
    write_manifest(&manifest_path, &manifest)?;

    Ok(WorkerResponse::Composed {
        audio_path: audio_path.display().to_string(),
        manifest_path: manifest_path.display().to_string(),
        manifest,
        unresolved: composition
            .unresolved
            .iter()
            .map(|t| t.token.clone())
            .collect(),
        partial: clip.partial,
        score: composition.score.map(|s| s.total).unwrap_or(0.0),
    })
}
