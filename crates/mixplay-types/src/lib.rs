//! Shared types for Mixplay
//!
//! This crate contains all shared data structures used across
//! the Mixplay composition engine: the input transcription document
//! model, the corpus and composition types, the configuration surface,
//! the output manifest, and the worker IPC protocol.

use serde::{Deserialize, Serialize};

// ============================================================================
// Input Document Types
// ============================================================================

/// Confidence assumed for words whose transcriber omitted one.
pub const NEUTRAL_CONFIDENCE: f32 = 0.5;

fn default_confidence() -> f32 {
    NEUTRAL_CONFIDENCE
}

/// One transcription document, one per source recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionDocument {
    pub metadata: DocumentMetadata,
    pub transcription: TranscriptionBody,
}

/// File identity block of a transcription document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Original recording file name (e.g. "interview_01.mp3")
    pub file: String,
    /// Path to the source audio asset
    pub path: String,
    /// Recording duration in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Detected language (ISO 639-1 code)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionBody {
    #[serde(default)]
    pub segments: Vec<DocumentSegment>,
}

/// A diarized segment with word-level timecodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSegment {
    #[serde(default)]
    pub id: i64,
    /// Speaker label for the whole segment, if diarization ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    #[serde(default)]
    pub words: Vec<DocumentWord>,
}

/// A single word with timing information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentWord {
    pub word: String,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Confidence score (0.0 - 1.0); neutral when omitted
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// Word-level speaker label, overrides the segment label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

// ============================================================================
// Corpus Types
// ============================================================================

/// One timestamped appearance of a word in one source recording.
///
/// Immutable once created; owned by its source record and cloned into
/// indexes and compositions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordOccurrence {
    /// Word as transcribed
    pub text: String,
    /// Lower-cased, accent- and punctuation-stripped form used for lookup
    pub normalized_text: String,
    /// Start time in the source audio (seconds)
    pub start: f64,
    /// End time in the source audio (seconds)
    pub end: f64,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f32,
    /// Speaker label, opaque and scoped to this source
    pub speaker: String,
    pub source_id: String,
    /// Original recording file name
    pub file_name: String,
    /// Path to the source audio asset
    pub audio_path: String,
}

impl WordOccurrence {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// All word occurrences of one loaded recording, in temporal order.
///
/// Replaced wholesale on reload, never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionSource {
    pub source_id: String,
    pub file_name: String,
    pub audio_path: String,
    pub words: Vec<WordOccurrence>,
}

/// A contiguous run of words from one source, spliced as a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkOccurrence {
    pub source_id: String,
    /// Constituent words in temporal order
    pub words: Vec<WordOccurrence>,
    /// Normalized constituent text joined with single spaces
    pub normalized_text: String,
    /// Start of the first constituent word (seconds)
    pub start: f64,
    /// End of the last constituent word (seconds)
    pub end: f64,
    /// Arithmetic mean of constituent confidences
    pub mean_confidence: f32,
}

impl ChunkOccurrence {
    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Representative speaker: the first constituent word's label.
    pub fn speaker(&self) -> &str {
        self.words.first().map(|w| w.speaker.as_str()).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.words.first().map(|w| w.file_name.as_str()).unwrap_or("")
    }

    pub fn audio_path(&self) -> &str {
        self.words.first().map(|w| w.audio_path.as_str()).unwrap_or("")
    }
}

// ============================================================================
// Composition Types
// ============================================================================

/// The concrete occurrence a composed unit splices from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum UnitSelection {
    Word(WordOccurrence),
    Chunk(ChunkOccurrence),
}

/// One selected word or chunk, tagged with the query tokens it satisfies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposedUnit {
    /// Normalized query tokens this unit covers, in phrase order
    pub tokens: Vec<String>,
    pub selection: UnitSelection,
}

impl ComposedUnit {
    pub fn start(&self) -> f64 {
        match &self.selection {
            UnitSelection::Word(w) => w.start,
            UnitSelection::Chunk(c) => c.start,
        }
    }

    pub fn end(&self) -> f64 {
        match &self.selection {
            UnitSelection::Word(w) => w.end,
            UnitSelection::Chunk(c) => c.end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end() - self.start()
    }

    pub fn speaker(&self) -> &str {
        match &self.selection {
            UnitSelection::Word(w) => &w.speaker,
            UnitSelection::Chunk(c) => c.speaker(),
        }
    }

    pub fn source_id(&self) -> &str {
        match &self.selection {
            UnitSelection::Word(w) => &w.source_id,
            UnitSelection::Chunk(c) => &c.source_id,
        }
    }

    pub fn file_name(&self) -> &str {
        match &self.selection {
            UnitSelection::Word(w) => &w.file_name,
            UnitSelection::Chunk(c) => c.file_name(),
        }
    }

    pub fn audio_path(&self) -> &str {
        match &self.selection {
            UnitSelection::Word(w) => &w.audio_path,
            UnitSelection::Chunk(c) => c.audio_path(),
        }
    }

    /// Spoken text of this unit.
    pub fn text(&self) -> String {
        match &self.selection {
            UnitSelection::Word(w) => w.text.clone(),
            UnitSelection::Chunk(c) => c
                .words
                .iter()
                .map(|w| w.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    pub fn mean_confidence(&self) -> f32 {
        match &self.selection {
            UnitSelection::Word(w) => w.confidence,
            UnitSelection::Chunk(c) => c.mean_confidence,
        }
    }

    /// Constituent word occurrences in temporal order.
    pub fn word_occurrences(&self) -> &[WordOccurrence] {
        match &self.selection {
            UnitSelection::Word(w) => std::slice::from_ref(w),
            UnitSelection::Chunk(c) => &c.words,
        }
    }
}

/// A query token no strategy could resolve. Soft failure: recorded,
/// composition continues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedToken {
    /// Position in the tokenized phrase
    pub index: usize,
    pub token: String,
}

/// The ordered, scored plan of units realizing a target phrase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Composition {
    pub units: Vec<ComposedUnit>,
    pub unresolved: Vec<UnresolvedToken>,
    /// Total tokens in the query phrase
    pub token_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<QualityScore>,
}

impl Composition {
    /// Resolved tokens / total tokens.
    pub fn coverage(&self) -> f32 {
        if self.token_count == 0 {
            return 0.0;
        }
        let resolved = self.token_count.saturating_sub(self.unresolved.len());
        resolved as f32 / self.token_count as f32
    }

    pub fn mean_confidence(&self) -> f32 {
        if self.units.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.units.iter().map(|u| u.mean_confidence()).sum();
        sum / self.units.len() as f32
    }

    /// Distinct speakers in unit order.
    pub fn speakers_used(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for unit in &self.units {
            let speaker = unit.speaker();
            if !seen.iter().any(|s: &String| s == speaker) {
                seen.push(speaker.to_string());
            }
        }
        seen
    }

    /// Distinct source files in unit order.
    pub fn files_used(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for unit in &self.units {
            let file = unit.file_name();
            if !seen.iter().any(|f: &String| f == file) {
                seen.push(file.to_string());
            }
        }
        seen
    }

    /// Spoken text of the composition.
    pub fn composed_text(&self) -> String {
        self.units
            .iter()
            .map(|u| u.text())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// Composite quality of a candidate composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub coverage: f32,
    pub mean_confidence: f32,
    pub source_diversity_penalty: f32,
    pub time_gap_penalty: f32,
    /// Weighted total used for ranking
    pub total: f32,
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Loudness normalization applied to the final rendered buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizationMode {
    Peak,
    Rms,
}

impl Default for NormalizationMode {
    fn default() -> Self {
        NormalizationMode::Peak
    }
}

/// Weights of the composite quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_coverage_weight")]
    pub coverage: f32,
    #[serde(default = "default_confidence_weight")]
    pub confidence: f32,
    #[serde(default = "default_diversity_weight")]
    pub diversity: f32,
    #[serde(default = "default_time_gap_weight")]
    pub time_gap: f32,
}

fn default_coverage_weight() -> f32 {
    0.7
}

fn default_confidence_weight() -> f32 {
    0.3
}

fn default_diversity_weight() -> f32 {
    0.05
}

fn default_time_gap_weight() -> f32 {
    0.05
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            coverage: default_coverage_weight(),
            confidence: default_confidence_weight(),
            diversity: default_diversity_weight(),
            time_gap: default_time_gap_weight(),
        }
    }
}

/// Engine configuration. Every field has a serde default so callers can
/// override only what they care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    /// Candidate filter floor for word confidence
    pub min_confidence: f32,
    /// Ranking allow-list; candidates from other speakers are kept only
    /// when no preferred speaker has the word
    pub preferred_speakers: Vec<String>,
    /// Cap on candidates considered per token
    pub max_results: usize,
    /// Extraction context around a word unit (seconds)
    pub word_padding: f64,
    /// Extraction context around a chunk unit (seconds)
    pub chunk_padding: f64,
    /// Silence inserted between non-crossfaded units (seconds)
    pub gap_duration: f64,
    /// Crossfade overlap between locality-adjacent units (milliseconds)
    pub crossfade_ms: u32,
    pub normalize_volume: bool,
    pub normalization: NormalizationMode,
    /// Locality window for the contextual strategy and crossfade policy
    /// (seconds)
    pub max_time_gap: f64,
    /// Contextual scoring bonus for staying with the previous speaker
    pub same_speaker_bonus: f32,
    /// Minimum similarity ratio for fuzzy-tier candidates
    pub fuzzy_threshold: f64,
    /// Times a single occurrence may repeat within one composition
    pub repetition_cap: usize,
    /// Smallest chunk window (words)
    pub chunk_min_words: usize,
    /// Largest chunk window (words)
    pub chunk_max_words: usize,
    /// Engine sample rate all sources are decoded to (Hz)
    pub sample_rate: u32,
    /// Bitrate for MP3 output (e.g. "192k")
    pub mp3_bitrate: String,
    /// Abort reload on the first malformed source instead of skipping it
    pub strict_reload: bool,
    pub score_weights: ScoreWeights,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.5,
            preferred_speakers: Vec::new(),
            max_results: 50,
            word_padding: 0.1,
            chunk_padding: 0.15,
            gap_duration: 0.3,
            crossfade_ms: 50,
            normalize_volume: true,
            normalization: NormalizationMode::default(),
            max_time_gap: 10.0,
            same_speaker_bonus: 0.1,
            fuzzy_threshold: 0.7,
            repetition_cap: 2,
            chunk_min_words: 2,
            chunk_max_words: 5,
            sample_rate: 16000,
            mp3_bitrate: "192k".to_string(),
            strict_reload: false,
            score_weights: ScoreWeights::default(),
        }
    }
}

// ============================================================================
// Index Statistics
// ============================================================================

/// Corpus statistics of one published index snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub sources: usize,
    pub total_words: usize,
    pub unique_words: usize,
    pub total_chunks: usize,
    pub unique_chunk_texts: usize,
}

// ============================================================================
// Output Manifest Types
// ============================================================================

/// Sidecar metadata document emitted next to the rendered audio asset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionManifest {
    pub metadata: ManifestMetadata,
    /// One entry per composed word in final order
    pub words: Vec<ManifestWord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Spoken text of the rendered clip
    pub text: String,
    /// Rendered duration in seconds
    pub total_duration: f64,
    pub speakers_used: Vec<String>,
    pub files_used: Vec<String>,
    pub words_count: usize,
    /// RFC 3339 generation timestamp
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestWord {
    pub word: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f32,
    pub speaker: String,
    pub file_name: String,
}

// ============================================================================
// Worker IPC Types
// ============================================================================

/// Selection strategy requested for a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyChoice {
    PerWord,
    Chunk,
    Contextual,
    /// Run every strategy and keep the highest-scoring composition
    Best,
}

impl Default for StrategyChoice {
    fn default() -> Self {
        StrategyChoice::PerWord
    }
}

/// Container for the rendered audio output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Wav,
    Mp3,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Mp3
    }
}

/// Worker command for IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerCommand {
    /// Load transcription documents and build the first index snapshot
    Load { dir: String },
    /// Rebuild the index from the current transcription directory
    Reload,
    /// Compose a phrase and render it
    Compose {
        phrase: String,
        #[serde(default)]
        strategy: StrategyChoice,
        /// Output audio path; generated when omitted
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<String>,
        #[serde(default)]
        format: OutputFormat,
        /// Request-scoped configuration override
        #[serde(skip_serializing_if = "Option::is_none")]
        config: Option<MixConfig>,
    },
    /// Report corpus statistics
    Stats,
    /// Shutdown worker
    Shutdown,
}

/// Worker response for IPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerResponse {
    Loaded(IndexStats),
    Composed {
        audio_path: String,
        manifest_path: String,
        manifest: CompositionManifest,
        /// Normalized tokens that resolved to nothing
        unresolved: Vec<String>,
        /// True when units were dropped because their source audio
        /// could not be decoded
        partial: bool,
        score: f32,
    },
    Stats(IndexStats),
    Error { message: String },
    Ok,
}
