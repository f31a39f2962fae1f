// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the pipeline can detect is fail-fast: it is
// raised as soon as it is seen and travels to main unchanged.
//
//   ConfigError      — bad startup settings, before heavy work
//   DataError        — corpus / vocabulary / cache integrity
//   LookupError      — an id that has no word while decoding
//   DivergenceError  — NaN loss during a training step

use thiserror::Error;

/// Startup configuration problems.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("No save path given, nothing could be saved or restored")]
    MissingSavePath,

    #[error("Malformed --save-params value '{0}' (expected all, i[..] or e[..])")]
    MalformedParamsSpec(String),

    #[error("Params selection for --save-params is empty")]
    EmptyParamsSelection,

    #[error("Embedding widths differ: source {source_dim}, target {target_dim}")]
    EmbeddingWidthMismatch { source_dim: usize, target_dim: usize },

    #[error("Model width {d_model} is not divisible by {num_heads} attention heads")]
    HeadsDoNotDivide { d_model: usize, num_heads: usize },

    #[error("Unknown vocabulary initializer '{0}' (expected uniform or normal)")]
    UnknownInitializer(String),

    #[error("Batch size must be at least 1")]
    ZeroBatchSize,

    #[error("Keep probability {0} is outside (0, 1]")]
    KeepProbOutOfRange(f64),
}

/// Integrity violations in corpus files, vocabularies or batches.
#[derive(Debug, Error, PartialEq)]
pub enum DataError {
    #[error("Parallel files differ in length: {source_lines} source lines vs {target_lines} target lines")]
    LengthMismatch { source_lines: usize, target_lines: usize },

    #[error("Id {id} in {structure} is out of range for vocabulary of size {bound}")]
    IdOutOfRange {
        structure: &'static str,
        id: usize,
        bound: usize,
    },

    #[error("Embedding payload is neither a dictionary nor a pair of dictionaries ({0})")]
    EmbeddingFormat(String),

    #[error("Embedding row {row} for '{word}' has width {found}, expected {expected}")]
    RaggedEmbedding {
        word: String,
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Required token '{token}' is missing from the {side} vocabulary")]
    MissingToken { token: String, side: &'static str },

    #[error("Cannot build a batch from an empty set of sentences")]
    EmptyBatch,

    #[error("Batch has {found} {structure} rows, expected {expected}")]
    BatchRowCount {
        structure: &'static str,
        found: usize,
        expected: usize,
    },

    #[error("Row {row} of {structure} has {found} entries, expected {expected}")]
    RaggedBatch {
        structure: &'static str,
        row: usize,
        found: usize,
        expected: usize,
    },
}

/// Decode-to-text failure: emitting the unknown word instead would
/// silently corrupt the reference alignment.
#[derive(Debug, Error, PartialEq)]
#[error("Id {id} has no word in the {side} vocabulary")]
pub struct LookupError {
    pub id: usize,
    pub side: &'static str,
}

/// The optimizer produced a NaN loss; training cannot resume.
#[derive(Debug, Error, PartialEq)]
#[error("Loss became NaN at global step {global_step}")]
pub struct DivergenceError {
    pub global_step: usize,
}
