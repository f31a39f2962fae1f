// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Every file format the program reads or writes, plus the
// default BLEU collaborator:
//
//   checkpoint.rs     — model weights (CompactRecorder) and the
//                       JSON manifest used to rebuild the network
//
//   params.rs         — run configuration subset as JSON
//                       (--save-params / --load-params)
//
//   batch_cache.rs    — bincode list of training batches
//
//   embedding_file.rs — bincode word → vector dictionaries
//
//   output.rs         — one translated sentence per line
//
//   metrics.rs        — one CSV row per evaluation
//
//   bleu.rs           — corpus BLEU-4
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Params file save/load
pub mod params;

/// Batch cache file
pub mod batch_cache;

/// Embedding dictionary files
pub mod embedding_file;

/// Inference output writer
pub mod output;

/// Evaluation metrics CSV logger
pub mod metrics;

/// Default BLEU scorer
pub mod bleu;
