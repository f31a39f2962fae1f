// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits that define what the pipeline
// talks about. Nothing in here touches files, tensors or burn.
//
//   vocabulary — word <-> id tables and special-token ids
//   batch      — sentence pairs, padded batches, runtime feeds
//   error      — typed failure taxonomy
//   traits     — seams to the runtime and the BLEU scorer

pub mod batch;

pub mod error;

pub mod traits;

pub mod vocabulary;
