// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// This layer orchestrates all the other layers to accomplish
// a specific goal (training or translating a file).
//
// Rules for this layer:
//   - No tensor math or model code here
//   - No argument parsing here (that's Layer 1)
//   - File formats belong to Layer 4 and 6
//   - Only workflow coordination
//
// The use cases are generic over the TranslationRuntime trait, so
// the whole workflow can be driven by an in-memory runtime in tests.

/// Every recognised setting of a run, plus file naming
pub mod config;

/// Startup shared by both workflows: params file, vocabularies, runtime
pub mod session;

/// The training workflow
pub mod train_use_case;

/// The translation workflow
pub mod infer_use_case;
