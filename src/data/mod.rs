// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between raw text files and padded id batches.
//
//   vocab / embedding files
//       │
//       ▼
//   vocab_builder   → word <-> id tables (+ optional vectors)
//       │
//   parallel files  │
//       │           │
//       ▼           │
//   corpus          → tokenised, filtered, sorted sentence pairs
//       │           │
//       ▼           ▼
//   batcher         → padded batches with decoder inputs
//       │
//       ▼
//   validator       → every id inside its vocabulary
//
//   sampler         → evaluation subset when no dev corpus exists
//
// Whole corpora are held in memory; nothing here streams.

pub mod batcher;

pub mod corpus;

pub mod sampler;

pub mod validator;

pub mod vocab_builder;
