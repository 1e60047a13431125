// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs   — Saving and loading model weights
//                     Burn's CompactRecorder for the model,
//                     optimizer and EMA records; serde_json
//                     for the model config and resume state.
//
//   vocab_store.rs  — Vocabulary cache
//                     Keeps the word/char vocabularies and
//                     the GloVe matrix between runs so the
//                     corpus is only scanned once.
//
//   metrics.rs      — Training metrics logging
//                     Per-interval and per-epoch CSV files in
//                     a timestamped run directory.
//
//   predictions.rs  — Evaluation output
//                     Similarity matrices and predicted vs
//                     true spans, as JSON.
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Vocabulary and GloVe cache
pub mod vocab_store;

/// Training metrics CSV logger
pub mod metrics;

/// Evaluation results writer
pub mod predictions;
