// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from preprocessed JSON files to padded tensor
// batches.
//
// The pipeline flows in this order:
//
//   data_*.json + shared_*.json
//       │
//       ▼
//   ProcessedJsonLoader → questions, contexts, answer spans
//       │
//       ▼
//   Vocab (domain)      → word and character ids
//       │
//       ▼
//   QaDataset           → encoded samples, fixed-size batches
//       │
//       ▼
//   BidafBatcher        → padded Int tensors per batch
//
// GloVe vectors are loaded alongside, indexed by the same
// word vocabulary.
//
// Reference: Burn Book §4 (Datasets and Batchers)

/// Reads the processed SQuAD JSON layout
pub mod loader;

/// Encoded samples and batch grouping (Burn Dataset)
pub mod dataset;

/// Pads samples into tensors (Burn Batcher)
pub mod batcher;

/// Pretrained word vectors
pub mod glove;
