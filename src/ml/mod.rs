// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// This layer contains the Burn network and everything that
// runs it. Data batching (Layer 4) and checkpoint records
// (Layer 6) also touch Burn types, but only this layer does
// tensor math.
//
// What's in this layer:
//
//   layers.rs    — CharCnn, Highway and AttentionFlow, the
//                  BiDAF-specific building blocks
//
//   model.rs     — The full BiDAF network and its config
//                  • GloVe word embedding (frozen)
//                  • Character CNN + highway
//                  • Contextual BiLSTM
//                  • Attention flow (C2Q + Q2C)
//                  • Two-layer modeling BiLSTM
//                  • Start / end pointer outputs
//
//   loss.rs      — Span NLL loss and accuracy counting
//
//   ema.rs       — Exponential moving average of weights
//
//   summary.rs   — Parameter listings and weight statistics
//
//   trainer.rs   — The training loop: resume, batches,
//                  Adam, EMA, snapshots, checkpoints
//
//   evaluator.rs — Inference over a split, accuracy and
//                  raw prediction arrays
//
// Backends: NdArray on the CPU by default, Wgpu with the
// `wgpu` feature. Training wraps either in Autodiff.
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Seo et al. (2017) Bidirectional Attention Flow

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

/// BiDAF building blocks
pub mod layers;

/// BiDAF network architecture
pub mod model;

/// Span loss and accuracy
pub mod loss;

/// Weight averaging
pub mod ema;

/// Parameter summaries
pub mod summary;

/// Full training loop with resume and checkpointing
pub mod trainer;

/// Evaluation over a dataset split
pub mod evaluator;

#[cfg(not(feature = "wgpu"))]
pub type InferBackend = burn::backend::NdArray;
#[cfg(feature = "wgpu")]
pub type InferBackend = burn::backend::Wgpu;

pub type TrainBackend = burn::backend::Autodiff<InferBackend>;

pub type Device = <InferBackend as burn::tensor::backend::Backend>::Device;

pub fn default_device() -> Device {
    Device::default()
}

/// One tick per batch. Hidden when `show` is false (tests).
pub(crate) fn progress_bar(len: usize, show: bool) -> Result<ProgressBar> {
    if !show {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} batches {msg}")?
            .progress_chars("=>-"),
    );
    Ok(pb)
}
