// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Load splits + vocabularies   (Layer 2 - corpus)
//   Step 2: Describe the architecture    (Layer 5 - ml)
//   Step 3: Save config                  (Layer 6 - infra)
//   Step 4: Encode the training split    (Layer 4 - data)
//   Step 5: Open the metrics run dir     (Layer 6 - infra)
//   Step 6: Run training loop            (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::application::corpus::Corpus;
use crate::data::dataset::QaDataset;
use crate::infra::{checkpoint::CheckpointManager, metrics::MetricsLogger};
use crate::ml::{
    default_device,
    trainer::{run_training, TrainOutcome},
    TrainBackend,
};

// ─── Data Configuration ──────────────────────────────────────────────────────
// Where the inputs live and how they are embedded. Shared by
// training and testing so both build the same vocabularies
// and the same network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub data_dir:       String,
    pub glove_dir:      String,
    pub checkpoint_dir: String,
    pub cache_dir:      String,
    pub use_cache:      bool,
    pub batch_size:     usize,
    pub w_embd_size:    usize,
    pub c_embd_size:    usize,
    pub out_chs:        usize,
    pub filter_widths:  Vec<usize>,
    pub seed:           u64,
    pub show_progress:  bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir:       "./dataset".to_string(),
            glove_dir:      "./dataset".to_string(),
            checkpoint_dir: "./checkpoints".to_string(),
            cache_dir:      "./cache".to_string(),
            use_cache:      false,
            batch_size:     32,
            w_embd_size:    100,
            c_embd_size:    8,
            out_chs:        100,
            filter_widths:  vec![5],
            seed:           1111,
            show_progress:  true,
        }
    }
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// The #[derive(Serialize, Deserialize)] macros from serde handle
// reading/writing this struct to JSON automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data:              DataConfig,
    pub lr:                f64,
    pub epochs:            usize,
    pub start_epoch:       usize,
    pub resume:            String,
    pub ema_decay:         f64,
    pub dropout:           f64,
    pub log_interval:      usize,
    pub snapshot_interval: usize,
    pub log_dir:           String,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data:              DataConfig::default(),
            lr:                1e-3,
            epochs:            3,
            start_epoch:       0,
            resume:            "./checkpoints/model_best".to_string(),
            ema_decay:         0.999,
            dropout:           0.2,
            log_interval:      100,
            snapshot_interval: 100,
            log_dir:           "./logs".to_string(),
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<TrainOutcome> {
        let cfg = &self.config;
        tracing::info!("----Train---");

        // ── Step 1: Splits and vocabularies ──────────────────────────────────
        // Both splits are read: the vocabulary covers the test words too
        let corpus = Corpus::load(&cfg.data)?;

        // ── Step 2: Architecture ─────────────────────────────────────────────
        let model_cfg = corpus.model_config(&cfg.data).with_dropout(cfg.dropout);

        // ── Step 3: Save config for testing ──────────────────────────────────
        // `test` needs the exact architecture to rebuild the model
        let ckpt = CheckpointManager::new(&cfg.data.checkpoint_dir);
        ckpt.save_model_config(&model_cfg)?;

        // ── Step 4: Encode the training split ────────────────────────────────
        let dataset = QaDataset::encode(
            &corpus.train.examples,
            &corpus.vocabs.words,
            &corpus.vocabs.chars,
        );

        // ── Step 5: Metrics ──────────────────────────────────────────────────
        let metrics = MetricsLogger::timestamped(&cfg.log_dir)?;
        tracing::info!("Logging metrics to '{}'", metrics.run_dir().display());

        // ── Step 6: Run training loop (Layer 5) ──────────────────────────────
        let device = default_device();
        tracing::info!("Using device: {:?}", device);
        run_training::<TrainBackend>(
            cfg,
            &model_cfg,
            &corpus.vocabs.glove,
            &dataset,
            &ckpt,
            &metrics,
            &device,
        )
    }
}
