// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores everything a run needs, using Burn's
// CompactRecorder for tensors and serde_json for metadata.
//
// Directory layout:
//
//   checkpoints/
//     model_config.json      ← BidafConfig, needed to rebuild the net
//     model.mpk              ← latest snapshot (EMA weights)
//     model_epoch/
//       model_1.mpk          ← EMA weights after epoch 0
//       model_2.mpk
//       ...
//     epoch-0/               ← full training checkpoint
//       model.mpk            ← raw training weights
//       optim.mpk            ← Adam moments
//       ema.mpk              ← EMA shadow weights
//       state.json           ← next epoch + best accuracy
//     model_best/            ← copy of the best epoch checkpoint
//
// CompactRecorder appends the `.mpk` extension itself, so
// the paths below never carry one.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    module::AutodiffModule,
    optim::Optimizer,
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::ml::model::{Bidaf, BidafConfig};

const MODEL_CONFIG_FILE: &str = "model_config.json";
const SNAPSHOT_NAME:     &str = "model";
const EPOCH_MODEL_DIR:   &str = "model_epoch";
const BEST_NAME:         &str = "model_best";
const STATE_FILE:        &str = "state.json";

/// Bookkeeping stored next to the tensors of a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainState {
    /// Epoch to start from when resuming
    pub epoch: usize,

    /// Best epoch accuracy seen so far, in [0, 1]
    pub best_acc: f64,
}

/// What a resumed run starts from
pub struct Resumed<B: AutodiffBackend, O> {
    pub model:     Bidaf<B>,
    pub optim:     O,
    pub ema_model: Bidaf<B::InnerBackend>,
    pub state:     TrainState,
}

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        // create_dir_all creates parent directories too, like `mkdir -p`
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Directory of a named training checkpoint, e.g. `epoch-3`
    pub fn checkpoint_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn epoch_checkpoint_name(epoch: usize) -> String {
        format!("epoch-{epoch}")
    }

    // ── Model architecture ───────────────────────────────────────────────────

    /// Must be saved before training so `test` can rebuild the network
    pub fn save_model_config(&self, cfg: &BidafConfig) -> Result<()> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        cfg.save(&path)
            .with_context(|| format!("Cannot write model config to '{}'", path.display()))?;
        tracing::debug!("Saved model config to '{}'", path.display());
        Ok(())
    }

    pub fn load_model_config(&self) -> Result<BidafConfig> {
        let path = self.dir.join(MODEL_CONFIG_FILE);
        BidafConfig::load(&path).map_err(|e| {
            anyhow::anyhow!(
                "Cannot read model config from '{}': {e:?}. \
                 Make sure you have run 'train' before 'test'.",
                path.display()
            )
        })
    }

    // ── Snapshot and per-epoch models ────────────────────────────────────────

    pub fn save_snapshot<B: Backend>(&self, model: &Bidaf<B>) -> Result<()> {
        save_record(model, self.dir.join(SNAPSHOT_NAME))
    }

    pub fn has_snapshot(&self) -> bool {
        recorded(&self.dir.join(SNAPSHOT_NAME))
    }

    pub fn load_snapshot<B: Backend>(&self, model: Bidaf<B>, device: &B::Device) -> Result<Bidaf<B>> {
        load_record(model, self.dir.join(SNAPSHOT_NAME), device)
    }

    /// Saved as `model_epoch/model_{n}` where n counts finished epochs
    pub fn save_epoch_model<B: Backend>(&self, model: &Bidaf<B>, n: usize) -> Result<()> {
        let dir = self.dir.join(EPOCH_MODEL_DIR);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create '{}'", dir.display()))?;
        save_record(model, dir.join(format!("model_{n}")))
    }

    pub fn load_epoch_model<B: Backend>(
        &self,
        model:  Bidaf<B>,
        n:      usize,
        device: &B::Device,
    ) -> Result<Bidaf<B>> {
        load_record(model, self.dir.join(EPOCH_MODEL_DIR).join(format!("model_{n}")), device)
    }

    /// Highest n among the saved `model_{n}` files, if any
    pub fn latest_epoch_model(&self) -> Result<Option<usize>> {
        let dir = self.dir.join(EPOCH_MODEL_DIR);
        if !dir.is_dir() {
            return Ok(None);
        }
        let mut latest = None;
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("Cannot list '{}'", dir.display()))?
        {
            let path = entry?.path();
            let n = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("model_"))
                .and_then(|s| s.parse::<usize>().ok());
            if path.extension().is_some_and(|e| e == "mpk") {
                latest = latest.max(n);
            }
        }
        Ok(latest)
    }

    // ── Training checkpoints ─────────────────────────────────────────────────

    /// Write a full checkpoint to `{dir}/{name}/`. With `is_best`
    /// the same checkpoint is also written as `model_best`.
    pub fn save_checkpoint<B, O>(
        &self,
        name:      &str,
        model:     &Bidaf<B>,
        optim:     &O,
        ema_model: &Bidaf<B::InnerBackend>,
        state:     TrainState,
        is_best:   bool,
    ) -> Result<PathBuf>
    where
        B: AutodiffBackend,
        O: Optimizer<Bidaf<B>, B>,
    {
        let path = self.checkpoint_path(name);
        write_checkpoint(&path, model, optim, ema_model, state)?;
        tracing::info!("Saved checkpoint '{}'", path.display());

        if is_best {
            write_checkpoint(&self.checkpoint_path(BEST_NAME), model, optim, ema_model, state)?;
            tracing::info!("New best accuracy {:.3}%", 100.0 * state.best_acc);
        }
        Ok(path)
    }

    /// True when `path` is a complete checkpoint directory
    pub fn has_checkpoint(path: &Path) -> bool {
        path.join(STATE_FILE).is_file()
    }

    /// Restore a checkpoint directory. Returns `None` when `path`
    /// holds no checkpoint.
    pub fn load_checkpoint<B, O>(
        &self,
        path:   &Path,
        model:  Bidaf<B>,
        optim:  O,
        device: &B::Device,
    ) -> Result<Option<Resumed<B, O>>>
    where
        B: AutodiffBackend,
        O: Optimizer<Bidaf<B>, B>,
    {
        if !Self::has_checkpoint(path) {
            return Ok(None);
        }
        let state_path = path.join(STATE_FILE);

        let json = fs::read_to_string(&state_path)
            .with_context(|| format!("Cannot read '{}'", state_path.display()))?;
        let state: TrainState = serde_json::from_str(&json)
            .with_context(|| format!("Malformed '{}'", state_path.display()))?;

        let ema_model = load_record(model.valid(), path.join("ema"), device)?;
        let model     = load_record(model, path.join("model"), device)?.freeze_word_embedding();

        let optim_path = path.join("optim");
        let record = CompactRecorder::new()
            .load(optim_path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", optim_path.display()))?;
        let optim = optim.load_record(record);

        Ok(Some(Resumed { model, optim, ema_model, state }))
    }
}

fn write_checkpoint<B, O>(
    path:      &Path,
    model:     &Bidaf<B>,
    optim:     &O,
    ema_model: &Bidaf<B::InnerBackend>,
    state:     TrainState,
) -> Result<()>
where
    B: AutodiffBackend,
    O: Optimizer<Bidaf<B>, B>,
{
    fs::create_dir_all(path)
        .with_context(|| format!("Cannot create checkpoint dir '{}'", path.display()))?;

    save_record(model, path.join("model"))?;
    save_record(ema_model, path.join("ema"))?;

    let optim_path = path.join("optim");
    CompactRecorder::new()
        .record(optim.to_record(), optim_path.clone())
        .with_context(|| format!("Failed to save optimizer state to '{}'", optim_path.display()))?;

    let state_path = path.join(STATE_FILE);
    fs::write(&state_path, serde_json::to_string_pretty(&state)?)
        .with_context(|| format!("Cannot write '{}'", state_path.display()))?;
    Ok(())
}

fn save_record<B: Backend>(model: &Bidaf<B>, path: PathBuf) -> Result<()> {
    CompactRecorder::new()
        .record(model.clone().into_record(), path.clone())
        .with_context(|| format!("Failed to save model to '{}'", path.display()))?;
    tracing::debug!("Saved model '{}'", path.display());
    Ok(())
}

fn load_record<B: Backend>(model: Bidaf<B>, path: PathBuf, device: &B::Device) -> Result<Bidaf<B>> {
    let record = CompactRecorder::new()
        .load(path.clone(), device)
        .with_context(|| format!("Cannot load model '{}'", path.display()))?;
    Ok(model.load_record(record))
}

fn recorded(path: &Path) -> bool {
    path.with_extension("mpk").is_file()
}
