// ============================================================
// Layer 2 — TestUseCase
// ============================================================
// Evaluates the latest snapshot on the test split:
//
//   Step 1: Load splits + vocabularies   (Layer 2 - corpus)
//   Step 2: Rebuild the network          (Layer 6 - infra)
//   Step 3: Load the snapshot weights    (Layer 6 - infra)
//   Step 4: Evaluate                     (Layer 5 - ml)
//   Step 5: Write the raw predictions    (Layer 6 - infra)
//
// Runs on the inference backend; nothing is trained.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::application::{corpus::Corpus, train_use_case::DataConfig};
use crate::data::{batcher::BidafBatcher, dataset::QaDataset};
use crate::infra::{
    checkpoint::CheckpointManager,
    predictions::{PredictionResults, PredictionWriter},
};
use crate::ml::{
    default_device,
    evaluator::{evaluate, EvalReport},
    model::Bidaf,
    InferBackend,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestConfig {
    pub data:        DataConfig,
    pub predictions: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            data:        DataConfig::default(),
            predictions: "./prediction_results.json".to_string(),
        }
    }
}

pub struct TestUseCase {
    config: TestConfig,
}

impl TestUseCase {
    pub fn new(config: TestConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<EvalReport> {
        let cfg = &self.config;
        tracing::info!("----Test---");

        // ── Step 1: Splits and vocabularies ──────────────────────────────────
        let corpus = Corpus::load(&cfg.data)?;

        // ── Step 2: Rebuild the trained architecture ─────────────────────────
        let ckpt = CheckpointManager::new(&cfg.data.checkpoint_dir);
        let model_cfg = ckpt.load_model_config()?;
        ensure!(
            model_cfg.vocab_size_w == corpus.vocabs.words.len()
                && model_cfg.vocab_size_c == corpus.vocabs.chars.len(),
            "Saved model expects {} words / {} chars but the data gives {} / {}",
            model_cfg.vocab_size_w,
            model_cfg.vocab_size_c,
            corpus.vocabs.words.len(),
            corpus.vocabs.chars.len()
        );

        // ── Step 3: Snapshot weights ─────────────────────────────────────────
        ensure!(
            ckpt.has_snapshot(),
            "No model snapshot in '{}'. Have you run 'train' first?",
            ckpt.dir().display()
        );
        let device = default_device();
        let model: Bidaf<InferBackend> = model_cfg.init(&device);
        let model = ckpt.load_snapshot(model, &device)?;
        tracing::info!("Model loaded from '{}'", ckpt.dir().display());

        // ── Step 4: Evaluate ─────────────────────────────────────────────────
        let dataset = QaDataset::encode(
            &corpus.test.examples,
            &corpus.vocabs.words,
            &corpus.vocabs.chars,
        );
        let batcher = BidafBatcher::new(model_cfg.max_filter_width());
        let mut report = evaluate(
            &model,
            &dataset,
            &batcher,
            cfg.data.batch_size,
            &device,
            cfg.data.show_progress,
        )?;

        // ── Step 5: Predictions ──────────────────────────────────────────────
        let results = PredictionResults::from_batches(std::mem::take(&mut report.predictions));
        PredictionWriter::new(&cfg.predictions).write(&results)?;

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::BidafConfig;
    use serde_json::json;
    use std::{fs, path::Path};

    /// "paris is big ." with the answer "paris", for both splits
    fn write_dataset(dir: &Path) {
        let data = json!({
            "q":  [["where", "?"]],
            "cq": [[["w"], ["?"]]],
            "y":  [[[[0, 0], [0, 1]]]],
            "*x": [[0, 0]],
        });
        let shared = json!({
            "x":  [[[["paris", "is", "big", "."]]]],
            "cx": [[[[["p"], ["i"], ["b"], ["."]]]]],
            "lower_word_counter": { "paris": 20, "is": 20, "big": 20 },
            "char_counter": { "p": 200, "i": 200 },
        });
        for split in ["train", "test"] {
            fs::write(dir.join(format!("data_{split}.json")), data.to_string()).unwrap();
            fs::write(dir.join(format!("shared_{split}.json")), shared.to_string()).unwrap();
        }
        fs::write(dir.join("glove.6B.2d.txt"), "paris 1 2\n").unwrap();
    }

    fn config(dir: &Path) -> TestConfig {
        TestConfig {
            data: DataConfig {
                data_dir:       dir.display().to_string(),
                glove_dir:      dir.display().to_string(),
                checkpoint_dir: dir.join("checkpoints").display().to_string(),
                cache_dir:      dir.join("cache").display().to_string(),
                batch_size:     1,
                w_embd_size:    2,
                c_embd_size:    2,
                out_chs:        2,
                filter_widths:  vec![1],
                show_progress:  false,
                ..DataConfig::default()
            },
            predictions: dir.join("out").join("predictions.json").display().to_string(),
        }
    }

    /// Architecture matching the fixture's vocabularies
    fn model_config(cfg: &TestConfig) -> BidafConfig {
        Corpus::load(&cfg.data).unwrap().model_config(&cfg.data)
    }

    #[test]
    fn test_snapshot_is_evaluated_and_predictions_written() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let cfg = config(dir.path());

        let model_cfg = model_config(&cfg);
        let ckpt = CheckpointManager::new(&cfg.data.checkpoint_dir);
        ckpt.save_model_config(&model_cfg).unwrap();
        ckpt.save_snapshot(&model_cfg.init::<InferBackend>(&default_device())).unwrap();

        let report = TestUseCase::new(cfg.clone()).execute().unwrap();
        assert_eq!(report.total, 1);
        assert!(report.p1_acc() <= 1.0);
        assert!(report.predictions.is_empty(), "predictions moved to the writer");

        let json = fs::read_to_string(&cfg.predictions).unwrap();
        let results: PredictionResults = serde_json::from_str(&json).unwrap();
        assert_eq!(results.batch_count(), 1);
        assert_eq!(results.true_start[&0], vec![0]);
        assert_eq!(results.true_end[&0], vec![0]);
        // One sample, four context words, two query words
        assert_eq!(results.similarity[&0].len(), 1);
        assert_eq!(results.similarity[&0][0].len(), 4);
        assert_eq!(results.similarity[&0][0][0].len(), 2);
    }

    #[test]
    fn test_missing_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let cfg = config(dir.path());

        let ckpt = CheckpointManager::new(&cfg.data.checkpoint_dir);
        ckpt.save_model_config(&model_config(&cfg)).unwrap();

        let err = TestUseCase::new(cfg.clone()).execute().unwrap_err();
        assert!(err.to_string().contains("No model snapshot"), "{err}");
        assert!(!Path::new(&cfg.predictions).exists());
    }

    #[test]
    fn test_vocabulary_mismatch_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_dataset(dir.path());
        let cfg = config(dir.path());

        let mut model_cfg = model_config(&cfg);
        model_cfg.vocab_size_w += 1;
        let ckpt = CheckpointManager::new(&cfg.data.checkpoint_dir);
        ckpt.save_model_config(&model_cfg).unwrap();
        ckpt.save_snapshot(&model_cfg.init::<InferBackend>(&default_device())).unwrap();

        let err = TestUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("Saved model expects"), "{err}");
    }
}
