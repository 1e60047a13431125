// ============================================================
// Layer 5 — Evaluator
// ============================================================
// Runs a trained model over a split in inference mode and
// scores its span predictions.
//
// Runs on the inner (non-autodiff) backend: no graph is
// recorded and dropout is off. Batches are visited in order
// so batch i of the saved predictions is batch i of the data.
//
// A prediction counts for p1 when argmax(p1) equals the true
// start, for p2 when argmax(p2) equals the true (inclusive)
// end, and as an exact span match when both do.

use anyhow::{anyhow, Result};
use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::data::{
    batcher::{BidafBatch, BidafBatcher},
    dataset::QaDataset,
};
use crate::infra::predictions::BatchPrediction;
use crate::ml::{loss::predict_positions, model::Bidaf, progress_bar};

/// Running accuracy is logged every this many batches
pub const EVAL_LOG_INTERVAL: usize = 100;

#[derive(Debug, Default)]
pub struct EvalReport {
    pub total:        usize,
    pub p1_correct:   usize,
    pub p2_correct:   usize,
    pub span_correct: usize,
    pub predictions:  Vec<BatchPrediction>,
}

impl EvalReport {
    pub fn p1_acc(&self) -> f64 {
        ratio(self.p1_correct, self.total)
    }

    pub fn p2_acc(&self) -> f64 {
        ratio(self.p2_correct, self.total)
    }

    pub fn exact_match(&self) -> f64 {
        ratio(self.span_correct, self.total)
    }

    fn add(&mut self, prediction: BatchPrediction) {
        let hits = |pred: &[i64], truth: &[i64]| pred.iter().zip(truth).filter(|(p, t)| p == t).count();
        self.total        += prediction.true_start.len();
        self.p1_correct   += hits(&prediction.pred_start, &prediction.true_start);
        self.p2_correct   += hits(&prediction.pred_end, &prediction.true_end);
        self.span_correct += prediction
            .pred_start
            .iter()
            .zip(&prediction.pred_end)
            .zip(prediction.true_start.iter().zip(&prediction.true_end))
            .filter(|((ps, pe), (ts, te))| ps == ts && pe == te)
            .count();
        self.predictions.push(prediction);
    }
}

fn ratio(n: usize, total: usize) -> f64 {
    if total > 0 { n as f64 / total as f64 } else { 0.0 }
}

pub fn evaluate<B: Backend>(
    model:         &Bidaf<B>,
    dataset:       &QaDataset,
    batcher:       &BidafBatcher,
    batch_size:    usize,
    device:        &B::Device,
    show_progress: bool,
) -> Result<EvalReport> {
    let batches = dataset.batches(batch_size, None);
    let pb = progress_bar(batches.len(), show_progress)?;
    let mut report = EvalReport::default();

    for (i, indices) in batches.iter().enumerate() {
        let batch: BidafBatch<B> = batcher.batch(dataset.items(indices), device);
        report.add(predict_batch(model, batch)?);

        if i % EVAL_LOG_INTERVAL == 0 {
            tracing::info!("current acc: {:.3}%", 100.0 * report.p1_acc());
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    tracing::info!("======== Test result ========");
    tracing::info!(
        "p1 acc: {:.3}%, p2 acc: {:.3}%, exact span: {:.3}% ({} samples)",
        100.0 * report.p1_acc(),
        100.0 * report.p2_acc(),
        100.0 * report.exact_match(),
        report.total
    );
    Ok(report)
}

fn predict_batch<B: Backend>(model: &Bidaf<B>, batch: BidafBatch<B>) -> Result<BatchPrediction> {
    let out = model.forward(batch.context, batch.context_chars, batch.query, batch.query_chars);
    let [b, t_len, j_len] = out.similarity.dims();

    let similarity = floats(out.similarity)?;
    let similarity = similarity
        .chunks(t_len * j_len)
        .map(|rows| rows.chunks(j_len).map(<[f32]>::to_vec).collect())
        .collect::<Vec<Vec<Vec<f32>>>>();
    debug_assert_eq!(similarity.len(), b);

    Ok(BatchPrediction {
        similarity,
        true_start: ints(batch.answer_start)?,
        true_end:   ints(batch.answer_end)?,
        pred_start: ints(predict_positions(out.p1))?,
        pred_end:   ints(predict_positions(out.p2))?,
    })
}

fn floats<B: Backend, const D: usize>(t: Tensor<B, D>) -> Result<Vec<f32>> {
    t.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

fn ints<B: Backend>(t: Tensor<B, 1, Int>) -> Result<Vec<i64>> {
    t.into_data()
        .convert::<i64>()
        .to_vec::<i64>()
        .map_err(|e| anyhow!("Cannot read tensor data: {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::QaSample;
    use crate::domain::example::AnswerSpan;
    use crate::ml::model::BidafConfig;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn prediction(pred: (i64, i64), truth: (i64, i64)) -> BatchPrediction {
        BatchPrediction {
            similarity: Vec::new(),
            true_start: vec![truth.0],
            true_end:   vec![truth.1],
            pred_start: vec![pred.0],
            pred_end:   vec![pred.1],
        }
    }

    #[test]
    fn test_report_counts() {
        let mut report = EvalReport::default();
        report.add(prediction((1, 2), (1, 2)));
        report.add(prediction((1, 3), (1, 2)));
        report.add(prediction((0, 2), (1, 2)));
        report.add(prediction((0, 0), (1, 2)));

        assert_eq!(report.total, 4);
        assert_eq!(report.p1_correct, 2);
        assert_eq!(report.p2_correct, 2);
        assert_eq!(report.span_correct, 1);
        assert_eq!(report.exact_match(), 0.25);
    }

    #[test]
    fn test_empty_report_has_zero_accuracy() {
        assert_eq!(EvalReport::default().p1_acc(), 0.0);
    }

    #[test]
    fn test_evaluate_collects_one_prediction_per_batch() {
        let device = Default::default();
        let cfg = BidafConfig::new(10, 10)
            .with_w_embd_size(2)
            .with_c_embd_size(2)
            .with_out_chs(2)
            .with_filter_widths(vec![2])
            .with_dropout(0.0);
        let model = cfg.init::<TestBackend>(&device);

        let samples = (0..5)
            .map(|i| QaSample {
                context:       vec![3, 4, 5, 6],
                context_chars: vec![vec![3, 4]; 4],
                query:         vec![7, 8],
                query_chars:   vec![vec![5]; 2],
                answer:        AnswerSpan::new(i % 3, i % 3 + 1),
            })
            .collect();
        let dataset = QaDataset::new(samples);
        let batcher = BidafBatcher::new(cfg.max_filter_width());

        let report = evaluate(&model, &dataset, &batcher, 2, &device, false).unwrap();
        // 5 samples in batches of 2: the last one is dropped
        assert_eq!(report.total, 4);
        assert_eq!(report.predictions.len(), 2);
        let first = &report.predictions[0];
        assert_eq!(first.similarity.len(), 2);
        assert_eq!(first.similarity[0].len(), 4);
        assert_eq!(first.similarity[0][0].len(), 2);
        assert_eq!(first.true_start, vec![0, 1]);
        assert_eq!(first.true_end, vec![0, 1]);
        assert!(first.pred_start.iter().all(|&p| (0..4).contains(&p)));
    }
}
