// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Trains BiDAF with Adam and keeps an EMA of the weights.
//
// Per batch:
//   forward → loss = NLL(p1, start) + NLL(p2, end)
//   backward → Adam step → EMA update
//
// Per epoch:
//   snapshot (EMA weights)       checkpoints/model
//   epoch model (EMA weights)    checkpoints/model_epoch/model_{e+1}
//   full checkpoint              checkpoints/epoch-{e}/
//   best checkpoint so far       checkpoints/model_best/
//
// Where a run starts from, in order of preference:
//   1. the --resume checkpoint (weights, Adam state, EMA, epoch)
//   2. the newest per-epoch model
//   3. the latest snapshot
//   4. a fresh model with GloVe word vectors
//
// Key Burn insight:
//   - Training uses an Autodiff backend for gradients
//   - model.valid() gives the same weights on the inner
//     backend; the EMA lives there, off the autodiff graph
//
// Reference: Burn Book §5, Kingma & Ba (2015) Adam

use anyhow::{ensure, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, SeedableRng};
use std::path::Path;

use crate::application::train_use_case::TrainConfig;
use crate::data::{
    batcher::{BidafBatch, BidafBatcher},
    dataset::QaDataset,
    glove::GloveMatrix,
};
use crate::infra::{
    checkpoint::{CheckpointManager, TrainState},
    metrics::{EpochMetrics, MetricsLogger, StepMetrics},
};
use crate::ml::{
    ema::Ema,
    loss::{count_correct, span_nll},
    model::{Bidaf, BidafConfig},
    progress_bar,
    summary::{list_params, log_summaries, summarize_params},
};

/// What a call to `run_training` did
#[derive(Debug)]
pub struct TrainOutcome {
    pub start_epoch: usize,
    pub epochs:      Vec<EpochMetrics>,
    pub best_acc:    Option<f64>,
}

/// Everything the epoch loop needs to start
struct Start<B: AutodiffBackend, O> {
    model:    Bidaf<B>,
    optim:    O,
    ema:      Ema<B::InnerBackend>,
    epoch:    usize,
    best_acc: Option<f64>,
}

pub fn run_training<B: AutodiffBackend>(
    cfg:       &TrainConfig,
    model_cfg: &BidafConfig,
    glove:     &GloveMatrix,
    dataset:   &QaDataset,
    ckpt:      &CheckpointManager,
    metrics:   &MetricsLogger,
    device:    &B::Device,
) -> Result<TrainOutcome> {
    let batch_size = cfg.data.batch_size;
    ensure!(batch_size > 0, "batch size must be positive");
    ensure!(
        dataset.sample_count() >= batch_size,
        "{} training samples cannot fill one batch of {}",
        dataset.sample_count(),
        batch_size
    );

    B::seed(cfg.data.seed);
    let mut rng = StdRng::seed_from_u64(cfg.data.seed);

    // ── Model, optimiser, EMA ────────────────────────────────────────────────
    let fresh: Bidaf<B> = model_cfg.init(device).with_pretrained_word_embedding(glove)?;

    // Adam: m = β1*m + (1-β1)*g,  v = β2*v + (1-β2)*g²,  θ -= lr * m / (√v + ε)
    let new_optim = || AdamConfig::new().with_epsilon(1e-8).init::<B, Bidaf<B>>();

    let Start { mut model, mut optim, mut ema, epoch: start_epoch, mut best_acc } =
        resume(cfg, ckpt, fresh, new_optim, device)?;

    tracing::info!("Model ready: {} parameters", model.num_params());
    tracing::info!("EMA over {} tensors, decay {}", ema.len(), ema.decay());
    log_summaries(&list_params(&model));

    let batcher = BidafBatcher::new(model_cfg.max_filter_width());
    let mut outcome = TrainOutcome { start_epoch, epochs: Vec::new(), best_acc };

    // ── Epoch loop ───────────────────────────────────────────────────────────
    for epoch in start_epoch..start_epoch + cfg.epochs {
        tracing::info!("---Epoch {}", epoch);
        let batches   = dataset.batches(batch_size, Some(&mut rng));
        let n_batches = batches.len();
        let pb = progress_bar(n_batches, cfg.data.show_progress)?;

        let mut loss_p1_sum = 0.0f64;
        let mut loss_p2_sum = 0.0f64;
        let mut p1_correct  = 0usize;
        let mut p2_correct  = 0usize;
        let mut total       = 0usize;

        for (i, indices) in batches.iter().enumerate() {
            let batch: BidafBatch<B> = batcher.batch(dataset.items(indices), device);
            total += batch.size();

            let out = model.forward(batch.context, batch.context_chars, batch.query, batch.query_chars);
            let loss_p1 = span_nll(out.log_p1, batch.answer_start.clone());
            let loss_p2 = span_nll(out.log_p2, batch.answer_end.clone());
            p1_correct += count_correct(out.p1, batch.answer_start);
            p2_correct += count_correct(out.p2, batch.answer_end);

            let l1: f64 = loss_p1.clone().into_scalar().elem::<f64>();
            let l2: f64 = loss_p2.clone().into_scalar().elem::<f64>();
            loss_p1_sum += l1;
            loss_p2_sum += l2;

            if (i + 1) % cfg.log_interval.max(1) == 0 {
                let step = StepMetrics {
                    epoch,
                    batch:   i,
                    step:    (epoch * n_batches + i) * batch_size,
                    loss_p1: l1,
                    loss_p2: l2,
                    p1_acc:  p1_correct as f64 / total as f64,
                    p2_acc:  p2_correct as f64 / total as f64,
                };
                pb.suspend(|| {
                    tracing::info!(
                        "Epoch {} {:.1}%, loss_p1: {:.3}, loss_p2: {:.3}",
                        epoch, 100.0 * i as f64 / n_batches as f64, l1, l2
                    );
                    tracing::info!(
                        "p1 acc: {:.3}% ({}/{}), p2 acc: {:.3}% ({}/{})",
                        100.0 * step.p1_acc, p1_correct, total,
                        100.0 * step.p2_acc, p2_correct, total
                    );
                    if tracing::enabled!(tracing::Level::DEBUG) {
                        log_summaries(&summarize_params(&model.valid()));
                    }
                });
                metrics.log_step(&step)?;
            }

            // Backward pass + Adam update; the frozen embedding has no gradient
            let grads = (loss_p1 + loss_p2).backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optim.step(cfg.lr, model, grads);
            ema.update_module(&model.valid());

            if (i + 1) % cfg.snapshot_interval.max(1) == 0 {
                ckpt.save_snapshot(&ema.apply(model.valid()))?;
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        // ── End of epoch ─────────────────────────────────────────────────────
        let ema_model = ema.apply(model.valid());
        ckpt.save_snapshot(&ema_model)?;
        ckpt.save_epoch_model(&ema_model, epoch + 1)?;

        let m = EpochMetrics::new(
            epoch,
            loss_p1_sum / n_batches as f64,
            loss_p2_sum / n_batches as f64,
            p1_correct as f64 / total as f64,
            p2_correct as f64 / total as f64,
        );
        tracing::info!("======== Epoch {} result ========", epoch);
        tracing::info!(
            "p1 acc: {:.3}, p2 acc: {:.3}",
            100.0 * m.p1_acc,
            100.0 * m.p2_acc
        );

        let is_best = best_acc.map_or(true, |best| m.is_improvement(best));
        if is_best {
            best_acc = Some(m.accuracy());
        }
        let state = TrainState { epoch: epoch + 1, best_acc: best_acc.unwrap_or(0.0) };
        ckpt.save_checkpoint(
            &CheckpointManager::epoch_checkpoint_name(epoch),
            &model,
            &optim,
            &ema_model,
            state,
            is_best,
        )?;
        metrics.log_epoch(&m)?;
        outcome.epochs.push(m);
    }

    outcome.best_acc = best_acc;
    tracing::info!("Training complete!");
    Ok(outcome)
}

fn resume<B, O>(
    cfg:       &TrainConfig,
    ckpt:      &CheckpointManager,
    fresh:     Bidaf<B>,
    new_optim: impl Fn() -> O,
    device:    &B::Device,
) -> Result<Start<B, O>>
where
    B: AutodiffBackend,
    O: Optimizer<Bidaf<B>, B>,
{
    let decay = cfg.ema_decay;
    let resume_path = Path::new(&cfg.resume);

    if CheckpointManager::has_checkpoint(resume_path) {
        tracing::info!("=> loading checkpoint '{}'", resume_path.display());
    }
    if let Some(r) = ckpt.load_checkpoint(resume_path, fresh.clone(), new_optim(), device)? {
        tracing::info!(
            "=> loaded checkpoint '{}' (epoch {})",
            resume_path.display(),
            r.state.epoch
        );
        return Ok(Start {
            ema:      Ema::from_module(decay, &r.ema_model),
            model:    r.model,
            optim:    r.optim,
            epoch:    r.state.epoch,
            best_acc: Some(r.state.best_acc),
        });
    }
    tracing::info!("=> no checkpoint found at '{}'", resume_path.display());

    let (model, epoch) = if let Some(n) = ckpt.latest_epoch_model()? {
        tracing::info!("Continuing from epoch model {}", n);
        (ckpt.load_epoch_model(fresh, n, device)?.freeze_word_embedding(), n)
    } else if ckpt.has_snapshot() {
        tracing::info!("Continuing from the latest snapshot");
        (ckpt.load_snapshot(fresh, device)?.freeze_word_embedding(), cfg.start_epoch)
    } else {
        (fresh, cfg.start_epoch)
    };

    Ok(Start {
        ema: Ema::from_module(decay, &model.valid()),
        model,
        optim: new_optim(),
        epoch,
        best_acc: None,
    })
}
