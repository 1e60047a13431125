// ============================================================
// Layer 5 — Span Loss and Accuracy
// ============================================================
// The model already returns log-probabilities, so the loss is
// a plain negative log-likelihood:
//
//   NLL = -(1/B) Σ_i log p_i[label_i]
//
// Total loss per batch = NLL(p1, start) + NLL(p2, end)

use burn::prelude::*;

/// Mean negative log-likelihood of the labelled positions.
/// log_p: [batch, T], labels: [batch] → [1]
pub fn span_nll<B: Backend>(log_p: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    let [batch, _] = log_p.dims();
    log_p.gather(1, labels.reshape([batch, 1])).mean().neg()
}

/// Most probable position per row — [batch, T] → [batch]
pub fn predict_positions<B: Backend>(p: Tensor<B, 2>) -> Tensor<B, 1, Int> {
    let [batch, _] = p.dims();
    p.argmax(1).reshape([batch])
}

/// Number of rows whose argmax equals the label
pub fn count_correct<B: Backend>(p: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    predict_positions(p)
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}
