// ============================================================
// Layer 4 — BiDAF Batcher
// ============================================================
// Implements Burn's Batcher trait to turn a Vec<QaSample>
// into padded tensors.
//
// Samples arrive unpadded, so every batch is padded to its OWN
// maxima rather than a global one:
//   T  = longest context in the batch
//   J  = longest query in the batch
//   W  = longest context word, in characters
//   W' = longest query word, in characters
//
// Character widths are raised to at least `min_word_len`
// because the char CNN cannot slide a width-5 filter over a
// 3-character word.
//
// Padding id is 0 (-NULL-) everywhere, which is also what the
// model uses to build its masks.
//
// Reference: Burn Book §4 (Batcher)

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::QaSample;
use crate::domain::vocab::NULL_ID;

// ─── BidafBatch ───────────────────────────────────────────────────────────────
/// A padded batch ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct BidafBatch<B: Backend> {
    /// Context word ids — shape: [batch, T]
    pub context: Tensor<B, 2, Int>,

    /// Context character ids — shape: [batch, T, W]
    pub context_chars: Tensor<B, 3, Int>,

    /// Query word ids — shape: [batch, J]
    pub query: Tensor<B, 2, Int>,

    /// Query character ids — shape: [batch, J, W']
    pub query_chars: Tensor<B, 3, Int>,

    /// Index of the first answer word — shape: [batch]
    pub answer_start: Tensor<B, 1, Int>,

    /// Index of the last answer word (inclusive) — shape: [batch]
    pub answer_end: Tensor<B, 1, Int>,
}

impl<B: Backend> BidafBatch<B> {
    pub fn size(&self) -> usize {
        self.context.dims()[0]
    }
}

// ─── BidafBatcher ─────────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct BidafBatcher {
    /// Lower bound for the character dimension (the widest CNN filter)
    min_word_len: usize,
}

impl BidafBatcher {
    pub fn new(min_word_len: usize) -> Self {
        Self { min_word_len }
    }
}

impl<B: Backend> Batcher<B, QaSample, BidafBatch<B>> for BidafBatcher {
    fn batch(&self, items: Vec<QaSample>, device: &B::Device) -> BidafBatch<B> {
        let batch_size = items.len();

        let ctx_len   = max_len(items.iter().map(|s| s.context.len()));
        let query_len = max_len(items.iter().map(|s| s.query.len()));
        let ctx_word_len = max_len(
            items.iter().flat_map(|s| s.context_chars.iter().map(Vec::len)),
        ).max(self.min_word_len);
        let query_word_len = max_len(
            items.iter().flat_map(|s| s.query_chars.iter().map(Vec::len)),
        ).max(self.min_word_len);

        let mut context       = Vec::with_capacity(batch_size * ctx_len);
        let mut context_chars = Vec::with_capacity(batch_size * ctx_len * ctx_word_len);
        let mut query         = Vec::with_capacity(batch_size * query_len);
        let mut query_chars   = Vec::with_capacity(batch_size * query_len * query_word_len);

        for s in &items {
            pad_words(&mut context, &s.context, ctx_len);
            pad_chars(&mut context_chars, &s.context_chars, ctx_len, ctx_word_len);
            pad_words(&mut query, &s.query, query_len);
            pad_chars(&mut query_chars, &s.query_chars, query_len, query_word_len);
        }

        let starts: Vec<i32> = items.iter().map(|s| s.answer.start as i32).collect();
        let ends:   Vec<i32> = items.iter().map(|s| s.answer.last() as i32).collect();

        BidafBatch {
            context: Tensor::<B, 1, Int>::from_ints(context.as_slice(), device)
                .reshape([batch_size, ctx_len]),
            context_chars: Tensor::<B, 1, Int>::from_ints(context_chars.as_slice(), device)
                .reshape([batch_size, ctx_len, ctx_word_len]),
            query: Tensor::<B, 1, Int>::from_ints(query.as_slice(), device)
                .reshape([batch_size, query_len]),
            query_chars: Tensor::<B, 1, Int>::from_ints(query_chars.as_slice(), device)
                .reshape([batch_size, query_len, query_word_len]),
            answer_start: Tensor::<B, 1, Int>::from_ints(starts.as_slice(), device),
            answer_end:   Tensor::<B, 1, Int>::from_ints(ends.as_slice(), device),
        }
    }
}

/// Longest length, never below 1 so tensors keep a non-empty shape
fn max_len(lengths: impl Iterator<Item = usize>) -> usize {
    lengths.max().unwrap_or(0).max(1)
}

fn pad_words(out: &mut Vec<i32>, ids: &[u32], len: usize) {
    out.extend(ids.iter().take(len).map(|&id| id as i32));
    out.extend(std::iter::repeat(NULL_ID as i32).take(len - ids.len().min(len)));
}

fn pad_chars(out: &mut Vec<i32>, words: &[Vec<u32>], len: usize, word_len: usize) {
    for word in words.iter().take(len) {
        pad_words(out, word, word_len);
    }
    let missing = len - words.len().min(len);
    out.extend(std::iter::repeat(NULL_ID as i32).take(missing * word_len));
}
