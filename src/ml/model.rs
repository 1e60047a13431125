// ============================================================
// Layer 5 — BiDAF Model
// ============================================================
// The full network, bottom to top:
//
//   1. Word embedding     GloVe, frozen            [b, T, w_embd]
//   2. Char embedding     CharCnn                  [b, T, out_chs·k]
//   3. Highway            over [word; char]        [b, T, d]
//   4. Contextual layer   BiLSTM(d → d)            [b, T, 2d]
//   5. Attention flow     C2Q + Q2C                [b, T, 8d]
//   6. Modeling layer     2 × BiLSTM               [b, T, 2d]
//   7. Output layer       p1 from [G; M]
//                         p2 from [G; BiLSTM(M)]   [b, T]
//
// The query goes through layers 1-4 with the same weights
// as the context.
//
// Reference: Seo et al. (2017) Bidirectional Attention Flow
//            Burn Book §3 (Building Blocks)

use anyhow::{ensure, Result};
use burn::{
    module::Param,
    nn::{
        BiLstm, BiLstmConfig,
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::log_softmax,
};

use crate::data::glove::GloveMatrix;
use crate::ml::layers::{
    mask_scores, AttentionFlow, AttentionFlowConfig, CharCnn, CharCnnConfig, Highway,
    HighwayConfig,
};

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally — do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct BidafConfig {
    pub vocab_size_w: usize,
    pub vocab_size_c: usize,
    #[config(default = 100)]
    pub w_embd_size: usize,
    #[config(default = 8)]
    pub c_embd_size: usize,
    #[config(default = 100)]
    pub out_chs: usize,
    #[config(default = "vec![5]")]
    pub filter_widths: Vec<usize>,
    #[config(default = 2)]
    pub highway_layers: usize,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl BidafConfig {
    /// Width of one word after the highway layer
    pub fn d(&self) -> usize {
        self.w_embd_size + self.char_cnn().out_dim()
    }

    /// Widest character filter; batches pad words to at least this
    pub fn max_filter_width(&self) -> usize {
        self.filter_widths.iter().copied().max().unwrap_or(1)
    }

    fn char_cnn(&self) -> CharCnnConfig {
        CharCnnConfig::new(
            self.vocab_size_c,
            self.c_embd_size,
            self.out_chs,
            self.filter_widths.clone(),
        )
        .with_dropout(self.dropout)
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> Bidaf<B> {
        let d = self.d();
        let bilstm = |d_input: usize| BiLstmConfig::new(d_input, d, true).init(device);
        let scorer = || LinearConfig::new(10 * d, 1).with_bias(false).init(device);

        Bidaf {
            word_embedding: EmbeddingConfig::new(self.vocab_size_w, self.w_embd_size)
                .init(device)
                .no_grad(),
            char_cnn:   self.char_cnn().init(device),
            highway:    HighwayConfig::new(d)
                .with_num_layers(self.highway_layers)
                .init(device),
            contextual: bilstm(d),
            attention:  AttentionFlowConfig::new(2 * d).init(device),
            modeling:   vec![bilstm(8 * d), bilstm(2 * d)],
            p1_layer:   scorer(),
            p2_lstm:    bilstm(2 * d),
            p2_layer:   scorer(),
            dropout:    DropoutConfig::new(self.dropout).init(),
        }
    }
}

#[derive(Module, Debug)]
pub struct Bidaf<B: Backend> {
    pub word_embedding: Embedding<B>,
    pub char_cnn:       CharCnn<B>,
    pub highway:        Highway<B>,
    pub contextual:     BiLstm<B>,
    pub attention:      AttentionFlow<B>,
    pub modeling:       Vec<BiLstm<B>>,
    pub p1_layer:       Linear<B>,
    pub p2_lstm:        BiLstm<B>,
    pub p2_layer:       Linear<B>,
    pub dropout:        Dropout,
}

pub struct BidafOutput<B: Backend> {
    /// Start distribution over context words — [batch, T]
    pub p1: Tensor<B, 2>,
    /// End distribution over context words — [batch, T]
    pub p2: Tensor<B, 2>,
    pub log_p1: Tensor<B, 2>,
    pub log_p2: Tensor<B, 2>,
    /// [batch, T, J]
    pub similarity: Tensor<B, 3>,
    /// [batch, T, J]
    pub c2q: Tensor<B, 3>,
    /// [batch, T]
    pub q2c: Tensor<B, 2>,
}

impl<B: Backend> Bidaf<B> {
    /// Replace the word embedding with pretrained vectors. The
    /// embedding stays frozen: the optimiser never sees it.
    pub fn with_pretrained_word_embedding(mut self, glove: &GloveMatrix) -> Result<Self> {
        let [rows, dim] = self.word_embedding.weight.dims();
        ensure!(
            glove.rows == rows && glove.dim == dim,
            "GloVe matrix is {}x{} but the word embedding is {}x{}",
            glove.rows, glove.dim, rows, dim
        );

        let device = self.word_embedding.weight.device();
        let weight = Tensor::<B, 1>::from_floats(glove.values.as_slice(), &device)
            .reshape([rows, dim]);
        self.word_embedding.weight = Param::from_tensor(weight);
        Ok(self.freeze_word_embedding())
    }

    /// Loading a record restores the embedding values; call this
    /// afterwards so they stay out of the gradient.
    pub fn freeze_word_embedding(mut self) -> Self {
        self.word_embedding = self.word_embedding.no_grad();
        self
    }

    /// Embedding and contextual layers, shared by context and query.
    /// words: [b, L], chars: [b, L, W] → [b, L, 2d]
    fn encode(&self, words: Tensor<B, 2, Int>, chars: Tensor<B, 3, Int>) -> Tensor<B, 3> {
        let word = self.word_embedding.forward(words);
        let char = self.char_cnn.forward(chars);
        let x = self.highway.forward(Tensor::cat(vec![word, char], 2));
        let (h, _) = self.contextual.forward(self.dropout.forward(x), None);
        h
    }

    /// context: [b, T], context_chars: [b, T, W]
    /// query:   [b, J], query_chars:   [b, J, W']
    pub fn forward(
        &self,
        context:       Tensor<B, 2, Int>,
        context_chars: Tensor<B, 3, Int>,
        query:         Tensor<B, 2, Int>,
        query_chars:   Tensor<B, 3, Int>,
    ) -> BidafOutput<B> {
        let [batch, t_len] = context.dims();

        // 1.0 where the id is -NULL-
        let context_pad = context.clone().equal_elem(0).float();
        let query_pad   = query.clone().equal_elem(0).float();

        let h = self.encode(context, context_chars); // [b, T, 2d]
        let u = self.encode(query, query_chars);     // [b, J, 2d]

        let attn = self.attention.forward(h, u, context_pad.clone(), query_pad);
        let g = attn.g;

        let m = self
            .modeling
            .iter()
            .fold(g.clone(), |x, lstm| lstm.forward(self.dropout.forward(x), None).0);

        let span_scores = |layer: &Linear<B>, rhs: Tensor<B, 3>| {
            let gm = self.dropout.forward(Tensor::cat(vec![g.clone(), rhs], 2));
            let scores = layer.forward(gm).reshape([batch, t_len]);
            log_softmax(mask_scores(scores, context_pad.clone()), 1)
        };

        let log_p1 = span_scores(&self.p1_layer, m.clone());
        let (m2, _) = self.p2_lstm.forward(m, None);
        let log_p2 = span_scores(&self.p2_layer, m2);

        BidafOutput {
            p1: log_p1.clone().exp(),
            p2: log_p2.clone().exp(),
            log_p1,
            log_p2,
            similarity: attn.similarity,
            c2q: attn.c2q,
            q2c: attn.q2c,
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny_config() -> BidafConfig {
        BidafConfig::new(12, 9)
            .with_w_embd_size(4)
            .with_c_embd_size(3)
            .with_out_chs(4)
            .with_filter_widths(vec![2])
            .with_dropout(0.0)
    }

    fn ids2(values: &[i32], shape: [usize; 2]) -> Tensor<TestBackend, 2, Int> {
        Tensor::<TestBackend, 1, Int>::from_ints(values, &Default::default()).reshape(shape)
    }

    /// Every word spelled as `width` copies of its own id
    fn chars(values: &[i32], shape: [usize; 2], width: usize) -> Tensor<TestBackend, 3, Int> {
        let spelled: Vec<i32> = values
            .iter()
            .flat_map(|&v| std::iter::repeat(v).take(width))
            .collect();
        Tensor::<TestBackend, 1, Int>::from_ints(spelled.as_slice(), &Default::default())
            .reshape([shape[0], shape[1], width])
    }

    fn floats<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().convert::<f32>().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_hidden_size() {
        let cfg = tiny_config();
        assert_eq!(cfg.d(), 8);
        assert_eq!(cfg.max_filter_width(), 2);
        assert_eq!(BidafConfig::new(10, 10).d(), 200);
    }

    #[test]
    fn test_forward_shapes_and_distributions() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);

        // Second context ends in two padding words
        let ctx_ids   = [3, 4, 5, 6, 7, 8, 8, 7, 0, 0];
        let query_ids = [3, 4, 5, 6, 7, 0];

        let out = model.forward(
            ids2(&ctx_ids, [2, 5]),
            chars(&ctx_ids, [2, 5], 3),
            ids2(&query_ids, [2, 3]),
            chars(&query_ids, [2, 3], 3),
        );
        assert_eq!(out.p1.dims(), [2, 5]);
        assert_eq!(out.p2.dims(), [2, 5]);
        assert_eq!(out.similarity.dims(), [2, 5, 3]);
        assert_eq!(out.q2c.dims(), [2, 5]);

        for p in [floats(out.p1), floats(out.p2)] {
            for row in p.chunks(5) {
                assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-4);
            }
            assert!(p[8] < 1e-6 && p[9] < 1e-6, "padding got probability");
        }
    }

    #[test]
    fn test_pretrained_embedding_is_copied() {
        let device = Default::default();
        let cfg = tiny_config();
        let mut glove = GloveMatrix::zeros(12, 4);
        glove.values[4..8].copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        let model = cfg
            .init::<TestBackend>(&device)
            .with_pretrained_word_embedding(&glove)
            .unwrap();
        let weight = floats(model.word_embedding.weight.val());
        assert_eq!(&weight[4..8], &[1.0, 2.0, 3.0, 4.0]);
        assert!(weight[..4].iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_pretrained_embedding_shape_mismatch() {
        let device = Default::default();
        let model = tiny_config().init::<TestBackend>(&device);
        assert!(model.with_pretrained_word_embedding(&GloveMatrix::zeros(12, 5)).is_err());
    }
}
