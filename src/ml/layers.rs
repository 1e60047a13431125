// ============================================================
// Layer 5 — BiDAF Building Blocks
// ============================================================
// The three layers BiDAF adds on top of Burn's stock modules:
//
//   CharCnn       — character-level word embedding
//   Highway       — gated mixing of word + char features
//   AttentionFlow — context-to-query and query-to-context
//                   attention over a similarity matrix
//
// Reference: Seo et al. (2017) Bidirectional Attention Flow
//            Kim (2014) CNNs for sentence classification
//            Srivastava et al. (2015) Highway networks

use burn::{
    nn::{
        conv::{Conv2d, Conv2dConfig},
        Dropout, DropoutConfig,
        Embedding, EmbeddingConfig,
        Linear, LinearConfig,
    },
    prelude::*,
    tensor::activation::{relu, sigmoid, softmax},
};

/// Added to masked scores before a softmax. Finite so that a
/// fully masked row still produces numbers instead of NaN.
pub const MASK_VALUE: f32 = -1e30;

/// `scores + pad * MASK_VALUE`; `pad` is 1.0 on padding, 0.0 elsewhere
pub fn mask_scores<B: Backend, const D: usize>(scores: Tensor<B, D>, pad: Tensor<B, D>) -> Tensor<B, D> {
    scores + pad.mul_scalar(MASK_VALUE)
}

// ─── CharCnn ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct CharCnnConfig {
    pub vocab_size: usize,
    pub embd_size:  usize,
    pub out_chs:    usize,
    pub filter_widths: Vec<usize>,
    #[config(default = 0.2)]
    pub dropout: f64,
}

impl CharCnnConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CharCnn<B> {
        let convs = self
            .filter_widths
            .iter()
            .map(|&w| Conv2dConfig::new([1, self.out_chs], [self.embd_size, w]).init(device))
            .collect();
        CharCnn {
            embedding: EmbeddingConfig::new(self.vocab_size, self.embd_size).init(device),
            convs,
            dropout: DropoutConfig::new(self.dropout).init(),
        }
    }

    pub fn out_dim(&self) -> usize {
        self.out_chs * self.filter_widths.len()
    }
}

/// Embeds every word from its characters: each filter slides
/// across the word and the strongest response per channel wins.
#[derive(Module, Debug)]
pub struct CharCnn<B: Backend> {
    pub embedding: Embedding<B>,
    pub convs:     Vec<Conv2d<B>>,
    pub dropout:   Dropout,
}

impl<B: Backend> CharCnn<B> {
    /// chars: [batch, seq, word_len] → [batch, seq, out_chs * filters]
    pub fn forward(&self, chars: Tensor<B, 3, Int>) -> Tensor<B, 3> {
        let [batch, seq, word_len] = chars.dims();

        // [batch*seq, word_len, embd] → [batch*seq, 1, embd, word_len]
        let x = self.embedding.forward(chars.reshape([batch * seq, word_len]));
        let x = self.dropout.forward(x).swap_dims(1, 2).unsqueeze_dim::<4>(1);

        let features: Vec<Tensor<B, 2>> = self
            .convs
            .iter()
            .map(|conv| {
                // [batch*seq, out_chs, 1, word_len - width + 1]
                let y = relu(conv.forward(x.clone()));
                let [n, channels, _, _] = y.dims();
                y.max_dim(3).reshape([n, channels])
            })
            .collect();

        let out = Tensor::cat(features, 1);
        let out_dim = out.dims()[1];
        out.reshape([batch, seq, out_dim])
    }
}

// ─── Highway ──────────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct HighwayConfig {
    pub size: usize,
    #[config(default = 2)]
    pub num_layers: usize,
}

impl HighwayConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> Highway<B> {
        let linear = || LinearConfig::new(self.size, self.size).init(device);
        Highway {
            transforms: (0..self.num_layers).map(|_| linear()).collect(),
            gates:      (0..self.num_layers).map(|_| linear()).collect(),
        }
    }
}

/// x ← g ⊙ relu(W_h x) + (1 - g) ⊙ x, with g = σ(W_g x)
#[derive(Module, Debug)]
pub struct Highway<B: Backend> {
    pub transforms: Vec<Linear<B>>,
    pub gates:      Vec<Linear<B>>,
}

impl<B: Backend> Highway<B> {
    pub fn forward(&self, x: Tensor<B, 3>) -> Tensor<B, 3> {
        self.transforms
            .iter()
            .zip(&self.gates)
            .fold(x, |x, (transform, gate)| {
                let g = sigmoid(gate.forward(x.clone()));
                let h = relu(transform.forward(x.clone()));
                g.clone() * h + (g.neg() + 1.0) * x
            })
    }
}

// ─── AttentionFlow ────────────────────────────────────────────────────────────
#[derive(Config, Debug)]
pub struct AttentionFlowConfig {
    /// Width of the contextual embeddings (2d)
    pub size: usize,
}

impl AttentionFlowConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> AttentionFlow<B> {
        let scorer = || LinearConfig::new(self.size, 1).with_bias(false).init(device);
        AttentionFlow {
            w_context: scorer(),
            w_query:   scorer(),
            w_product: scorer(),
        }
    }
}

/// S_tj = w_h·h_t + w_u·u_j + w_hu·(h_t ⊙ u_j)
///
/// This is the single `w·[h; u; h⊙u]` projection of the paper
/// split into its three blocks, which avoids materialising the
/// [batch, T, J, 6d] concatenation.
#[derive(Module, Debug)]
pub struct AttentionFlow<B: Backend> {
    pub w_context: Linear<B>,
    pub w_query:   Linear<B>,
    pub w_product: Linear<B>,
}

pub struct AttentionFlowOutput<B: Backend> {
    /// Query-aware context representation G — [batch, T, 8d]
    pub g: Tensor<B, 3>,

    /// Similarity matrix S, query padding masked — [batch, T, J]
    pub similarity: Tensor<B, 3>,

    /// Context-to-query weights softmax_j(S) — [batch, T, J]
    pub c2q: Tensor<B, 3>,

    /// Query-to-context weights softmax_t(max_j S) — [batch, T]
    pub q2c: Tensor<B, 2>,
}

impl<B: Backend> AttentionFlow<B> {
    /// h: [batch, T, 2d], u: [batch, J, 2d]
    /// context_pad / query_pad: 1.0 at padding positions
    pub fn forward(
        &self,
        h:           Tensor<B, 3>,
        u:           Tensor<B, 3>,
        context_pad: Tensor<B, 2>,
        query_pad:   Tensor<B, 2>,
    ) -> AttentionFlowOutput<B> {
        let [batch, t_len, size] = h.dims();

        let s_context = self.w_context.forward(h.clone());                // [b, T, 1]
        let s_query   = self.w_query.forward(u.clone()).swap_dims(1, 2);  // [b, 1, J]
        let w_hu = self.w_product.weight.val().reshape([1, 1, size]);
        let s_product = (h.clone() * w_hu).matmul(u.clone().swap_dims(1, 2)); // [b, T, J]

        let similarity = mask_scores(
            s_product + s_context + s_query,
            query_pad.unsqueeze_dim::<3>(1),
        );

        // C2Q: which query words matter to each context word
        let c2q = softmax(similarity.clone(), 2);
        let u_tilde = c2q.clone().matmul(u); // [b, T, 2d]

        // Q2C: which context words matter most to any query word
        let q2c = softmax(
            mask_scores(similarity.clone().max_dim(2).reshape([batch, t_len]), context_pad),
            1,
        );
        let h_tilde = q2c.clone().unsqueeze_dim::<3>(1).matmul(h.clone()); // [b, 1, 2d]

        let g = Tensor::cat(
            vec![
                h.clone(),
                u_tilde.clone(),
                h.clone() * u_tilde,
                h * h_tilde,
            ],
            2,
        );

        AttentionFlowOutput { g, similarity, c2q, q2c }
    }
}
