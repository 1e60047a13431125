use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::domain::example::{AnswerSpan, QaExample};
use crate::domain::vocab::Vocab;

/// One question with every token replaced by its vocabulary id.
/// Sequences are unpadded; the batcher pads per batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaSample {
    pub context:       Vec<u32>,
    pub context_chars: Vec<Vec<u32>>,
    pub query:         Vec<u32>,
    pub query_chars:   Vec<Vec<u32>>,
    pub answer:        AnswerSpan,
}

impl QaSample {
    pub fn encode(example: &QaExample, words: &Vocab, chars: &Vocab) -> Self {
        let ids = |ws: &[String]| -> Vec<u32> { ws.iter().map(|w| words.id(w)).collect() };
        let chids = |ws: &[Vec<String>]| -> Vec<Vec<u32>> {
            ws.iter()
                .map(|w| w.iter().map(|c| chars.id(c)).collect())
                .collect()
        };
        Self {
            context:       ids(&example.context),
            context_chars: chids(&example.context_chars),
            query:         ids(&example.query),
            query_chars:   chids(&example.query_chars),
            answer:        example.answer,
        }
    }
}

pub struct QaDataset {
    samples: Vec<QaSample>,
}

impl QaDataset {
    pub fn new(samples: Vec<QaSample>) -> Self { Self { samples } }

    pub fn encode(examples: &[QaExample], words: &Vocab, chars: &Vocab) -> Self {
        Self::new(
            examples
                .iter()
                .map(|e| QaSample::encode(e, words, chars))
                .collect(),
        )
    }

    pub fn sample_count(&self) -> usize { self.samples.len() }

    /// Group sample indices into batches of exactly `batch_size`.
    ///
    /// Consecutive samples share a batch and the incomplete tail is
    /// dropped. With an rng the order of whole batches is shuffled;
    /// their composition never changes.
    pub fn batches(&self, batch_size: usize, rng: Option<&mut StdRng>) -> Vec<Vec<usize>> {
        if batch_size == 0 {
            return Vec::new();
        }
        let mut batches: Vec<Vec<usize>> = (0..self.samples.len())
            .collect::<Vec<_>>()
            .chunks_exact(batch_size)
            .map(<[usize]>::to_vec)
            .collect();
        if let Some(rng) = rng {
            batches.shuffle(rng);
        }
        batches
    }

    /// Cloned samples for one batch of indices
    pub fn items(&self, indices: &[usize]) -> Vec<QaSample> {
        indices.iter().filter_map(|&i| self.get(i)).collect()
    }
}

impl Dataset<QaSample> for QaDataset {
    fn get(&self, index: usize) -> Option<QaSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn sample(n: usize) -> QaSample {
        QaSample {
            context:       vec![3; n + 1],
            context_chars: vec![vec![3]; n + 1],
            query:         vec![4],
            query_chars:   vec![vec![4]],
            answer:        AnswerSpan::new(0, 1),
        }
    }

    fn dataset(n: usize) -> QaDataset {
        QaDataset::new((0..n).map(sample).collect())
    }

    #[test]
    fn test_encode_maps_unknown_to_unk() {
        let words = Vocab::from_tokens(["paris"]);
        let chars = Vocab::from_tokens(["p"]);
        let ex = QaExample {
            id:            "0".into(),
            context:       vec!["paris".into(), "rome".into()],
            context_chars: vec![vec!["p".into()], vec!["r".into()]],
            query:         vec!["paris".into()],
            query_chars:   vec![vec!["p".into()]],
            answer:        AnswerSpan::new(0, 1),
        };
        let s = QaSample::encode(&ex, &words, &chars);
        assert_eq!(s.context, vec![3, 1]);
        assert_eq!(s.context_chars, vec![vec![3], vec![1]]);
        assert_eq!(s.query, vec![3]);
    }

    #[test]
    fn test_batches_drop_incomplete_tail() {
        let batches = dataset(10).batches(4, None);
        assert_eq!(batches, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
    }

    #[test]
    fn test_shuffle_keeps_batch_composition() {
        let ds = dataset(40);
        let mut rng = StdRng::seed_from_u64(1111);
        let mut shuffled = ds.batches(4, Some(&mut rng));
        assert_eq!(shuffled.len(), 10);
        shuffled.sort();
        assert_eq!(shuffled, ds.batches(4, None));
    }

    #[test]
    fn test_shuffle_is_seeded() {
        let ds = dataset(40);
        let a = ds.batches(4, Some(&mut StdRng::seed_from_u64(7)));
        let b = ds.batches(4, Some(&mut StdRng::seed_from_u64(7)));
        assert_eq!(a, b);
    }

    #[test]
    fn test_items_follow_indices() {
        let ds = dataset(5);
        let items = ds.items(&[3, 1]);
        assert_eq!(items[0].context.len(), 4);
        assert_eq!(items[1].context.len(), 2);
    }
}
