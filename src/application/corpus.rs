// ============================================================
// Layer 2 — Corpus Preparation
// ============================================================
// Shared by both use cases:
//
//   Step 1: Load the train and test splits       (Layer 4 - data)
//   Step 2: Merge their vocabulary candidates    (Layer 3 - domain)
//   Step 3: Load GloVe rows for the word vocab   (Layer 4 - data)
//
// Steps 2-3 are skipped when the vocabulary cache is used
// and already populated (Layer 6 - infra).
//
// Both splits feed the vocabulary, so `train` and `test`
// always agree on every word and character id.

use anyhow::Result;

use crate::application::train_use_case::DataConfig;
use crate::data::{glove::load_glove_weights, loader::ProcessedJsonLoader};
use crate::domain::{
    traits::{ExampleSource, Split},
    vocab::Vocab,
};
use crate::infra::vocab_store::{VocabStore, Vocabularies};
use crate::ml::model::BidafConfig;

pub struct Corpus {
    pub train:  Split,
    pub test:   Split,
    pub vocabs: Vocabularies,
}

impl Corpus {
    pub fn load(cfg: &DataConfig) -> Result<Self> {
        let train = ProcessedJsonLoader::for_split(&cfg.data_dir, "train").load()?;
        let test  = ProcessedJsonLoader::for_split(&cfg.data_dir, "test").load()?;

        let store = VocabStore::new(&cfg.cache_dir);
        let build = || build_vocabularies(cfg, &train, &test);
        let vocabs = if cfg.use_cache {
            store.load_or_build(build)?
        } else {
            let vocabs = build()?;
            store.save(&vocabs)?;
            vocabs
        };

        let corpus = Self { train, test, vocabs };
        corpus.log_stats();
        Ok(corpus)
    }

    /// Architecture for this corpus. Dropout and embedding sizes
    /// come from the caller's config.
    pub fn model_config(&self, cfg: &DataConfig) -> BidafConfig {
        BidafConfig::new(self.vocabs.words.len(), self.vocabs.chars.len())
            .with_w_embd_size(cfg.w_embd_size)
            .with_c_embd_size(cfg.c_embd_size)
            .with_out_chs(cfg.out_chs)
            .with_filter_widths(cfg.filter_widths.clone())
    }

    fn log_stats(&self) {
        let stats = self.train.stats;
        tracing::info!("n_train: {}", self.train.size());
        tracing::info!("n_test: {}", self.test.size());
        tracing::info!("ctx_maxlen: {}", stats.ctx_maxlen);
        tracing::info!("vocab_size_w: {}", self.vocabs.words.len());
        tracing::info!("vocab_size_c: {}", self.vocabs.chars.len());
        tracing::info!("ctx_sent_maxlen: {}", stats.ctx_sent_maxlen);
        tracing::info!("query_sent_maxlen: {}", stats.query_maxlen);
    }
}

fn build_vocabularies(cfg: &DataConfig, train: &Split, test: &Split) -> Result<Vocabularies> {
    let words = Vocab::from_tokens(
        train.word_candidates.iter().chain(&test.word_candidates).cloned(),
    );
    let chars = Vocab::from_tokens(
        train.char_candidates.iter().chain(&test.char_candidates).cloned(),
    );
    let glove = load_glove_weights(&cfg.glove_dir, cfg.w_embd_size, &words)?;
    Ok(Vocabularies { words, chars, glove })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::{fs, path::Path};

    /// One article, one paragraph, "paris is big ." with the answer "paris"
    fn write_split(dir: &Path, split: &str, extra_word: &str) {
        let words = json!([[[["paris", "is", extra_word, "."]]]]);
        let chars = json!([[[[["p"], ["i"], ["b"], ["."]]]]]);
        let data = json!({
            "q":  [["where", "?"]],
            "cq": [[["w"], ["?"]]],
            "y":  [[[[0, 0], [0, 1]]]],
            "*x": [[0, 0]],
        });
        let shared = json!({
            "x": words,
            "cx": chars,
            "lower_word_counter": { "paris": 20, "is": 20, extra_word: 20, ".": 3 },
            "char_counter": { "p": 200, "i": 5 },
        });
        fs::write(dir.join(format!("data_{split}.json")), data.to_string()).unwrap();
        fs::write(dir.join(format!("shared_{split}.json")), shared.to_string()).unwrap();
    }

    fn config(dir: &Path, use_cache: bool) -> DataConfig {
        DataConfig {
            data_dir:    dir.display().to_string(),
            glove_dir:   dir.display().to_string(),
            cache_dir:   dir.join("cache").display().to_string(),
            use_cache,
            w_embd_size: 2,
            ..DataConfig::default()
        }
    }

    #[test]
    fn test_vocabulary_spans_both_splits() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), "train", "big");
        write_split(dir.path(), "test", "huge");
        fs::write(dir.path().join("glove.6B.2d.txt"), "paris 1 2\n").unwrap();

        let corpus = Corpus::load(&config(dir.path(), false)).unwrap();
        assert_eq!(corpus.train.size(), 1);
        assert_eq!(corpus.test.size(), 1);

        let words = &corpus.vocabs.words;
        // big, huge, is, paris; "." is too rare
        assert_eq!(words.len(), 7);
        assert_eq!(words.id("big"), 3);
        assert_eq!(words.id("huge"), 4);
        assert_eq!(words.id("."), 1);
        assert_eq!(corpus.vocabs.chars.len(), 4);
        assert_eq!(corpus.vocabs.glove.row(words.id("paris") as usize), [1.0, 2.0]);

        let model_cfg = corpus.model_config(&config(dir.path(), false));
        assert_eq!(model_cfg.vocab_size_w, 7);
        assert_eq!(model_cfg.vocab_size_c, 4);
    }

    #[test]
    fn test_cache_skips_glove() {
        let dir = tempfile::tempdir().unwrap();
        write_split(dir.path(), "train", "big");
        write_split(dir.path(), "test", "big");
        let glove = dir.path().join("glove.6B.2d.txt");
        fs::write(&glove, "paris 1 2\n").unwrap();

        let first = Corpus::load(&config(dir.path(), true)).unwrap();
        fs::remove_file(&glove).unwrap();
        let second = Corpus::load(&config(dir.path(), true)).unwrap();
        assert_eq!(first.vocabs, second.vocabs);

        // Without the cache flag the GloVe file is required again
        assert!(Corpus::load(&config(dir.path(), false)).is_err());
    }
}
