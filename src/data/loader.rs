// ============================================================
// Layer 4 — Processed Dataset Loader
// ============================================================
// Reads a dataset split produced by the SQuAD preprocessing
// step. Each split is two JSON files:
//
//   data_{split}.json   — one entry per question
//     "q"   : query words                 [[word]]
//     "cq"  : query characters            [[[char]]]
//     "y"   : answers                     [[[[sent, word], [sent, word_end]]]]
//     "*x"  : paragraph reference         [[article, paragraph]]
//     "ids" : question ids (optional)
//
//   shared_{split}.json — the paragraphs the questions point at
//     "x"   : article → paragraph → sentence → word
//     "cx"  : same, one level deeper for characters
//     "lower_word_counter", "char_counter", "word2vec"
//           : optional statistics used to pick vocabulary tokens
//
// The loader flattens a paragraph's sentences into one context
// and converts the (sentence, word) answer pairs to flat word
// offsets. The answer end is exclusive.
//
// Reference: serde_json streaming from a BufReader
//            Rust Book §9 (Error Handling)

use std::{
    collections::{BTreeSet, HashMap},
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{de::DeserializeOwned, de::IgnoredAny, Deserialize};

use crate::domain::example::{AnswerSpan, QaExample};
use crate::domain::traits::{ExampleSource, Split, SplitStats};

/// Words seen more often than this join the vocabulary
pub const WORD_COUNT_THRESHOLD: usize = 10;

/// Characters seen more often than this join the vocabulary
pub const CHAR_COUNT_THRESHOLD: usize = 100;

// ─── Raw JSON layout ─────────────────────────────────────────────────────────
type Words      = Vec<String>;
type WordChars  = Vec<Vec<String>>;
type SpanPoints = [[usize; 2]; 2];

#[derive(Debug, Deserialize)]
struct RawData {
    q:  Vec<Words>,
    cq: Vec<WordChars>,
    y:  Vec<Vec<SpanPoints>>,
    #[serde(rename = "*x")]
    paragraph_refs: Vec<[usize; 2]>,
    #[serde(default)]
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawShared {
    x:  Vec<Vec<Vec<Words>>>,
    cx: Vec<Vec<Vec<WordChars>>>,
    #[serde(default)]
    lower_word_counter: HashMap<String, usize>,
    #[serde(default)]
    char_counter: HashMap<String, usize>,
    // Only the keys matter: a word with a pretrained vector is always kept
    #[serde(default)]
    word2vec: HashMap<String, IgnoredAny>,
}

// ─── ProcessedJsonLoader ─────────────────────────────────────────────────────
pub struct ProcessedJsonLoader {
    data_path:   PathBuf,
    shared_path: PathBuf,
}

impl ProcessedJsonLoader {
    pub fn new(data_path: impl Into<PathBuf>, shared_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path:   data_path.into(),
            shared_path: shared_path.into(),
        }
    }

    /// `{dir}/data_{split}.json` + `{dir}/shared_{split}.json`
    pub fn for_split(dir: impl AsRef<Path>, split: &str) -> Self {
        let dir = dir.as_ref();
        Self::new(
            dir.join(format!("data_{split}.json")),
            dir.join(format!("shared_{split}.json")),
        )
    }
}

impl ExampleSource for ProcessedJsonLoader {
    fn load(&self) -> Result<Split> {
        let data:   RawData   = read_json(&self.data_path)?;
        let shared: RawShared = read_json(&self.shared_path)?;

        let split = build_split(data, shared)?;
        tracing::info!(
            "Loaded {} questions from '{}'",
            split.size(),
            self.data_path.display()
        );
        Ok(split)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open dataset file '{}'", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Cannot parse dataset file '{}'", path.display()))
}

// ─── Split construction ──────────────────────────────────────────────────────
fn build_split(data: RawData, shared: RawShared) -> Result<Split> {
    let n = data.q.len();
    if n != data.cq.len() || n != data.paragraph_refs.len() || n != data.y.len() {
        bail!(
            "Inconsistent data file: {} queries, {} query spellings, {} answers, {} paragraph refs",
            n,
            data.cq.len(),
            data.y.len(),
            data.paragraph_refs.len()
        );
    }

    let mut examples = Vec::with_capacity(data.q.len());
    let mut stats    = SplitStats::default();

    for (i, (query, [article, paragraph])) in
        data.q.iter().zip(data.paragraph_refs.iter().copied()).enumerate()
    {
        let sentences = shared
            .x
            .get(article)
            .and_then(|a| a.get(paragraph))
            .with_context(|| {
                format!("Question {i} references missing paragraph [{article}, {paragraph}]")
            })?;
        let sentence_chars = shared
            .cx
            .get(article)
            .and_then(|a| a.get(paragraph))
            .with_context(|| {
                format!("Question {i} references missing characters [{article}, {paragraph}]")
            })?;

        // Offset of each sentence's first word in the flattened context
        let offsets: Vec<usize> = sentences
            .iter()
            .scan(0usize, |acc, s| {
                let start = *acc;
                *acc += s.len();
                Some(start)
            })
            .collect();

        let context: Vec<String> = sentences
            .iter()
            .flatten()
            .map(|w| w.to_lowercase())
            .collect();
        let context_chars: Vec<Vec<String>> = sentence_chars.iter().flatten().cloned().collect();

        // Only the first answer is used for training and evaluation
        let Some(&[[s0, w0], [s1, w1]]) = data.y[i].first() else {
            tracing::warn!("Skipping question {i}: no answer");
            continue;
        };
        let (Some(&o0), Some(&o1)) = (offsets.get(s0), offsets.get(s1)) else {
            tracing::warn!("Skipping question {i}: answer sentence out of range");
            continue;
        };
        let answer = AnswerSpan::new(o0 + w0, o1 + w1);
        if answer.start >= answer.end || answer.end > context.len() {
            tracing::warn!(
                "Skipping question {i}: span {}..{} does not fit a {}-word context",
                answer.start,
                answer.end,
                context.len()
            );
            continue;
        }

        stats.ctx_maxlen      = stats.ctx_maxlen.max(context.len());
        stats.ctx_sent_maxlen = stats
            .ctx_sent_maxlen
            .max(sentences.iter().map(Vec::len).max().unwrap_or(0));
        stats.query_maxlen    = stats.query_maxlen.max(query.len());

        examples.push(QaExample {
            id:    data.ids.get(i).cloned().unwrap_or_else(|| i.to_string()),
            context,
            context_chars,
            query: query.iter().map(|w| w.to_lowercase()).collect(),
            query_chars: data.cq[i].clone(),
            answer,
        });
    }

    let (word_candidates, char_candidates) = vocab_candidates(&shared, &examples);

    Ok(Split { examples, word_candidates, char_candidates, stats })
}

/// Pick the tokens this split contributes to the vocabularies.
///
/// Prefers the counters written by preprocessing; when a file
/// has none, they are recounted from the loaded examples.
fn vocab_candidates(
    shared:   &RawShared,
    examples: &[QaExample],
) -> (BTreeSet<String>, BTreeSet<String>) {
    let word_counter = if shared.lower_word_counter.is_empty() {
        count(examples.iter().flat_map(|e| e.context.iter().chain(e.query.iter())))
    } else {
        shared.lower_word_counter.clone()
    };
    let char_counter = if shared.char_counter.is_empty() {
        count(examples.iter().flat_map(|e| {
            e.context_chars.iter().chain(e.query_chars.iter()).flatten()
        }))
    } else {
        shared.char_counter.clone()
    };

    let words = word_counter
        .into_iter()
        .filter(|(w, n)| *n > WORD_COUNT_THRESHOLD || shared.word2vec.contains_key(w))
        .map(|(w, _)| w)
        .collect();
    let chars = char_counter
        .into_iter()
        .filter(|(_, n)| *n > CHAR_COUNT_THRESHOLD)
        .map(|(c, _)| c)
        .collect();

    (words, chars)
}

fn count<'a>(tokens: impl Iterator<Item = &'a String>) -> HashMap<String, usize> {
    let mut counter = HashMap::new();
    for t in tokens {
        *counter.entry(t.clone()).or_insert(0) += 1;
    }
    counter
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn chars_of(words: &[&str]) -> Vec<Vec<String>> {
        words
            .iter()
            .map(|w| w.chars().map(|c| c.to_string()).collect())
            .collect()
    }

    fn write_split(dir: &Path, data: serde_json::Value, shared: serde_json::Value) {
        fs::write(dir.join("data_dev.json"), data.to_string()).unwrap();
        fs::write(dir.join("shared_dev.json"), shared.to_string()).unwrap();
    }

    fn two_sentence_shared() -> serde_json::Value {
        let s1 = ["The", "Tower", "is", "tall", "."];
        let s2 = ["It", "is", "in", "Paris", "."];
        json!({
            "x":  [[[s1, s2]]],
            "cx": [[[chars_of(&s1), chars_of(&s2)]]],
            "lower_word_counter": { "paris": 11, "tower": 3, "the": 50 },
            "char_counter": { "a": 101, "z": 2 },
            "word2vec": { "tower": [0.1, 0.2] }
        })
    }

    #[test]
    fn test_flattens_sentences_and_offsets_answer() {
        let dir = tempfile::tempdir().unwrap();
        let q = ["Where", "is", "it", "?"];
        write_split(
            dir.path(),
            json!({
                "q":  [q],
                "cq": [chars_of(&q)],
                "y":  [[[[1, 3], [1, 4]]]],
                "*x": [[0, 0]],
                "ids": ["abc"]
            }),
            two_sentence_shared(),
        );

        let split = ProcessedJsonLoader::for_split(dir.path(), "dev").load().unwrap();
        assert_eq!(split.size(), 1);

        let ex = &split.examples[0];
        assert_eq!(ex.id, "abc");
        assert_eq!(ex.context.len(), 10);
        assert_eq!(ex.context[0], "the");
        assert_eq!(ex.query[0], "where");
        // "Paris" is word 3 of sentence 1 → flat offset 5 + 3
        assert_eq!(ex.answer, AnswerSpan::new(8, 9));
        assert_eq!(ex.answer_words(), ["paris"]);
        // Characters keep their case
        assert_eq!(ex.context_chars[0], ["T", "h", "e"]);

        assert_eq!(split.stats.ctx_maxlen, 10);
        assert_eq!(split.stats.ctx_sent_maxlen, 5);
        assert_eq!(split.stats.query_maxlen, 4);
    }

    #[test]
    fn test_vocab_candidates_use_counters_and_word2vec() {
        let dir = tempfile::tempdir().unwrap();
        let q = ["where", "?"];
        write_split(
            dir.path(),
            json!({
                "q":  [q],
                "cq": [chars_of(&q)],
                "y":  [[[[0, 0], [0, 1]]]],
                "*x": [[0, 0]]
            }),
            two_sentence_shared(),
        );

        let split = ProcessedJsonLoader::for_split(dir.path(), "dev").load().unwrap();
        let words: Vec<&str> = split.word_candidates.iter().map(String::as_str).collect();
        assert_eq!(words, ["paris", "the", "tower"]);
        let chars: Vec<&str> = split.char_candidates.iter().map(String::as_str).collect();
        assert_eq!(chars, ["a"]);
        // No ids in the file → positional id
        assert_eq!(split.examples[0].id, "0");
    }

    #[test]
    fn test_skips_span_outside_context() {
        let dir = tempfile::tempdir().unwrap();
        let q = ["why"];
        write_split(
            dir.path(),
            json!({
                "q":  [q, q],
                "cq": [chars_of(&q), chars_of(&q)],
                "y":  [[[[0, 0], [0, 2]]], [[[1, 4], [1, 9]]]],
                "*x": [[0, 0], [0, 0]]
            }),
            two_sentence_shared(),
        );

        let split = ProcessedJsonLoader::for_split(dir.path(), "dev").load().unwrap();
        assert_eq!(split.size(), 1);
    }

    #[test]
    fn test_missing_paragraph_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let q = ["why"];
        write_split(
            dir.path(),
            json!({
                "q":  [q],
                "cq": [chars_of(&q)],
                "y":  [[[[0, 0], [0, 1]]]],
                "*x": [[3, 0]]
            }),
            two_sentence_shared(),
        );

        assert!(ProcessedJsonLoader::for_split(dir.path(), "dev").load().is_err());
    }

    #[test]
    fn test_short_query_chars_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let q = ["why"];
        write_split(
            dir.path(),
            json!({
                "q":  [q, q],
                "cq": [chars_of(&q)],
                "y":  [[[[0, 0], [0, 1]]], [[[0, 0], [0, 1]]]],
                "*x": [[0, 0], [0, 0]]
            }),
            two_sentence_shared(),
        );

        let err = ProcessedJsonLoader::for_split(dir.path(), "dev").load().unwrap_err();
        assert!(format!("{err:#}").contains("1 query spellings"), "{err:#}");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProcessedJsonLoader::for_split(dir.path(), "train").load().unwrap_err();
        assert!(err.to_string().contains("data_train.json"));
    }
}
