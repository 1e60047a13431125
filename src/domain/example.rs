// ============================================================
// Layer 3 — QaExample Domain Type
// ============================================================
// One reading-comprehension question in domain terms:
//   - a context passage, already split into words
//   - the characters of every context word
//   - a query, split the same way
//   - the answer as a SPAN of word offsets into the context
//
// The model never generates text; it points at the answer
// inside the passage by predicting a start and an end word.
//
// Example:
//   Context: ["the", "eiffel", "tower", "is", "in", "paris"]
//   Query:   ["where", "is", "the", "tower", "?"]
//   Answer:  AnswerSpan { start: 5, end: 6 }  → "paris"
//
// Reference: Seo et al. (2017) Bidirectional Attention Flow
//            Rajpurkar et al. (2016) SQuAD

use serde::{Deserialize, Serialize};

/// Word offsets of an answer inside the flattened context.
/// `end` is exclusive, so a one-word answer at 5 is `5..6`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSpan {
    pub start: usize,
    pub end:   usize,
}

impl AnswerSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Index of the last answer word (the label for the end pointer)
    pub fn last(&self) -> usize {
        self.end.saturating_sub(1)
    }
}

/// A tokenised question with its context passage and gold span.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaExample {
    /// Question id from the dataset (index when the file has none)
    pub id: String,

    /// Lowercased context words
    pub context: Vec<String>,

    /// Characters of each context word, case preserved
    pub context_chars: Vec<Vec<String>>,

    /// Lowercased query words
    pub query: Vec<String>,

    /// Characters of each query word, case preserved
    pub query_chars: Vec<Vec<String>>,

    pub answer: AnswerSpan,
}

impl QaExample {
    /// The gold answer words, clamped to the context length
    pub fn answer_words(&self) -> &[String] {
        let end   = self.answer.end.min(self.context.len());
        let start = self.answer.start.min(end);
        &self.context[start..end]
    }
}
