// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The application layer loads datasets through this trait
// and never sees the JSON layout behind it. The processed
// SQuAD loader is the one implementation today.

use std::collections::BTreeSet;

use anyhow::Result;

use crate::domain::example::QaExample;

// ─── SplitStats ──────────────────────────────────────────────────────────────
/// Length statistics reported at start-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SplitStats {
    /// Longest flattened context, in words
    pub ctx_maxlen: usize,

    /// Longest single context sentence, in words
    pub ctx_sent_maxlen: usize,

    /// Longest query, in words
    pub query_maxlen: usize,
}

// ─── Split ───────────────────────────────────────────────────────────────────
/// Everything one dataset split contributes to a run:
/// its examples plus the tokens it nominates for the vocabularies.
#[derive(Debug, Clone, Default)]
pub struct Split {
    pub examples:        Vec<QaExample>,
    pub word_candidates: BTreeSet<String>,
    pub char_candidates: BTreeSet<String>,
    pub stats:           SplitStats,
}

impl Split {
    pub fn size(&self) -> usize {
        self.examples.len()
    }
}

// ─── ExampleSource ───────────────────────────────────────────────────────────
/// Any component that can produce a dataset split.
pub trait ExampleSource {
    fn load(&self) -> Result<Split>;
}
