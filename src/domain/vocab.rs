// ============================================================
// Layer 3 — Vocabulary
// ============================================================
// Maps tokens (words or characters) to integer ids.
//
// Three ids are reserved before any real token:
//   0 → -NULL-  padding
//   1 → -UNK-   anything not in the vocabulary
//   2 → -ENT-   entity placeholder
//
// Real tokens are sorted and numbered from 3, so the same
// token set always produces the same ids across runs. This
// matters because the GloVe matrix rows and the saved model
// weights are both indexed by these ids.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

pub const NULL: &str = "-NULL-";
pub const UNK:  &str = "-UNK-";
pub const ENT:  &str = "-ENT-";

pub const NULL_ID: u32 = 0;
pub const UNK_ID:  u32 = 1;
pub const ENT_ID:  u32 = 2;

const FIRST_TOKEN_ID: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vocab {
    index: HashMap<String, u32>,
}

impl Vocab {
    /// Build a vocabulary from any collection of tokens.
    /// Duplicates are merged and the result is sorted before numbering.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sorted: BTreeSet<String> = tokens.into_iter().map(Into::into).collect();

        let mut index: HashMap<String, u32> = sorted
            .into_iter()
            .zip(FIRST_TOKEN_ID..)
            .collect();

        // Reserved tokens override anything the dataset happened to contain
        index.insert(NULL.to_string(), NULL_ID);
        index.insert(UNK.to_string(),  UNK_ID);
        index.insert(ENT.to_string(),  ENT_ID);

        Self { index }
    }

    /// Id of a token, falling back to -UNK-
    pub fn id(&self, token: &str) -> u32 {
        self.index.get(token).copied().unwrap_or(UNK_ID)
    }

    pub fn get(&self, token: &str) -> Option<u32> {
        self.index.get(token).copied()
    }

    /// Largest id + 1. Embedding tables need this many rows.
    pub fn len(&self) -> usize {
        self.index.values().max().map_or(0, |&m| m as usize + 1)
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_ids() {
        let v = Vocab::from_tokens(["b", "a"]);
        assert_eq!(v.id(NULL), 0);
        assert_eq!(v.id(UNK),  1);
        assert_eq!(v.id(ENT),  2);
    }

    #[test]
    fn test_tokens_sorted_from_three() {
        let v = Vocab::from_tokens(["paris", "eiffel", "tower", "eiffel"]);
        assert_eq!(v.id("eiffel"), 3);
        assert_eq!(v.id("paris"),  4);
        assert_eq!(v.id("tower"),  5);
        assert_eq!(v.len(), 6);
    }

    #[test]
    fn test_unknown_token_maps_to_unk() {
        let v = Vocab::from_tokens(["a"]);
        assert_eq!(v.id("zebra"), UNK_ID);
        assert_eq!(v.get("zebra"), None);
    }

    #[test]
    fn test_empty_vocab_still_has_reserved_rows() {
        let v = Vocab::from_tokens(Vec::<String>::new());
        assert_eq!(v.len(), 3);
    }
}
