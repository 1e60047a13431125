// ============================================================
// Layer 6 — Vocabulary Store
// ============================================================
// Building vocabularies and the GloVe matrix means reading
// both splits and a large text file. With `--use-cache` the
// result of the first run is reused:
//
//   cache/
//     w2i.json     ← word vocabulary
//     c2i.json     ← character vocabulary
//     glove.json   ← [words, w_embd] matrix, row-major
//
// The cache is only valid for the same data and embedding
// size; delete the directory after changing either.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::data::glove::GloveMatrix;
use crate::domain::vocab::Vocab;

const WORDS_FILE: &str = "w2i.json";
const CHARS_FILE: &str = "c2i.json";
const GLOVE_FILE: &str = "glove.json";

/// Everything derived from the corpus before training starts
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabularies {
    pub words: Vocab,
    pub chars: Vocab,
    pub glove: GloveMatrix,
}

pub struct VocabStore {
    dir: PathBuf,
}

impl VocabStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn exists(&self) -> bool {
        [WORDS_FILE, CHARS_FILE, GLOVE_FILE]
            .iter()
            .all(|f| self.dir.join(f).is_file())
    }

    /// Load the cache when present, otherwise run `build` and save
    /// its result.
    pub fn load_or_build(&self, build: impl FnOnce() -> Result<Vocabularies>) -> Result<Vocabularies> {
        if self.exists() {
            tracing::info!("Loading vocabularies from cache '{}'", self.dir.display());
            self.load()
        } else {
            let vocabs = build()?;
            self.save(&vocabs)?;
            Ok(vocabs)
        }
    }

    pub fn load(&self) -> Result<Vocabularies> {
        let words: Vocab = read_json(&self.dir.join(WORDS_FILE))?;
        let chars: Vocab = read_json(&self.dir.join(CHARS_FILE))?;
        let glove: GloveMatrix = read_json(&self.dir.join(GLOVE_FILE))?;
        Ok(Vocabularies { words, chars, glove })
    }

    pub fn save(&self, vocabs: &Vocabularies) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Cannot create cache dir '{}'", self.dir.display()))?;
        write_json(&self.dir.join(WORDS_FILE), &vocabs.words)?;
        write_json(&self.dir.join(CHARS_FILE), &vocabs.chars)?;
        write_json(&self.dir.join(GLOVE_FILE), &vocabs.glove)?;
        tracing::info!("Cached vocabularies in '{}'", self.dir.display());
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read '{}'", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed cache file '{}'", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    fs::write(path, serde_json::to_string(value)?)
        .with_context(|| format!("Cannot write '{}'", path.display()))
}
