// ============================================================
// Layer 4 — GloVe Word Vectors
// ============================================================
// Builds the pretrained word-embedding matrix from a GloVe
// text file (`glove.6B.{dim}d.txt`). Each line is
//
//   word v1 v2 ... v_dim
//
// Row i of the matrix is the vector of the word with vocab
// id i. Words GloVe does not know, and the reserved -NULL-,
// -UNK-, -ENT- rows, stay zero.
//
// The file is streamed line by line; only the vectors of
// vocabulary words are kept in memory.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::vocab::Vocab;

/// A dense `[rows, dim]` matrix in row-major order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GloveMatrix {
    pub rows:   usize,
    pub dim:    usize,
    pub values: Vec<f32>,
}

impl GloveMatrix {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self { rows, dim, values: vec![0.0; rows * dim] }
    }

    pub fn row(&self, i: usize) -> &[f32] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }
}

/// Path of the GloVe file for a given embedding size
pub fn glove_path(dir: impl AsRef<Path>, dim: usize) -> PathBuf {
    dir.as_ref().join(format!("glove.6B.{dim}d.txt"))
}

/// Load GloVe vectors for every word of `vocab`.
pub fn load_glove_weights(dir: impl AsRef<Path>, dim: usize, vocab: &Vocab) -> Result<GloveMatrix> {
    let path = glove_path(dir, dim);
    let file = File::open(&path)
        .with_context(|| format!("Cannot open GloVe file '{}'", path.display()))?;

    let mut matrix = GloveMatrix::zeros(vocab.len(), dim);
    let mut found  = 0usize;

    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        let mut fields = line.split_whitespace();
        let Some(word) = fields.next() else { continue };
        let Some(row) = vocab.get(word) else { continue };

        let vector: Vec<f32> = match fields.map(str::parse::<f32>).collect() {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("Skipping GloVe line {}: {}", line_no + 1, e);
                continue;
            }
        };
        if vector.len() != dim {
            tracing::warn!(
                "Skipping GloVe line {}: expected {} values, got {}",
                line_no + 1,
                dim,
                vector.len()
            );
            continue;
        }

        let start = row as usize * dim;
        matrix.values[start..start + dim].copy_from_slice(&vector);
        found += 1;
    }

    tracing::info!(
        "GloVe coverage: {}/{} words from '{}'",
        found,
        vocab.len(),
        path.display()
    );
    Ok(matrix)
}
