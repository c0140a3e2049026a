//! # Flat similarity index
//!
//! Stores every vector row-major in one buffer and answers queries by brute
//! force: squared Euclidean distance against every row. No partitioning, no
//! quantization. Persisted as JSON (`{"dimensions": N, "vectors": [...]}`).

use crate::error::{self, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatIndex {
    dimensions: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index for vectors of the given width
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }

    /// Vector width
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Number of stored vectors
    pub fn len(&self) -> usize {
        if self.dimensions == 0 {
            0
        } else {
            self.vectors.len() / self.dimensions
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vector at `position`
    pub fn get(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimensions)?;
        let end = start.checked_add(self.dimensions)?;
        self.vectors.get(start..end)
    }

    /// Append a vector; its position is the previous `len()`
    pub fn add(&mut self, vector: &[f32]) -> Result<usize> {
        if vector.len() != self.dimensions {
            return Err(Error::dimension_mismatch(self.dimensions, vector.len())
                .with_operation("index::add"));
        }
        let position = self.len();
        self.vectors.extend_from_slice(vector);
        Ok(position)
    }

    /// Drop the most recently added vector
    pub fn pop(&mut self) {
        let keep = self.vectors.len().saturating_sub(self.dimensions);
        self.vectors.truncate(keep);
    }

    /// Keep only the first `len` rows
    pub fn truncate(&mut self, len: usize) {
        self.vectors.truncate(len.saturating_mul(self.dimensions));
    }

    /// The `k` nearest rows as `(position, squared distance)`, closest first.
    ///
    /// Ties keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimensions {
            return Err(Error::dimension_mismatch(self.dimensions, query.len())
                .with_operation("index::search"));
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimensions)
            .enumerate()
            .map(|(position, row)| (position, squared_l2(query, row)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Read an index written by [`FlatIndex::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| error::io_error(path, e).with_operation("index::load"))?;
        let index: FlatIndex = serde_json::from_str(&content)
            .map_err(|e| error::serialization_error(path, e).with_operation("index::load"))?;

        if index.dimensions == 0 || index.vectors.len() % index.dimensions != 0 {
            return Err(Error::serialization_failed(format!(
                "{}: {} values do not divide into rows of {}",
                path.display(),
                index.vectors.len(),
                index.dimensions
            ))
            .with_operation("index::load"));
        }
        Ok(index)
    }

    /// Overwrite `path` with the whole index
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)
            .map_err(|e| error::serialization_error(path, e).with_operation("index::save"))?;
        std::fs::write(path, content)
            .map_err(|e| error::io_error(path, e).with_operation("index::save"))
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}
