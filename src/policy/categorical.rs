//! Batched categorical action distribution
//!
//! Holds one probability vector per batch row, extracted from the policy's
//! softmax output. Sampling draws from the caller's rng handle so action
//! selection is reproducible from the master seed.

use rand::rngs::StdRng;
use rand::Rng;

use crate::diversity;

/// A batch of categorical distributions over a discrete action space.
#[derive(Debug, Clone)]
pub struct Categorical {
    rows: Vec<Vec<f32>>,
}

impl Categorical {
    /// Build from one probability vector per batch row.
    pub fn new(rows: Vec<Vec<f32>>) -> Self {
        Self { rows }
    }

    /// Number of batch rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The full probability vectors, one per row
    pub fn probs(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Sample one action per row by inverse transform.
    pub fn sample(&self, rng: &mut StdRng) -> Vec<i64> {
        self.rows
            .iter()
            .map(|row| {
                let u: f32 = rng.gen();
                let mut acc = 0.0f32;
                for (i, &p) in row.iter().enumerate() {
                    acc += p;
                    if u < acc {
                        return i as i64;
                    }
                }
                // Float rounding can leave acc fractionally below 1.
                (row.len() - 1) as i64
            })
            .collect()
    }

    /// Log-probability of one action per row.
    pub fn log_prob(&self, actions: &[i64]) -> Vec<f32> {
        debug_assert_eq!(actions.len(), self.rows.len());
        self.rows
            .iter()
            .zip(actions.iter())
            .map(|(row, &a)| row[a as usize].ln())
            .collect()
    }

    /// Entropy of each row's distribution.
    pub fn entropy(&self) -> Vec<f32> {
        self.rows.iter().map(|row| diversity::entropy(row)).collect()
    }
}
