//! Population of policy parameter snapshots
//!
//! The population is a fixed-size collection of parameter snapshots, one
//! per member. Training rotates through members: each iteration one member
//! is checked out as the trainee, updated, and written back. Selection is
//! uniform and immediate repetition is allowed.

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::Rng;

use crate::policy::{ActorCritic, ParamSnapshot};

/// A fixed-size collection of independently initialized policies.
#[derive(Debug)]
pub struct Population {
    members: Vec<ParamSnapshot>,
    obs_dim: i64,
    action_dim: i64,
}

impl Population {
    /// Initialize `size` members from distinct parameter draws.
    ///
    /// Member `p` is drawn from `seed + p`, so the whole population is
    /// reproducible from a single seed and no two members share a draw.
    pub fn new(size: usize, obs_dim: i64, action_dim: i64, seed: i64) -> Result<Self> {
        ensure!(size >= 2, "population needs at least 2 members, got {size}");
        let members = (0..size)
            .map(|p| {
                let policy = ActorCritic::new(obs_dim, action_dim, seed + p as i64);
                ParamSnapshot::from_policy(&policy)
            })
            .collect();
        Ok(Self { members, obs_dim, action_dim })
    }

    /// Number of members
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// Observation dimensionality all members share
    pub fn obs_dim(&self) -> i64 {
        self.obs_dim
    }

    /// Action space size all members share
    pub fn action_dim(&self) -> i64 {
        self.action_dim
    }

    /// Pick the next trainee index uniformly at random.
    ///
    /// The same member may be picked twice in a row; nothing excludes the
    /// previous trainee.
    pub fn select_next_trainee(&self, rng: &mut StdRng) -> usize {
        rng.gen_range(0..self.members.len())
    }

    /// Deep-copy one member's parameters for training.
    pub fn checkout(&self, index: usize) -> ParamSnapshot {
        self.members[index].clone()
    }

    /// Borrow one member's snapshot without copying.
    pub fn member(&self, index: usize) -> &ParamSnapshot {
        &self.members[index]
    }

    /// Write updated parameters back into a member's slot.
    pub fn reinsert(&mut self, index: usize, snapshot: ParamSnapshot) {
        self.members[index] = snapshot;
    }
}

/// Indices of every member except the trainee, in ascending order.
pub fn other_indices(size: usize, trainee: usize) -> Vec<usize> {
    (0..size).filter(|&i| i != trainee).collect()
}
