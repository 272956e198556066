//! Fixed-capacity rollout buffer
//!
//! Stores `num_steps` records of `num_actors` rows each, where an actor is
//! one (agent, environment) pair. Rewards are stored already folded
//! (environment reward + annealed shaping + diversity bonus); the raw
//! components are kept alongside for diagnostics.

use anyhow::{ensure, Result};
use tch::Tensor;

use crate::buffer::gae;

/// One timestep of experience across all actors.
#[derive(Debug, Clone)]
pub struct StepRecord {
    /// Observation per actor
    pub obs: Vec<Vec<f32>>,
    /// Sampled action per actor
    pub actions: Vec<i64>,
    /// Trainee value estimate per actor
    pub values: Vec<f32>,
    /// Trainee log-probability of the sampled action per actor
    pub log_probs: Vec<f32>,
    /// Folded training reward per actor
    pub rewards: Vec<f32>,
    /// Raw environment reward per actor
    pub orig_rewards: Vec<f32>,
    /// Raw shaped reward per actor, before annealing
    pub shaped_rewards: Vec<f32>,
    /// Post-inclusion population negative log-probability per actor
    pub neg_logp_pop_new: Vec<f32>,
    /// Population-mix entropy delta per actor (diagnostic)
    pub entropy_deltas: Vec<f32>,
    /// Population negative log-probability delta per actor (diagnostic)
    pub neg_logp_deltas: Vec<f32>,
    /// Terminal flag per actor (1.0 when the episode ended on this step)
    pub dones: Vec<f32>,
}

/// Flattened rollout ready for the optimizer, `[num_steps * num_actors]`
/// rows in step-major order.
#[derive(Debug)]
pub struct TrainBatch {
    /// Observations, `[n, obs_dim]`
    pub obs: Tensor,
    /// Actions, `[n]`, int64
    pub actions: Tensor,
    /// Behavior log-probabilities, `[n]`
    pub log_probs: Tensor,
    /// Advantages, `[n]`
    pub advantages: Tensor,
    /// Value targets, `[n]`
    pub targets: Tensor,
    /// Value estimates recorded at collection time, `[n]`
    pub values: Tensor,
}

impl TrainBatch {
    /// Number of rows
    pub fn len(&self) -> i64 {
        self.actions.size()[0]
    }

    /// Whether the batch is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Experience storage for one rollout pass.
#[derive(Debug)]
pub struct RolloutBuffer {
    num_steps: usize,
    num_actors: usize,
    obs_dim: usize,

    steps: Vec<StepRecord>,
    advantages: Vec<Vec<f32>>,
    targets: Vec<Vec<f32>>,
}

impl RolloutBuffer {
    /// Create an empty buffer with fixed capacity.
    pub fn new(num_steps: usize, num_actors: usize, obs_dim: usize) -> Self {
        Self {
            num_steps,
            num_actors,
            obs_dim,
            steps: Vec::with_capacity(num_steps),
            advantages: Vec::new(),
            targets: Vec::new(),
        }
    }

    /// Number of steps stored so far
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps have been stored
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Whether the buffer holds `num_steps` records
    pub fn is_full(&self) -> bool {
        self.steps.len() == self.num_steps
    }

    /// Clear all stored experience for the next rollout pass.
    pub fn reset(&mut self) {
        self.steps.clear();
        self.advantages.clear();
        self.targets.clear();
    }

    /// Append one timestep of experience.
    pub fn push(&mut self, record: StepRecord) -> Result<()> {
        ensure!(!self.is_full(), "rollout buffer is full ({} steps)", self.num_steps);
        ensure!(
            record.actions.len() == self.num_actors,
            "expected {} actor rows, got {}",
            self.num_actors,
            record.actions.len()
        );
        ensure!(
            record.obs.iter().all(|row| row.len() == self.obs_dim),
            "observation rows must have {} features",
            self.obs_dim
        );
        debug_assert_eq!(record.values.len(), self.num_actors);
        debug_assert_eq!(record.rewards.len(), self.num_actors);
        debug_assert_eq!(record.dones.len(), self.num_actors);
        self.steps.push(record);
        Ok(())
    }

    /// Run advantage estimation over the stored rollout.
    ///
    /// `bootstrap` is one value estimate per actor for the observation
    /// after the final stored step.
    pub fn compute_advantages(
        &mut self,
        bootstrap: &[f32],
        gamma: f32,
        gae_lambda: f32,
    ) -> Result<()> {
        ensure!(self.is_full(), "rollout incomplete: {}/{} steps", self.len(), self.num_steps);
        ensure!(
            bootstrap.len() == self.num_actors,
            "expected {} bootstrap values, got {}",
            self.num_actors,
            bootstrap.len()
        );

        let rewards: Vec<Vec<f32>> = self.steps.iter().map(|s| s.rewards.clone()).collect();
        let values: Vec<Vec<f32>> = self.steps.iter().map(|s| s.values.clone()).collect();
        let dones: Vec<Vec<f32>> = self.steps.iter().map(|s| s.dones.clone()).collect();

        let (adv, targets) = gae::advantages(&rewards, &values, &dones, bootstrap, gamma, gae_lambda);
        self.advantages = adv;
        self.targets = targets;
        Ok(())
    }

    /// Flatten the rollout into optimizer-ready tensors.
    ///
    /// Requires [`RolloutBuffer::compute_advantages`] to have run.
    pub fn batch(&self) -> Result<TrainBatch> {
        ensure!(
            self.advantages.len() == self.num_steps,
            "advantages not computed for this rollout"
        );

        let n = self.num_steps * self.num_actors;
        let mut obs = Vec::with_capacity(n * self.obs_dim);
        let mut actions = Vec::with_capacity(n);
        let mut log_probs = Vec::with_capacity(n);
        let mut advantages = Vec::with_capacity(n);
        let mut targets = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);

        for (t, step) in self.steps.iter().enumerate() {
            for a in 0..self.num_actors {
                obs.extend_from_slice(&step.obs[a]);
                actions.push(step.actions[a]);
                log_probs.push(step.log_probs[a]);
                advantages.push(self.advantages[t][a]);
                targets.push(self.targets[t][a]);
                values.push(step.values[a]);
            }
        }

        Ok(TrainBatch {
            obs: Tensor::from_slice(&obs).view([n as i64, self.obs_dim as i64]),
            actions: Tensor::from_slice(&actions),
            log_probs: Tensor::from_slice(&log_probs),
            advantages: Tensor::from_slice(&advantages),
            targets: Tensor::from_slice(&targets),
            values: Tensor::from_slice(&values),
        })
    }

    /// Mean over all stored rows of a per-actor field.
    pub fn mean_of<F>(&self, field: F) -> f64
    where
        F: Fn(&StepRecord) -> &[f32],
    {
        let mut total = 0.0f64;
        let mut count = 0usize;
        for step in &self.steps {
            for &v in field(step) {
                total += v as f64;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }

    /// Sum over all stored rows of a per-actor field, divided by the number
    /// of environments the rows came from.
    pub fn sum_per_env<F>(&self, field: F, num_envs: usize) -> f64
    where
        F: Fn(&StepRecord) -> &[f32],
    {
        let mut total = 0.0f64;
        for step in &self.steps {
            for &v in field(step) {
                total += v as f64;
            }
        }
        total / num_envs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(num_actors: usize, obs_dim: usize, reward: f32, done: f32) -> StepRecord {
        StepRecord {
            obs: vec![vec![0.5; obs_dim]; num_actors],
            actions: vec![1; num_actors],
            values: vec![0.0; num_actors],
            log_probs: vec![-1.0; num_actors],
            rewards: vec![reward; num_actors],
            orig_rewards: vec![reward; num_actors],
            shaped_rewards: vec![0.0; num_actors],
            neg_logp_pop_new: vec![1.5; num_actors],
            entropy_deltas: vec![0.0; num_actors],
            neg_logp_deltas: vec![0.0; num_actors],
            dones: vec![done; num_actors],
        }
    }

    #[test]
    fn test_push_until_full() {
        let mut buf = RolloutBuffer::new(4, 2, 3);
        for _ in 0..4 {
            buf.push(record(2, 3, 1.0, 0.0)).unwrap();
        }
        assert!(buf.is_full());
        assert!(buf.push(record(2, 3, 1.0, 0.0)).is_err());
    }

    #[test]
    fn test_push_rejects_wrong_width() {
        let mut buf = RolloutBuffer::new(4, 2, 3);
        assert!(buf.push(record(3, 3, 1.0, 0.0)).is_err());
        assert!(buf.push(record(2, 5, 1.0, 0.0)).is_err());
    }

    #[test]
    fn test_batch_requires_advantages() {
        let mut buf = RolloutBuffer::new(2, 2, 3);
        buf.push(record(2, 3, 1.0, 0.0)).unwrap();
        buf.push(record(2, 3, 1.0, 0.0)).unwrap();
        assert!(buf.batch().is_err());

        buf.compute_advantages(&[0.0, 0.0], 0.99, 0.95).unwrap();
        let batch = buf.batch().unwrap();
        assert_eq!(batch.obs.size(), vec![4, 3]);
        assert_eq!(batch.actions.size(), vec![4]);
        assert_eq!(batch.len(), 4);
    }

    #[test]
    fn test_advantages_require_full_buffer() {
        let mut buf = RolloutBuffer::new(3, 1, 2);
        buf.push(record(1, 2, 0.0, 0.0)).unwrap();
        assert!(buf.compute_advantages(&[0.0], 0.99, 0.95).is_err());
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut buf = RolloutBuffer::new(2, 1, 2);
        buf.push(record(1, 2, 1.0, 0.0)).unwrap();
        buf.push(record(1, 2, 1.0, 1.0)).unwrap();
        buf.compute_advantages(&[0.0], 0.99, 0.95).unwrap();

        buf.reset();
        assert!(buf.is_empty());
        buf.push(record(1, 2, 0.0, 0.0)).unwrap();
        assert!(buf.batch().is_err());
    }

    #[test]
    fn test_field_means() {
        let mut buf = RolloutBuffer::new(2, 2, 2);
        buf.push(record(2, 2, 1.0, 0.0)).unwrap();
        buf.push(record(2, 2, 3.0, 0.0)).unwrap();
        assert!((buf.mean_of(|s| &s.rewards) - 2.0).abs() < 1e-9);
        assert!((buf.mean_of(|s| &s.neg_logp_pop_new) - 1.5).abs() < 1e-9);
        // Total reward is 8 across 2 environments.
        assert!((buf.sum_per_env(|s| &s.rewards, 2) - 4.0).abs() < 1e-9);
    }
}
