//! Vectorized environment pool
//!
//! Advances `num_envs` independent instances in lockstep, one batched
//! operation per timestep. Instances are stepped in parallel with Rayon,
//! but time itself is strictly sequential; there is no cross-instance
//! ordering dependency within a step.
//!
//! Terminated instances auto-reset internally so that every collection
//! pass produces exactly `num_steps` valid transitions per instance.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::env::{CoopEnv, NUM_AGENTS};

/// Result of stepping one pool instance, after any auto-reset.
#[derive(Debug, Clone)]
pub struct PoolStep {
    /// Observation per agent. When the episode ended this is the first
    /// observation of the freshly reset episode.
    pub obs: [Vec<f32>; NUM_AGENTS],

    /// Raw task reward per agent from the step that just happened
    pub reward: [f32; NUM_AGENTS],

    /// Shaped-reward component per agent
    pub shaped_reward: [f32; NUM_AGENTS],

    /// Whether that step ended the episode
    pub done: bool,
}

/// A pool of cooperative environments advanced in lockstep.
///
/// Each instance owns its rng, seeded deterministically from the master
/// seed and the instance index, so pool behavior is reproducible
/// regardless of Rayon's scheduling.
pub struct EnvPool<E: CoopEnv> {
    envs: Vec<(E, StdRng)>,
}

impl<E: CoopEnv> EnvPool<E> {
    /// Create a pool of `num_envs` instances from a factory function.
    pub fn new<F>(env_fn: F, num_envs: usize, seed: u64) -> Self
    where
        F: Fn() -> E,
    {
        let envs = (0..num_envs)
            .map(|i| (env_fn(), StdRng::seed_from_u64(seed.wrapping_add(i as u64))))
            .collect();
        Self { envs }
    }

    /// Number of instances in the pool
    pub fn num_envs(&self) -> usize {
        self.envs.len()
    }

    /// Observation dimensionality, taken from the first instance
    pub fn obs_dim(&self) -> usize {
        self.envs[0].0.obs_dim()
    }

    /// Action space size, taken from the first instance
    pub fn num_actions(&self) -> i64 {
        self.envs[0].0.num_actions()
    }

    /// Reset every instance and return the initial observations.
    pub fn reset_all(&mut self) -> Vec<[Vec<f32>; NUM_AGENTS]> {
        self.envs
            .par_iter_mut()
            .map(|(env, rng)| env.reset(rng))
            .collect()
    }

    /// Step every instance with one action pair each.
    ///
    /// Instances whose episode ends are reset before returning, so the
    /// observation in the result is always valid for the next step.
    /// Environment errors are propagated; the pool never retries.
    pub fn step(&mut self, actions: &[[i64; NUM_AGENTS]]) -> Result<Vec<PoolStep>> {
        assert_eq!(
            actions.len(),
            self.envs.len(),
            "one action pair per environment instance"
        );

        self.envs
            .par_iter_mut()
            .zip(actions.par_iter())
            .map(|((env, rng), &action)| {
                let step = env.step(rng, action)?;
                let obs = if step.done { env.reset(rng) } else { step.obs };
                Ok(PoolStep {
                    obs,
                    reward: step.reward,
                    shaped_reward: step.shaped_reward,
                    done: step.done,
                })
            })
            .collect()
    }
}
