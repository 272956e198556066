//! Training configuration and hyperparameters
//!
//! A single flat configuration struct covers the population curriculum,
//! the environment, PPO, and the logging/checkpoint side effects. All
//! batch-size arithmetic is checked up front by [`TrainConfig::validate`]
//! so that a misconfigured run aborts before any iteration executes.

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::env::rendezvous::Layout;
use crate::env::NUM_AGENTS;
use crate::metrics::LogMode;

/// Full training configuration.
///
/// Defaults mirror a small-scale run of the reference setup; they train
/// on the `cramped_room` layout with a population of two.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Metrics sink mode (`enabled`, `offline`, or `disabled`)
    pub mode: LogMode,

    /// Experiment grouping label, passed through to the metrics sink
    pub group: String,

    /// Checkpoint directory; `None` disables checkpointing entirely
    pub checkpoint_path: Option<String>,

    /// Checkpoint every N updates (iteration 0 is always skipped)
    pub checkpoint_freq: usize,

    /// Number of policies in the population
    pub population_size: usize,

    /// Coefficient on the population diversity bonus
    pub ent_pop_coeff: f32,

    /// Named environment layout
    pub layout_name: String,

    /// Env-steps over which the shaped-reward weight anneals from 1 to 0
    pub rew_shaping_horizon: u64,

    /// Master seed; a fixed seed reproduces a run
    pub seed: u64,

    /// Base learning rate
    pub lr: f64,

    /// Linearly anneal the learning rate to zero over the run
    pub anneal_lr: bool,

    /// Number of parallel environment instances
    pub num_envs: usize,

    /// Rollout horizon (timesteps per collection pass)
    pub num_steps: usize,

    /// Total environment-step budget for the run
    pub total_timesteps: u64,

    /// Optimization epochs per rollout
    pub update_epochs: usize,

    /// Minibatches per epoch; must divide the batch exactly
    pub num_minibatches: usize,

    /// Discount factor
    pub gamma: f32,

    /// GAE lambda
    pub gae_lambda: f32,

    /// PPO clipping parameter, shared by the policy and value objectives
    pub clip_eps: f64,

    /// Entropy bonus coefficient in the surrogate loss
    pub ent_coef: f64,

    /// Value loss coefficient
    pub vf_coef: f64,

    /// Global gradient-norm clip
    pub max_grad_norm: f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            mode: LogMode::Disabled,
            group: String::new(),
            checkpoint_path: Some("checkpoints".to_string()),
            checkpoint_freq: 100,
            population_size: 2,
            ent_pop_coeff: 0.01,
            layout_name: "cramped_room".to_string(),
            rew_shaping_horizon: 10_000_000,
            seed: 42,
            lr: 2.5e-4,
            anneal_lr: true,
            num_envs: 128,
            num_steps: 400,
            total_timesteps: 100_000_000,
            update_epochs: 4,
            num_minibatches: 4,
            gamma: 0.99,
            gae_lambda: 0.95,
            clip_eps: 0.2,
            ent_coef: 0.01,
            vf_coef: 0.5,
            max_grad_norm: 0.5,
        }
    }
}

impl TrainConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Total actors driven per timestep (two agents per environment)
    pub fn num_actors(&self) -> usize {
        NUM_AGENTS * self.num_envs
    }

    /// Number of training iterations in the run (floored)
    pub fn num_updates(&self) -> usize {
        (self.total_timesteps / self.num_steps as u64 / self.num_envs as u64) as usize
    }

    /// Samples per minibatch
    pub fn minibatch_size(&self) -> usize {
        self.num_actors() * self.num_steps / self.num_minibatches
    }

    /// Validate the configuration.
    ///
    /// Called once before training starts; any error here is fatal and
    /// unrecoverable mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.population_size == 0 {
            return Err(anyhow!("population_size must be positive"));
        }
        if self.num_envs == 0 {
            return Err(anyhow!("num_envs must be positive"));
        }
        if self.num_steps == 0 {
            return Err(anyhow!("num_steps must be positive"));
        }
        if self.update_epochs == 0 {
            return Err(anyhow!("update_epochs must be positive"));
        }
        if self.num_minibatches == 0 {
            return Err(anyhow!("num_minibatches must be positive"));
        }
        if self.minibatch_size() * self.num_minibatches != self.num_steps * self.num_actors() {
            return Err(anyhow!(
                "batch size must be equal to number of steps * number of actors: \
                 {} minibatches of {} != {} steps * {} actors",
                self.num_minibatches,
                self.minibatch_size(),
                self.num_steps,
                self.num_actors()
            ));
        }
        if self.num_updates() == 0 {
            return Err(anyhow!(
                "total_timesteps too small for even one update ({} steps * {} envs)",
                self.num_steps,
                self.num_envs
            ));
        }
        if self.lr <= 0.0 {
            return Err(anyhow!("lr must be positive"));
        }
        if !(0.0..=1.0).contains(&self.gamma) {
            return Err(anyhow!("gamma must be in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&self.gae_lambda) {
            return Err(anyhow!("gae_lambda must be in [0, 1]"));
        }
        if self.clip_eps <= 0.0 {
            return Err(anyhow!("clip_eps must be positive"));
        }
        if self.ent_coef < 0.0 {
            return Err(anyhow!("ent_coef must be non-negative"));
        }
        if self.vf_coef < 0.0 {
            return Err(anyhow!("vf_coef must be non-negative"));
        }
        if self.ent_pop_coeff < 0.0 {
            return Err(anyhow!("ent_pop_coeff must be non-negative"));
        }
        if self.max_grad_norm <= 0.0 {
            return Err(anyhow!("max_grad_norm must be positive"));
        }
        // Rejects unknown layout names before the environment is built.
        Layout::from_name(&self.layout_name)?;
        Ok(())
    }

    /// Set the layout name
    pub fn layout_name(mut self, name: &str) -> Self {
        self.layout_name = name.to_string();
        self
    }

    /// Set the population size
    pub fn population_size(mut self, size: usize) -> Self {
        self.population_size = size;
        self
    }

    /// Set the diversity bonus coefficient
    pub fn ent_pop_coeff(mut self, coeff: f32) -> Self {
        self.ent_pop_coeff = coeff;
        self
    }

    /// Set the master seed
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the number of parallel environments
    pub fn num_envs(mut self, n: usize) -> Self {
        self.num_envs = n;
        self
    }

    /// Set the rollout horizon
    pub fn num_steps(mut self, n: usize) -> Self {
        self.num_steps = n;
        self
    }

    /// Set the total timestep budget
    pub fn total_timesteps(mut self, n: u64) -> Self {
        self.total_timesteps = n;
        self
    }

    /// Set the number of optimization epochs
    pub fn update_epochs(mut self, n: usize) -> Self {
        self.update_epochs = n;
        self
    }

    /// Set the number of minibatches
    pub fn num_minibatches(mut self, n: usize) -> Self {
        self.num_minibatches = n;
        self
    }

    /// Set the learning rate
    pub fn lr(mut self, lr: f64) -> Self {
        self.lr = lr;
        self
    }

    /// Set the checkpoint directory (`None` disables checkpointing)
    pub fn checkpoint_path(mut self, path: Option<&str>) -> Self {
        self.checkpoint_path = path.map(|p| p.to_string());
        self
    }

    /// Set the checkpoint cadence
    pub fn checkpoint_freq(mut self, freq: usize) -> Self {
        self.checkpoint_freq = freq;
        self
    }
}
