//! Two-agent environment traits and implementations
//!
//! The trainer consumes environments only through the [`CoopEnv`]
//! `reset`/`step` contract: two named agents act simultaneously, rewards
//! and observations come back per agent, and `step` reports a separable
//! shaped-reward component alongside the raw task reward.

use anyhow::Result;
use rand::rngs::StdRng;

pub mod pool;
pub mod rendezvous;

/// Number of agents every cooperative environment drives.
pub const NUM_AGENTS: usize = 2;

/// Result of advancing a cooperative environment by one step.
#[derive(Debug, Clone)]
pub struct CoopStep {
    /// Next observation, one per agent
    pub obs: [Vec<f32>; NUM_AGENTS],

    /// Raw task reward, one per agent
    pub reward: [f32; NUM_AGENTS],

    /// Separable shaped-reward component, one per agent. Consumed by the
    /// collector before being folded into the total reward.
    pub shaped_reward: [f32; NUM_AGENTS],

    /// Whether the joint episode ended (terminal or time limit). Both
    /// agents share a single episode boundary.
    pub done: bool,
}

/// Core trait for two-agent cooperative environments.
///
/// All randomness is drawn from the caller-supplied rng handle so that a
/// fixed seed reproduces a run.
pub trait CoopEnv: Send {
    /// Reset the episode and return the initial observation per agent
    fn reset(&mut self, rng: &mut StdRng) -> [Vec<f32>; NUM_AGENTS];

    /// Advance one step with one action per agent
    fn step(&mut self, rng: &mut StdRng, actions: [i64; NUM_AGENTS]) -> Result<CoopStep>;

    /// Dimensionality of each agent's flattened observation
    fn obs_dim(&self) -> usize;

    /// Size of the discrete action space
    fn num_actions(&self) -> i64;
}
