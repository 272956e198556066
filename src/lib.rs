//! # mep-rl
//!
//! Maximum-entropy population training (MEP) for cooperative two-agent
//! grid worlds, built on independent PPO + tch-rs.
//!
//! A fixed-size population of actor-critic policies is trained one member
//! at a time. Each iteration the trainee collects vectorized rollouts
//! alongside the rest of the population, receives a diversity bonus for
//! actions that are surprising to the blended population, and is updated
//! with a clipped surrogate objective before being reinserted and a new
//! trainee is drawn. Continually retraining against a rotating, diversifying
//! population produces policies that generalize to unseen partners.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Experience buffer and advantage estimation
pub mod buffer;

/// Checkpoint persistence for population members
pub mod checkpoint;

/// Training configuration and validation
pub mod config;

/// Population-entropy diversity bonus
pub mod diversity;

/// Two-agent environment traits and implementations
pub mod env;

/// Per-iteration metrics emission
pub mod metrics;

/// Actor-critic policy and parameter snapshots
pub mod policy;

/// Population of parameter snapshots and trainee rotation
pub mod population;

/// Rollout collection, PPO update, and the trainer loop
pub mod train;

/// Current version of mep-rl
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
