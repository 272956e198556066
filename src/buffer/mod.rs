//! Rollout storage and advantage estimation
//!
//! Experience collected during a rollout pass is stored step-major with one
//! row per actor (agent, environment pair). After the pass completes,
//! generalized advantage estimation runs backwards over the stored
//! timesteps and the buffer flattens into tensors for the optimizer.

pub mod gae;
pub mod rollout;

pub use rollout::{RolloutBuffer, StepRecord, TrainBatch};
