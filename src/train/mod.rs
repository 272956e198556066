//! Rollout collection, PPO optimization, and the trainer loop
//!
//! [`Trainer`] owns the whole iteration cycle: check out a trainee from
//! the population, collect a vectorized rollout with diversity-augmented
//! rewards, estimate advantages, run the clipped-surrogate update, write
//! the trainee back, and rotate to the next member.

pub mod rollout;
pub mod schedule;
pub mod trainer;
pub mod update;

pub use rollout::{RolloutCollector, RolloutReport};
pub use schedule::{shaping_coef, LrSchedule};
pub use trainer::Trainer;
pub use update::UpdateStats;
