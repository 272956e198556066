//! Actor-critic policy and parameter snapshots
//!
//! The trainer consumes the function approximator only through the
//! `init`/`apply` contract: initialization produces parameters, and
//! applying them to an observation batch yields a categorical action
//! distribution plus a scalar value estimate per row.

pub mod actor_critic;
pub mod categorical;
pub mod snapshot;

pub use actor_critic::ActorCritic;
pub use categorical::Categorical;
pub use snapshot::ParamSnapshot;
