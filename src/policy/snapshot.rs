//! Parameter snapshots
//!
//! A [`ParamSnapshot`] is a detached deep copy of a policy's parameters,
//! keyed by variable name. Snapshots are what the population stores and
//! what checkpoints persist; loading one back into a policy of the same
//! shape reproduces its outputs exactly.

use anyhow::{anyhow, Result};
use tch::Tensor;

use crate::policy::ActorCritic;

/// A named, detached copy of every parameter tensor of one policy.
pub struct ParamSnapshot {
    vars: Vec<(String, Tensor)>,
}

impl ParamSnapshot {
    /// Take a snapshot of a policy's current parameters.
    ///
    /// Variables are sorted by name so snapshot contents are deterministic.
    pub fn from_policy(policy: &ActorCritic) -> Self {
        let mut vars: Vec<(String, Tensor)> = policy
            .var_store()
            .variables()
            .iter()
            .map(|(name, t)| (name.clone(), t.detach().copy()))
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        Self { vars }
    }

    /// Copy this snapshot's values into a policy's parameters in place.
    ///
    /// The policy must have been built with the same architecture; a name
    /// mismatch is an error.
    pub fn load_into(&self, policy: &ActorCritic) -> Result<()> {
        let mut dst = policy.var_store().variables();
        if dst.len() != self.vars.len() {
            return Err(anyhow!(
                "parameter count mismatch: snapshot has {}, policy has {}",
                self.vars.len(),
                dst.len()
            ));
        }
        tch::no_grad(|| -> Result<()> {
            for (name, value) in &self.vars {
                let var = dst
                    .get_mut(name)
                    .ok_or_else(|| anyhow!("policy has no parameter named {name}"))?;
                var.copy_(value);
            }
            Ok(())
        })
    }

    /// Number of parameter tensors in the snapshot
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Whether the snapshot holds no tensors
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl Clone for ParamSnapshot {
    fn clone(&self) -> Self {
        Self {
            vars: self
                .vars
                .iter()
                .map(|(name, t)| (name.clone(), t.copy()))
                .collect(),
        }
    }
}

impl std::fmt::Debug for ParamSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParamSnapshot").field("tensors", &self.vars.len()).finish()
    }
}
