//! Actor-critic MLP for discrete actions
//!
//! Separate actor and critic trunks, two hidden layers of 64 with tanh
//! and orthogonal initialization (gain sqrt(2) for hidden layers, 0.01 for
//! the actor head, 1.0 for the critic head). The actor outputs action
//! logits, the critic a scalar value estimate.

use anyhow::{anyhow, Result};
use tch::{
    nn::{self, Init, Module, OptimizerConfig},
    Device, Kind, Tensor,
};

use crate::policy::Categorical;

const HIDDEN_DIM: i64 = 64;

/// Actor-critic policy over a discrete action space.
pub struct ActorCritic {
    vs: nn::VarStore,
    actor: nn::Sequential,
    critic: nn::Sequential,
    obs_dim: i64,
    action_dim: i64,
}

fn trunk(root: &nn::Path, obs_dim: i64, out_dim: i64, head_gain: f64) -> nn::Sequential {
    let hidden_cfg = nn::LinearConfig {
        ws_init: Init::Orthogonal { gain: 2.0_f64.sqrt() },
        ..Default::default()
    };
    let head_cfg = nn::LinearConfig {
        ws_init: Init::Orthogonal { gain: head_gain },
        ..Default::default()
    };

    nn::seq()
        .add(nn::linear(root / "fc1", obs_dim, HIDDEN_DIM, hidden_cfg))
        .add_fn(|x| x.tanh())
        .add(nn::linear(root / "fc2", HIDDEN_DIM, HIDDEN_DIM, hidden_cfg))
        .add_fn(|x| x.tanh())
        .add(nn::linear(root / "head", HIDDEN_DIM, out_dim, head_cfg))
}

impl ActorCritic {
    /// Create a policy with freshly drawn parameters.
    ///
    /// The draw is deterministic in `init_seed`; population members built
    /// from distinct seeds are independent random draws.
    pub fn new(obs_dim: i64, action_dim: i64, init_seed: i64) -> Self {
        tch::manual_seed(init_seed);
        let vs = nn::VarStore::new(Device::Cpu);
        let root = vs.root();

        let actor = trunk(&(&root / "actor"), obs_dim, action_dim, 0.01);
        let critic = trunk(&(&root / "critic"), obs_dim, 1, 1.0);

        Self { vs, actor, critic, obs_dim, action_dim }
    }

    /// Observation dimensionality this policy was built for
    pub fn obs_dim(&self) -> i64 {
        self.obs_dim
    }

    /// Action space size this policy was built for
    pub fn action_dim(&self) -> i64 {
        self.action_dim
    }

    /// Forward pass: action logits `[batch, action_dim]` and values `[batch]`.
    pub fn forward(&self, obs: &Tensor) -> (Tensor, Tensor) {
        let logits = self.actor.forward(obs);
        let values = self.critic.forward(obs).squeeze_dim(-1);
        (logits, values)
    }

    /// Convert observation rows to a `[batch, obs_dim]` tensor.
    pub fn obs_tensor(&self, rows: &[Vec<f32>]) -> Tensor {
        let mut flat = Vec::with_capacity(rows.len() * self.obs_dim as usize);
        for row in rows {
            flat.extend_from_slice(row);
        }
        Tensor::from_slice(&flat).view([rows.len() as i64, self.obs_dim])
    }

    /// Evaluate the policy on an observation batch without gradients.
    ///
    /// Returns the full categorical action distribution (probability
    /// vectors included, as the diversity scorer needs them) and the value
    /// estimate per row.
    pub fn apply(&self, rows: &[Vec<f32>]) -> Result<(Categorical, Vec<f32>)> {
        let obs = self.obs_tensor(rows);
        let (probs, values) = tch::no_grad(|| {
            let (logits, values) = self.forward(&obs);
            (logits.softmax(-1, Kind::Float), values)
        });

        let flat: Vec<f32> = Vec::try_from(probs.contiguous().view([-1]))
            .map_err(|e| anyhow!("extracting action probabilities: {e:?}"))?;
        let dim = self.action_dim as usize;
        let prob_rows = flat.chunks(dim).map(|c| c.to_vec()).collect();

        let values: Vec<f32> = Vec::try_from(values.contiguous().view([-1]))
            .map_err(|e| anyhow!("extracting value estimates: {e:?}"))?;

        Ok((Categorical::new(prob_rows), values))
    }

    /// Re-evaluate stored observations and actions with gradients enabled.
    ///
    /// Returns per-sample log-probabilities, per-sample entropies, and
    /// values, all `[batch]` tensors attached to the autograd graph.
    pub fn evaluate(&self, obs: &Tensor, actions: &Tensor) -> (Tensor, Tensor, Tensor) {
        let (logits, values) = self.forward(obs);
        let log_probs_all = logits.log_softmax(-1, Kind::Float);
        let probs = log_probs_all.exp();

        let action_log_probs = log_probs_all
            .gather(-1, &actions.unsqueeze(-1), false)
            .squeeze_dim(-1);
        let entropy = -(probs * log_probs_all).sum_dim_intlist(-1, false, Kind::Float);

        (action_log_probs, entropy, values)
    }

    /// Create an Adam optimizer over this policy's parameters.
    pub fn optimizer(&self, learning_rate: f64) -> Result<nn::Optimizer> {
        Ok(nn::Adam::default().build(&self.vs, learning_rate)?)
    }

    /// Variable store holding the parameters
    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    /// Save parameters to a file (safetensors via the variable store).
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        self.vs.save(path)?;
        Ok(())
    }

    /// Load parameters from a file saved by [`ActorCritic::save`].
    pub fn load<P: AsRef<std::path::Path>>(&mut self, path: P) -> Result<()> {
        self.vs.load(path)?;
        Ok(())
    }
}

impl std::fmt::Debug for ActorCritic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorCritic")
            .field("obs_dim", &self.obs_dim)
            .field("action_dim", &self.action_dim)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_shapes() {
        let policy = ActorCritic::new(9, 6, 0);
        let obs = Tensor::randn([8, 9], (Kind::Float, Device::Cpu));
        let (logits, values) = policy.forward(&obs);
        assert_eq!(logits.size(), vec![8, 6]);
        assert_eq!(values.size(), vec![8]);
    }

    #[test]
    fn test_apply_probabilities_normalized() {
        let policy = ActorCritic::new(9, 6, 1);
        let rows = vec![vec![0.1f32; 9]; 4];
        let (dist, values) = policy.apply(&rows).unwrap();

        assert_eq!(dist.len(), 4);
        assert_eq!(values.len(), 4);
        for row in dist.probs() {
            let total: f32 = row.iter().sum();
            assert!((total - 1.0).abs() < 1e-4);
            assert!(row.iter().all(|&p| p > 0.0));
        }
    }

    #[test]
    fn test_same_seed_same_draw() {
        let a = ActorCritic::new(9, 6, 42);
        let b = ActorCritic::new(9, 6, 42);
        let rows = vec![vec![0.3f32; 9]; 2];
        let (da, _) = a.apply(&rows).unwrap();
        let (db, _) = b.apply(&rows).unwrap();
        assert_eq!(da.probs(), db.probs());
    }

    #[test]
    fn test_distinct_seeds_distinct_draws() {
        let a = ActorCritic::new(9, 6, 1);
        let b = ActorCritic::new(9, 6, 2);
        let rows = vec![vec![0.3f32; 9]; 1];
        let (da, _) = a.apply(&rows).unwrap();
        let (db, _) = b.apply(&rows).unwrap();
        assert_ne!(da.probs(), db.probs());
    }

    #[test]
    fn test_evaluate_log_probs_match_apply() {
        let policy = ActorCritic::new(9, 6, 7);
        let rows = vec![vec![0.2f32; 9]; 4];
        let (dist, _) = policy.apply(&rows).unwrap();

        let mut rng = StdRng::seed_from_u64(0);
        let actions = dist.sample(&mut rng);
        let lp_dist = dist.log_prob(&actions);

        let obs = policy.obs_tensor(&rows);
        let actions_t = Tensor::from_slice(&actions);
        let (lp, entropy, values) = policy.evaluate(&obs, &actions_t);
        assert_eq!(lp.size(), vec![4]);
        assert_eq!(entropy.size(), vec![4]);
        assert_eq!(values.size(), vec![4]);

        let lp_eval: Vec<f32> = Vec::try_from(lp.view([-1])).unwrap();
        for (a, b) in lp_dist.iter().zip(lp_eval.iter()) {
            assert!((a - b).abs() < 1e-4, "log-prob mismatch: {a} vs {b}");
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let policy = ActorCritic::new(9, 6, 5);
        let path = std::env::temp_dir().join("mep_rl_actor_critic_test.safetensors");
        policy.save(&path).unwrap();

        let mut restored = ActorCritic::new(9, 6, 6);
        restored.load(&path).unwrap();

        let rows = vec![vec![0.4f32; 9]; 3];
        let (da, va) = policy.apply(&rows).unwrap();
        let (db, vb) = restored.apply(&rows).unwrap();
        for (ra, rb) in da.probs().iter().zip(db.probs().iter()) {
            for (a, b) in ra.iter().zip(rb.iter()) {
                assert!((a - b).abs() < 1e-6);
            }
        }
        for (a, b) in va.iter().zip(vb.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
        std::fs::remove_file(&path).ok();
    }
}
