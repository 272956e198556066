//! Clipped-surrogate PPO update
//!
//! One update consumes a flattened rollout batch for `update_epochs`
//! epochs. Each epoch shuffles the rows, splits them into equally sized
//! contiguous minibatches, and applies one Adam step per minibatch:
//! advantage standardization, clipped policy surrogate, clipped value
//! regression against the GAE targets, entropy bonus, then a global
//! gradient-norm clip. The value loss takes the elementwise *maximum* of
//! the clipped and unclipped squared errors, which is the pessimistic
//! variant of value clipping.

use anyhow::{ensure, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tch::{nn, Kind, Tensor};

use crate::buffer::TrainBatch;
use crate::config::TrainConfig;
use crate::policy::ActorCritic;
use crate::train::schedule::LrSchedule;

const ADV_EPS: f64 = 1e-8;

/// Loss terms averaged over every minibatch of one update.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateStats {
    /// Combined objective
    pub total_loss: f64,
    /// Clipped policy surrogate term
    pub policy_loss: f64,
    /// Clipped value regression term, pre-coefficient
    pub value_loss: f64,
    /// Mean policy entropy over the batch
    pub entropy: f64,
    /// Learning rate used for the final minibatch
    pub lr: f64,
}

/// Run one full PPO update on `policy` in place.
pub fn run_update(
    policy: &ActorCritic,
    optimizer: &mut nn::Optimizer,
    batch: &TrainBatch,
    config: &TrainConfig,
    schedule: &mut LrSchedule,
    rng: &mut StdRng,
) -> Result<UpdateStats> {
    let n = batch.len();
    ensure!(n > 0, "empty training batch");
    ensure!(
        n % config.num_minibatches as i64 == 0,
        "batch of {n} rows does not split into {} minibatches",
        config.num_minibatches
    );
    let minibatch_size = (n / config.num_minibatches as i64) as usize;

    let mut stats = UpdateStats::default();
    let mut steps = 0usize;

    let mut indices: Vec<i64> = (0..n).collect();
    for _ in 0..config.update_epochs {
        indices.shuffle(rng);

        for chunk in indices.chunks(minibatch_size) {
            let idx = Tensor::from_slice(chunk);
            let obs = batch.obs.index_select(0, &idx);
            let actions = batch.actions.index_select(0, &idx);
            let old_log_probs = batch.log_probs.index_select(0, &idx);
            let advantages = batch.advantages.index_select(0, &idx);
            let targets = batch.targets.index_select(0, &idx);
            let old_values = batch.values.index_select(0, &idx);

            // Standardize advantages within the minibatch.
            let adv_mean = advantages.mean(Kind::Float);
            let adv_std = advantages.std(false);
            let advantages = (advantages - adv_mean) / (adv_std + ADV_EPS);

            let (log_probs, entropy, values) = policy.evaluate(&obs, &actions);

            let ratio = (&log_probs - &old_log_probs).exp();
            let surr1 = &ratio * &advantages;
            let surr2 =
                ratio.clamp(1.0 - config.clip_eps, 1.0 + config.clip_eps) * &advantages;
            let policy_loss = -surr1.minimum(&surr2).mean(Kind::Float);

            let values_clipped =
                &old_values + (&values - &old_values).clamp(-config.clip_eps, config.clip_eps);
            let err_unclipped = (&values - &targets).square();
            let err_clipped = (values_clipped - &targets).square();
            let value_loss = err_unclipped.maximum(&err_clipped).mean(Kind::Float) * 0.5;

            let entropy_mean = entropy.mean(Kind::Float);

            let loss: Tensor =
                &policy_loss + &value_loss * config.vf_coef - &entropy_mean * config.ent_coef;

            let lr = schedule.next_lr();
            optimizer.set_lr(lr);
            optimizer.zero_grad();
            loss.backward();
            optimizer.clip_grad_norm(config.max_grad_norm);
            optimizer.step();

            stats.total_loss += f64::try_from(&loss)?;
            stats.policy_loss += f64::try_from(&policy_loss)?;
            stats.value_loss += f64::try_from(&value_loss)?;
            stats.entropy += f64::try_from(&entropy_mean)?;
            stats.lr = lr;
            steps += 1;
        }
    }

    stats.total_loss /= steps as f64;
    stats.policy_loss /= steps as f64;
    stats.value_loss /= steps as f64;
    stats.entropy /= steps as f64;
    Ok(stats)
}
