//! Generalized advantage estimation
//!
//! Backward recurrence over a finished rollout:
//!
//! ```text
//! delta_t = r_t + gamma * V_{t+1} * (1 - done_t) - V_t
//! gae_t   = delta_t + gamma * lambda * (1 - done_t) * gae_{t+1}
//! ```
//!
//! seeded with `gae_{T} = 0` and bootstrapped with value estimates for the
//! observations that follow the final stored step. Terminal steps
//! (`done_t = 1`) cut both the bootstrap and the accumulated trace, so no
//! credit leaks across an environment reset. The value target is the
//! advantage plus the stored value estimate.

/// Compute advantages and value targets for a `[num_steps][num_actors]`
/// rollout.
///
/// `bootstrap` holds one value estimate per actor for the observation
/// after the last stored step. Returns `(advantages, targets)` with the
/// same shape as the inputs.
pub fn advantages(
    rewards: &[Vec<f32>],
    values: &[Vec<f32>],
    dones: &[Vec<f32>],
    bootstrap: &[f32],
    gamma: f32,
    gae_lambda: f32,
) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let num_steps = rewards.len();
    let num_actors = bootstrap.len();

    let mut adv = vec![vec![0.0f32; num_actors]; num_steps];
    let mut targets = vec![vec![0.0f32; num_actors]; num_steps];

    let mut gae = vec![0.0f32; num_actors];
    let mut next_values = bootstrap.to_vec();

    for t in (0..num_steps).rev() {
        for a in 0..num_actors {
            let not_done = 1.0 - dones[t][a];
            let delta = rewards[t][a] + gamma * next_values[a] * not_done - values[t][a];
            gae[a] = delta + gamma * gae_lambda * not_done * gae[a];
            adv[t][a] = gae[a];
            targets[t][a] = gae[a] + values[t][a];
        }
        next_values.copy_from_slice(&values[t]);
    }

    (adv, targets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(column: &[(f32, f32, f32)], bootstrap: f32, gamma: f32, lambda: f32) -> (Vec<f32>, Vec<f32>) {
        let rewards: Vec<Vec<f32>> = column.iter().map(|&(r, _, _)| vec![r]).collect();
        let values: Vec<Vec<f32>> = column.iter().map(|&(_, v, _)| vec![v]).collect();
        let dones: Vec<Vec<f32>> = column.iter().map(|&(_, _, d)| vec![d]).collect();
        let (adv, tgt) = advantages(&rewards, &values, &dones, &[bootstrap], gamma, lambda);
        (
            adv.iter().map(|row| row[0]).collect(),
            tgt.iter().map(|row| row[0]).collect(),
        )
    }

    #[test]
    fn test_single_step_is_td_error() {
        // One step, no termination: gae = r + gamma * bootstrap - v.
        let (adv, tgt) = single(&[(1.0, 0.5, 0.0)], 2.0, 0.9, 0.95);
        assert!((adv[0] - (1.0 + 0.9 * 2.0 - 0.5)).abs() < 1e-6);
        assert!((tgt[0] - (adv[0] + 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_constant_reward_zero_values_geometric_series() {
        // With V = 0 everywhere and reward 1 each step, delta_t = 1 and the
        // advantage at the first step is the geometric series over
        // gamma * lambda.
        let gamma = 0.9f32;
        let lambda = 0.95f32;
        let steps = vec![(1.0, 0.0, 0.0); 8];
        let (adv, _) = single(&steps, 0.0, gamma, lambda);

        let q = gamma * lambda;
        let expected: f32 = (0..8).map(|k| q.powi(k)).sum();
        assert!(
            (adv[0] - expected).abs() < 1e-5,
            "expected {expected}, got {}",
            adv[0]
        );
    }

    #[test]
    fn test_done_cuts_bootstrap_and_trace() {
        // Step 1 is terminal, so step 1's advantage ignores the bootstrap
        // and step 0's trace stops at step 1's delta.
        let gamma = 0.99f32;
        let lambda = 0.95f32;
        let (adv, _) = single(&[(0.0, 0.3, 0.0), (5.0, 0.4, 1.0)], 100.0, gamma, lambda);

        let delta1 = 5.0 - 0.4;
        assert!((adv[1] - delta1).abs() < 1e-5);
        let delta0 = 0.0 + gamma * 0.4 - 0.3;
        assert!((adv[0] - (delta0 + gamma * lambda * delta1)).abs() < 1e-5);
    }

    #[test]
    fn test_actors_are_independent() {
        let rewards = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let values = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let dones = vec![vec![0.0, 1.0], vec![0.0, 0.0]];
        let (adv, _) = advantages(&rewards, &values, &dones, &[0.0, 0.0], 0.9, 0.95);

        // Actor 1's terminal flag at step 0 must not affect actor 0.
        let (adv_solo, _) = advantages(
            &[vec![1.0], vec![0.0]],
            &[vec![0.0], vec![0.0]],
            &[vec![0.0], vec![0.0]],
            &[0.0],
            0.9,
            0.95,
        );
        assert!((adv[0][0] - adv_solo[0][0]).abs() < 1e-6);
        assert!((adv[1][0] - adv_solo[1][0]).abs() < 1e-6);
    }
}
