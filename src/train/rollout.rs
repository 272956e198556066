//! Vectorized rollout collection with diversity-augmented rewards
//!
//! One collection pass advances the environment pool for `num_steps`
//! timesteps with the trainee controlling both agents of every instance.
//! Actor rows are agent-major: actor `a` is agent `a / num_envs` in
//! environment `a % num_envs`. At every step the trainee's action
//! distribution is scored against the rest of the population and the
//! diversity bonus is folded into the stored reward, together with the
//! annealed shaped reward.

use anyhow::Result;
use rand::rngs::StdRng;

use crate::buffer::{RolloutBuffer, StepRecord};
use crate::config::TrainConfig;
use crate::diversity;
use crate::env::pool::EnvPool;
use crate::env::{CoopEnv, NUM_AGENTS};
use crate::policy::ActorCritic;
use crate::train::schedule::shaping_coef;

/// Summary of one collection pass.
#[derive(Debug)]
pub struct RolloutReport {
    /// Value estimate per actor for the observation after the final step
    pub bootstrap: Vec<f32>,
    /// `(return, length)` of every episode that finished during the pass,
    /// where the return is agent 0's raw task reward
    pub episodes: Vec<(f64, u64)>,
}

/// Drives the environment pool and fills the rollout buffer.
pub struct RolloutCollector<E: CoopEnv> {
    pool: EnvPool<E>,
    /// Current observation per actor, agent-major
    obs: Vec<Vec<f32>>,
    episode_return: Vec<f64>,
    episode_length: Vec<u64>,
}

impl<E: CoopEnv> RolloutCollector<E> {
    /// Create a collector and reset every pool instance.
    pub fn new(mut pool: EnvPool<E>) -> Self {
        let num_envs = pool.num_envs();
        let obs = Self::flatten_obs(pool.reset_all(), num_envs);
        Self {
            pool,
            obs,
            episode_return: vec![0.0; num_envs],
            episode_length: vec![0; num_envs],
        }
    }

    /// The pool being driven
    pub fn pool(&self) -> &EnvPool<E> {
        &self.pool
    }

    /// Number of actor rows per timestep
    pub fn num_actors(&self) -> usize {
        NUM_AGENTS * self.pool.num_envs()
    }

    fn flatten_obs(per_env: Vec<[Vec<f32>; NUM_AGENTS]>, num_envs: usize) -> Vec<Vec<f32>> {
        let mut rows = vec![Vec::new(); NUM_AGENTS * num_envs];
        for (env, agents) in per_env.into_iter().enumerate() {
            for (agent, obs) in agents.into_iter().enumerate() {
                rows[agent * num_envs + env] = obs;
            }
        }
        rows
    }

    /// Collect `num_steps` timesteps into `buffer`.
    ///
    /// `peers` hold the parameters of every population member except the
    /// trainee; `env_step` is the number of environment steps completed
    /// before this pass, which fixes the shaping anneal for the whole
    /// pass. Returns bootstrap values and finished-episode statistics.
    pub fn collect(
        &mut self,
        trainee: &ActorCritic,
        peers: &[ActorCritic],
        buffer: &mut RolloutBuffer,
        config: &TrainConfig,
        env_step: u64,
        rng: &mut StdRng,
    ) -> Result<RolloutReport> {
        let num_envs = self.pool.num_envs();
        let num_actors = self.num_actors();
        let shaping = shaping_coef(env_step, config.rew_shaping_horizon);
        let mut episodes = Vec::new();

        for _ in 0..config.num_steps {
            let (dist, values) = trainee.apply(&self.obs)?;
            let actions = dist.sample(rng);
            let log_probs = dist.log_prob(&actions);

            // Every peer's action distribution on the same observations.
            let peer_dists: Vec<_> = peers
                .iter()
                .map(|peer| peer.apply(&self.obs).map(|(d, _)| d))
                .collect::<Result<_>>()?;

            let mut neg_logp_pop_new = vec![0.0f32; num_actors];
            let mut entropy_deltas = vec![0.0f32; num_actors];
            let mut neg_logp_deltas = vec![0.0f32; num_actors];
            let mut bonuses = vec![0.0f32; num_actors];
            for a in 0..num_actors {
                let others: Vec<&[f32]> =
                    peer_dists.iter().map(|d| d.probs()[a].as_slice()).collect();
                let terms = diversity::score(&others, &dist.probs()[a], actions[a]);
                neg_logp_pop_new[a] = terms.neg_logp_new;
                entropy_deltas[a] = terms.entropy_delta;
                neg_logp_deltas[a] = terms.neg_logp_delta;
                bonuses[a] = diversity::bonus(&terms, config.ent_pop_coeff);
            }

            let joint_actions: Vec<[i64; NUM_AGENTS]> = (0..num_envs)
                .map(|e| [actions[e], actions[num_envs + e]])
                .collect();
            let results = self.pool.step(&joint_actions)?;

            let mut orig_rewards = vec![0.0f32; num_actors];
            let mut shaped_rewards = vec![0.0f32; num_actors];
            let mut rewards = vec![0.0f32; num_actors];
            let mut dones = vec![0.0f32; num_actors];
            for (e, result) in results.iter().enumerate() {
                self.episode_return[e] += result.reward[0] as f64;
                self.episode_length[e] += 1;
                if result.done {
                    episodes.push((self.episode_return[e], self.episode_length[e]));
                    self.episode_return[e] = 0.0;
                    self.episode_length[e] = 0;
                }
                for agent in 0..NUM_AGENTS {
                    let a = agent * num_envs + e;
                    orig_rewards[a] = result.reward[agent];
                    shaped_rewards[a] = result.shaped_reward[agent];
                    rewards[a] =
                        result.reward[agent] + shaping * result.shaped_reward[agent] + bonuses[a];
                    dones[a] = if result.done { 1.0 } else { 0.0 };
                }
            }

            buffer.push(StepRecord {
                obs: std::mem::take(&mut self.obs),
                actions,
                values,
                log_probs,
                rewards,
                orig_rewards,
                shaped_rewards,
                neg_logp_pop_new,
                entropy_deltas,
                neg_logp_deltas,
                dones,
            })?;

            let mut next_obs = vec![Vec::new(); num_actors];
            for (e, result) in results.into_iter().enumerate() {
                for (agent, obs) in result.obs.into_iter().enumerate() {
                    next_obs[agent * num_envs + e] = obs;
                }
            }
            self.obs = next_obs;
        }

        let (_, bootstrap) = trainee.apply(&self.obs)?;
        Ok(RolloutReport { bootstrap, episodes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::rendezvous::Rendezvous;
    use rand::SeedableRng;

    fn setup(num_envs: usize) -> (RolloutCollector<Rendezvous>, TrainConfig) {
        let pool = EnvPool::new(
            || Rendezvous::from_name("cramped_room").unwrap(),
            num_envs,
            17,
        );
        let config = TrainConfig::new()
            .num_envs(num_envs)
            .num_steps(8)
            .num_minibatches(2)
            .total_timesteps(1_000);
        (RolloutCollector::new(pool), config)
    }

    #[test]
    fn test_collect_fills_buffer() {
        let (mut collector, config) = setup(4);
        let obs_dim = collector.pool().obs_dim();
        let trainee = ActorCritic::new(obs_dim as i64, 6, 1);
        let peer = ActorCritic::new(obs_dim as i64, 6, 2);
        let mut buffer = RolloutBuffer::new(8, collector.num_actors(), obs_dim);
        let mut rng = StdRng::seed_from_u64(0);

        let report = collector
            .collect(&trainee, &[peer], &mut buffer, &config, 0, &mut rng)
            .unwrap();

        assert!(buffer.is_full());
        assert_eq!(report.bootstrap.len(), 8);
        // A non-degenerate population mix always has surprisal above zero.
        assert!(buffer.mean_of(|s| &s.neg_logp_pop_new) > 0.0);
    }

    #[test]
    fn test_collect_is_reproducible() {
        let run = || {
            let (mut collector, config) = setup(2);
            let obs_dim = collector.pool().obs_dim();
            let trainee = ActorCritic::new(obs_dim as i64, 6, 5);
            let peer = ActorCritic::new(obs_dim as i64, 6, 6);
            let mut buffer = RolloutBuffer::new(8, collector.num_actors(), obs_dim);
            let mut rng = StdRng::seed_from_u64(3);
            collector
                .collect(&trainee, &[peer], &mut buffer, &config, 0, &mut rng)
                .unwrap();
            (buffer.mean_of(|s| &s.rewards), buffer.mean_of(|s| &s.neg_logp_pop_new))
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_shaping_fully_annealed_drops_shaped_component() {
        let (mut collector, config) = setup(2);
        let obs_dim = collector.pool().obs_dim();
        let trainee = ActorCritic::new(obs_dim as i64, 6, 5);
        let peer = ActorCritic::new(obs_dim as i64, 6, 6);
        let mut buffer = RolloutBuffer::new(8, collector.num_actors(), obs_dim);
        let mut rng = StdRng::seed_from_u64(3);

        // Past the horizon the folded reward contains no shaping term.
        collector
            .collect(
                &trainee,
                &[peer],
                &mut buffer,
                &config,
                config.rew_shaping_horizon,
                &mut rng,
            )
            .unwrap();

        let coeff = config.ent_pop_coeff as f64;
        let expected = buffer.mean_of(|s| &s.orig_rewards)
            + coeff * buffer.mean_of(|s| &s.neg_logp_pop_new);
        assert!((buffer.mean_of(|s| &s.rewards) - expected).abs() < 1e-4);
    }
}
