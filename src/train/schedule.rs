//! Annealing schedules
//!
//! Two schedules run over a training run: the shaped-reward weight decays
//! linearly in environment steps, and the learning rate decays linearly in
//! completed updates. The learning-rate fraction is a step function: it is
//! constant across every minibatch of one update and drops only when the
//! next update begins.

/// Weight on the shaped reward at environment step `env_step`.
///
/// Decays linearly from 1 at step 0 to 0 at `horizon`, clamped to [0, 1].
/// A zero horizon disables shaping immediately.
pub fn shaping_coef(env_step: u64, horizon: u64) -> f32 {
    if horizon == 0 {
        return 0.0;
    }
    (1.0 - env_step as f64 / horizon as f64).clamp(0.0, 1.0) as f32
}

/// Linearly decaying learning rate, advanced once per minibatch.
#[derive(Debug)]
pub struct LrSchedule {
    base_lr: f64,
    anneal: bool,
    num_updates: usize,
    minibatches_per_update: usize,
    minibatch_count: usize,
}

impl LrSchedule {
    /// Create a schedule for a run of `num_updates` iterations with
    /// `update_epochs * num_minibatches` gradient steps each.
    pub fn new(base_lr: f64, anneal: bool, num_updates: usize, update_epochs: usize, num_minibatches: usize) -> Self {
        Self {
            base_lr,
            anneal,
            num_updates,
            minibatches_per_update: update_epochs * num_minibatches,
            minibatch_count: 0,
        }
    }

    /// Learning rate for the next gradient step, advancing the counter.
    pub fn next_lr(&mut self) -> f64 {
        let lr = if self.anneal {
            // Integer division: every minibatch of one update sees the
            // same fraction.
            let completed_updates = self.minibatch_count / self.minibatches_per_update;
            self.base_lr * (1.0 - completed_updates as f64 / self.num_updates as f64)
        } else {
            self.base_lr
        };
        self.minibatch_count += 1;
        lr
    }
}
