//! Population-entropy diversity bonus
//!
//! The trainee is rewarded for choosing actions that are surprising to the
//! blended population: the bonus is proportional to the negative
//! log-probability of the sampled action under the population mix that
//! *includes* the trainee. The entropy and negative-log-probability deltas
//! between the with/without mixes are computed as diagnostics only; they do
//! not feed back into the reward. That asymmetry is the trained objective
//! and is preserved deliberately.
//!
//! All quantities are computed directly from categorical probability
//! vectors. Input precondition: every action keeps non-zero probability
//! mass (softmax outputs satisfy this); no smoothing is applied, so a
//! zero-probability action would produce a non-finite result.

/// Diversity terms for one (timestep, actor) pair.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiversityTerms {
    /// Entropy of the population mix including the trainee minus the
    /// entropy of the mix without it. Diagnostic only.
    pub entropy_delta: f32,

    /// Negative log-probability of the sampled action under the
    /// post-inclusion mix. This is the reward signal, pre-coefficient.
    pub neg_logp_new: f32,

    /// Post-inclusion minus pre-inclusion negative log-probability of the
    /// sampled action. Diagnostic only.
    pub neg_logp_delta: f32,
}

/// Categorical entropy `-sum p ln p` of a probability vector.
pub fn entropy(probs: &[f32]) -> f32 {
    -probs.iter().map(|&p| p * p.ln()).sum::<f32>()
}

/// Elementwise mean of a set of probability vectors.
pub fn mix(rows: &[&[f32]]) -> Vec<f32> {
    let n = rows.len();
    debug_assert!(n > 0, "population mix over an empty set");
    let dim = rows[0].len();
    let mut out = vec![0.0f32; dim];
    for row in rows {
        debug_assert_eq!(row.len(), dim);
        for (acc, &p) in out.iter_mut().zip(row.iter()) {
            *acc += p;
        }
    }
    for acc in &mut out {
        *acc /= n as f32;
    }
    out
}

/// Score one trainee decision against the rest of the population.
///
/// `others` are the action-probability vectors of every population member
/// except the trainee, all conditioned on the same observation; `trainee`
/// is the trainee's vector and `action` its sampled action.
pub fn score(others: &[&[f32]], trainee: &[f32], action: i64) -> DiversityTerms {
    let mix_without = mix(others);

    let mut with_rows: Vec<&[f32]> = others.to_vec();
    with_rows.push(trainee);
    let mix_with = mix(&with_rows);

    let a = action as usize;
    let neg_logp_old = -mix_without[a].ln();
    let neg_logp_new = -mix_with[a].ln();

    DiversityTerms {
        entropy_delta: entropy(&mix_with) - entropy(&mix_without),
        neg_logp_new,
        neg_logp_delta: neg_logp_new - neg_logp_old,
    }
}

/// The reward bonus added to the environment reward.
///
/// Uses the post-inclusion negative log-probability, not the delta.
pub fn bonus(terms: &DiversityTerms, ent_pop_coeff: f32) -> f32 {
    ent_pop_coeff * terms.neg_logp_new
}
