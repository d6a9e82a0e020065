//! Whole-stack stepping.
//!
//! A stack is an ordered sequence of levels, index 0 closest to the sensory
//! input and the last index holding the constant prior. One call to
//! [`next_levels`] advances every level by one discrete timestep:
//!
//! ```text
//! [L0, L1, ..., Ln]  ->  [next_bottom(L0, L1),
//!                         next_level(L0, L1, L2),
//!                         ...,
//!                         next_level(Ln-2, Ln-1, Ln),
//!                         Ln]
//! ```
//!
//! Every update reads the pre-step snapshot only, so repeated application to
//! the same input produces the same output. Independent stacks (one per
//! simulated organism, say) share nothing and are advanced in parallel by
//! [`step_stacks`].

use rayon::prelude::*;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{StackError, StackResult};
use crate::level::Level;
use crate::update::{next_covar, next_error, next_hypoth, next_learn};

/// An ordered stack of levels, bottom first.
pub type Stack = Vec<Level>;

/// Advance one interior level.
///
/// All four quantities are computed from the same pre-update snapshot of the
/// three neighboring levels; structural functions and step sizes carry over.
///
/// # Errors
/// `SingularMatrix` from the covariance rule, `ShapeMismatch` from
/// inconsistent operands.
pub fn next_level(below: &Level, level: &Level, above: &Level) -> StackResult<Level> {
    Ok(Level {
        hypoth: next_hypoth(below, level)?,
        error: next_error(level, above)?,
        covar: next_covar(level)?,
        learn: next_learn(level, above)?,
        gen: Arc::clone(&level.gen),
        gen_deriv: Arc::clone(&level.gen_deriv),
        attn: Arc::clone(&level.attn),
        hypoth_dt: level.hypoth_dt,
        error_dt: level.error_dt,
        covar_dt: level.covar_dt,
        learn_dt: level.learn_dt,
    })
}

/// Advance a whole stack by one timestep.
///
/// The new bottom comes from `next_bottom` (see
/// [`crate::level::make_next_bottom`]), interior levels from a sliding window
/// of three consecutive levels over the old stack, and the top level is
/// carried forward unchanged. Length and ordering are preserved. A failure in
/// any level fails the whole step; no partial stack is returned.
///
/// # Errors
/// `InvalidStack` for stacks shorter than 3 levels, plus anything the update
/// rules raise.
pub fn next_levels<F>(next_bottom: &F, stack: &[Level]) -> StackResult<Stack>
where
    F: Fn(&Level, &Level) -> StackResult<Level>,
{
    if stack.len() < 3 {
        return Err(StackError::InvalidStack(format!(
            "need at least 3 levels (bottom, interior, top), got {}",
            stack.len()
        )));
    }
    debug!(levels = stack.len(), "advancing stack");

    let mut next = Vec::with_capacity(stack.len());
    next.push(next_bottom(&stack[0], &stack[1])?);
    for window in stack.windows(3) {
        next.push(next_level(&window[0], &window[1], &window[2])?);
    }
    next.push(stack[stack.len() - 1].clone());
    Ok(next)
}

/// Advance independent stacks in parallel, one sensory driver per stack.
///
/// Cross-stack there is no data dependency, so the work is split across the
/// rayon pool. Any single stack failing fails the whole call.
///
/// # Errors
/// `InvalidStack` when `stacks` and `next_bottoms` differ in length, plus
/// anything [`next_levels`] raises.
pub fn step_stacks<F>(stacks: &[Stack], next_bottoms: &[F]) -> StackResult<Vec<Stack>>
where
    F: Fn(&Level, &Level) -> StackResult<Level> + Sync,
{
    if stacks.len() != next_bottoms.len() {
        return Err(StackError::InvalidStack(format!(
            "{} stacks but {} bottom drivers",
            stacks.len(),
            next_bottoms.len()
        )));
    }
    trace!(stacks = stacks.len(), "stepping independent stacks");

    stacks
        .par_iter()
        .zip(next_bottoms.par_iter())
        .map(|(stack, next_bottom)| next_levels(next_bottom, stack))
        .collect()
}
