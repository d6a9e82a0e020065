//! One layer of the predictive-coding hierarchy.
//!
//! A [`Level`] couples four numeric quantities (hypothesis, prediction
//! error, covariance, and a learned mean-scaling factor) with the fixed
//! structural functions that connect it to the level below: the generative
//! map `gen`, its derivative `gen_deriv`, and the attention adjustment
//! `attn`. The numeric fields change every timestep; the structural functions
//! never do.
//!
//! Boundary levels get their own constructors: [`make_top_level`] for the
//! constant prior at the top of the stack and [`make_next_bottom`] for the
//! sensory-driven bottom.

use std::fmt;
use std::sync::Arc;

use crate::error::{StackError, StackResult};
use crate::params::DEFAULT_DT;
use crate::tensor::Value;
use crate::update::{next_covar, next_error, next_learn};

/// Generative map or its derivative: hypothesis in, prediction out.
pub type GenFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Attention adjustment `(level, covar) -> covar'` applied at read time when
/// computing the error update.
pub type AttnFn = Arc<dyn Fn(&Level, &Value) -> Value + Send + Sync>;

/// One layer of the hierarchy at one timestep.
///
/// At the bottom the hypothesis is literally sensory data; at higher levels
/// it is an inferred parameter. Levels are immutable once produced: the
/// update rules return new `Level` values rather than mutating in place,
/// which is what makes step determinism and parallel multi-stack evaluation
/// safe without locking.
#[derive(Clone)]
pub struct Level {
    /// Current estimate of this layer's hidden cause.
    pub hypoth: Value,
    /// Prediction error; same shape as `hypoth`.
    pub error: Value,
    /// Covariance of the assumed distribution over this level's input. Must
    /// stay invertible whenever the covariance update runs.
    pub covar: Value,
    /// Scaling applied to the generative map's output to produce the
    /// predicted mean for the level below.
    pub learn: Value,
    /// Generative map toward the level below; fixed for the level's
    /// lifetime.
    pub gen: GenFn,
    /// Derivative of `gen`, evaluated elementwise.
    pub gen_deriv: GenFn,
    /// Covariance gain control; identity when unused.
    pub attn: AttnFn,
    pub hypoth_dt: f64,
    pub error_dt: f64,
    pub covar_dt: f64,
    pub learn_dt: f64,
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("hypoth", &self.hypoth)
            .field("error", &self.error)
            .field("covar", &self.covar)
            .field("learn", &self.learn)
            .field("hypoth_dt", &self.hypoth_dt)
            .field("error_dt", &self.error_dt)
            .field("covar_dt", &self.covar_dt)
            .field("learn_dt", &self.learn_dt)
            .finish_non_exhaustive()
    }
}

impl Level {
    /// A fully-populated level with identity structural functions and the
    /// default step sizes. Callers override the public fields directly.
    #[must_use]
    pub fn new(hypoth: Value, error: Value, covar: Value, learn: Value) -> Self {
        let gen_deriv = unit_gen_deriv();
        Self {
            hypoth,
            error,
            covar,
            learn,
            gen: identity_gen(),
            gen_deriv,
            attn: passthrough_attn(),
            hypoth_dt: DEFAULT_DT,
            error_dt: DEFAULT_DT,
            covar_dt: DEFAULT_DT,
            learn_dt: DEFAULT_DT,
        }
    }

    /// Fail fast on mutually inconsistent shapes: `error` must match
    /// `hypoth`, and `covar`/`learn` must be scalar for a scalar hypothesis
    /// or k x k for a k-vector one.
    ///
    /// # Errors
    /// `ShapeMismatch` naming the offending field.
    pub fn validate(&self) -> StackResult<()> {
        let (k, cols) = self.hypoth.shape();
        if cols != 1 {
            return Err(StackError::ShapeMismatch(format!(
                "hypoth must be a scalar or column vector, got {}",
                self.hypoth.describe()
            )));
        }
        if self.error.shape() != (k, 1) || self.error.is_scalar() != self.hypoth.is_scalar() {
            return Err(StackError::ShapeMismatch(format!(
                "error is {} but hypoth is {}",
                self.error.describe(),
                self.hypoth.describe()
            )));
        }
        for (name, field) in [("covar", &self.covar), ("learn", &self.learn)] {
            if field.shape() != (k, k) || field.is_scalar() != self.hypoth.is_scalar() {
                return Err(StackError::ShapeMismatch(format!(
                    "{name} is {} but hypoth is {}",
                    field.describe(),
                    self.hypoth.describe()
                )));
            }
        }
        Ok(())
    }
}

/// The identity generative map.
#[must_use]
pub fn identity_gen() -> GenFn {
    Arc::new(Value::clone)
}

/// Derivative of the identity map: ones of the hypothesis shape.
#[must_use]
pub fn unit_gen_deriv() -> GenFn {
    Arc::new(Value::ones_like)
}

/// Attention that leaves covariance untouched.
#[must_use]
pub fn passthrough_attn() -> AttnFn {
    Arc::new(|_level, covar| covar.clone())
}

/// The constant prior at the top of a stack.
///
/// Only the hypothesis and the identity generative map matter: the level just
/// below treats this level's `hypoth` as a literal target mean. The remaining
/// numeric fields are shape-appropriate zeros and the step sizes are zero;
/// the top is never passed through the general update, so they are never
/// read.
#[must_use]
pub fn make_top_level(hypoth: Value) -> Level {
    let zero = hypoth.zeros_like();
    let (k, _) = hypoth.shape();
    let zero_sq = if hypoth.is_scalar() {
        Value::scalar(0.0)
    } else {
        Value::zeros(k, k)
    };
    Level {
        hypoth,
        error: zero,
        covar: zero_sq.clone(),
        learn: zero_sq,
        gen: identity_gen(),
        gen_deriv: unit_gen_deriv(),
        attn: passthrough_attn(),
        hypoth_dt: 0.0,
        error_dt: 0.0,
        covar_dt: 0.0,
        learn_dt: 0.0,
    }
}

/// Build the bottom-level update function around a sensory source.
///
/// At the sensory boundary there is no level below to supply an error signal
/// for the usual hypothesis recurrence, so the hypothesis is injected
/// directly from `hypoth_gen` each step while `error`, `covar`, and `learn`
/// advance by the ordinary rules from the old bottom level and its neighbor
/// above. Structural functions and step sizes carry over unchanged.
///
/// The returned closure is what [`crate::stack::next_levels`] expects as its
/// `next_bottom` argument.
pub fn make_next_bottom<G>(hypoth_gen: G) -> impl Fn(&Level, &Level) -> StackResult<Level>
where
    G: Fn() -> Value,
{
    move |level: &Level, above: &Level| {
        Ok(Level {
            hypoth: hypoth_gen(),
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
}
