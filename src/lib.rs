#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

//! Hierarchical predictive-coding engine.
//!
//! A stack of coupled numeric levels iteratively refines a hypothesis about
//! the causes of sensory input: prediction errors flow upward, corrective
//! signals flow downward, and each level integrates four coupled quantities
//! with the discrete-time gradient updates derived from the variational free
//! energy:
//!
//! ```text
//! hypoth <- hypoth + dt * (gen'(hypoth) o (learn-T . error-) - error)
//! error  <- error  + dt * (hypoth - learn . gen+(hypoth+) - attn(covar) . error)
//! covar  <- covar  + dt * 1/2 (error . errorT - covar^-1)
//! learn  <- learn  + dt * (error . gen+(hypoth+)T)
//! ```
//!
//! The engine is a pure, synchronous transition function: [`next_levels`]
//! takes a stack and returns a new one, owning no scheduling, no I/O, and no
//! persistent state. The bottom level's hypothesis is injected from an
//! external sensory source ([`make_next_bottom`]); the top level is a
//! constant prior ([`make_top_level`]) carried forward unchanged. Scalar and
//! matrix levels share one set of update rules via [`Value`].
//!
//! Independent stacks (one per simulated organism, say) share nothing and
//! can be advanced together with [`step_stacks`].

pub mod error;
pub mod level;
pub mod params;
pub mod report;
pub mod stack;
pub mod tensor;
pub mod update;

pub use error::{StackError, StackResult};
pub use level::{
    identity_gen, make_next_bottom, make_top_level, passthrough_attn, unit_gen_deriv, AttnFn,
    GenFn, Level,
};
pub use report::{level_repr, stack_repr, value_repr};
pub use stack::{next_level, next_levels, step_stacks, Stack};
pub use tensor::Value;
pub use update::{
    covar_inc, error_inc, hypoth_inc, learn_inc, limit_covar, next_covar, next_error, next_hypoth,
    next_learn,
};
