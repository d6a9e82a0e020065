//! Engine defaults.

/// Floor applied to scalar and 1x1 covariance by the covariance update.
pub const COVAR_MIN: f64 = 1.0;

/// Default integration step for all four per-level quantities.
pub const DEFAULT_DT: f64 = 0.01;
