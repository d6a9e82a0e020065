//! Per-level update rules.
//!
//! Four independent recurrences, each a pure function of a level and its
//! neighbor(s), following the discrete-time gradient updates on the
//! variational free energy:
//!
//! ```text
//! hypoth-inc = gen'(hypoth) o (learn-T . error-)  -  error
//! error-inc  = hypoth - learn . gen+(hypoth+) - attn(covar) . error
//! covar-inc  = 1/2 (error . errorT - covar^-1)
//! learn-inc  = error . gen+(hypoth+)T
//! ```
//!
//! where `-` subscripts name the level below, `+` subscripts the level above,
//! and `o` is the elementwise product. Each `next_*` function integrates its
//! increment with the level's own step size. All four are total over
//! well-shaped inputs except the covariance update, which fails on a singular
//! covariance and lets that error propagate; there is no well-defined update
//! in that case.

use crate::error::StackResult;
use crate::level::{GenFn, Level};
use crate::params::COVAR_MIN;
use crate::tensor::Value;

/// Gradient of the free energy with respect to the hypothesis: the
/// generative-model-mediated error signal from the level below, penalized by
/// this level's own residual error.
pub fn hypoth_inc(
    hypoth: &Value,
    error: &Value,
    error_below: &Value,
    learn_below: &Value,
    gen_deriv: &GenFn,
) -> StackResult<Value> {
    let feedback = learn_below.transpose().mul(error_below)?;
    gen_deriv(hypoth).emul(&feedback)?.sub(error)
}

/// `level.hypoth` advanced one step toward the error signal from `below`.
pub fn next_hypoth(below: &Level, level: &Level) -> StackResult<Value> {
    let inc = hypoth_inc(
        &level.hypoth,
        &level.error,
        &below.error,
        &below.learn,
        &level.gen_deriv,
    )?;
    level.hypoth.add(&inc.scale(level.hypoth_dt))
}

/// Mismatch between this level's hypothesis and the mean predicted by the
/// level above, shrunk by attention-modulated covariance feedback.
pub fn error_inc(
    error: &Value,
    hypoth: &Value,
    hypoth_above: &Value,
    covar: &Value,
    learn: &Value,
    gen_above: &GenFn,
    attn: &dyn Fn(&Value) -> Value,
) -> StackResult<Value> {
    let predicted = learn.mul(&gen_above(hypoth_above))?;
    let damping = attn(covar).mul(error)?;
    hypoth.sub(&predicted)?.sub(&damping)
}

/// `level.error` advanced one step against the prediction from `above`.
///
/// Partially applies `level.attn` to the level before handing it to
/// [`error_inc`].
pub fn next_error(level: &Level, above: &Level) -> StackResult<Value> {
    let attn = |covar: &Value| (level.attn)(level, covar);
    let inc = error_inc(
        &level.error,
        &level.hypoth,
        &above.hypoth,
        &level.covar,
        &level.learn,
        &above.gen,
        &attn,
    )?;
    level.error.add(&inc.scale(level.error_dt))
}

/// Half the gap between the squared error and the current precision.
///
/// # Errors
/// `SingularMatrix` when `covar` cannot be inverted.
pub fn covar_inc(error: &Value, covar: &Value) -> StackResult<Value> {
    Ok(error.square().sub(&covar.try_inverse()?)?.scale(0.5))
}

/// `level.covar` advanced one step, floored by [`limit_covar`].
///
/// # Errors
/// Inherits `SingularMatrix` from [`covar_inc`].
pub fn next_covar(level: &Level) -> StackResult<Value> {
    let inc = covar_inc(&level.error, &level.covar)?;
    let advanced = level.covar.add(&inc.scale(level.covar_dt))?;
    Ok(limit_covar(&advanced, COVAR_MIN))
}

/// Clamp scalar and 1x1 covariance to `floor`.
///
/// Full matrix covariance passes through unchanged: there is no agreed
/// elementwise analogue of the scalar floor, so the policy for the matrix
/// case is left to the caller (see DESIGN.md).
#[must_use]
pub fn limit_covar(covar: &Value, floor: f64) -> Value {
    match covar {
        Value::Scalar(x) => Value::Scalar(x.max(floor)),
        Value::Matrix(m) if m.nrows() == 1 && m.ncols() == 1 => {
            Value::matrix(1, 1, &[m[(0, 0)].max(floor)])
        }
        Value::Matrix(_) => covar.clone(),
    }
}

/// Hebbian-style increment for the mean-scaling factor.
pub fn learn_inc(error: &Value, hypoth_above: &Value, gen_above: &GenFn) -> StackResult<Value> {
    error.mul(&gen_above(hypoth_above).transpose())
}

/// `level.learn` advanced one step from the prediction of `above`.
pub fn next_learn(level: &Level, above: &Level) -> StackResult<Value> {
    let inc = learn_inc(&level.error, &above.hypoth, &above.gen)?;
    level.learn.add(&inc.scale(level.learn_dt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StackError;
    use std::sync::Arc;

    const TOL: f64 = 1e-9;

    fn scalar_level(hypoth: f64, error: f64, covar: f64, learn: f64) -> Level {
        Level::new(
            Value::scalar(hypoth),
            Value::scalar(error),
            Value::scalar(covar),
            Value::scalar(learn),
        )
    }

    fn assert_scalar(value: &Value, expected: f64) {
        match value {
            Value::Scalar(x) => assert!(
                (x - expected).abs() < TOL,
                "expected {expected}, got {x}"
            ),
            Value::Matrix(_) => panic!("expected a scalar, got {}", value.describe()),
        }
    }

    #[test]
    fn test_next_hypoth_scalar_closed_form() {
        // inc = gen'(h) * (learn- * error-) - error = 1*0.1 - 0.1 = 0
        let below = scalar_level(0.0, 0.1, 1.0, 1.0);
        let level = scalar_level(1.0, 0.1, 1.0, 1.0);
        assert_scalar(&next_hypoth(&below, &level).unwrap(), 1.0);

        // asymmetric case: inc = 1*(2.0*0.3) - 0.1 = 0.5
        let below = scalar_level(0.0, 0.3, 1.0, 2.0);
        assert_scalar(&next_hypoth(&below, &level).unwrap(), 1.0 + 0.01 * 0.5);
    }

    #[test]
    fn test_next_error_scalar_closed_form() {
        // With gen = identity, learn = 1, attn = identity:
        // error' = error + dt * (hypoth - hypoth+ - covar * error)
        let level = scalar_level(1.0, 0.1, 1.0, 1.0);
        let above = scalar_level(2.0, 0.0, 1.0, 1.0);
        let expected = 0.1 + 0.01 * (1.0 - 2.0 - 1.0 * 0.1);
        assert_scalar(&next_error(&level, &above).unwrap(), expected);
    }

    #[test]
    fn test_next_error_applies_attention() {
        // attn doubles effective covariance: inc = h - h+ - 2*covar*error
        let mut level = scalar_level(1.0, 0.1, 1.0, 1.0);
        level.attn = Arc::new(|_level, covar| covar.scale(2.0));
        let above = scalar_level(2.0, 0.0, 1.0, 1.0);
        let expected = 0.1 + 0.01 * (1.0 - 2.0 - 2.0 * 0.1);
        assert_scalar(&next_error(&level, &above).unwrap(), expected);
    }

    #[test]
    fn test_next_covar_scalar_closed_form() {
        // covar large enough that the floor stays inactive:
        // inc = 0.5*(0.1^2 - 1/2) = -0.245
        let level = scalar_level(1.0, 0.1, 2.0, 1.0);
        assert_scalar(&next_covar(&level).unwrap(), 2.0 + 0.01 * -0.245);
    }

    #[test]
    fn test_next_covar_clamps_to_floor() {
        // inc = 0.5*(0.01 - 1.0) = -0.495, so the raw update dips below 1.0
        let level = scalar_level(1.0, 0.1, 1.0, 1.0);
        assert_scalar(&next_covar(&level).unwrap(), 1.0);
    }

    #[test]
    fn test_next_covar_singular_fails() {
        let level = scalar_level(1.0, 0.1, 0.0, 1.0);
        assert_eq!(next_covar(&level), Err(StackError::SingularMatrix));

        let vec_level = Level::new(
            Value::vector(&[1.0, 2.0]),
            Value::vector(&[0.1, 0.2]),
            Value::matrix(2, 2, &[1.0, 1.0, 1.0, 1.0]),
            Value::identity(2),
        );
        assert_eq!(next_covar(&vec_level), Err(StackError::SingularMatrix));
    }

    #[test]
    fn test_next_learn_scalar_closed_form() {
        let level = scalar_level(1.0, 0.1, 1.0, 1.0);
        let above = scalar_level(2.0, 0.0, 1.0, 1.0);
        assert_scalar(&next_learn(&level, &above).unwrap(), 1.0 + 0.01 * 0.2);
    }

    #[test]
    fn test_limit_covar_one_by_one_matrix() {
        let low = Value::matrix(1, 1, &[0.4]);
        assert_eq!(limit_covar(&low, 1.0), Value::matrix(1, 1, &[1.0]));

        let full = Value::matrix(2, 2, &[0.1, 0.0, 0.0, 0.1]);
        assert_eq!(limit_covar(&full, 1.0), full);
    }

    #[test]
    fn test_vector_updates_preserve_shapes() {
        let make = || {
            Level::new(
                Value::vector(&[1.0, 2.0]),
                Value::vector(&[0.1, 0.2]),
                Value::matrix(2, 2, &[2.0, 0.0, 0.0, 2.0]),
                Value::identity(2),
            )
        };
        let below = make();
        let level = make();
        let mut above = make();
        above.hypoth = Value::vector(&[3.0, 4.0]);

        assert_eq!(next_hypoth(&below, &level).unwrap().shape(), (2, 1));
        assert_eq!(next_error(&level, &above).unwrap().shape(), (2, 1));
        assert_eq!(next_covar(&level).unwrap().shape(), (2, 2));
        assert_eq!(next_learn(&level, &above).unwrap().shape(), (2, 2));
    }

    #[test]
    fn test_vector_updates_numeric_values() {
        let make = || {
            Level::new(
                Value::vector(&[1.0, 2.0]),
                Value::vector(&[0.1, 0.2]),
                Value::matrix(2, 2, &[2.0, 0.0, 0.0, 2.0]),
                Value::identity(2),
            )
        };
        let below = make();
        let level = make();
        let mut above = make();
        above.hypoth = Value::vector(&[3.0, 4.0]);

        // feedback = I^T . [0.1, 0.2] matches error exactly, so hypoth holds
        assert_eq!(
            next_hypoth(&below, &level).unwrap(),
            Value::vector(&[1.0, 2.0])
        );

        // inc = [1,2] - [3,4] - 2*[0.1,0.2] = [-2.2, -2.4]
        let error = next_error(&level, &above).unwrap();
        match error {
            Value::Matrix(m) => {
                assert!((m[(0, 0)] - 0.078).abs() < TOL);
                assert!((m[(1, 0)] - 0.176).abs() < TOL);
            }
            Value::Scalar(_) => panic!("expected a vector"),
        }

        // inc = [0.1, 0.2] . [3, 4]^T
        let learn = next_learn(&level, &above).unwrap();
        match learn {
            Value::Matrix(m) => {
                assert!((m[(0, 0)] - 1.003).abs() < TOL);
                assert!((m[(0, 1)] - 0.004).abs() < TOL);
                assert!((m[(1, 0)] - 0.006).abs() < TOL);
                assert!((m[(1, 1)] - 1.008).abs() < TOL);
            }
            Value::Scalar(_) => panic!("expected a matrix"),
        }
    }

    #[test]
    fn test_mixed_shape_level_fails_fast() {
        // vector hypothesis against a scalar covariance
        let level = Level::new(
            Value::vector(&[1.0, 2.0]),
            Value::vector(&[0.1, 0.2]),
            Value::scalar(1.0),
            Value::identity(2),
        );
        let above = Level::new(
            Value::vector(&[3.0, 4.0]),
            Value::vector(&[0.0, 0.0]),
            Value::identity(2),
            Value::identity(2),
        );
        assert!(matches!(
            next_error(&level, &above),
            Err(StackError::ShapeMismatch(_))
        ));
    }
}
