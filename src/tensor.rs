//! Scalar/matrix numeric values.
//!
//! Levels hold quantities that are either plain scalars or matrices; the
//! update rules are written once against this type and dispatch on shape.
//! Vectors are represented as k x 1 column matrices so that transposition and
//! outer products fall out of ordinary matrix algebra:
//!
//! ```text
//! square(x) = x . xT     (outer product for a column, x^2 for a scalar)
//! ```
//!
//! Dispatch is strict: mixing a scalar quantity with a matrix one in
//! `add`/`sub`/`mul`/`emul` is a shape mismatch, never a silent broadcast.
//! Plain scalar factors (step sizes, the 1/2 in the covariance rule) enter
//! through [`Value::scale`] only.

use nalgebra::DMatrix;

use crate::error::{StackError, StackResult};

/// A rank-0 or rank-2 numeric quantity.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(f64),
    Matrix(DMatrix<f64>),
}

impl Value {
    #[must_use]
    pub const fn scalar(x: f64) -> Self {
        Self::Scalar(x)
    }

    /// A column vector (k x 1 matrix).
    #[must_use]
    pub fn vector(data: &[f64]) -> Self {
        Self::Matrix(DMatrix::from_column_slice(data.len(), 1, data))
    }

    /// A matrix from row-major data.
    ///
    /// # Panics
    /// Panics if `data.len() != nrows * ncols`.
    #[must_use]
    pub fn matrix(nrows: usize, ncols: usize, data: &[f64]) -> Self {
        Self::Matrix(DMatrix::from_row_slice(nrows, ncols, data))
    }

    /// The k x k identity matrix.
    #[must_use]
    pub fn identity(k: usize) -> Self {
        Self::Matrix(DMatrix::identity(k, k))
    }

    /// An all-zero matrix.
    #[must_use]
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self::Matrix(DMatrix::zeros(nrows, ncols))
    }

    /// A zero of the same shape as `self`.
    #[must_use]
    pub fn zeros_like(&self) -> Self {
        match self {
            Self::Scalar(_) => Self::Scalar(0.0),
            Self::Matrix(m) => Self::Matrix(DMatrix::zeros(m.nrows(), m.ncols())),
        }
    }

    /// A one of the same shape as `self` (elementwise ones for matrices).
    #[must_use]
    pub fn ones_like(&self) -> Self {
        match self {
            Self::Scalar(_) => Self::Scalar(1.0),
            Self::Matrix(m) => Self::Matrix(DMatrix::repeat(m.nrows(), m.ncols(), 1.0)),
        }
    }

    /// `(rows, cols)`; scalars report `(1, 1)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Scalar(_) => (1, 1),
            Self::Matrix(m) => (m.nrows(), m.ncols()),
        }
    }

    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    /// Human-readable shape for error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Scalar(_) => "scalar".to_string(),
            Self::Matrix(m) => format!("{}x{} matrix", m.nrows(), m.ncols()),
        }
    }

    /// Elementwise sum; operands must be the same kind and shape.
    pub fn add(&self, rhs: &Self) -> StackResult<Self> {
        match (self, rhs) {
            (Self::Scalar(a), Self::Scalar(b)) => Ok(Self::Scalar(a + b)),
            (Self::Matrix(a), Self::Matrix(b)) if a.shape() == b.shape() => {
                Ok(Self::Matrix(a + b))
            }
            _ => Err(mismatch("add", self, rhs)),
        }
    }

    /// Elementwise difference; operands must be the same kind and shape.
    pub fn sub(&self, rhs: &Self) -> StackResult<Self> {
        match (self, rhs) {
            (Self::Scalar(a), Self::Scalar(b)) => Ok(Self::Scalar(a - b)),
            (Self::Matrix(a), Self::Matrix(b)) if a.shape() == b.shape() => {
                Ok(Self::Matrix(a - b))
            }
            _ => Err(mismatch("sub", self, rhs)),
        }
    }

    /// Matrix product (plain product for scalars). Inner dimensions must
    /// agree; scalar and matrix operands never mix.
    pub fn mul(&self, rhs: &Self) -> StackResult<Self> {
        match (self, rhs) {
            (Self::Scalar(a), Self::Scalar(b)) => Ok(Self::Scalar(a * b)),
            (Self::Matrix(a), Self::Matrix(b)) if a.ncols() == b.nrows() => {
                Ok(Self::Matrix(a * b))
            }
            _ => Err(mismatch("mul", self, rhs)),
        }
    }

    /// Elementwise (Hadamard) product; operands must be the same kind and
    /// shape.
    pub fn emul(&self, rhs: &Self) -> StackResult<Self> {
        match (self, rhs) {
            (Self::Scalar(a), Self::Scalar(b)) => Ok(Self::Scalar(a * b)),
            (Self::Matrix(a), Self::Matrix(b)) if a.shape() == b.shape() => {
                Ok(Self::Matrix(a.component_mul(b)))
            }
            _ => Err(mismatch("emul", self, rhs)),
        }
    }

    /// Multiply every element by a plain factor.
    #[must_use]
    pub fn scale(&self, factor: f64) -> Self {
        match self {
            Self::Scalar(a) => Self::Scalar(a * factor),
            Self::Matrix(m) => Self::Matrix(m * factor),
        }
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        match self {
            Self::Scalar(a) => Self::Scalar(*a),
            Self::Matrix(m) => Self::Matrix(m.transpose()),
        }
    }

    /// Multiplicative inverse.
    ///
    /// # Errors
    /// `SingularMatrix` for a zero scalar or a non-invertible matrix.
    pub fn try_inverse(&self) -> StackResult<Self> {
        match self {
            Self::Scalar(a) => {
                if *a == 0.0 {
                    Err(StackError::SingularMatrix)
                } else {
                    Ok(Self::Scalar(1.0 / a))
                }
            }
            Self::Matrix(m) => m
                .clone()
                .try_inverse()
                .map(Self::Matrix)
                .ok_or(StackError::SingularMatrix),
        }
    }

    /// `x . xT`: the square of a scalar, the outer product of a column
    /// vector, `M . MT` in general.
    #[must_use]
    pub fn square(&self) -> Self {
        match self {
            Self::Scalar(a) => Self::Scalar(a * a),
            Self::Matrix(m) => Self::Matrix(m * m.transpose()),
        }
    }
}

fn mismatch(op: &str, lhs: &Value, rhs: &Value) -> StackError {
    StackError::ShapeMismatch(format!("{op}: {} vs {}", lhs.describe(), rhs.describe()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_arithmetic() {
        let a = Value::scalar(3.0);
        let b = Value::scalar(2.0);
        assert_eq!(a.add(&b).unwrap(), Value::scalar(5.0));
        assert_eq!(a.sub(&b).unwrap(), Value::scalar(1.0));
        assert_eq!(a.mul(&b).unwrap(), Value::scalar(6.0));
        assert_eq!(a.emul(&b).unwrap(), Value::scalar(6.0));
        assert_eq!(a.scale(0.5), Value::scalar(1.5));
    }

    #[test]
    fn test_matrix_product_shapes() {
        let m = Value::matrix(2, 2, &[1.0, 2.0, 3.0, 4.0]);
        let v = Value::vector(&[1.0, 1.0]);
        let out = m.mul(&v).unwrap();
        assert_eq!(out.shape(), (2, 1));
        assert_eq!(out, Value::vector(&[3.0, 7.0]));
    }

    #[test]
    fn test_mixed_kinds_rejected() {
        let s = Value::scalar(1.0);
        let v = Value::vector(&[1.0, 2.0]);
        assert!(matches!(s.add(&v), Err(StackError::ShapeMismatch(_))));
        assert!(matches!(v.mul(&s), Err(StackError::ShapeMismatch(_))));
        assert!(matches!(v.emul(&s), Err(StackError::ShapeMismatch(_))));
    }

    #[test]
    fn test_incompatible_dims_rejected() {
        let a = Value::vector(&[1.0, 2.0]);
        let b = Value::vector(&[1.0, 2.0, 3.0]);
        assert!(matches!(a.add(&b), Err(StackError::ShapeMismatch(_))));
        assert!(matches!(a.mul(&b), Err(StackError::ShapeMismatch(_))));
    }

    #[test]
    fn test_transpose_vector() {
        let v = Value::vector(&[1.0, 2.0, 3.0]);
        assert_eq!(v.transpose().shape(), (1, 3));
    }

    #[test]
    fn test_square_is_outer_product() {
        let v = Value::vector(&[1.0, 2.0]);
        let sq = v.square();
        assert_eq!(sq.shape(), (2, 2));
        assert_eq!(sq, Value::matrix(2, 2, &[1.0, 2.0, 2.0, 4.0]));

        assert_eq!(Value::scalar(3.0).square(), Value::scalar(9.0));
    }

    #[test]
    fn test_inverse_scalar() {
        assert_eq!(
            Value::scalar(4.0).try_inverse().unwrap(),
            Value::scalar(0.25)
        );
        assert_eq!(
            Value::scalar(0.0).try_inverse(),
            Err(StackError::SingularMatrix)
        );
    }

    #[test]
    fn test_inverse_matrix() {
        let m = Value::matrix(2, 2, &[2.0, 0.0, 0.0, 4.0]);
        assert_eq!(
            m.try_inverse().unwrap(),
            Value::matrix(2, 2, &[0.5, 0.0, 0.0, 0.25])
        );

        let singular = Value::matrix(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(singular.try_inverse(), Err(StackError::SingularMatrix));
    }

    #[test]
    fn test_like_constructors() {
        let v = Value::vector(&[1.0, 2.0]);
        assert_eq!(v.zeros_like(), Value::vector(&[0.0, 0.0]));
        assert_eq!(v.ones_like(), Value::vector(&[1.0, 1.0]));
        assert_eq!(Value::scalar(7.0).ones_like(), Value::scalar(1.0));
    }
}
