//! Minimal dense f64 array type.
//!
//! This is the numeric value layer the differentiation core wraps. It
//! provides exactly what the tracer and the gradient rules need: shape
//! introspection, zero/one construction, elementwise combinators with
//! scalar broadcasting, and a full-sum reduction. Anything fancier
//! (views, strides, linear algebra backends) is deliberately absent.

use crate::error::AdError;

/// A dense n-dimensional array of `f64` values.
///
/// A rank-0 tensor (empty shape) holds exactly one element and is the
/// canonical scalar.
///
/// # Examples
///
/// ```
/// use tapegrad::Tensor;
///
/// let t = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
/// assert_eq!(t.shape(), &[3]);
/// assert_eq!(t.len(), 3);
///
/// let s = Tensor::scalar(2.5);
/// assert!(s.is_scalar());
/// assert_eq!(s.item(), Some(2.5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f64>,
    shape: Vec<usize>,
}

impl Tensor {
    /// Create a zero-filled tensor with the given shape.
    pub fn zeros(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self {
            data: vec![0.0; len],
            shape: shape.to_vec(),
        }
    }

    /// Create a one-filled tensor with the given shape.
    pub fn ones(shape: &[usize]) -> Self {
        let len: usize = shape.iter().product();
        Self {
            data: vec![1.0; len],
            shape: shape.to_vec(),
        }
    }

    /// Create a rank-0 tensor holding a single value.
    pub fn scalar(value: f64) -> Self {
        Self {
            data: vec![value],
            shape: Vec::new(),
        }
    }

    /// Create a tensor from data and shape.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::LengthMismatch`] if the data length does not
    /// match the number of elements the shape requires.
    pub fn from_vec(data: Vec<f64>, shape: &[usize]) -> Result<Self, AdError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(AdError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
        })
    }

    /// Get the shape.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the rank (number of dimensions).
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Get the total number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor has zero elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if the tensor holds exactly one element (rank-0 or `[1]`).
    #[inline]
    pub fn is_scalar(&self) -> bool {
        self.data.len() == 1
    }

    /// Get the underlying data slice.
    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Get the single element of a scalar tensor, `None` otherwise.
    pub fn item(&self) -> Option<f64> {
        if self.is_scalar() {
            Some(self.data[0])
        } else {
            None
        }
    }

    /// Apply a function to each element, returning a new tensor.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapegrad::Tensor;
    ///
    /// let t = Tensor::from_vec(vec![1.0, 4.0, 9.0], &[3]).unwrap();
    /// let r = t.map(f64::sqrt);
    /// assert_eq!(r.data(), &[1.0, 2.0, 3.0]);
    /// ```
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f64) -> f64,
    {
        Self {
            data: self.data.iter().map(|&x| f(x)).collect(),
            shape: self.shape.clone(),
        }
    }

    /// Combine two tensors element-wise.
    ///
    /// Shapes must match, or one operand must be a scalar, in which case it
    /// is broadcast over the other.
    ///
    /// # Errors
    ///
    /// Returns [`AdError::ShapeMismatch`] for incompatible non-scalar shapes.
    ///
    /// # Examples
    ///
    /// ```
    /// use tapegrad::Tensor;
    ///
    /// let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
    /// let b = Tensor::scalar(10.0);
    /// let c = a.zip(&b, |x, y| x * y).unwrap();
    /// assert_eq!(c.data(), &[10.0, 20.0, 30.0]);
    /// ```
    pub fn zip<F>(&self, other: &Tensor, f: F) -> Result<Self, AdError>
    where
        F: Fn(f64, f64) -> f64,
    {
        if self.shape == other.shape {
            Ok(Self {
                data: self
                    .data
                    .iter()
                    .zip(other.data.iter())
                    .map(|(&a, &b)| f(a, b))
                    .collect(),
                shape: self.shape.clone(),
            })
        } else if other.is_scalar() {
            let b = other.data[0];
            Ok(self.map(|a| f(a, b)))
        } else if self.is_scalar() {
            let a = self.data[0];
            Ok(Self {
                data: other.data.iter().map(|&b| f(a, b)).collect(),
                shape: other.shape.clone(),
            })
        } else {
            Err(AdError::ShapeMismatch {
                lhs: self.shape.clone(),
                rhs: other.shape.clone(),
            })
        }
    }

    /// Sum all elements into a rank-0 tensor.
    pub fn sum(&self) -> Self {
        Self::scalar(self.data.iter().sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_zeros_and_ones() {
        let z = Tensor::zeros(&[2, 3]);
        assert_eq!(z.shape(), &[2, 3]);
        assert_eq!(z.len(), 6);
        assert!(z.data().iter().all(|&x| x == 0.0));

        let o = Tensor::ones(&[4]);
        assert_eq!(o.data(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_scalar_is_rank_zero() {
        let s = Tensor::scalar(3.0);
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.len(), 1);
        assert!(s.is_scalar());
        assert_eq!(s.item(), Some(3.0));
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let result = Tensor::from_vec(vec![1.0, 2.0], &[3]);
        assert!(matches!(result, Err(AdError::LengthMismatch { .. })));
    }

    #[test]
    fn test_item_non_scalar() {
        let t = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        assert_eq!(t.item(), None);
    }

    #[test]
    fn test_map() {
        let t = Tensor::from_vec(vec![0.0, 1.0], &[2]).unwrap();
        let e = t.map(f64::exp);
        assert_relative_eq!(e.data()[0], 1.0);
        assert_relative_eq!(e.data()[1], std::f64::consts::E);
    }

    #[test]
    fn test_zip_same_shape() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let b = Tensor::from_vec(vec![4.0, 5.0, 6.0], &[3]).unwrap();
        let c = a.zip(&b, |x, y| x + y).unwrap();
        assert_eq!(c.data(), &[5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_zip_scalar_broadcast() {
        let a = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let s = Tensor::scalar(3.0);

        let left = s.zip(&a, |x, y| x - y).unwrap();
        assert_eq!(left.data(), &[2.0, 1.0]);
        assert_eq!(left.shape(), &[2]);

        let right = a.zip(&s, |x, y| x - y).unwrap();
        assert_eq!(right.data(), &[-2.0, -1.0]);
    }

    #[test]
    fn test_zip_shape_mismatch() {
        let a = Tensor::from_vec(vec![1.0, 2.0, 3.0], &[3]).unwrap();
        let b = Tensor::from_vec(vec![1.0, 2.0], &[2]).unwrap();
        let result = a.zip(&b, |x, y| x + y);
        assert!(matches!(result, Err(AdError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_sum() {
        let t = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let s = t.sum();
        assert!(s.is_scalar());
        assert_eq!(s.item(), Some(10.0));
    }
}
