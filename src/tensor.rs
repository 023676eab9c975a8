//! The strided N-dimensional array shared by datasets, generators, and
//! attacks.

use std::{iter, ops, sync::Arc};

use crate::tensor::elem::{Elem, Float, Num};

pub mod elem;
mod error;
mod layout;

pub use error::TensorError;
pub use layout::Layout;

/// An immutable N-dimensional array with shared storage.
///
/// Operations never mutate their operands. Structural operations (`permute`,
/// `expand`, `narrow`, `index_axis`, `squeeze`) return views sharing the
/// buffer of the original tensor, while element-wise operations and
/// reductions materialize new buffers in row-major order. A tensor with an
/// empty shape is a scalar holding a single element; zero-sized axes are
/// rejected at construction.
#[derive(Debug)]
pub struct Tensor<E = f32> {
    buffer: Arc<[E]>,
    layout: Layout,
}

impl<E> Clone for Tensor<E> {
    fn clone(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            layout: self.layout.clone(),
        }
    }
}

impl<'a, E: Elem> IntoIterator for &'a Tensor<E> {
    type Item = &'a E;

    type IntoIter = Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<E: Num> ops::Add<Self> for &Tensor<E> {
    type Output = Tensor<E>;

    fn add(self, other: Self) -> Self::Output {
        Tensor::add(self, other).expect("tensors can be broadcasted")
    }
}

impl<E: Num> ops::Sub<Self> for &Tensor<E> {
    type Output = Tensor<E>;

    fn sub(self, other: Self) -> Self::Output {
        Tensor::sub(self, other).expect("tensors can be broadcasted")
    }
}

impl<E: Num> ops::Mul<Self> for &Tensor<E> {
    type Output = Tensor<E>;

    fn mul(self, other: Self) -> Self::Output {
        Tensor::mul(self, other).expect("tensors can be broadcasted")
    }
}

impl<E: Num> ops::Div<Self> for &Tensor<E> {
    type Output = Tensor<E>;

    fn div(self, other: Self) -> Self::Output {
        Tensor::div(self, other).expect("tensors can be broadcasted")
    }
}

impl<E: Elem> Tensor<E> {
    /// Create a tensor given its shape and data.
    ///
    /// The order of the elements in `data` is in increasing order of the last
    /// axis, then the second last, and so on.
    pub fn new(shape: &[usize], data: &[E]) -> Result<Self, TensorError> {
        if shape.contains(&0) {
            return Err(TensorError::ZeroAxis(shape.to_vec()));
        }
        let layout = Layout::contiguous(shape);
        if layout.elems() != data.len() {
            return Err(TensorError::ElementCount {
                shape: shape.to_vec(),
                expected: layout.elems(),
                actual: data.len(),
            });
        }
        Ok(Self {
            buffer: data.to_vec().into(),
            layout,
        })
    }

    /// Create a scalar holding the given value.
    ///
    /// This is a special tensor that has no shape.
    pub fn scalar(value: E) -> Self {
        Self {
            buffer: vec![value].into(),
            layout: Layout::contiguous(&[]),
        }
    }

    /// Create a tensor given its shape filled with a single value.
    pub fn full(shape: &[usize], value: E) -> Result<Self, TensorError> {
        if shape.contains(&0) {
            return Err(TensorError::ZeroAxis(shape.to_vec()));
        }
        let layout = Layout::contiguous(shape);
        let buffer: Vec<E> = iter::repeat(value).take(layout.elems()).collect();
        Ok(Self {
            buffer: buffer.into(),
            layout,
        })
    }

    /// Create a tensor given its shape filled with zeros.
    pub fn zeros(shape: &[usize]) -> Result<Self, TensorError>
    where
        E: Num,
    {
        Self::full(shape, E::zero())
    }

    /// Stack tensors of identical shape along a new leading axis.
    pub fn stack(parts: &[Self]) -> Result<Self, TensorError> {
        let Some(first) = parts.first() else {
            return Err(TensorError::ZeroAxis(vec![0]));
        };
        let mut buffer = Vec::with_capacity(parts.len() * first.elems());
        for part in parts {
            if part.shape() != first.shape() {
                return Err(TensorError::IncompatibleShapes(
                    first.shape().to_vec(),
                    part.shape().to_vec(),
                ));
            }
            buffer.extend(part.iter().cloned());
        }
        let mut shape = Vec::with_capacity(first.rank() + 1);
        shape.push(parts.len());
        shape.extend_from_slice(first.shape());
        Ok(Self {
            buffer: buffer.into(),
            layout: Layout::contiguous(&shape),
        })
    }

    /// Concatenate tensors along their first axis.
    ///
    /// All parts must have the same shape past the first axis.
    pub fn concat_rows(parts: &[Self]) -> Result<Self, TensorError> {
        let Some(first) = parts.first() else {
            return Err(TensorError::ZeroAxis(vec![0]));
        };
        if first.rank() == 0 {
            return Err(TensorError::NotAMatrix(vec![]));
        }
        let mut rows = 0;
        let mut buffer = Vec::new();
        for part in parts {
            if part.rank() != first.rank() || part.shape()[1..] != first.shape()[1..] {
                return Err(TensorError::IncompatibleShapes(
                    first.shape().to_vec(),
                    part.shape().to_vec(),
                ));
            }
            rows += part.shape()[0];
            buffer.extend(part.iter().cloned());
        }
        let mut shape = first.shape().to_vec();
        shape[0] = rows;
        Ok(Self {
            buffer: buffer.into(),
            layout: Layout::contiguous(&shape),
        })
    }

    /// Return the shape of the tensor.
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Return the number of axes of the tensor.
    pub fn rank(&self) -> usize {
        self.layout.rank()
    }

    /// Return the number of elements in the tensor.
    pub fn elems(&self) -> usize {
        self.layout.elems()
    }

    /// Create a row-major iterator over the tensor's elements.
    pub fn iter(&self) -> Iter<'_, E> {
        Iter {
            tensor: self,
            indices: self.layout.indices(),
        }
    }

    /// Collect all elements of the tensor into a [`Vec`] in row-major order.
    pub fn ravel(&self) -> Vec<E> {
        self.iter().cloned().collect()
    }

    /// Add `other` to `self`, element-wise.
    ///
    /// The tensors are broadcasted to the same shape before adding if
    /// necessary.
    pub fn add(&self, other: &Self) -> Result<Self, TensorError>
    where
        E: Num,
    {
        self.zip_with(other, |x, y| x.clone() + y.clone())
    }

    /// Subtract `other` from `self`, element-wise.
    ///
    /// The tensors are broadcasted to the same shape before subtracting if
    /// necessary.
    pub fn sub(&self, other: &Self) -> Result<Self, TensorError>
    where
        E: Num,
    {
        self.zip_with(other, |x, y| x.clone() - y.clone())
    }

    /// Multiply `self` by `other`, element-wise.
    ///
    /// The tensors are broadcasted to the same shape before multiplying if
    /// necessary.
    pub fn mul(&self, other: &Self) -> Result<Self, TensorError>
    where
        E: Num,
    {
        self.zip_with(other, |x, y| x.clone() * y.clone())
    }

    /// Divide `self` by `other`, element-wise.
    ///
    /// The tensors are broadcasted to the same shape before dividing if
    /// necessary.
    pub fn div(&self, other: &Self) -> Result<Self, TensorError>
    where
        E: Num,
    {
        self.zip_with(other, |x, y| x.clone() / y.clone())
    }

    /// Multiply each element by a constant.
    #[must_use]
    pub fn scale(&self, factor: E) -> Self
    where
        E: Num,
    {
        self.map(|x| x.clone() * factor.clone())
    }

    /// Clamp each element to the interval `[lo, hi]`.
    #[must_use]
    pub fn clamp(&self, lo: E, hi: E) -> Self
    where
        E: Num,
    {
        self.map(|x| {
            if *x < lo {
                lo.clone()
            } else if *x > hi {
                hi.clone()
            } else {
                x.clone()
            }
        })
    }

    /// Apply exp to each element.
    #[must_use]
    pub fn exp(&self) -> Self
    where
        E: Float,
    {
        self.map(|x| x.exp())
    }

    /// Apply the natural logarithm to each element.
    #[must_use]
    pub fn ln(&self) -> Self
    where
        E: Float,
    {
        self.map(|x| x.ln())
    }

    /// Apply the square root to each element.
    #[must_use]
    pub fn sqrt(&self) -> Self
    where
        E: Float,
    {
        self.map(|x| x.sqrt())
    }

    /// Take the absolute value of each element.
    #[must_use]
    pub fn abs(&self) -> Self
    where
        E: Float,
    {
        self.map(|x| x.abs())
    }

    /// Take the sign of each element, with zero mapped to zero.
    #[must_use]
    pub fn sign(&self) -> Self
    where
        E: Float,
    {
        self.map(|x| if x.is_zero() { E::zero() } else { x.signum() })
    }

    /// Reduce along the given axes by summing all elements.
    ///
    /// Reduced axes are kept with size one.
    pub fn sum(&self, axes: &[usize]) -> Result<Self, TensorError>
    where
        E: Num,
    {
        self.reduce(axes, E::zero, |acc, x| acc.clone() + x.clone())
    }

    /// Reduce along the given axes by taking the maximum of all elements.
    ///
    /// Reduced axes are kept with size one.
    pub fn max(&self, axes: &[usize]) -> Result<Self, TensorError>
    where
        E: Float,
    {
        self.reduce(axes, E::neg_infinity, |acc, x| {
            if *x > *acc {
                x.clone()
            } else {
                acc.clone()
            }
        })
    }

    /// Reduce along the given axes by averaging all elements.
    ///
    /// Reduced axes are kept with size one.
    pub fn mean(&self, axes: &[usize]) -> Result<Self, TensorError>
    where
        E: Float,
    {
        let mut count = 1;
        for &axis in axes {
            if axis >= self.rank() {
                return Err(TensorError::AxisOutOfBounds {
                    axis,
                    rank: self.rank(),
                });
            }
            count *= self.shape()[axis];
        }
        let divisor = E::from(count).expect("axis sizes fit the element type");
        Ok(self.sum(axes)?.map(|x| *x / divisor))
    }

    /// Return the smallest element of the tensor.
    pub fn min_value(&self) -> E
    where
        E: Num,
    {
        self.fold_values(|acc, x| if *x < *acc { x.clone() } else { acc.clone() })
    }

    /// Return the largest element of the tensor.
    pub fn max_value(&self) -> E
    where
        E: Num,
    {
        self.fold_values(|acc, x| if *x > *acc { x.clone() } else { acc.clone() })
    }

    /// Return the average of all elements of the tensor.
    pub fn mean_value(&self) -> E
    where
        E: Float,
    {
        let sum = self.fold_values(|acc, x| acc.clone() + x.clone());
        let count = E::from(self.elems()).expect("element count fits the element type");
        sum / count
    }

    /// Reshape the tensor to the given shape, keeping the number of elements
    /// unchanged.
    pub fn reshape(&self, shape: &[usize]) -> Result<Self, TensorError> {
        if shape.contains(&0) {
            return Err(TensorError::ZeroAxis(shape.to_vec()));
        }
        let layout = Layout::contiguous(shape);
        if layout.elems() != self.elems() {
            return Err(TensorError::ElementCount {
                shape: shape.to_vec(),
                expected: layout.elems(),
                actual: self.elems(),
            });
        }
        let buffer = if self.layout.is_contiguous() {
            Arc::clone(&self.buffer)
        } else {
            self.ravel().into()
        };
        Ok(Self { buffer, layout })
    }

    /// Permute the tensor axes according to the given permutation.
    pub fn permute(&self, permutation: &[usize]) -> Result<Self, TensorError> {
        Ok(Self {
            buffer: Arc::clone(&self.buffer),
            layout: self.layout.permute(permutation)?,
        })
    }

    /// Swap 2 axes of the tensor without cloning its data.
    pub fn transpose(&self, axis0: usize, axis1: usize) -> Result<Self, TensorError> {
        let rank = self.rank();
        for axis in [axis0, axis1] {
            if axis >= rank {
                return Err(TensorError::AxisOutOfBounds { axis, rank });
            }
        }
        let mut permutation: Vec<_> = (0..rank).collect();
        permutation.swap(axis0, axis1);
        self.permute(&permutation)
    }

    /// Expand singleton axes in the tensor to a larger size.
    pub fn expand(&self, shape: &[usize]) -> Result<Self, TensorError> {
        Ok(Self {
            buffer: Arc::clone(&self.buffer),
            layout: self.layout.expand(shape)?,
        })
    }

    /// Remove all singleton axes from the tensor.
    #[must_use]
    pub fn squeeze(&self) -> Self {
        Self {
            buffer: Arc::clone(&self.buffer),
            layout: self.layout.squeeze(),
        }
    }

    /// Restrict an axis to `len` indices starting at `start`, without cloning
    /// the data.
    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Result<Self, TensorError> {
        Ok(Self {
            buffer: Arc::clone(&self.buffer),
            layout: self.layout.narrow(axis, start, len)?,
        })
    }

    /// Select one index of an axis, removing the axis, without cloning the
    /// data.
    pub fn index_axis(&self, axis: usize, index: usize) -> Result<Self, TensorError> {
        Ok(Self {
            buffer: Arc::clone(&self.buffer),
            layout: self.layout.index_axis(axis, index)?,
        })
    }

    /// Matrix product of two matrices.
    pub fn matmul(&self, other: &Self) -> Result<Self, TensorError>
    where
        E: Num,
    {
        let lhs = self.shape();
        let rhs = other.shape();
        if lhs.len() != 2 {
            return Err(TensorError::NotAMatrix(lhs.to_vec()));
        }
        if rhs.len() != 2 {
            return Err(TensorError::NotAMatrix(rhs.to_vec()));
        }
        if lhs[1] != rhs[0] {
            return Err(TensorError::IncompatibleShapes(lhs.to_vec(), rhs.to_vec()));
        }
        let (m, k, n) = (lhs[0], lhs[1], rhs[1]);
        let mut buffer = Vec::with_capacity(m * n);
        for i in 0..m {
            for j in 0..n {
                let mut acc = E::zero();
                for p in 0..k {
                    acc = acc + self.at(&[i, p]).clone() * other.at(&[p, j]).clone();
                }
                buffer.push(acc);
            }
        }
        Ok(Self {
            buffer: buffer.into(),
            layout: Layout::contiguous(&[m, n]),
        })
    }

    /// Return the column of the largest element in each row of a matrix.
    ///
    /// Ties resolve to the first occurrence.
    pub fn argmax_rows(&self) -> Result<Vec<usize>, TensorError>
    where
        E: PartialOrd,
    {
        let shape = self.shape();
        if shape.len() != 2 {
            return Err(TensorError::NotAMatrix(shape.to_vec()));
        }
        let (rows, cols) = (shape[0], shape[1]);
        let mut out = Vec::with_capacity(rows);
        for i in 0..rows {
            let mut best = 0;
            for j in 1..cols {
                if self.at(&[i, j]) > self.at(&[i, best]) {
                    best = j;
                }
            }
            out.push(best);
        }
        Ok(out)
    }

    fn at(&self, index: &[usize]) -> &E {
        &self.buffer[self.layout.position(index)]
    }

    fn map<F>(&self, op: F) -> Self
    where
        F: Fn(&E) -> E,
    {
        let buffer: Vec<E> = self.iter().map(op).collect();
        Self {
            buffer: buffer.into(),
            layout: Layout::contiguous(self.shape()),
        }
    }

    fn zip_with<F>(&self, other: &Self, op: F) -> Result<Self, TensorError>
    where
        F: Fn(&E, &E) -> E,
    {
        let shape = broadcast_shape(self.shape(), other.shape())?;
        let lhs = self.expand(&shape)?;
        let rhs = other.expand(&shape)?;
        let buffer: Vec<E> = lhs
            .layout
            .indices()
            .map(|index| op(lhs.at(&index), rhs.at(&index)))
            .collect();
        Ok(Self {
            buffer: buffer.into(),
            layout: Layout::contiguous(&shape),
        })
    }

    fn reduce<D, F>(&self, axes: &[usize], init: D, fold: F) -> Result<Self, TensorError>
    where
        D: Fn() -> E,
        F: Fn(&E, &E) -> E,
    {
        let (reduced, reducer) = self.layout.reduce(axes)?;
        let mut buffer: Vec<E> = iter::repeat_with(init).take(reduced.elems()).collect();
        for index in self.layout.indices() {
            let dst = reducer.position(&index);
            buffer[dst] = fold(&buffer[dst], self.at(&index));
        }
        Ok(Self {
            buffer: buffer.into(),
            layout: reduced,
        })
    }

    fn fold_values<F>(&self, fold: F) -> E
    where
        F: Fn(&E, &E) -> E,
    {
        let mut it = self.iter();
        let Some(first) = it.next() else {
            unreachable!("zero-sized axes are rejected at construction");
        };
        let mut acc = first.clone();
        for x in it {
            acc = fold(&acc, x);
        }
        acc
    }
}

/// A row-major iterator over a tensor's elements.
#[derive(Debug)]
pub struct Iter<'a, E> {
    tensor: &'a Tensor<E>,
    indices: layout::Indices<'a>,
}

impl<'a, E> Iterator for Iter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        self.indices
            .next()
            .map(|index| &self.tensor.buffer[self.tensor.layout.position(&index)])
    }
}

/// Compute the common shape two shapes broadcast to.
///
/// Shapes are zipped from their trailing axes; paired sizes must either match
/// or be one, and missing leading axes count as one.
fn broadcast_shape(lhs: &[usize], rhs: &[usize]) -> Result<Vec<usize>, TensorError> {
    let rank = lhs.len().max(rhs.len());
    let mut shape = vec![1; rank];
    for dim in 0..rank {
        let l = if dim < lhs.len() {
            lhs[lhs.len() - dim - 1]
        } else {
            1
        };
        let r = if dim < rhs.len() {
            rhs[rhs.len() - dim - 1]
        } else {
            1
        };
        shape[rank - dim - 1] = if l == r || r == 1 {
            l
        } else if l == 1 {
            r
        } else {
            return Err(TensorError::IncompatibleShapes(lhs.to_vec(), rhs.to_vec()));
        };
    }
    Ok(shape)
}
