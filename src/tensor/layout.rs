//! Mappings between tensor indices and positions in a shared buffer.

use super::error::TensorError;

/// A layout describes how a tensor's elements are laid out in its buffer.
///
/// A layout pairs a shape with the stride of each axis and an offset into the
/// buffer. Views produced by `permute`, `expand`, `narrow`, and `index_axis`
/// share the buffer of the tensor they were derived from and differ only in
/// their layout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    shape: Vec<usize>,
    strides: Vec<usize>,
    offset: usize,
}

impl Layout {
    /// Creates a contiguous row-major layout for the given shape.
    pub fn contiguous(shape: &[usize]) -> Self {
        let mut strides = vec![1; shape.len()];
        for axis in (0..shape.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * shape[axis + 1];
        }
        Self {
            shape: shape.to_vec(),
            strides,
            offset: 0,
        }
    }

    /// Returns the number of elements in each axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Returns the buffer distance between consecutive elements of each axis.
    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    /// Returns the number of axes.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Returns the number of elements addressed by the layout.
    pub fn elems(&self) -> usize {
        self.shape.iter().product()
    }

    /// Translates a tensor index into a position in the buffer.
    pub fn position(&self, index: &[usize]) -> usize {
        let products = index.iter().zip(self.strides.iter()).map(|(x, s)| x * s);
        self.offset + products.sum::<usize>()
    }

    /// Reports whether the layout addresses its buffer in row-major order
    /// without gaps.
    pub fn is_contiguous(&self) -> bool {
        if self.offset != 0 {
            return false;
        }
        let mut stride = 1;
        for (size, actual) in self.shape.iter().zip(self.strides.iter()).rev() {
            if *actual != stride {
                return false;
            }
            stride *= size;
        }
        true
    }

    /// Creates a row-major iterator over all indices addressed by the layout.
    pub(crate) fn indices(&self) -> Indices<'_> {
        Indices {
            layout: self,
            next: vec![0; self.shape.len()],
            exhausted: false,
        }
    }

    /// Returns a layout with singleton axes grown to the given shape.
    ///
    /// Grown axes get a stride of zero so every index along them maps to the
    /// same buffer position. Leading axes may be added.
    pub fn expand(&self, shape: &[usize]) -> Result<Self, TensorError> {
        if shape.len() < self.shape.len() {
            return Err(TensorError::IncompatibleShapes(
                self.shape.clone(),
                shape.to_vec(),
            ));
        }
        let mut strides = vec![0; shape.len()];
        for axis in 0..self.shape.len() {
            let old = self.shape.len() - axis - 1;
            let new = shape.len() - axis - 1;
            if self.shape[old] == shape[new] {
                strides[new] = self.strides[old];
            } else if self.shape[old] == 1 {
                strides[new] = 0;
            } else {
                return Err(TensorError::IncompatibleShapes(
                    self.shape.clone(),
                    shape.to_vec(),
                ));
            }
        }
        Ok(Self {
            shape: shape.to_vec(),
            strides,
            offset: self.offset,
        })
    }

    /// Returns a layout with the axes reordered by the given permutation.
    pub fn permute(&self, permutation: &[usize]) -> Result<Self, TensorError> {
        let rank = self.rank();
        if permutation.len() != rank {
            return Err(TensorError::InvalidPermutation(permutation.to_vec(), rank));
        }
        let mut seen = vec![false; rank];
        for &axis in permutation {
            if axis >= rank || seen[axis] {
                return Err(TensorError::InvalidPermutation(permutation.to_vec(), rank));
            }
            seen[axis] = true;
        }
        let shape = permutation.iter().map(|&axis| self.shape[axis]).collect();
        let strides = permutation.iter().map(|&axis| self.strides[axis]).collect();
        Ok(Self {
            shape,
            strides,
            offset: self.offset,
        })
    }

    /// Returns a layout restricted to `len` indices of an axis, starting at
    /// `start`.
    pub fn narrow(&self, axis: usize, start: usize, len: usize) -> Result<Self, TensorError> {
        let size = self.axis_size(axis)?;
        if len == 0 {
            let mut shape = self.shape.clone();
            shape[axis] = 0;
            return Err(TensorError::ZeroAxis(shape));
        }
        if start + len > size {
            return Err(TensorError::IndexOutOfBounds {
                index: start + len - 1,
                axis,
                size,
            });
        }
        let mut shape = self.shape.clone();
        shape[axis] = len;
        Ok(Self {
            shape,
            strides: self.strides.clone(),
            offset: self.offset + start * self.strides[axis],
        })
    }

    /// Returns a layout with the given axis removed, fixed to one index.
    pub fn index_axis(&self, axis: usize, index: usize) -> Result<Self, TensorError> {
        let size = self.axis_size(axis)?;
        if index >= size {
            return Err(TensorError::IndexOutOfBounds { index, axis, size });
        }
        let mut shape = self.shape.clone();
        let mut strides = self.strides.clone();
        shape.remove(axis);
        let stride = strides.remove(axis);
        Ok(Self {
            shape,
            strides,
            offset: self.offset + index * stride,
        })
    }

    /// Returns a layout with all singleton axes removed.
    pub fn squeeze(&self) -> Self {
        let mut shape = Vec::with_capacity(self.shape.len());
        let mut strides = Vec::with_capacity(self.strides.len());
        for (&size, &stride) in self.shape.iter().zip(self.strides.iter()) {
            if size != 1 {
                shape.push(size);
                strides.push(stride);
            }
        }
        Self {
            shape,
            strides,
            offset: self.offset,
        }
    }

    /// Returns the reduced layout and the reducer layout for the given axes.
    ///
    /// The reduced layout keeps every reduced axis with size one. The reducer
    /// layout is the reduced layout with the strides of the reduced axes set
    /// to zero, so that all indices along a reduced axis in the original
    /// tensor map to the same position in the reduced tensor.
    pub(crate) fn reduce(&self, axes: &[usize]) -> Result<(Self, Self), TensorError> {
        let mut shape = self.shape.clone();
        for &axis in axes {
            self.axis_size(axis)?;
            shape[axis] = 1;
        }
        let reduced = Self::contiguous(&shape);
        let mut reducer = reduced.clone();
        for &axis in axes {
            reducer.strides[axis] = 0;
        }
        Ok((reduced, reducer))
    }

    fn axis_size(&self, axis: usize) -> Result<usize, TensorError> {
        self.shape
            .get(axis)
            .copied()
            .ok_or(TensorError::AxisOutOfBounds {
                axis,
                rank: self.rank(),
            })
    }
}

/// A row-major iterator over the indices addressed by a layout.
#[derive(Debug)]
pub(crate) struct Indices<'a> {
    layout: &'a Layout,
    next: Vec<usize>,
    exhausted: bool,
}

impl Iterator for Indices<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let index = self.next.clone();
        for (axis, size) in self.layout.shape.iter().enumerate().rev() {
            self.next[axis] += 1;
            if self.next[axis] < *size {
                return Some(index);
            }
            self.next[axis] = 0;
        }
        self.exhausted = true;
        Some(index)
    }
}
