//! Dense per-cell and per-face arrays.
//!
//! A [`Field`] does not record whether it lives on cells or on faces; its
//! length decides. Operators that accept either check the length against the
//! mesh and return [`Error::DimensionMismatch`](crate::Error::DimensionMismatch)
//! when it matches neither.

use crate::types::{Tensor3, Value, Vec3};
use std::ops::{Index, IndexMut};

/// Typed dense array, one entry per cell or per face.
#[derive(Debug, Clone, PartialEq)]
pub struct Field<T> {
    data: Vec<T>,
}

pub type ScalarField = Field<f64>;
pub type VectorField = Field<Vec3>;
pub type TensorField = Field<Tensor3>;
pub type IndexField = Field<usize>;
pub type MaskField = Field<bool>;

impl<T> Field<T> {
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    pub fn from_fn(len: usize, f: impl FnMut(usize) -> T) -> Self {
        Self {
            data: (0..len).map(f).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.data.iter_mut()
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Field<U> {
        Field {
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> Field<T> {
    pub fn filled(len: usize, value: T) -> Self {
        Self {
            data: vec![value; len],
        }
    }
}

impl<V: Value> Field<V> {
    pub fn zeros(len: usize) -> Self {
        Self::filled(len, V::zero())
    }

    /// Values of one axis as a contiguous vector.
    pub fn component(&self, axis: usize) -> Vec<f64> {
        self.data.iter().map(|v| v.axis(axis)).collect()
    }

    /// Overwrite one axis from a slice of matching length.
    pub fn set_component(&mut self, axis: usize, values: &[f64]) {
        debug_assert_eq!(values.len(), self.data.len());
        for (v, &x) in self.data.iter_mut().zip(values) {
            v.set_axis(axis, x);
        }
    }

    /// Index of the first entry with a NaN or infinite component.
    pub fn first_non_finite(&self) -> Option<usize> {
        self.data.iter().position(|v| !v.is_finite())
    }
}

impl<T> Index<usize> for Field<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.data[index]
    }
}

impl<T> IndexMut<usize> for Field<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index]
    }
}

impl<T> FromIterator<T> for Field<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a Field<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// Cell-centred unknown: values plus their stored gradients.
///
/// Gradients feed the non-orthogonal correction of face gradients; refresh
/// them with [`FvValue::update_gradients`](crate::value::FvValue::update_gradients).
#[derive(Debug, Clone, PartialEq)]
pub struct CellData<V: Value> {
    pub values: Field<V>,
    pub gradients: Field<V::Gradient>,
}

pub type ScalarData = CellData<f64>;
pub type VectorData = CellData<Vec3>;

impl<V: Value> CellData<V> {
    /// Zero values and zero gradients.
    pub fn zeros(cell_count: usize) -> Self {
        Self {
            values: Field::zeros(cell_count),
            gradients: Field::filled(cell_count, V::zero_gradient()),
        }
    }

    /// Given values with zero gradients.
    pub fn from_values(values: Field<V>) -> Self {
        let n = values.len();
        Self {
            values,
            gradients: Field::filled(n, V::zero_gradient()),
        }
    }

    pub fn cell_count(&self) -> usize {
        self.values.len()
    }
}
