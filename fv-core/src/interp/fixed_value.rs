//! Prescribed face values (Dirichlet condition).

use super::{dirichlet_face_coeffs, dirichlet_face_grad, dirichlet_face_grad_coeffs, Interpolator};
use crate::error::{Error, Result};
use crate::field::{CellData, Field};
use crate::matrix::FvMatrix;
use crate::patch::Patch;
use crate::types::Value;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct FixedValue<'m, V: Value> {
    patch: Patch<'m>,
    values: Vec<V>,
}

impl<'m, V: Value> FixedValue<'m, V> {
    /// One value per face of `patch`, in face order.
    pub fn new(patch: Patch<'m>, values: Vec<V>) -> Result<Self> {
        if values.len() != patch.count() {
            return Err(Error::DimensionMismatch {
                expected: patch.count(),
                found: values.len(),
                context: "fixed face values",
            });
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(Error::NonFiniteValue {
                location: crate::error::Location::FaceSource,
                index: patch.begin() + i,
            });
        }
        Ok(Self { patch, values })
    }

    /// Same value on every face.
    pub fn uniform(patch: Patch<'m>, value: V) -> Self {
        Self {
            values: vec![value; patch.count()],
            patch,
        }
    }

    /// Values evaluated at each face centre.
    pub fn from_fn(patch: Patch<'m>, f: impl Fn(&crate::types::Point3) -> V) -> Result<Self> {
        let values = patch.faces().map(|face| f(&patch.face_center(face))).collect();
        Self::new(patch, values)
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn set_values(&mut self, values: Vec<V>) -> Result<()> {
        *self = Self::new(self.patch, values)?;
        Ok(())
    }
}

impl<'m, V: Value> Interpolator<V> for FixedValue<'m, V> {
    fn faces(&self) -> Range<usize> {
        self.patch.faces()
    }

    fn face_values(&self, out: &mut Field<V>, _data: &CellData<V>) {
        for (i, f) in self.patch.faces().enumerate() {
            out[f] = self.values[i];
        }
    }

    fn face_coeffs(&self, out: &mut FvMatrix<'_, V>, _data: &CellData<V>) -> Result<()> {
        dirichlet_face_coeffs(&self.patch, &self.values, out)
    }

    fn face_grad(&self, out: &mut Field<V>, data: &CellData<V>) {
        dirichlet_face_grad(&self.patch, &self.values, out, data);
    }

    fn face_grad_coeffs(&self, out: &mut FvMatrix<'_, V>, _data: &CellData<V>) -> Result<()> {
        dirichlet_face_grad_coeffs(&self.patch, &self.values, out)
    }
}
