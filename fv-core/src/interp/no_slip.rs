//! Stationary wall: zero velocity on every face of the patch.

use super::{dirichlet_face_grad, dirichlet_face_grad_coeffs, Interpolator};
use crate::error::Result;
use crate::field::{CellData, Field};
use crate::matrix::FvMatrix;
use crate::patch::Patch;
use crate::types::Vec3;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct NoSlip<'m> {
    patch: Patch<'m>,
    zeros: Vec<Vec3>,
}

impl<'m> NoSlip<'m> {
    pub fn new(patch: Patch<'m>) -> Self {
        Self {
            zeros: vec![Vec3::zeros(); patch.count()],
            patch,
        }
    }
}

impl<'m> Interpolator<Vec3> for NoSlip<'m> {
    fn faces(&self) -> Range<usize> {
        self.patch.faces()
    }

    fn face_values(&self, out: &mut Field<Vec3>, _data: &CellData<Vec3>) {
        for f in self.patch.faces() {
            out[f] = Vec3::zeros();
        }
    }

    /// Zero face value: nothing to add.
    fn face_coeffs(&self, _out: &mut FvMatrix<'_, Vec3>, _data: &CellData<Vec3>) -> Result<()> {
        Ok(())
    }

    fn face_grad(&self, out: &mut Field<Vec3>, data: &CellData<Vec3>) {
        dirichlet_face_grad(&self.patch, &self.zeros, out, data);
    }

    fn face_grad_coeffs(&self, out: &mut FvMatrix<'_, Vec3>, _data: &CellData<Vec3>) -> Result<()> {
        dirichlet_face_grad_coeffs(&self.patch, &self.zeros, out)
    }
}
