//! First-order upwind scheme for vector convection.
//!
//! Each half-face compares the normal flux `u·n` carried by the owner value
//! with the one carried by the neighbor value and takes the side with the
//! larger flux, the owner on ties. Twin half-faces have opposite normals, so
//! unless the fluxes tie each picks its own owner or both pick the same
//! cell. Gradients fall back to the central scheme.

use super::{central_face_grad, central_face_grad_coeffs, Interpolator};
use crate::error::Result;
use crate::field::{CellData, Field};
use crate::matrix::FvMatrix;
use crate::patch::InteriorPatch;
use crate::types::{Value, Vec3};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct Upwind<'m> {
    interior: InteriorPatch<'m>,
}

impl<'m> Upwind<'m> {
    pub fn new(interior: InteriorPatch<'m>) -> Self {
        Self { interior }
    }

    /// True when the owner value carries at least the neighbor's normal flux.
    fn owner_selected(&self, f: usize, data: &CellData<Vec3>) -> bool {
        let patch = self.interior.patch();
        let n = patch.normal(f);
        data.values[patch.owner(f)].dot(&n) >= data.values[patch.neighbor(f)].dot(&n)
    }
}

impl<'m> Interpolator<Vec3> for Upwind<'m> {
    fn faces(&self) -> Range<usize> {
        self.interior.faces()
    }

    fn face_values(&self, out: &mut Field<Vec3>, data: &CellData<Vec3>) {
        let patch = self.interior.patch();
        for f in self.interior.faces() {
            let cell = if self.owner_selected(f, data) {
                patch.owner(f)
            } else {
                patch.neighbor(f)
            };
            out[f] = data.values[cell];
        }
    }

    fn face_coeffs(&self, out: &mut FvMatrix<'_, Vec3>, data: &CellData<Vec3>) -> Result<()> {
        let faces = self.interior.faces();
        let (owner, neigh): (Vec<Vec3>, Vec<Vec3>) = faces
            .clone()
            .map(|f| {
                if self.owner_selected(f, data) {
                    (<Vec3 as Value>::splat(1.0), Vec3::zeros())
                } else {
                    (Vec3::zeros(), <Vec3 as Value>::splat(1.0))
                }
            })
            .unzip();
        out.add_fcoeffs(faces, &neigh, &owner)
    }

    fn face_grad(&self, out: &mut Field<Vec3>, data: &CellData<Vec3>) {
        central_face_grad(&self.interior, out, data);
    }

    fn face_grad_coeffs(&self, out: &mut FvMatrix<'_, Vec3>, data: &CellData<Vec3>) -> Result<()> {
        central_face_grad_coeffs(&self.interior, out, data)
    }
}
