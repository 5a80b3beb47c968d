//! Prescribed normal gradients (Neumann condition).
//!
//! The face value is extrapolated linearly from the owner:
//! `φ_f = φ_o + g / inv_dist`.

use super::Interpolator;
use crate::error::{Error, Location, Result};
use crate::field::{CellData, Field};
use crate::matrix::FvMatrix;
use crate::patch::Patch;
use crate::types::{Value, Vec3};
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct FixedGradient<'m, V: Value> {
    patch: Patch<'m>,
    gradients: Vec<V>,
}

/// Vector Neumann condition, zero unless overridden per face.
pub type ZeroVecGradient<'m> = FixedGradient<'m, Vec3>;

impl<'m, V: Value> FixedGradient<'m, V> {
    /// One normal gradient per face of `patch`.
    pub fn new(patch: Patch<'m>, gradients: Vec<V>) -> Result<Self> {
        if gradients.len() != patch.count() {
            return Err(Error::DimensionMismatch {
                expected: patch.count(),
                found: gradients.len(),
                context: "fixed face gradients",
            });
        }
        if let Some(i) = gradients.iter().position(|g| !g.is_finite()) {
            return Err(Error::NonFiniteValue {
                location: Location::FaceSource,
                index: patch.begin() + i,
            });
        }
        Ok(Self { patch, gradients })
    }

    pub fn uniform(patch: Patch<'m>, gradient: V) -> Self {
        Self {
            gradients: vec![gradient; patch.count()],
            patch,
        }
    }

    /// Zero flux through every face.
    pub fn zero(patch: Patch<'m>) -> Self {
        Self::uniform(patch, V::zero())
    }

    /// Gradients evaluated from face centre and outward normal.
    pub fn from_fn(patch: Patch<'m>, f: impl Fn(&crate::types::Point3, &Vec3) -> V) -> Result<Self> {
        let gradients = patch
            .faces()
            .map(|face| f(&patch.face_center(face), &patch.normal(face)))
            .collect();
        Self::new(patch, gradients)
    }

    pub fn gradients(&self) -> &[V] {
        &self.gradients
    }

    /// Override the gradient on one face, by global face id.
    pub fn set_gradient(&mut self, face: usize, gradient: V) -> Result<()> {
        let range = self.patch.faces();
        if !range.contains(&face) {
            return Err(Error::PatchOutOfRange {
                begin: face,
                end: face + 1,
                face_count: self.patch.mesh().face_count(),
            });
        }
        if !gradient.is_finite() {
            return Err(Error::NonFiniteValue {
                location: Location::FaceSource,
                index: face,
            });
        }
        self.gradients[face - range.start] = gradient;
        Ok(())
    }

    fn offset(&self, i: usize, face: usize) -> V {
        self.gradients[i] * (1.0 / self.patch.inv_dist(face))
    }
}

impl<'m, V: Value> Interpolator<V> for FixedGradient<'m, V> {
    fn faces(&self) -> Range<usize> {
        self.patch.faces()
    }

    fn face_values(&self, out: &mut Field<V>, data: &CellData<V>) {
        for (i, f) in self.patch.faces().enumerate() {
            out[f] = data.values[self.patch.owner(f)] + self.offset(i, f);
        }
    }

    fn face_coeffs(&self, out: &mut FvMatrix<'_, V>, _data: &CellData<V>) -> Result<()> {
        let faces = self.patch.faces();
        let owner = vec![V::splat(1.0); faces.len()];
        let neigh = vec![V::zero(); faces.len()];
        let source: Vec<V> = faces.clone().enumerate().map(|(i, f)| self.offset(i, f)).collect();
        out.add_fcoeffs(faces.clone(), &neigh, &owner)?;
        out.add_fsources(faces, &source)
    }

    fn face_grad(&self, out: &mut Field<V>, _data: &CellData<V>) {
        for (i, f) in self.patch.faces().enumerate() {
            out[f] = self.gradients[i];
        }
    }

    fn face_grad_coeffs(&self, out: &mut FvMatrix<'_, V>, _data: &CellData<V>) -> Result<()> {
        out.add_fsources(self.patch.faces(), &self.gradients)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ScalarData, VectorData};
    use crate::interp::test_support::channel;
    use approx::assert_relative_eq;

    #[test]
    fn test_extrapolates_linear_field_exactly() {
        let mesh = channel([2, 2, 2], Vec3::new(1.0, 1.0, 1.0));
        let g = Vec3::new(0.5, -1.0, 2.0);
        let values = Field::from_fn(mesh.cell_count(), |c| g.dot(&mesh.cell_centers()[c]));
        let data = ScalarData::from_values(values);
        let walls = FixedGradient::from_fn(mesh.wall(), |_, n| g.dot(n)).unwrap();

        let mut out = Field::zeros(mesh.face_count());
        walls.face_values(&mut out, &data);
        for f in walls.faces() {
            assert_relative_eq!(out[f], g.dot(&mesh.face_center(f)), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_vec_gradient_copies_owner() {
        let mesh = channel([1, 1, 1], Vec3::new(1.0, 1.0, 1.0));
        let u = Vec3::new(1.0, 2.0, 3.0);
        let data = VectorData::from_values(Field::filled(1, u));
        let mut outlet = ZeroVecGradient::zero(mesh.outlet());

        let mut values = Field::zeros(mesh.face_count());
        outlet.face_values(&mut values, &data);
        let f = mesh.outlet().faces().start;
        assert_relative_eq!(values[f], u);

        outlet.set_gradient(f, Vec3::new(0.0, 0.0, 4.0)).unwrap();
        let mut grads = Field::zeros(mesh.face_count());
        outlet.face_grad(&mut grads, &data);
        assert_relative_eq!(grads[f], Vec3::new(0.0, 0.0, 4.0));
        assert_eq!(
            outlet.set_gradient(0, Vec3::zeros()),
            Err(Error::PatchOutOfRange {
                begin: 0,
                end: 1,
                face_count: mesh.face_count(),
            })
        );
    }

    #[test]
    fn test_coefficients_match_evaluation() {
        let mesh = channel([1, 1, 1], Vec3::new(2.0, 2.0, 2.0));
        let data = ScalarData::from_values(Field::from_vec(vec![3.0]));
        let inlet = FixedGradient::uniform(mesh.inlet(), 0.25);

        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        inlet.face_coeffs(&mut m, &data).unwrap();
        let mut out = Field::zeros(mesh.face_count());
        inlet.face_values(&mut out, &data);
        let f = mesh.inlet().faces().start;
        assert_relative_eq!(m.owner_coeffs()[f] * 3.0 + m.face_sources()[f], out[f]);
        assert_relative_eq!(out[f], 3.25);

        let mut g = FvMatrix::new(&mesh, &data).unwrap();
        inlet.face_grad_coeffs(&mut g, &data).unwrap();
        assert_relative_eq!(g.face_sources()[f], 0.25);
        assert_eq!(g.owner_coeffs()[f], 0.0);
    }
}
