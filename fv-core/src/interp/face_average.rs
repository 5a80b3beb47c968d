//! Central (linear) interior scheme.
//!
//! Face value is the inverse-distance blend of owner and neighbor values.
//! The face gradient is the two-point difference along the centre line,
//! corrected for non-orthogonality with the blended stored cell gradients.
//! The correction is explicit: it enters the matrix as a face source, never
//! as a coefficient.

use super::{central_face_grad, central_face_grad_coeffs, Interpolator};
use crate::error::Result;
use crate::field::{CellData, Field};
use crate::matrix::FvMatrix;
use crate::patch::InteriorPatch;
use crate::types::Value;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct FaceAverage<'m> {
    interior: InteriorPatch<'m>,
}

impl<'m> FaceAverage<'m> {
    pub fn new(interior: InteriorPatch<'m>) -> Self {
        Self { interior }
    }
}

impl<'m, V: Value> Interpolator<V> for FaceAverage<'m> {
    fn faces(&self) -> Range<usize> {
        self.interior.faces()
    }

    fn face_values(&self, out: &mut Field<V>, data: &CellData<V>) {
        let patch = self.interior.patch();
        for f in self.interior.faces() {
            let (wo, wn) = self.interior.weights(f);
            out[f] = data.values[patch.owner(f)] * wo + data.values[patch.neighbor(f)] * wn;
        }
    }

    fn face_coeffs(&self, out: &mut FvMatrix<'_, V>, _data: &CellData<V>) -> Result<()> {
        let faces = self.interior.faces();
        let (owner, neigh): (Vec<V>, Vec<V>) = faces
            .clone()
            .map(|f| {
                let (wo, wn) = self.interior.weights(f);
                (V::splat(wo), V::splat(wn))
            })
            .unzip();
        out.add_fcoeffs(faces, &neigh, &owner)
    }

    fn face_grad(&self, out: &mut Field<V>, data: &CellData<V>) {
        central_face_grad(&self.interior, out, data);
    }

    fn face_grad_coeffs(&self, out: &mut FvMatrix<'_, V>, data: &CellData<V>) -> Result<()> {
        central_face_grad_coeffs(&self.interior, out, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ScalarData, VectorData};
    use crate::mesh::{build_mesh, BoundaryKind, VolumeMesh};
    use crate::types::{Tensor3, Vec3};
    use approx::assert_relative_eq;

    fn linear(mesh: &crate::mesh::FvMeshData, g: Vec3) -> ScalarData {
        let values = Field::from_fn(mesh.cell_count(), |c| g.dot(&mesh.cell_centers()[c]));
        let mut data = ScalarData::from_values(values);
        data.gradients = Field::filled(mesh.cell_count(), g);
        data
    }

    #[test]
    fn test_face_values_interpolate_linear_field() {
        let mesh = build_mesh(&VolumeMesh::cartesian_box([3, 2, 2], Vec3::new(3.0, 1.0, 1.0), [BoundaryKind::Wall; 6]))
            .unwrap();
        let g = Vec3::new(1.0, -2.0, 0.5);
        let data = linear(&mesh, g);
        let scheme = FaceAverage::new(mesh.interior());

        let mut out = Field::zeros(mesh.face_count());
        scheme.face_values(&mut out, &data);
        for f in Interpolator::<f64>::faces(&scheme) {
            assert_relative_eq!(out[f], g.dot(&mesh.face_center(f)), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_normal_gradient_exact_on_sheared_mesh() {
        let volume = VolumeMesh::cartesian_box([2, 2, 3], Vec3::new(2.0, 2.0, 3.0), [BoundaryKind::Wall; 6]).sheared(0.4);
        let mesh = build_mesh(&volume).unwrap();
        let g = Vec3::new(0.3, 0.0, 1.0);
        let data = linear(&mesh, g);
        let scheme = FaceAverage::new(mesh.interior());

        let mut out = Field::zeros(mesh.face_count());
        scheme.face_grad(&mut out, &data);
        let mut corrected = 0;
        for f in mesh.interior().faces() {
            assert_relative_eq!(out[f], g.dot(&mesh.normal()[f]), epsilon = 1e-12);
            let e = mesh.cell_centers()[mesh.neighbor()[f]] - mesh.cell_centers()[mesh.owner()[f]];
            if e.normalize().dot(&mesh.normal()[f]) < 1.0 - 1e-9 {
                corrected += 1;
            }
        }
        assert!(corrected > 0, "shear should make some faces non-orthogonal");
    }

    #[test]
    fn test_coefficients_reproduce_evaluated_gradient() {
        let volume = VolumeMesh::cartesian_box([2, 2, 2], Vec3::new(1.0, 1.0, 1.0), [BoundaryKind::Wall; 6]).sheared(0.25);
        let mesh = build_mesh(&volume).unwrap();
        let data = linear(&mesh, Vec3::new(0.0, 1.0, 2.0));
        let scheme = FaceAverage::new(mesh.interior());

        let mut evaluated = Field::zeros(mesh.face_count());
        scheme.face_grad(&mut evaluated, &data);
        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        scheme.face_grad_coeffs(&mut m, &data).unwrap();

        for f in mesh.interior().faces() {
            let o = mesh.owner()[f];
            let nb = mesh.neighbor()[f];
            let linear = m.owner_coeffs()[f] * data.values[o]
                + m.neigh_coeffs()[f] * data.values[nb]
                + m.face_sources()[f];
            assert_relative_eq!(linear, evaluated[f], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_twin_faces_are_antisymmetric() {
        let volume = VolumeMesh::cartesian_box([2, 2, 2], Vec3::new(1.0, 1.0, 1.0), [BoundaryKind::Wall; 6]).sheared(0.5);
        let mesh = build_mesh(&volume).unwrap();
        let mut data = linear(&mesh, Vec3::new(1.0, 2.0, 3.0));
        data.gradients = Field::from_fn(mesh.cell_count(), |c| Vec3::new(c as f64, 1.0, -(c as f64)));
        let scheme = FaceAverage::new(mesh.interior());

        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        scheme.face_grad_coeffs(&mut m, &data).unwrap();

        let mut net = 0.0;
        for f in mesh.interior().faces() {
            let twin = mesh
                .interior()
                .faces()
                .find(|&t| mesh.owner()[t] == mesh.neighbor()[f] && mesh.neighbor()[t] == mesh.owner()[f])
                .unwrap();
            assert_relative_eq!(m.owner_coeffs()[f], -m.neigh_coeffs()[twin]);
            assert_relative_eq!(m.face_sources()[f], -m.face_sources()[twin], epsilon = 1e-12);
            net += m.face_sources()[f] * mesh.area()[f];
        }
        assert_relative_eq!(net, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_vector_values_use_tensor_gradients() {
        let volume = VolumeMesh::cartesian_box([1, 1, 2], Vec3::new(1.0, 1.0, 2.0), [BoundaryKind::Wall; 6]).sheared(0.5);
        let mesh = build_mesh(&volume).unwrap();
        // u = (z, 0, 2x): rows of the gradient are component gradients
        let grad = Tensor3::new(0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let values = Field::from_fn(mesh.cell_count(), |c| grad * mesh.cell_centers()[c]);
        let mut data = VectorData::from_values(values);
        data.gradients = Field::filled(mesh.cell_count(), grad);

        let scheme = FaceAverage::new(mesh.interior());
        let mut out = Field::zeros(mesh.face_count());
        scheme.face_grad(&mut out, &data);
        for f in mesh.interior().faces() {
            assert_relative_eq!(out[f], grad * mesh.normal()[f], epsilon = 1e-12);
        }
    }
}
