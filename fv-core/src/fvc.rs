//! Explicit finite-volume operators.
//!
//! Each operator evaluates face quantities from the current cell data and
//! sums them over the owned half-faces of every cell (Gauss's theorem),
//! divided by the cell volume.

use crate::field::{Field, ScalarField};
use crate::mesh::FvMeshData;
use crate::types::{Value, Vec3};
use crate::value::FvValue;

/// Cell gradient: `(1/V) Σ φ_f ⊗ n_f A_f`.
pub fn grad<V: Value>(value: &FvValue<'_, V>) -> Field<V::Gradient> {
    grad_of_faces(value.mesh(), &value.face_values())
}

/// [`grad`] from precomputed face values.
pub fn grad_of_faces<V: Value>(mesh: &FvMeshData, face_values: &Field<V>) -> Field<V::Gradient> {
    let mut out = Field::filled(mesh.cell_count(), V::zero_gradient());
    for f in 0..mesh.face_count() {
        let o = mesh.owner()[f];
        out[o] += face_values[f].outer(&(mesh.normal()[f] * mesh.area()[f]));
    }
    for (g, inv_v) in out.iter_mut().zip(mesh.inv_volume()) {
        *g = *g * *inv_v;
    }
    out
}

/// Cell divergence: `(1/V) Σ u_f · n_f A_f`.
pub fn div(value: &FvValue<'_, Vec3>) -> ScalarField {
    let mesh = value.mesh();
    let faces = value.face_values();
    let mut out = Field::zeros(mesh.cell_count());
    for f in 0..mesh.face_count() {
        out[mesh.owner()[f]] += faces[f].dot(&mesh.normal()[f]) * mesh.area()[f];
    }
    scale_by_inv_volume(mesh, &mut out);
    out
}

/// Explicit convection: `(1/V) Σ (a_f · n_f A_f) u_f`.
pub fn conv<V: Value>(a: &FvValue<'_, Vec3>, u: &FvValue<'_, V>) -> Field<V> {
    let mesh = u.mesh();
    let a_faces = a.face_values();
    let u_faces = u.face_values();
    let mut out = Field::zeros(mesh.cell_count());
    for f in 0..mesh.face_count() {
        let flux = a_faces[f].dot(&mesh.normal()[f]) * mesh.area()[f];
        out[mesh.owner()[f]] += u_faces[f] * flux;
    }
    scale_by_inv_volume(mesh, &mut out);
    out
}

fn scale_by_inv_volume<V: Value>(mesh: &FvMeshData, field: &mut Field<V>) {
    for (v, inv_v) in field.iter_mut().zip(mesh.inv_volume()) {
        *v = *v * *inv_v;
    }
}
