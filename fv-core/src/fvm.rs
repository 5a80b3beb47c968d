//! Implicit finite-volume operators.
//!
//! Each operator returns a fresh [`FvMatrix`] for the unknown, built from the
//! unknown's interpolator coefficients and scaled to per-unit-volume form.
//! Terms compose with [`FvMatrix::add_matrix`] / [`FvMatrix::sub_matrix`]
//! before a single solve.

use crate::error::{Error, Result};
use crate::field::{Field, ScalarField};
use crate::matrix::FvMatrix;
use crate::mesh::FvMeshData;
use crate::types::{Value, Vec3};
use crate::value::FvValue;

/// `A_f / V_owner` per face.
fn area_per_volume(mesh: &FvMeshData) -> ScalarField {
    let owner = mesh.owner();
    let inv_volume = mesh.inv_volume();
    Field::from_fn(mesh.face_count(), |f| mesh.area()[f] * inv_volume[owner[f]])
}

/// Diffusion `∇²φ` with unit diffusivity.
pub fn laplace<'m, V: Value>(value: &FvValue<'m, V>) -> Result<FvMatrix<'m, V>> {
    let mut m = value.face_grad_coeffs()?;
    m.scale(&area_per_volume(value.mesh()))?;
    Ok(m)
}

/// Diffusion `∇·(Γ∇φ)`; `diffusivity` is face- or cell-indexed.
pub fn laplace_with<'m, V: Value>(diffusivity: &ScalarField, value: &FvValue<'m, V>) -> Result<FvMatrix<'m, V>> {
    let mut m = laplace(value)?;
    m.scale(diffusivity)?;
    Ok(m)
}

/// Convection `∇·(a φ)` with the unknown's face-value scheme.
pub fn conv<'m, V: Value>(a: &FvValue<'_, Vec3>, value: &FvValue<'m, V>) -> Result<FvMatrix<'m, V>> {
    let mesh = value.mesh();
    if a.mesh().face_count() != mesh.face_count() {
        return Err(Error::DimensionMismatch {
            expected: mesh.face_count(),
            found: a.mesh().face_count(),
            context: "convecting field",
        });
    }
    let a_faces = a.face_values();
    let owner = mesh.owner();
    let inv_volume = mesh.inv_volume();
    let flux = Field::from_fn(mesh.face_count(), |f| {
        a_faces[f].dot(&mesh.normal()[f]) * mesh.area()[f] * inv_volume[owner[f]]
    });

    let mut m = value.face_coeffs()?;
    m.scale(&flux)?;
    Ok(m)
}

/// Implicit Euler time derivative `(φ - φ_last) / dt`.
pub fn ddt<'m, V: Value>(value: &FvValue<'m, V>, last: &Field<V>, dt: f64) -> Result<FvMatrix<'m, V>> {
    let mesh = value.mesh();
    let nc = mesh.cell_count();
    if last.len() != nc {
        return Err(Error::DimensionMismatch {
            expected: nc,
            found: last.len(),
            context: "previous time level",
        });
    }
    let rate = 1.0 / dt;
    let mut m = FvMatrix::new(mesh, value.data())?;
    m.add_ccoeffs(0..nc, &vec![V::splat(rate); nc])?;
    let sources: Vec<V> = last.iter().map(|v| *v * rate).collect();
    m.add_csources(0..nc, &sources)?;
    Ok(m)
}
