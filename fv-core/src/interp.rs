//! Interpolator trait and face schemes.
//!
//! An [`Interpolator`] owns one contiguous face range and turns cell data
//! into face quantities, either evaluated (`face_values`, `face_grad`) or as
//! linear coefficients injected into an [`FvMatrix`] (`face_coeffs`,
//! `face_grad_coeffs`). Face gradients are normal derivatives `∂φ/∂n`.
//!
//! Coefficient methods write `φ_f = owner·φ_o + neigh·φ_n + source` per face
//! and axis. Boundary faces have `neighbor == owner`, so their `neigh`
//! coefficient lands on the diagonal too; schemes leave it zero.
//!
//! # Submodules
//!
//! - [`face_average`] - central interior scheme with non-orthogonal correction
//! - [`upwind`] - first-order interior convection for vector fields
//! - [`no_slip`] - zero-velocity wall
//! - [`fixed_value`] - prescribed face values (Dirichlet)
//! - [`fixed_gradient`] - prescribed normal gradients (Neumann)
//! - [`wave_generator`] - time-varying inlet profile

use crate::error::Result;
use crate::field::{CellData, Field};
use crate::matrix::FvMatrix;
use crate::patch::{InteriorPatch, Patch};
use crate::types::Value;
use std::ops::Range;

pub mod face_average;
pub mod fixed_gradient;
pub mod fixed_value;
pub mod no_slip;
pub mod upwind;
pub mod wave_generator;

pub use face_average::FaceAverage;
pub use fixed_gradient::{FixedGradient, ZeroVecGradient};
pub use fixed_value::FixedValue;
pub use no_slip::NoSlip;
pub use upwind::Upwind;
pub use wave_generator::WaveGenerator;

/// Face scheme for one patch.
///
/// Implementations write only inside [`faces`](Interpolator::faces).
pub trait Interpolator<V: Value> {
    /// Face range this scheme owns.
    fn faces(&self) -> Range<usize>;

    /// Evaluate face values into `out` (face-indexed).
    fn face_values(&self, out: &mut Field<V>, data: &CellData<V>);

    /// Add the face-value coefficients to `out`.
    fn face_coeffs(&self, out: &mut FvMatrix<'_, V>, data: &CellData<V>) -> Result<()>;

    /// Evaluate normal gradients into `out` (face-indexed).
    fn face_grad(&self, out: &mut Field<V>, data: &CellData<V>);

    /// Add the normal-gradient coefficients to `out`.
    fn face_grad_coeffs(&self, out: &mut FvMatrix<'_, V>, data: &CellData<V>) -> Result<()>;

    /// Adjust cell data before assembly. Most schemes do nothing.
    fn fix_boundary(&self, _data: &mut CellData<V>) {}

    /// Advance time-dependent boundary data. Most schemes do nothing.
    fn set_time(&mut self, _time: f64) -> Result<()> {
        Ok(())
    }
}

/// Two-point normal gradient plus the explicit non-orthogonal correction.
///
/// Returns `(inv_dist, correction)` with
/// `∂φ/∂n ≈ (φ_n - φ_o)·inv_dist + correction`.
pub(crate) fn central_gradient<V: Value>(
    interior: &InteriorPatch<'_>,
    face: usize,
    data: &CellData<V>,
) -> (f64, V) {
    let patch = interior.patch();
    let mesh = patch.mesh();
    let o = patch.owner(face);
    let nb = patch.neighbor(face);
    let n = patch.normal(face);
    let inv_dist = patch.inv_dist(face);
    let (wo, wn) = interior.weights(face);

    let e = mesh.cell_centers()[nb] - mesh.cell_centers()[o];
    let g = data.gradients[o] * wo + data.gradients[nb] * wn;
    let correction = V::project(&g, &(n - e * inv_dist));
    (inv_dist, correction)
}

pub(crate) fn central_face_grad<V: Value>(
    interior: &InteriorPatch<'_>,
    out: &mut Field<V>,
    data: &CellData<V>,
) {
    let patch = interior.patch();
    for f in interior.faces() {
        let (inv_dist, correction) = central_gradient(interior, f, data);
        let diff = data.values[patch.neighbor(f)] - data.values[patch.owner(f)];
        out[f] = diff * inv_dist + correction;
    }
}

pub(crate) fn central_face_grad_coeffs<V: Value>(
    interior: &InteriorPatch<'_>,
    out: &mut FvMatrix<'_, V>,
    data: &CellData<V>,
) -> Result<()> {
    let faces = interior.faces();
    let mut owner = Vec::with_capacity(faces.len());
    let mut neigh = Vec::with_capacity(faces.len());
    let mut source = Vec::with_capacity(faces.len());
    for f in faces.clone() {
        let (inv_dist, correction) = central_gradient(interior, f, data);
        owner.push(V::splat(-inv_dist));
        neigh.push(V::splat(inv_dist));
        source.push(correction);
    }
    out.add_fcoeffs(faces.clone(), &neigh, &owner)?;
    out.add_fsources(faces, &source)
}

/// Face values prescribed per face of a boundary patch.
pub(crate) fn dirichlet_face_grad<V: Value>(
    patch: &Patch<'_>,
    values: &[V],
    out: &mut Field<V>,
    data: &CellData<V>,
) {
    for (i, f) in patch.faces().enumerate() {
        out[f] = (values[i] - data.values[patch.owner(f)]) * patch.inv_dist(f);
    }
}

pub(crate) fn dirichlet_face_coeffs<V: Value>(
    patch: &Patch<'_>,
    values: &[V],
    out: &mut FvMatrix<'_, V>,
) -> Result<()> {
    out.add_fsources(patch.faces(), values)
}

pub(crate) fn dirichlet_face_grad_coeffs<V: Value>(
    patch: &Patch<'_>,
    values: &[V],
    out: &mut FvMatrix<'_, V>,
) -> Result<()> {
    let faces = patch.faces();
    let owner: Vec<V> = faces.clone().map(|f| V::splat(-patch.inv_dist(f))).collect();
    let neigh = vec![V::zero(); faces.len()];
    let source: Vec<V> = faces
        .clone()
        .enumerate()
        .map(|(i, f)| values[i] * patch.inv_dist(f))
        .collect();
    out.add_fcoeffs(faces.clone(), &neigh, &owner)?;
    out.add_fsources(faces, &source)
}
