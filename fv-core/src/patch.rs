//! Patch views over the face table.
//!
//! A [`Patch`] is a non-owning `(begin, count)` window into [`FvMeshData`].
//! All accessors take global face ids, so a scheme loops over
//! [`Patch::faces`] and indexes mesh arrays directly.

use crate::mesh::{FvMeshData, PatchKind};
use crate::types::{Point3, Vec3};
use std::ops::Range;

#[derive(Debug, Clone, Copy)]
pub struct Patch<'m> {
    mesh: &'m FvMeshData,
    kind: PatchKind,
    begin: usize,
    count: usize,
}

impl<'m> Patch<'m> {
    pub fn new(mesh: &'m FvMeshData, kind: PatchKind, range: Range<usize>) -> Self {
        debug_assert!(range.end <= mesh.face_count());
        Self {
            mesh,
            kind,
            begin: range.start,
            count: range.len(),
        }
    }

    pub fn mesh(&self) -> &'m FvMeshData {
        self.mesh
    }

    pub fn kind(&self) -> PatchKind {
        self.kind
    }

    pub fn begin(&self) -> usize {
        self.begin
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn faces(&self) -> Range<usize> {
        self.begin..self.begin + self.count
    }

    pub fn owner(&self, face: usize) -> usize {
        self.mesh.owner()[face]
    }

    pub fn neighbor(&self, face: usize) -> usize {
        self.mesh.neighbor()[face]
    }

    pub fn normal(&self, face: usize) -> Vec3 {
        self.mesh.normal()[face]
    }

    pub fn area(&self, face: usize) -> f64 {
        self.mesh.area()[face]
    }

    pub fn inv_dist(&self, face: usize) -> f64 {
        self.mesh.inv_dist()[face]
    }

    pub fn dx(&self, face: usize) -> Vec3 {
        self.mesh.dx()[face]
    }

    pub fn face_center(&self, face: usize) -> Point3 {
        self.mesh.face_center(face)
    }
}

/// Interior patch with cached inverse-distance interpolation weights.
#[derive(Debug, Clone)]
pub struct InteriorPatch<'m> {
    patch: Patch<'m>,
    owner_weight: Vec<f64>,
}

impl<'m> InteriorPatch<'m> {
    pub fn new(patch: Patch<'m>) -> Self {
        let mesh = patch.mesh();
        let owner_weight = patch
            .faces()
            .map(|f| {
                let n = mesh.normal()[f];
                let d_owner = mesh.dx()[f].dot(&n).abs();
                let d_neigh = (mesh.cell_centers()[mesh.neighbor()[f]] - mesh.face_center(f))
                    .dot(&n)
                    .abs();
                let total = d_owner + d_neigh;
                if total > 0.0 {
                    d_neigh / total
                } else {
                    0.5
                }
            })
            .collect();
        Self {
            patch,
            owner_weight,
        }
    }

    pub fn patch(&self) -> &Patch<'m> {
        &self.patch
    }

    pub fn faces(&self) -> Range<usize> {
        self.patch.faces()
    }

    /// `(owner, neighbor)` blend factors for a face; they sum to one.
    pub fn weights(&self, face: usize) -> (f64, f64) {
        let w = self.owner_weight[face - self.patch.begin()];
        (w, 1.0 - w)
    }
}
