//! Finite-volume coefficient accumulation, assembly and solve.
//!
//! An [`FvMatrix`] collects linear face and cell contributions for one
//! unknown, then [`build`](FvMatrix::build)s one CSR system per axis and
//! [`solve`](FvMatrix::solve)s them into the unknown's cell values.
//!
//! # Row convention
//!
//! Buffers hold per-unit-volume contributions. Row `c` of axis `a` reads
//!
//! ```text
//! Σ_{f owned by c} (owner_f·x_c + neigh_f·x_nb + source_f) + coeff_c·x_c = source_c
//! ```
//!
//! and is multiplied through by the cell volume during assembly, so face
//! sources land on the right-hand side negated while cell sources are added
//! as-is.

use crate::error::{Error, Location, Result};
use crate::field::{CellData, Field, ScalarField};
use crate::mesh::FvMeshData;
use crate::solver::{residual_norm, select_solver, SolveStats, SolverConfig};
use crate::sparse::{CsrMatrix, TripletMatrix};
use crate::types::Value;
use std::ops::{Neg, Range};

/// Rows whose absolute sum is below this fraction of their magnitude count as
/// annihilating the constant vector.
const SINGULAR_ROW_TOL: f64 = 1e-12;

/// Assembled per-axis systems.
#[derive(Debug, Clone)]
pub struct Assembled {
    /// One square matrix per axis, `cell_count` rows each.
    pub systems: Vec<CsrMatrix>,
    /// Right-hand side per axis.
    pub rhs: Vec<Vec<f64>>,
    /// Axes with a coupled block that has no fixed level.
    singular: Vec<bool>,
}

#[derive(Debug, Clone)]
enum BuildState {
    Dirty,
    Built(Assembled),
}

/// Result of [`FvMatrix::solve_report`].
#[derive(Debug, Clone)]
pub struct SolveReport {
    /// Mean relative change over cells, averaged over axes.
    pub change: f64,
    /// Per-axis solver statistics.
    pub stats: Vec<SolveStats>,
}

/// Linear system for one unknown with `V::DIM` decoupled axes.
#[derive(Debug, Clone)]
pub struct FvMatrix<'m, V: Value> {
    mesh: &'m FvMeshData,
    owner_coeff: Field<V>,
    neigh_coeff: Field<V>,
    face_source: Field<V>,
    cell_coeff: Field<V>,
    cell_source: Field<V>,
    old_values: Field<V>,
    reference: Option<(usize, V)>,
    under_relax_coeff: f64,
    config: SolverConfig,
    state: BuildState,
}

impl<'m, V: Value> FvMatrix<'m, V> {
    /// Empty system bound to a mesh and the current state of an unknown.
    pub fn new(mesh: &'m FvMeshData, data: &CellData<V>) -> Result<Self> {
        let nf = mesh.face_count();
        let nc = mesh.cell_count();
        if data.cell_count() != nc {
            return Err(Error::DimensionMismatch {
                expected: nc,
                found: data.cell_count(),
                context: "matrix cell data",
            });
        }
        Ok(Self {
            mesh,
            owner_coeff: Field::zeros(nf),
            neigh_coeff: Field::zeros(nf),
            face_source: Field::zeros(nf),
            cell_coeff: Field::zeros(nc),
            cell_source: Field::zeros(nc),
            old_values: data.values.clone(),
            reference: None,
            under_relax_coeff: 1.0,
            config: SolverConfig::default(),
            state: BuildState::Dirty,
        })
    }

    pub fn with_config(mut self, config: SolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn set_config(&mut self, config: SolverConfig) {
        self.config = config;
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn mesh(&self) -> &'m FvMeshData {
        self.mesh
    }

    pub fn owner_coeffs(&self) -> &Field<V> {
        &self.owner_coeff
    }

    pub fn neigh_coeffs(&self) -> &Field<V> {
        &self.neigh_coeff
    }

    pub fn face_sources(&self) -> &Field<V> {
        &self.face_source
    }

    pub fn cell_coeffs(&self) -> &Field<V> {
        &self.cell_coeff
    }

    pub fn cell_sources(&self) -> &Field<V> {
        &self.cell_source
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self.state, BuildState::Dirty)
    }

    fn touch(&mut self) {
        self.state = BuildState::Dirty;
    }

    fn check_range(&self, range: &Range<usize>, len: usize, limit: usize) -> Result<()> {
        if range.end > limit || range.start > range.end {
            return Err(Error::PatchOutOfRange {
                begin: range.start,
                end: range.end,
                face_count: limit,
            });
        }
        if range.len() != len {
            return Err(Error::DimensionMismatch {
                expected: range.len(),
                found: len,
                context: "coefficient slice",
            });
        }
        Ok(())
    }

    fn check_finite(values: &[V], begin: usize, location: Location) -> Result<()> {
        match values.iter().position(|v| !v.is_finite()) {
            Some(i) => Err(Error::NonFiniteValue {
                location,
                index: begin + i,
            }),
            None => Ok(()),
        }
    }

    /// Accumulate linear face coefficients over one contiguous face range.
    pub fn add_fcoeffs(&mut self, faces: Range<usize>, neigh: &[V], owner: &[V]) -> Result<()> {
        let nf = self.mesh.face_count();
        self.check_range(&faces, neigh.len(), nf)?;
        self.check_range(&faces, owner.len(), nf)?;
        Self::check_finite(neigh, faces.start, Location::FaceCoeff)?;
        Self::check_finite(owner, faces.start, Location::FaceCoeff)?;

        for (i, f) in faces.enumerate() {
            self.neigh_coeff[f] += neigh[i];
            self.owner_coeff[f] += owner[i];
        }
        self.touch();
        Ok(())
    }

    /// Accumulate fixed (non-coefficient) face contributions.
    pub fn add_fsources(&mut self, faces: Range<usize>, source: &[V]) -> Result<()> {
        self.check_range(&faces, source.len(), self.mesh.face_count())?;
        Self::check_finite(source, faces.start, Location::FaceSource)?;

        for (i, f) in faces.enumerate() {
            self.face_source[f] += source[i];
        }
        self.touch();
        Ok(())
    }

    /// Accumulate cell-local diagonal coefficients.
    pub fn add_ccoeffs(&mut self, cells: Range<usize>, coeff: &[V]) -> Result<()> {
        self.check_range(&cells, coeff.len(), self.mesh.cell_count())?;
        Self::check_finite(coeff, cells.start, Location::CellCoeff)?;

        for (i, c) in cells.enumerate() {
            self.cell_coeff[c] += coeff[i];
        }
        self.touch();
        Ok(())
    }

    /// Accumulate cell sources (right-hand side).
    pub fn add_csources(&mut self, cells: Range<usize>, source: &[V]) -> Result<()> {
        self.check_range(&cells, source.len(), self.mesh.cell_count())?;
        Self::check_finite(source, cells.start, Location::CellSource)?;

        for (i, c) in cells.enumerate() {
            self.cell_source[c] += source[i];
        }
        self.touch();
        Ok(())
    }

    /// Scale every buffer by a broadcast field.
    ///
    /// A face-indexed field scales the face buffers. A cell-indexed field is
    /// gathered onto each face's owner for the face buffers and scales the
    /// cell buffers directly.
    pub fn scale(&mut self, field: &ScalarField) -> Result<()> {
        let nf = self.mesh.face_count();
        let nc = self.mesh.cell_count();
        let location = if field.len() == nf {
            Location::FaceCoeff
        } else {
            Location::CellCoeff
        };
        if let Some(i) = field.first_non_finite() {
            return Err(Error::NonFiniteValue { location, index: i });
        }

        if field.len() == nf {
            for f in 0..nf {
                self.scale_face(f, field[f]);
            }
        } else if field.len() == nc {
            let owner = self.mesh.owner();
            for f in 0..nf {
                self.scale_face(f, field[owner[f]]);
            }
            for c in 0..nc {
                self.cell_coeff[c] = self.cell_coeff[c] * field[c];
                self.cell_source[c] = self.cell_source[c] * field[c];
            }
        } else {
            return Err(Error::DimensionMismatch {
                expected: nf,
                found: field.len(),
                context: "scaling field (neither face- nor cell-indexed)",
            });
        }
        self.touch();
        Ok(())
    }

    fn scale_face(&mut self, f: usize, s: f64) {
        self.owner_coeff[f] = self.owner_coeff[f] * s;
        self.neigh_coeff[f] = self.neigh_coeff[f] * s;
        self.face_source[f] = self.face_source[f] * s;
    }

    fn check_cell_field(&self, field: &Field<V>) -> Result<()> {
        if field.len() != self.mesh.cell_count() {
            return Err(Error::DimensionMismatch {
                expected: self.mesh.cell_count(),
                found: field.len(),
                context: "cell source field",
            });
        }
        Self::check_finite(field.as_slice(), 0, Location::CellSource)
    }

    /// Add a cell-indexed field to the cell sources.
    pub fn add_field(&mut self, field: &Field<V>) -> Result<()> {
        self.check_cell_field(field)?;
        for (s, v) in self.cell_source.iter_mut().zip(field) {
            *s += *v;
        }
        self.touch();
        Ok(())
    }

    /// Subtract a cell-indexed field from the cell sources.
    pub fn sub_field(&mut self, field: &Field<V>) -> Result<()> {
        self.check_cell_field(field)?;
        for (s, v) in self.cell_source.iter_mut().zip(field) {
            *s -= *v;
        }
        self.touch();
        Ok(())
    }

    fn combine(&mut self, other: &FvMatrix<'_, V>, sign: f64) -> Result<()> {
        if other.mesh.face_count() != self.mesh.face_count() {
            return Err(Error::DimensionMismatch {
                expected: self.mesh.face_count(),
                found: other.mesh.face_count(),
                context: "matrix face count",
            });
        }
        if other.mesh.cell_count() != self.mesh.cell_count() {
            return Err(Error::DimensionMismatch {
                expected: self.mesh.cell_count(),
                found: other.mesh.cell_count(),
                context: "matrix cell count",
            });
        }

        let pairs = [
            (&mut self.owner_coeff, &other.owner_coeff),
            (&mut self.neigh_coeff, &other.neigh_coeff),
            (&mut self.face_source, &other.face_source),
            (&mut self.cell_coeff, &other.cell_coeff),
            (&mut self.cell_source, &other.cell_source),
        ];
        for (dst, src) in pairs {
            for (d, s) in dst.iter_mut().zip(src) {
                *d += *s * sign;
            }
        }
        if self.reference.is_none() {
            self.reference = other.reference;
        }
        self.touch();
        Ok(())
    }

    /// Add another term's coefficients and sources.
    pub fn add_matrix(&mut self, other: &FvMatrix<'_, V>) -> Result<()> {
        self.combine(other, 1.0)
    }

    /// Subtract another term's coefficients and sources.
    pub fn sub_matrix(&mut self, other: &FvMatrix<'_, V>) -> Result<()> {
        self.combine(other, -1.0)
    }

    /// Pin `cell` to `value` on every axis.
    pub fn set_ref(&mut self, cell: usize, value: V) -> Result<()> {
        if cell >= self.mesh.cell_count() {
            return Err(Error::DimensionMismatch {
                expected: self.mesh.cell_count(),
                found: cell,
                context: "reference cell index",
            });
        }
        self.reference = Some((cell, value));
        self.touch();
        Ok(())
    }

    pub fn reference(&self) -> Option<(usize, V)> {
        self.reference
    }

    /// Implicit under-relaxation factor in `(0, 1]`; `1.0` disables it.
    pub fn under_relax(&mut self, alpha: f64) -> Result<()> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(Error::Solver(format!(
                "under-relaxation factor {} outside (0, 1]",
                alpha
            )));
        }
        self.under_relax_coeff = alpha;
        self.touch();
        Ok(())
    }

    /// Assemble the per-axis systems. No-op when already built.
    pub fn build(&mut self) -> Result<()> {
        if !self.is_dirty() {
            return Ok(());
        }

        let mesh = self.mesh;
        let nc = mesh.cell_count();
        let nf = mesh.face_count();
        let owner = mesh.owner();
        let neighbor = mesh.neighbor();
        let inv_volume = mesh.inv_volume();
        let ref_cell = self.reference.map(|(c, _)| c);

        let mut systems = Vec::with_capacity(V::DIM);
        let mut rhs_all = Vec::with_capacity(V::DIM);
        let mut singular = Vec::with_capacity(V::DIM);

        for axis in 0..V::DIM {
            let mut diag = vec![0.0; nc];
            let mut rhs = vec![0.0; nc];
            let mut row_sum = vec![0.0; nc];
            let mut row_abs = vec![0.0; nc];
            let mut blocks = Components::new(nc);
            let mut triplet = TripletMatrix::with_capacity(nc, nc, nf + nc);

            for f in 0..nf {
                let o = owner[f];
                let nb = neighbor[f];
                let volume = 1.0 / inv_volume[o];
                let oc = self.owner_coeff[f].axis(axis) * volume;
                let ncf = self.neigh_coeff[f].axis(axis) * volume;
                let src = self.face_source[f].axis(axis) * volume;

                if o == nb {
                    diag[o] += oc + ncf;
                } else {
                    diag[o] += oc;
                    row_sum[o] += ncf;
                    row_abs[o] += ncf.abs();
                    if ncf != 0.0 {
                        blocks.join(o, nb);
                    }
                    if ref_cell != Some(o) {
                        triplet.add(o, nb, ncf);
                    }
                }
                rhs[o] -= src;
            }

            for c in 0..nc {
                let volume = 1.0 / inv_volume[c];
                diag[c] += self.cell_coeff[c].axis(axis) * volume;
                rhs[c] += self.cell_source[c].axis(axis) * volume;
            }

            if self.under_relax_coeff != 1.0 {
                let factor = (1.0 - self.under_relax_coeff) / self.under_relax_coeff;
                for c in 0..nc {
                    rhs[c] += factor * diag[c] * self.old_values[c].axis(axis);
                    diag[c] *= 1.0 + factor;
                }
                log::trace!("axis {}: under-relaxed with alpha = {}", axis, self.under_relax_coeff);
            }

            if let Some((cell, value)) = self.reference {
                diag[cell] = 1.0;
                rhs[cell] = value.axis(axis);
                log::trace!("axis {}: pinned cell {} to {}", axis, cell, rhs[cell]);
            }

            for c in 0..nc {
                if !diag[c].is_finite() || !rhs[c].is_finite() {
                    return Err(Error::NonFiniteValue {
                        location: Location::AssembledRow,
                        index: c,
                    });
                }
                triplet.add(c, c, diag[c]);
            }

            // A coupled block is rank deficient when none of its rows is
            // pinned and every row annihilates the constant vector.
            let mut anchored = vec![false; nc];
            for c in 0..nc {
                let magnitude = diag[c].abs() + row_abs[c];
                let floating = ref_cell != Some(c) && (diag[c] + row_sum[c]).abs() <= SINGULAR_ROW_TOL * magnitude;
                if !floating {
                    anchored[blocks.find(c)] = true;
                }
            }
            let rank_deficient = (0..nc).any(|c| !anchored[blocks.find(c)]);
            if rank_deficient {
                log::debug!("axis {}: floating block without a fixed level", axis);
            }

            systems.push(triplet.to_csr()?);
            rhs_all.push(rhs);
            singular.push(rank_deficient);
        }

        log::debug!(
            "assembled {} axis system(s): {} cells, nnz {}",
            V::DIM,
            nc,
            systems.first().map(|s| s.nnz()).unwrap_or(0)
        );
        self.state = BuildState::Built(Assembled {
            systems,
            rhs: rhs_all,
            singular,
        });
        Ok(())
    }

    /// Assembled systems, if built and not modified since.
    pub fn assembled(&self) -> Option<&Assembled> {
        match &self.state {
            BuildState::Built(a) => Some(a),
            BuildState::Dirty => None,
        }
    }

    pub fn system(&self, axis: usize) -> Option<&CsrMatrix> {
        self.assembled().and_then(|a| a.systems.get(axis))
    }

    pub fn rhs(&self, axis: usize) -> Option<&[f64]> {
        self.assembled().and_then(|a| a.rhs.get(axis).map(|r| r.as_slice()))
    }

    /// Build, then solve every axis independently into `data.values`.
    ///
    /// Returns the mean relative change. On error `data` is left untouched.
    pub fn solve(&mut self, data: &mut CellData<V>) -> Result<f64> {
        self.solve_report(data).map(|r| r.change)
    }

    /// Like [`solve`](Self::solve), also returning per-axis statistics.
    pub fn solve_report(&mut self, data: &mut CellData<V>) -> Result<SolveReport> {
        self.build()?;
        let nc = self.mesh.cell_count();
        if data.cell_count() != nc {
            return Err(Error::DimensionMismatch {
                expected: nc,
                found: data.cell_count(),
                context: "solved field",
            });
        }
        let assembled = self.assembled().ok_or_else(|| Error::Solver("matrix not assembled".into()))?;

        let solver = select_solver(&self.config, nc);
        let mut solutions = Vec::with_capacity(V::DIM);
        let mut stats = Vec::with_capacity(V::DIM);
        let mut change = 0.0;

        for axis in 0..V::DIM {
            if assembled.singular[axis] {
                return Err(Error::SingularSystem { axis });
            }

            let old = data.values.component(axis);
            let mut x = old.clone();
            let s = solver.solve(&assembled.systems[axis], &assembled.rhs[axis], &mut x)?;
            if !s.is_converged() {
                log::warn!(
                    "axis {}: {} stopped ({:?}) after {} iterations, residual {:e}",
                    axis,
                    s.solver,
                    s.status,
                    s.iterations,
                    s.residual
                );
                return Err(Error::SolverDidNotConverge {
                    axis,
                    iterations: s.iterations,
                    residual: s.residual,
                });
            }
            log::debug!(
                "axis {}: {} converged in {} iterations, residual {:e}",
                axis,
                s.solver,
                s.iterations,
                s.residual
            );

            change += self.config.change_norm.mean_change(&old, &x, axis)?;
            solutions.push(x);
            stats.push(s);
        }

        for (axis, x) in solutions.iter().enumerate() {
            data.values.set_component(axis, x);
        }
        Ok(SolveReport {
            change: change / V::DIM as f64,
            stats,
        })
    }

    /// Per-axis residual norm `‖b - A x‖` of the current field.
    pub fn residual(&mut self, data: &CellData<V>) -> Result<Vec<f64>> {
        self.build()?;
        let assembled = self.assembled().ok_or_else(|| Error::Solver("matrix not assembled".into()))?;
        if data.cell_count() != self.mesh.cell_count() {
            return Err(Error::DimensionMismatch {
                expected: self.mesh.cell_count(),
                found: data.cell_count(),
                context: "residual field",
            });
        }
        Ok((0..V::DIM)
            .map(|axis| {
                residual_norm(
                    &assembled.systems[axis],
                    &assembled.rhs[axis],
                    &data.values.component(axis),
                )
            })
            .collect())
    }
}

/// Union-find over cells coupled by nonzero off-diagonal coefficients.
struct Components {
    parent: Vec<usize>,
}

impl Components {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut c: usize) -> usize {
        while self.parent[c] != c {
            self.parent[c] = self.parent[self.parent[c]];
            c = self.parent[c];
        }
        c
    }

    fn join(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}

impl<'m, V: Value> Neg for FvMatrix<'m, V> {
    type Output = Self;

    fn neg(mut self) -> Self {
        for buf in [
            &mut self.owner_coeff,
            &mut self.neigh_coeff,
            &mut self.face_source,
            &mut self.cell_coeff,
            &mut self.cell_source,
        ] {
            for v in buf.iter_mut() {
                *v = -*v;
            }
        }
        self.state = BuildState::Dirty;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{ScalarData, VectorData};
    use crate::mesh::{build_mesh, BoundaryKind, VolumeMesh};
    use crate::solver::ChangeNorm;
    use crate::sparse::{entry, row_entries};
    use crate::types::Vec3;
    use approx::assert_relative_eq;

    /// Three unit cells along x; interior half-faces 0..4.
    fn chain() -> FvMeshData {
        build_mesh(&VolumeMesh::cartesian_box([3, 1, 1], Vec3::new(3.0, 1.0, 1.0), [BoundaryKind::Wall; 6])).unwrap()
    }

    /// Diffusion-like interior coupling plus a diagonal term on every cell.
    fn stencil<'m>(mesh: &'m FvMeshData, data: &ScalarData) -> FvMatrix<'m, f64> {
        let mut m = FvMatrix::new(mesh, data).unwrap();
        let interior = mesh.patch_range(crate::mesh::PatchKind::Interior);
        let n = interior.len();
        m.add_fcoeffs(interior, &vec![-1.0; n], &vec![1.0; n]).unwrap();
        m.add_ccoeffs(0..3, &[1.0, 1.0, 1.0]).unwrap();
        m.add_csources(0..3, &[1.0, 2.0, 3.0]).unwrap();
        m
    }

    #[test]
    fn test_build_scatters_owner_rows() {
        let mesh = chain();
        let data = ScalarData::zeros(3);
        let mut m = stencil(&mesh, &data);
        m.build().unwrap();

        let a = m.system(0).unwrap();
        assert_relative_eq!(entry(a, 0, 0), 2.0);
        assert_relative_eq!(entry(a, 1, 1), 3.0);
        assert_relative_eq!(entry(a, 0, 1), -1.0);
        assert_relative_eq!(entry(a, 1, 0), -1.0);
        assert_eq!(entry(a, 0, 2), 0.0);
        assert_eq!(m.rhs(0).unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_face_source_is_negated_onto_rhs() {
        let mesh = chain();
        let data = ScalarData::zeros(3);
        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        m.add_ccoeffs(0..3, &[1.0; 3]).unwrap();
        let wall = mesh.wall().faces();
        let first = wall.start;
        m.add_fsources(first..first + 1, &[4.0]).unwrap();
        m.build().unwrap();

        let owner = mesh.owner()[first];
        assert_relative_eq!(m.rhs(0).unwrap()[owner], -4.0);
    }

    #[test]
    fn test_dirty_state_machine() {
        let mesh = chain();
        let data = ScalarData::zeros(3);
        let mut m = stencil(&mesh, &data);
        assert!(m.is_dirty());
        assert!(m.assembled().is_none());
        m.build().unwrap();
        assert!(!m.is_dirty());
        m.add_csources(1..2, &[1.0]).unwrap();
        assert!(m.is_dirty());
        assert!(m.system(0).is_none());
    }

    #[test]
    fn test_idempotent_build() {
        let mesh = chain();
        let data = ScalarData::from_values(Field::from_vec(vec![1.0, 2.0, 3.0]));
        let mut m = stencil(&mesh, &data);
        m.under_relax(0.7).unwrap();
        m.build().unwrap();
        let first = m.system(0).unwrap().clone();
        let first_rhs = m.rhs(0).unwrap().to_vec();

        m.build().unwrap();
        let second = m.system(0).unwrap();
        assert_eq!(first.row_offsets(), second.row_offsets());
        assert_eq!(first.col_indices(), second.col_indices());
        assert_eq!(first.values(), second.values());
        assert_eq!(first_rhs, m.rhs(0).unwrap());
    }

    #[test]
    fn test_under_relax_one_is_noop() {
        let mesh = chain();
        let data = ScalarData::from_values(Field::from_vec(vec![1.0, -2.0, 3.0]));
        let mut plain = stencil(&mesh, &data);
        let mut relaxed = stencil(&mesh, &data);
        relaxed.under_relax(1.0).unwrap();
        plain.build().unwrap();
        relaxed.build().unwrap();

        let (a, b) = (plain.system(0).unwrap(), relaxed.system(0).unwrap());
        assert_eq!(a.col_indices(), b.col_indices());
        for (x, y) in a.values().iter().zip(b.values()) {
            assert_relative_eq!(x, y, epsilon = 1e-14);
        }
        assert_eq!(plain.rhs(0), relaxed.rhs(0));
    }

    #[test]
    fn test_under_relax_scales_diagonal_and_source() {
        let mesh = chain();
        let data = ScalarData::from_values(Field::from_vec(vec![1.0, 2.0, 3.0]));
        let mut m = stencil(&mesh, &data);
        m.under_relax(0.5).unwrap();
        m.build().unwrap();

        // factor = 1: diagonal doubles, rhs gains diag * old
        let a = m.system(0).unwrap();
        assert_relative_eq!(entry(a, 0, 0), 4.0);
        assert_relative_eq!(entry(a, 1, 1), 6.0);
        assert_relative_eq!(m.rhs(0).unwrap()[1], 2.0 + 3.0 * 2.0);
        assert!(m.under_relax(0.0).is_err());
        assert!(m.under_relax(1.5).is_err());
    }

    #[test]
    fn test_under_relaxation_keeps_fixed_point() {
        let mesh = chain();
        let mut exact = ScalarData::zeros(3);
        stencil(&mesh, &exact).solve(&mut exact).unwrap();

        let mut relaxed = exact.clone();
        let mut m = stencil(&mesh, &relaxed);
        m.under_relax(0.3).unwrap();
        let change = m.solve(&mut relaxed).unwrap();
        assert!(change < 1e-8);
        for c in 0..3 {
            assert_relative_eq!(relaxed.values[c], exact.values[c], epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reference_pinning_gives_unit_row() {
        let mesh = chain();
        let data = VectorData::zeros(3);
        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        let interior = mesh.patch_range(crate::mesh::PatchKind::Interior);
        let n = interior.len();
        m.add_fcoeffs(interior, &vec![Vec3::repeat(-1.0); n], &vec![Vec3::repeat(1.0); n]).unwrap();
        m.set_ref(1, Vec3::new(1.0, 2.0, 3.0)).unwrap();
        m.build().unwrap();

        for axis in 0..3 {
            let a = m.system(axis).unwrap();
            let row: Vec<_> = row_entries(a, 1).collect();
            assert_eq!(row, vec![(1, 1.0)]);
            assert_relative_eq!(m.rhs(axis).unwrap()[1], (axis + 1) as f64);
        }
        assert!(m.set_ref(3, Vec3::zeros()).is_err());
    }

    #[test]
    fn test_pure_neumann_without_reference_is_singular() {
        let mesh = chain();
        let mut data = ScalarData::zeros(3);
        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        let interior = mesh.patch_range(crate::mesh::PatchKind::Interior);
        let n = interior.len();
        m.add_fcoeffs(interior, &vec![-1.0; n], &vec![1.0; n]).unwrap();
        assert_eq!(m.solve(&mut data), Err(Error::SingularSystem { axis: 0 }));

        m.set_ref(0, 2.0).unwrap();
        m.solve(&mut data).unwrap();
        for c in 0..3 {
            assert_relative_eq!(data.values[c], 2.0, epsilon = 1e-10);
        }
    }

    #[test]
    fn test_rejects_non_finite_and_bad_ranges() {
        let mesh = chain();
        let data = ScalarData::zeros(3);
        let mut m = FvMatrix::new(&mesh, &data).unwrap();

        assert_eq!(
            m.add_fcoeffs(0..2, &[0.0, f64::NAN], &[1.0, 1.0]),
            Err(Error::NonFiniteValue {
                location: Location::FaceCoeff,
                index: 1
            })
        );
        assert!(matches!(
            m.add_fsources(0..2, &[1.0]),
            Err(Error::DimensionMismatch { .. })
        ));
        let nf = mesh.face_count();
        assert!(matches!(
            m.add_fsources(nf..nf + 1, &[1.0]),
            Err(Error::PatchOutOfRange { .. })
        ));
        assert!(matches!(
            m.scale(&Field::from_vec(vec![1.0; 5])),
            Err(Error::DimensionMismatch { .. })
        ));
        assert!(matches!(
            m.add_field(&Field::from_vec(vec![1.0; 2])),
            Err(Error::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_scale_by_cell_field_gathers_onto_owner() {
        let mesh = chain();
        let data = ScalarData::zeros(3);
        let mut m = stencil(&mesh, &data);
        m.scale(&Field::from_vec(vec![1.0, 2.0, 3.0])).unwrap();

        for f in mesh.patch_range(crate::mesh::PatchKind::Interior) {
            let s = (mesh.owner()[f] + 1) as f64;
            assert_relative_eq!(m.owner_coeffs()[f], s);
            assert_relative_eq!(m.neigh_coeffs()[f], -s);
        }
        assert_eq!(m.cell_coeffs().as_slice(), &[1.0, 2.0, 3.0]);
        assert_eq!(m.cell_sources().as_slice(), &[1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_matrix_algebra() {
        let mesh = chain();
        let data = ScalarData::zeros(3);
        let a = stencil(&mesh, &data);
        let mut sum = stencil(&mesh, &data);
        sum.add_matrix(&a).unwrap();
        assert_eq!(sum.cell_sources().as_slice(), &[2.0, 4.0, 6.0]);

        sum.sub_matrix(&a).unwrap();
        sum.sub_field(&Field::from_vec(vec![1.0, 1.0, 1.0])).unwrap();
        assert_eq!(sum.cell_sources().as_slice(), &[0.0, 1.0, 2.0]);

        let neg = -a;
        assert_eq!(neg.cell_coeffs().as_slice(), &[-1.0, -1.0, -1.0]);
        assert_relative_eq!(neg.owner_coeffs()[0], -1.0);
    }

    #[test]
    fn test_solve_reports_non_convergence() {
        let mesh = build_mesh(&VolumeMesh::cartesian_box([40, 1, 1], Vec3::new(1.0, 1.0, 1.0), [BoundaryKind::Wall; 6])).unwrap();
        let mut data = ScalarData::zeros(40);
        let mut m = FvMatrix::new(&mesh, &data)
            .unwrap()
            .with_config(SolverConfig::default().with_max_iterations(1).with_tolerance(1e-14));
        let interior = mesh.patch_range(crate::mesh::PatchKind::Interior);
        let n = interior.len();
        m.add_fcoeffs(interior, &vec![-1.0; n], &vec![1.0; n]).unwrap();
        m.add_ccoeffs(0..40, &[1e-3; 40]).unwrap();
        let sources: Vec<f64> = (0..40).map(|i| i as f64).collect();
        m.add_csources(0..40, &sources).unwrap();

        let before = data.clone();
        assert!(matches!(
            m.solve(&mut data),
            Err(Error::SolverDidNotConverge { axis: 0, .. })
        ));
        assert_eq!(data, before);
    }

    #[test]
    fn test_solve_returns_mean_change_and_residual() {
        let mesh = chain();
        let mut data = ScalarData::from_values(Field::from_vec(vec![1.0, 1.0, 1.0]));
        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        m.add_ccoeffs(0..3, &[1.0; 3]).unwrap();
        m.add_csources(0..3, &[2.0, 2.0, 2.0]).unwrap();

        let report = m.solve_report(&mut data).unwrap();
        assert_relative_eq!(report.change, 1.0, epsilon = 1e-10);
        assert_eq!(report.stats.len(), 1);
        for r in m.residual(&data).unwrap() {
            assert!(r < 1e-10);
        }
    }

    #[test]
    fn test_new_rejects_short_cell_data() {
        let mesh = chain();
        let err = FvMatrix::new(&mesh, &ScalarData::zeros(2)).unwrap_err();
        assert_eq!(
            err,
            Error::DimensionMismatch {
                expected: 3,
                found: 2,
                context: "matrix cell data",
            }
        );
    }

    #[test]
    fn test_floating_block_beside_fixed_cell_is_singular() {
        let mesh = chain();
        let mut data = ScalarData::zeros(3);
        let mut m = FvMatrix::new(&mesh, &data).unwrap();
        // cells 0 and 1 only talk to each other; cell 2 has its own level
        for f in mesh.patch_range(crate::mesh::PatchKind::Interior) {
            if mesh.owner()[f] + mesh.neighbor()[f] == 1 {
                m.add_fcoeffs(f..f + 1, &[-1.0], &[1.0]).unwrap();
            }
        }
        m.add_ccoeffs(2..3, &[1.0]).unwrap();
        m.add_csources(2..3, &[4.0]).unwrap();
        assert_eq!(m.solve(&mut data), Err(Error::SingularSystem { axis: 0 }));

        m.set_ref(1, 3.0).unwrap();
        m.solve(&mut data).unwrap();
        assert_relative_eq!(data.values[0], 3.0, epsilon = 1e-10);
        assert_relative_eq!(data.values[2], 4.0, epsilon = 1e-10);
    }

    #[test]
    fn test_relative_change_norm_rejects_zero_old_value() {
        let mesh = chain();
        let mut data = ScalarData::from_values(Field::from_vec(vec![1.0, 0.0, 2.0]));
        let mut m = FvMatrix::new(&mesh, &data)
            .unwrap()
            .with_config(SolverConfig::default().with_change_norm(ChangeNorm::Relative));
        m.add_ccoeffs(0..3, &[1.0; 3]).unwrap();
        m.add_csources(0..3, &[5.0, 5.0, 5.0]).unwrap();

        let before = data.clone();
        assert_eq!(m.solve(&mut data), Err(Error::DivideByZeroResidual { cell: 1, axis: 0 }));
        assert_eq!(data, before);

        m.set_config(SolverConfig::default());
        m.solve(&mut data).unwrap();
        assert_relative_eq!(data.values[1], 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_non_finite_face_scaling_reports_face_location() {
        let mesh = chain();
        let mut m = stencil(&mesh, &ScalarData::zeros(3));
        let mut field = Field::filled(mesh.face_count(), 1.0);
        field[5] = f64::NAN;
        assert_eq!(
            m.scale(&field),
            Err(Error::NonFiniteValue {
                location: Location::FaceCoeff,
                index: 5,
            })
        );
        let mut cells = Field::filled(3, 1.0);
        cells[2] = f64::INFINITY;
        assert_eq!(
            m.scale(&cells),
            Err(Error::NonFiniteValue {
                location: Location::CellCoeff,
                index: 2,
            })
        );
    }
}
