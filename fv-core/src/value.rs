//! Cell-centred unknown with its face schemes.

use crate::error::{Error, Result};
use crate::field::{CellData, Field};
use crate::fvc;
use crate::interp::Interpolator;
use crate::matrix::FvMatrix;
use crate::mesh::FvMeshData;
use crate::types::Value;
use std::fmt;
use std::ops::Range;

/// Cell data plus the interpolators that cover its faces.
///
/// Each interpolator owns a disjoint face range. Face queries allocate a
/// fresh face-sized buffer and let every interpolator fill its own range;
/// nothing is cached between calls.
pub struct FvValue<'m, V: Value> {
    mesh: &'m FvMeshData,
    data: CellData<V>,
    interpolators: Vec<Box<dyn Interpolator<V> + 'm>>,
}

impl<'m, V: Value> FvValue<'m, V> {
    pub fn new(mesh: &'m FvMeshData, data: CellData<V>) -> Result<Self> {
        if data.cell_count() != mesh.cell_count() {
            return Err(Error::DimensionMismatch {
                expected: mesh.cell_count(),
                found: data.cell_count(),
                context: "cell data",
            });
        }
        if data.gradients.len() != data.values.len() {
            return Err(Error::DimensionMismatch {
                expected: data.values.len(),
                found: data.gradients.len(),
                context: "cell gradients",
            });
        }
        Ok(Self {
            mesh,
            data,
            interpolators: Vec::new(),
        })
    }

    /// Zero-initialised unknown.
    pub fn zeros(mesh: &'m FvMeshData) -> Self {
        Self {
            mesh,
            data: CellData::zeros(mesh.cell_count()),
            interpolators: Vec::new(),
        }
    }

    /// Values from a function of cell centre.
    pub fn from_fn(mesh: &'m FvMeshData, f: impl Fn(&crate::types::Point3) -> V) -> Self {
        let values = mesh.cell_centers().iter().map(f).collect();
        Self {
            mesh,
            data: CellData::from_values(values),
            interpolators: Vec::new(),
        }
    }

    /// Attach a scheme. Its face range must lie inside the face table and
    /// must not overlap any scheme already attached.
    pub fn add_interpolator(&mut self, interpolator: impl Interpolator<V> + 'm) -> Result<()> {
        let range = interpolator.faces();
        if range.end > self.mesh.face_count() || range.start > range.end {
            return Err(Error::PatchOutOfRange {
                begin: range.start,
                end: range.end,
                face_count: self.mesh.face_count(),
            });
        }
        if let Some(existing) = self
            .interpolators
            .iter()
            .map(|i| i.faces())
            .find(|r| overlaps(r, &range))
        {
            return Err(Error::PatchOverlap {
                begin: range.start.max(existing.start),
                end: range.end.min(existing.end),
            });
        }
        self.interpolators.push(Box::new(interpolator));
        Ok(())
    }

    /// Builder form of [`add_interpolator`](Self::add_interpolator).
    pub fn with(mut self, interpolator: impl Interpolator<V> + 'm) -> Result<Self> {
        self.add_interpolator(interpolator)?;
        Ok(self)
    }

    pub fn mesh(&self) -> &'m FvMeshData {
        self.mesh
    }

    pub fn data(&self) -> &CellData<V> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut CellData<V> {
        &mut self.data
    }

    pub fn values(&self) -> &Field<V> {
        &self.data.values
    }

    pub fn gradients(&self) -> &Field<V::Gradient> {
        &self.data.gradients
    }

    pub fn into_data(self) -> CellData<V> {
        self.data
    }

    /// Faces not claimed by any interpolator.
    pub fn uncovered_faces(&self) -> Vec<usize> {
        let mut covered = vec![false; self.mesh.face_count()];
        for i in &self.interpolators {
            for f in i.faces() {
                covered[f] = true;
            }
        }
        covered
            .iter()
            .enumerate()
            .filter(|(_, c)| !**c)
            .map(|(f, _)| f)
            .collect()
    }

    pub fn face_values(&self) -> Field<V> {
        let mut out = Field::zeros(self.mesh.face_count());
        for i in &self.interpolators {
            i.face_values(&mut out, &self.data);
        }
        out
    }

    pub fn face_grad(&self) -> Field<V> {
        let mut out = Field::zeros(self.mesh.face_count());
        for i in &self.interpolators {
            i.face_grad(&mut out, &self.data);
        }
        out
    }

    /// Fresh matrix holding the linear face-value coefficients.
    pub fn face_coeffs(&self) -> Result<FvMatrix<'m, V>> {
        let mut m = FvMatrix::new(self.mesh, &self.data)?;
        for i in &self.interpolators {
            i.face_coeffs(&mut m, &self.data)?;
        }
        Ok(m)
    }

    /// Fresh matrix holding the linear normal-gradient coefficients.
    pub fn face_grad_coeffs(&self) -> Result<FvMatrix<'m, V>> {
        let mut m = FvMatrix::new(self.mesh, &self.data)?;
        for i in &self.interpolators {
            i.face_grad_coeffs(&mut m, &self.data)?;
        }
        Ok(m)
    }

    pub fn fix_boundary(&mut self) {
        for i in &self.interpolators {
            i.fix_boundary(&mut self.data);
        }
    }

    /// Advance every time-dependent interpolator to `time`.
    pub fn set_time(&mut self, time: f64) -> Result<()> {
        for i in &mut self.interpolators {
            i.set_time(time)?;
        }
        Ok(())
    }

    /// Recompute stored cell gradients from the current values.
    pub fn update_gradients(&mut self) {
        self.data.gradients = fvc::grad(self);
    }

    /// Solve `matrix` into this unknown. See [`FvMatrix::solve`].
    pub fn solve(&mut self, matrix: &mut FvMatrix<'_, V>) -> Result<f64> {
        matrix.solve(&mut self.data)
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    !a.is_empty() && !b.is_empty() && a.start < b.end && b.start < a.end
}

impl<V: Value> fmt::Debug for FvValue<'_, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ranges: Vec<_> = self.interpolators.iter().map(|i| i.faces()).collect();
        f.debug_struct("FvValue")
            .field("cells", &self.data.cell_count())
            .field("interpolators", &ranges)
            .finish()
    }
}
