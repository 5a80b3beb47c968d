//! Mesh input and finite-volume mesh data.
//!
//! [`VolumeMesh`] is the polyhedral mesh handed over by mesh generation.
//! [`build_mesh`] turns it into [`FvMeshData`], the immutable face/cell
//! geometry every patch, value and matrix borrows.
//!
//! # Face ordering
//!
//! Faces are stored as half-faces: every face shared by two cells appears
//! twice, once owned by each side, with the normal pointing out of its
//! owner. Boundary half-faces have `neighbor == owner`. The face table is
//! ordered so that each patch is one contiguous range:
//!
//! ```text
//! [ interior (by owner cell) | wall | inlet | outlet ]
//! ```

use crate::error::{Error, Result};
use crate::patch::{InteriorPatch, Patch};
use crate::types::{Point3, Vec3};
use std::collections::HashMap;
use std::ops::Range;

/// Boundary role of a face that has no neighbor cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundaryKind {
    Wall,
    Inlet,
    Outlet,
}

impl BoundaryKind {
    /// Storage order of boundary patches in the face table.
    pub const ORDER: [BoundaryKind; 3] =
        [BoundaryKind::Wall, BoundaryKind::Inlet, BoundaryKind::Outlet];
}

/// Role of a contiguous face range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    Interior,
    Wall,
    Inlet,
    Outlet,
}

impl From<BoundaryKind> for PatchKind {
    fn from(kind: BoundaryKind) -> Self {
        match kind {
            BoundaryKind::Wall => PatchKind::Wall,
            BoundaryKind::Inlet => PatchKind::Inlet,
            BoundaryKind::Outlet => PatchKind::Outlet,
        }
    }
}

/// Polygonal face of an input cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFace {
    /// Vertex indices around the polygon (either winding).
    pub vertices: Vec<usize>,
    /// Boundary role if this face ends up unshared. `None` means wall.
    pub boundary: Option<BoundaryKind>,
}

impl CellFace {
    pub fn new(vertices: Vec<usize>) -> Self {
        Self {
            vertices,
            boundary: None,
        }
    }

    pub fn boundary(vertices: Vec<usize>, kind: BoundaryKind) -> Self {
        Self {
            vertices,
            boundary: Some(kind),
        }
    }
}

/// Volumetric polyhedral mesh produced by mesh generation.
#[derive(Debug, Clone, Default)]
pub struct VolumeMesh {
    vertices: Vec<Point3>,
    cells: Vec<Vec<CellFace>>,
}

impl VolumeMesh {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a vertex, returning its index.
    pub fn add_vertex(&mut self, point: Point3) -> usize {
        let idx = self.vertices.len();
        self.vertices.push(point);
        idx
    }

    /// Add multiple vertices at once.
    pub fn add_vertices(&mut self, points: impl IntoIterator<Item = Point3>) {
        self.vertices.extend(points);
    }

    /// Add a closed polyhedral cell.
    pub fn add_cell(&mut self, faces: Vec<CellFace>) -> Result<usize> {
        if faces.len() < 4 {
            return Err(Error::Mesh(format!(
                "cell needs at least 4 faces, got {}",
                faces.len()
            )));
        }
        for face in &faces {
            if face.vertices.len() < 3 {
                return Err(Error::Mesh(format!(
                    "face needs at least 3 vertices, got {}",
                    face.vertices.len()
                )));
            }
            for &v in &face.vertices {
                if v >= self.vertices.len() {
                    return Err(Error::Mesh(format!(
                        "vertex index {} out of bounds (mesh has {} vertices)",
                        v,
                        self.vertices.len()
                    )));
                }
            }
        }

        let idx = self.cells.len();
        self.cells.push(faces);
        Ok(idx)
    }

    pub fn n_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    pub fn cells(&self) -> &[Vec<CellFace>] {
        &self.cells
    }

    /// Structured hexahedral block `[0, extent]` split into `dims` cells.
    ///
    /// `sides` gives the boundary role of the -x, +x, -y, +y, -z, +z sides.
    pub fn cartesian_box(dims: [usize; 3], extent: Vec3, sides: [BoundaryKind; 6]) -> Self {
        let [nx, ny, nz] = dims;
        let vid = |i: usize, j: usize, k: usize| i + (nx + 1) * (j + (ny + 1) * k);

        let mut mesh = Self::new();
        for k in 0..=nz {
            for j in 0..=ny {
                for i in 0..=nx {
                    mesh.add_vertex(Point3::new(
                        extent.x * i as f64 / nx as f64,
                        extent.y * j as f64 / ny as f64,
                        extent.z * k as f64 / nz as f64,
                    ));
                }
            }
        }

        let tag = |on_side: bool, side: usize| on_side.then_some(sides[side]);
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    let faces = vec![
                        CellFace {
                            vertices: vec![vid(i, j, k), vid(i, j + 1, k), vid(i, j + 1, k + 1), vid(i, j, k + 1)],
                            boundary: tag(i == 0, 0),
                        },
                        CellFace {
                            vertices: vec![vid(i + 1, j, k), vid(i + 1, j, k + 1), vid(i + 1, j + 1, k + 1), vid(i + 1, j + 1, k)],
                            boundary: tag(i + 1 == nx, 1),
                        },
                        CellFace {
                            vertices: vec![vid(i, j, k), vid(i, j, k + 1), vid(i + 1, j, k + 1), vid(i + 1, j, k)],
                            boundary: tag(j == 0, 2),
                        },
                        CellFace {
                            vertices: vec![vid(i, j + 1, k), vid(i + 1, j + 1, k), vid(i + 1, j + 1, k + 1), vid(i, j + 1, k + 1)],
                            boundary: tag(j + 1 == ny, 3),
                        },
                        CellFace {
                            vertices: vec![vid(i, j, k), vid(i + 1, j, k), vid(i + 1, j + 1, k), vid(i, j + 1, k)],
                            boundary: tag(k == 0, 4),
                        },
                        CellFace {
                            vertices: vec![vid(i, j, k + 1), vid(i, j + 1, k + 1), vid(i + 1, j + 1, k + 1), vid(i + 1, j, k + 1)],
                            boundary: tag(k + 1 == nz, 5),
                        },
                    ];
                    mesh.cells.push(faces);
                }
            }
        }
        mesh
    }

    /// Copy with every vertex shifted by `x += shear * z`.
    ///
    /// Turns an orthogonal box into a non-orthogonal one with the same
    /// topology and cell volumes.
    pub fn sheared(&self, shear: f64) -> Self {
        self.map_vertices(|p| Point3::new(p.x + shear * p.z, p.y, p.z))
    }

    /// Copy with every vertex moved by `f`; topology is unchanged.
    pub fn map_vertices(&self, f: impl Fn(&Point3) -> Point3) -> Self {
        Self {
            vertices: self.vertices.iter().map(f).collect(),
            cells: self.cells.clone(),
        }
    }
}

/// Immutable face/cell geometry for one mesh.
///
/// Per-face arrays are parallel and indexed by half-face id; per-cell arrays
/// by cell id.
#[derive(Debug, Clone)]
pub struct FvMeshData {
    owner: Vec<usize>,
    neighbor: Vec<usize>,
    normal: Vec<Vec3>,
    area: Vec<f64>,
    dx: Vec<Vec3>,
    inv_dist: Vec<f64>,
    cell_center: Vec<Point3>,
    inv_volume: Vec<f64>,
    patches: Vec<(PatchKind, Range<usize>)>,
}

impl FvMeshData {
    pub fn cell_count(&self) -> usize {
        self.inv_volume.len()
    }

    pub fn face_count(&self) -> usize {
        self.owner.len()
    }

    /// Owning cell per face.
    pub fn owner(&self) -> &[usize] {
        &self.owner
    }

    /// Neighbor cell per face (the owner itself on boundary faces).
    pub fn neighbor(&self) -> &[usize] {
        &self.neighbor
    }

    /// Unit normal per face, pointing out of the owner.
    pub fn normal(&self) -> &[Vec3] {
        &self.normal
    }

    pub fn area(&self) -> &[f64] {
        &self.area
    }

    /// Vector from the owner centre to the face centre.
    pub fn dx(&self) -> &[Vec3] {
        &self.dx
    }

    /// Inverse of the owner-to-neighbor (or owner-to-face) distance along the normal.
    pub fn inv_dist(&self) -> &[f64] {
        &self.inv_dist
    }

    pub fn cell_centers(&self) -> &[Point3] {
        &self.cell_center
    }

    pub fn inv_volume(&self) -> &[f64] {
        &self.inv_volume
    }

    pub fn face_center(&self, face: usize) -> Point3 {
        self.cell_center[self.owner[face]] + self.dx[face]
    }

    pub fn is_boundary(&self, face: usize) -> bool {
        self.owner[face] == self.neighbor[face]
    }

    /// Face range of a patch (empty if the mesh has no such faces).
    pub fn patch_range(&self, kind: PatchKind) -> Range<usize> {
        self.patches
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, r)| r.clone())
            .unwrap_or(0..0)
    }

    pub fn patch(&self, kind: PatchKind) -> Patch<'_> {
        Patch::new(self, kind, self.patch_range(kind))
    }

    pub fn interior(&self) -> InteriorPatch<'_> {
        InteriorPatch::new(self.patch(PatchKind::Interior))
    }

    pub fn wall(&self) -> Patch<'_> {
        self.patch(PatchKind::Wall)
    }

    pub fn inlet(&self) -> Patch<'_> {
        self.patch(PatchKind::Inlet)
    }

    pub fn outlet(&self) -> Patch<'_> {
        self.patch(PatchKind::Outlet)
    }
}

struct HalfFace {
    owner: usize,
    neighbor: usize,
    area_vec: Vec3,
    center: Point3,
}

/// Area vector and centroid of a polygon by triangle fan about its vertex mean.
fn polygon_geometry(points: &[Point3]) -> (Vec3, Point3) {
    let mean = points.iter().sum::<Point3>() / points.len() as f64;
    let mut area_vec = Vec3::zeros();
    let mut weighted = Vec3::zeros();
    let mut total = 0.0;
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        let tri = 0.5 * (a - mean).cross(&(b - mean));
        let mag = tri.norm();
        area_vec += tri;
        weighted += (mean + a + b) / 3.0 * mag;
        total += mag;
    }
    let center = if total > 0.0 { weighted / total } else { mean };
    (area_vec, center)
}

/// Build the finite-volume face/cell tables from a polyhedral mesh.
pub fn build_mesh(volume: &VolumeMesh) -> Result<FvMeshData> {
    let n_cells = volume.n_cells();
    let mut cell_center = Vec::with_capacity(n_cells);
    let mut inv_volume = Vec::with_capacity(n_cells);
    let mut face_geom: Vec<Vec<(Vec3, Point3)>> = Vec::with_capacity(n_cells);

    for (c, faces) in volume.cells.iter().enumerate() {
        let geom: Vec<(Vec3, Point3)> = faces
            .iter()
            .map(|f| {
                let pts: Vec<Point3> = f.vertices.iter().map(|&v| volume.vertices[v]).collect();
                polygon_geometry(&pts)
            })
            .collect();

        let reference = geom.iter().map(|(_, fc)| fc).sum::<Point3>() / geom.len() as f64;
        let mut vol = 0.0;
        let mut moment = Vec3::zeros();
        for (s, fc) in &geom {
            let pyramid = ((fc - reference).dot(s) / 3.0).abs();
            vol += pyramid;
            moment += (reference + 0.75 * (fc - reference)) * pyramid;
        }
        if !(vol > 0.0) {
            return Err(Error::Mesh(format!("cell {} has zero volume", c)));
        }
        cell_center.push(moment / vol);
        inv_volume.push(1.0 / vol);
        face_geom.push(geom);
    }

    let mut shared: HashMap<Vec<usize>, Vec<(usize, usize)>> = HashMap::new();
    for (c, faces) in volume.cells.iter().enumerate() {
        for (l, f) in faces.iter().enumerate() {
            let mut key = f.vertices.clone();
            key.sort_unstable();
            shared.entry(key).or_default().push((c, l));
        }
    }

    let mut interior = Vec::new();
    let mut boundary: HashMap<BoundaryKind, Vec<HalfFace>> = HashMap::new();
    for (c, faces) in volume.cells.iter().enumerate() {
        for (l, f) in faces.iter().enumerate() {
            let mut key = f.vertices.clone();
            key.sort_unstable();
            let sides = &shared[&key];

            let (mut area_vec, center) = face_geom[c][l];
            if (center - cell_center[c]).dot(&area_vec) < 0.0 {
                area_vec = -area_vec;
            }

            match sides.as_slice() {
                [_] => {
                    let kind = f.boundary.unwrap_or(BoundaryKind::Wall);
                    boundary.entry(kind).or_default().push(HalfFace {
                        owner: c,
                        neighbor: c,
                        area_vec,
                        center,
                    });
                }
                [a, b] => {
                    let other = if a.0 == c { b.0 } else { a.0 };
                    if other == c {
                        return Err(Error::Mesh(format!("cell {} lists the same face twice", c)));
                    }
                    if f.boundary.is_some() {
                        log::warn!("cell {} face {} is shared but tagged as boundary; tag ignored", c, l);
                    }
                    interior.push(HalfFace {
                        owner: c,
                        neighbor: other,
                        area_vec,
                        center,
                    });
                }
                _ => {
                    return Err(Error::Mesh(format!(
                        "face {:?} is shared by {} cells",
                        key,
                        sides.len()
                    )));
                }
            }
        }
    }

    let mut patches = vec![(PatchKind::Interior, 0..interior.len())];
    let mut ordered = interior;
    for kind in BoundaryKind::ORDER {
        let faces = boundary.remove(&kind).unwrap_or_default();
        let begin = ordered.len();
        ordered.extend(faces);
        patches.push((kind.into(), begin..ordered.len()));
    }

    let n_faces = ordered.len();
    let mut mesh = FvMeshData {
        owner: Vec::with_capacity(n_faces),
        neighbor: Vec::with_capacity(n_faces),
        normal: Vec::with_capacity(n_faces),
        area: Vec::with_capacity(n_faces),
        dx: Vec::with_capacity(n_faces),
        inv_dist: Vec::with_capacity(n_faces),
        cell_center,
        inv_volume,
        patches,
    };

    for (f, hf) in ordered.iter().enumerate() {
        let area = hf.area_vec.norm();
        if !(area > 0.0) {
            return Err(Error::Mesh(format!("face {} of cell {} has zero area", f, hf.owner)));
        }
        let normal = hf.area_vec / area;
        let dx = hf.center - mesh.cell_center[hf.owner];
        let span = if hf.owner == hf.neighbor {
            dx
        } else {
            mesh.cell_center[hf.neighbor] - mesh.cell_center[hf.owner]
        };
        let dist = span.dot(&normal);
        if !(dist > 0.0) {
            return Err(Error::Mesh(format!(
                "face {} of cell {} has non-positive normal distance {}",
                f, hf.owner, dist
            )));
        }

        mesh.owner.push(hf.owner);
        mesh.neighbor.push(hf.neighbor);
        mesh.normal.push(normal);
        mesh.area.push(area);
        mesh.dx.push(dx);
        mesh.inv_dist.push(1.0 / dist);
    }

    log::debug!(
        "built FV mesh: {} cells, {} half-faces ({} interior)",
        mesh.cell_count(),
        mesh.face_count(),
        mesh.patch_range(PatchKind::Interior).len()
    );
    Ok(mesh)
}
