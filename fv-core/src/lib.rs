//! FV Core - finite-volume discretization on unstructured polyhedral meshes
//!
//! Cell-centred finite-volume library with:
//! - Half-face mesh data with contiguous boundary patches
//! - Pluggable face schemes (central, upwind, Dirichlet, Neumann, inlets)
//! - Implicit (`fvm`) and explicit (`fvc`) operators
//! - Per-axis sparse assembly (CSR format) with reference pinning and
//!   implicit under-relaxation
//! - Iterative and direct linear solvers
//!
//! # Architecture
//!
//! The library is built around these core abstractions:
//!
//! - [`FvMeshData`]: Face and cell geometry, built once by [`build_mesh`]
//! - [`Interpolator`] trait: Face values and gradients for one patch
//! - [`FvValue`]: An unknown's cell data plus its interpolators
//! - [`FvMatrix`]: Coefficient accumulation, assembly and solve
//! - [`LinearSolver`] trait: Linear system solution strategies
//!
//! # Example
//!
//! ```
//! use fv_core::interp::{FaceAverage, FixedGradient, FixedValue};
//! use fv_core::mesh::{build_mesh, BoundaryKind::*, VolumeMesh};
//! use fv_core::{fvm, FvValue, Vec3};
//!
//! let volume = VolumeMesh::cartesian_box([1, 1, 3], Vec3::new(1.0, 1.0, 3.0), [Wall, Wall, Wall, Wall, Inlet, Outlet]);
//! let mesh = build_mesh(&volume)?;
//!
//! let mut t: FvValue<f64> = FvValue::zeros(&mesh);
//! t.add_interpolator(FaceAverage::new(mesh.interior()))?;
//! t.add_interpolator(FixedGradient::zero(mesh.wall()))?;
//! t.add_interpolator(FixedValue::uniform(mesh.inlet(), 0.0))?;
//! t.add_interpolator(FixedValue::uniform(mesh.outlet(), 10.0))?;
//!
//! let mut eqn = fvm::laplace(&t)?;
//! t.solve(&mut eqn)?;
//! assert!((t.values()[1] - 5.0).abs() < 1e-6);
//! # Ok::<(), fv_core::Error>(())
//! ```

pub mod types;
pub mod error;
pub mod field;
pub mod mesh;
pub mod patch;
pub mod interp;
pub mod value;
pub mod sparse;
pub mod solver;
pub mod matrix;
pub mod fvm;
pub mod fvc;
pub mod testing;

pub use types::{Point3, Tensor3, Value, Vec3};
pub use error::{Error, Result};
pub use field::{CellData, Field, ScalarData, ScalarField, VectorData, VectorField};
pub use mesh::{build_mesh, BoundaryKind, FvMeshData, PatchKind, VolumeMesh};
pub use patch::{InteriorPatch, Patch};
pub use interp::Interpolator;
pub use value::FvValue;
pub use sparse::CsrMatrix;
pub use solver::{LinearSolver, SolverConfig};
pub use matrix::FvMatrix;
