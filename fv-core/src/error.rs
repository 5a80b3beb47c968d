//! Error types for finite-volume assembly and solve.

use thiserror::Error;

/// Result type alias using the crate [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Where a non-finite number was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    /// Face coefficient (owner or neighbor) at a face index.
    FaceCoeff,
    /// Fixed face source at a face index.
    FaceSource,
    /// Cell-local diagonal coefficient at a cell index.
    CellCoeff,
    /// Cell source at a cell index.
    CellSource,
    /// Assembled row (diagonal or right-hand side) at a cell index.
    AssembledRow,
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Location::FaceCoeff => "face coefficient",
            Location::FaceSource => "face source",
            Location::CellCoeff => "cell coefficient",
            Location::CellSource => "cell source",
            Location::AssembledRow => "assembled row",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while discretizing or solving.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Operand shapes disagree (face-indexed vs cell-indexed, or sizes differ).
    #[error("dimension mismatch in {context}: expected {expected}, found {found}")]
    DimensionMismatch {
        expected: usize,
        found: usize,
        context: &'static str,
    },

    /// NaN or infinity in an accumulated coefficient or source.
    #[error("non-finite {location} at index {index}")]
    NonFiniteValue { location: Location, index: usize },

    /// The assembled system is rank-deficient and no reference cell was set.
    #[error("singular system on axis {axis}: set a reference cell to pin the solution")]
    SingularSystem { axis: usize },

    /// Iterative solver stopped before reaching its tolerance.
    #[error("solver did not converge on axis {axis} after {iterations} iterations (residual {residual:e})")]
    SolverDidNotConverge {
        axis: usize,
        iterations: usize,
        residual: f64,
    },

    /// Relative change requested against a previous value of exactly zero.
    #[error("relative change undefined at cell {cell}, axis {axis}: previous value is zero")]
    DivideByZeroResidual { cell: usize, axis: usize },

    /// Two interpolators claim overlapping face ranges.
    #[error("patch {begin}..{end} overlaps an existing interpolator")]
    PatchOverlap { begin: usize, end: usize },

    /// A face range reaches past the end of the face table.
    #[error("face range {begin}..{end} out of bounds ({face_count} faces)")]
    PatchOutOfRange {
        begin: usize,
        end: usize,
        face_count: usize,
    },

    /// Malformed mesh input.
    #[error("mesh error: {0}")]
    Mesh(String),

    /// Linear solver backend failure.
    #[error("solver error: {0}")]
    Solver(String),
}
