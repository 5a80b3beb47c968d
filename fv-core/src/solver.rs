//! Linear system solvers.
//!
//! Solves one assembled per-axis system `A x = b`, warm-started from the
//! current field values.
//!
//! # Solver Backends
//!
//! - [`BiCgStabSolver`]: Jacobi-preconditioned BiCGSTAB. Handles the
//!   non-symmetric matrices produced by convection and reference pinning.
//!   This is the default.
//! - [`DenseLuSolver`]: nalgebra dense LU (small systems and cross-checks).

use crate::error::{Error, Result};
use crate::sparse::{diagonal, spmv, CsrMatrix};
use serde::{Deserialize, Serialize};

/// Breakdown threshold for BiCGSTAB inner products.
const BREAKDOWN: f64 = 1e-30;

/// Linear solver interface.
pub trait LinearSolver: Send + Sync {
    /// Solve `A x = b` in place, using the incoming `x` as the initial guess.
    ///
    /// Returns statistics; a solver that stops early reports it through
    /// [`SolveStats::status`] rather than an error.
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64], x: &mut [f64]) -> Result<SolveStats>;

    /// Solver name for diagnostics.
    fn name(&self) -> &str;
}

/// Solver selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SolverType {
    /// Dense LU factorization.
    Direct,
    /// BiCGSTAB with Jacobi preconditioning.
    #[default]
    Iterative,
    /// Direct at or below `auto_threshold` rows, iterative above.
    Auto,
}

/// Policy for the relative-change metric returned by a solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ChangeNorm {
    /// `|new - old| / max(|old|, floor)`: relative where the field is
    /// large, absolute (scaled by `floor`) where it passes through zero.
    Mixed { floor: f64 },
    /// `|new - old| / |old|`; a previous value of exactly zero is an error.
    Relative,
}

impl Default for ChangeNorm {
    fn default() -> Self {
        ChangeNorm::Mixed { floor: 1e-8 }
    }
}

impl ChangeNorm {
    /// Mean change over all cells of one axis.
    pub fn mean_change(&self, old: &[f64], new: &[f64], axis: usize) -> Result<f64> {
        debug_assert_eq!(old.len(), new.len());
        if old.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        for (cell, (&o, &n)) in old.iter().zip(new).enumerate() {
            let delta = (n - o).abs();
            total += match *self {
                ChangeNorm::Mixed { floor } => {
                    let scale = o.abs().max(floor);
                    if scale > 0.0 {
                        delta / scale
                    } else {
                        delta
                    }
                }
                ChangeNorm::Relative => {
                    if o == 0.0 {
                        return Err(Error::DivideByZeroResidual { cell, axis });
                    }
                    delta / o.abs()
                }
            };
        }
        Ok(total / old.len() as f64)
    }
}

/// Solver configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    /// Solver type to use.
    pub solver_type: SolverType,
    /// Relative residual tolerance (against `‖b‖`).
    pub tolerance: f64,
    /// Absolute residual tolerance.
    pub abs_tolerance: f64,
    /// Maximum iterations for iterative solvers.
    pub max_iterations: usize,
    /// Row count at or below which `Auto` picks the direct solver.
    pub auto_threshold: usize,
    /// Relative-change policy for [`FvMatrix::solve`](crate::matrix::FvMatrix::solve).
    pub change_norm: ChangeNorm,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver_type: SolverType::Iterative,
            tolerance: 1e-10,
            abs_tolerance: 1e-14,
            max_iterations: 1000,
            auto_threshold: 256,
            change_norm: ChangeNorm::default(),
        }
    }
}

impl SolverConfig {
    pub fn with_solver_type(mut self, solver_type: SolverType) -> Self {
        self.solver_type = solver_type;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_abs_tolerance(mut self, abs_tolerance: f64) -> Self {
        self.abs_tolerance = abs_tolerance;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_change_norm(mut self, change_norm: ChangeNorm) -> Self {
        self.change_norm = change_norm;
        self
    }
}

/// Outcome of one solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    Converged,
    MaxIterationsReached,
    /// BiCGSTAB breakdown (an inner product vanished).
    Stagnated,
}

/// Solution statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveStats {
    /// Solver name used.
    pub solver: String,
    pub status: SolveStatus,
    /// Number of iterations (zero for direct solvers).
    pub iterations: usize,
    /// Final residual norm `‖b - A x‖`.
    pub residual: f64,
}

impl SolveStats {
    pub fn is_converged(&self) -> bool {
        self.status == SolveStatus::Converged
    }
}

fn check_shape(matrix: &CsrMatrix, rhs: &[f64], x: &[f64]) -> Result<()> {
    if matrix.nrows() != matrix.ncols() {
        return Err(Error::Solver("Matrix must be square".into()));
    }
    if matrix.nrows() != rhs.len() || rhs.len() != x.len() {
        return Err(Error::Solver("RHS size mismatch".into()));
    }
    Ok(())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm2(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// Residual norm `‖b - A x‖`.
pub fn residual_norm(matrix: &CsrMatrix, rhs: &[f64], x: &[f64]) -> f64 {
    let mut ax = vec![0.0; rhs.len()];
    spmv(matrix, x, &mut ax);
    ax.iter()
        .zip(rhs)
        .map(|(a, b)| (b - a) * (b - a))
        .sum::<f64>()
        .sqrt()
}

/// Dense LU solver using nalgebra.
///
/// Converts the matrix to dense storage, so only suitable for small systems.
#[derive(Debug, Default)]
pub struct DenseLuSolver;

impl DenseLuSolver {
    pub fn new() -> Self {
        Self
    }
}

impl LinearSolver for DenseLuSolver {
    fn solve(&self, matrix: &CsrMatrix, rhs: &[f64], x: &mut [f64]) -> Result<SolveStats> {
        use nalgebra::{DMatrix, DVector};

        check_shape(matrix, rhs, x)?;
        if rhs.is_empty() {
            return Ok(SolveStats {
                solver: self.name().into(),
                status: SolveStatus::Converged,
                iterations: 0,
                residual: 0.0,
            });
        }

        let dense = DMatrix::from(matrix);
        let b = DVector::from_column_slice(rhs);
        let solution = dense
            .lu()
            .solve(&b)
            .ok_or_else(|| Error::Solver("LU factorization failed: matrix is singular".into()))?;
        x.copy_from_slice(solution.as_slice());

        Ok(SolveStats {
            solver: self.name().into(),
            status: SolveStatus::Converged,
            iterations: 0,
            residual: residual_norm(matrix, rhs, x),
        })
    }

    fn name(&self) -> &str {
        "Dense LU"
    }
}

/// BiCGSTAB with Jacobi (diagonal) right preconditioning.
///
/// Stops when `‖r‖ ≤ max(abs_tolerance, tolerance · ‖b‖)`.
#[derive(Debug, Clone)]
pub struct BiCgStabSolver {
    config: SolverConfig,
}

impl BiCgStabSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl Default for BiCgStabSolver {
    fn default() -> Self {
        Self::new(SolverConfig::default())
    }
}

impl LinearSolver for BiCgStabSolver {
    fn solve(&self, matrix: &CsrMatrix, b: &[f64], x: &mut [f64]) -> Result<SolveStats> {
        check_shape(matrix, b, x)?;
        let n = b.len();
        let stats = |status, iterations, residual| SolveStats {
            solver: self.name().into(),
            status,
            iterations,
            residual,
        };

        let inv_diag: Vec<f64> = diagonal(matrix)
            .into_iter()
            .map(|d| if d.abs() > 1e-300 { 1.0 / d } else { 1.0 })
            .collect();
        let precond = |src: &[f64], dst: &mut [f64]| {
            for ((d, s), m) in dst.iter_mut().zip(src).zip(&inv_diag) {
                *d = s * m;
            }
        };

        // r = b - A*x
        let mut r = vec![0.0; n];
        spmv(matrix, x, &mut r);
        for (ri, bi) in r.iter_mut().zip(b) {
            *ri = bi - *ri;
        }

        let tol = self.config.abs_tolerance.max(self.config.tolerance * norm2(b));
        let initial = norm2(&r);
        if initial <= tol {
            return Ok(stats(SolveStatus::Converged, 0, initial));
        }

        // shadow residual stays fixed for the whole solve
        let r0 = r.clone();
        let mut p = vec![0.0; n];
        let mut v = vec![0.0; n];
        let mut s = vec![0.0; n];
        let mut t = vec![0.0; n];
        let mut p_hat = vec![0.0; n];
        let mut s_hat = vec![0.0; n];

        let mut rho_old = 1.0;
        let mut alpha = 1.0;
        let mut omega = 1.0;
        let mut r_norm = initial;

        for iter in 0..self.config.max_iterations {
            let rho = dot(&r0, &r);
            if rho.abs() < BREAKDOWN {
                return Ok(stats(SolveStatus::Stagnated, iter, r_norm));
            }

            let beta = if iter == 0 {
                0.0
            } else {
                (rho / rho_old) * (alpha / omega)
            };
            rho_old = rho;

            for i in 0..n {
                p[i] = r[i] + beta * (p[i] - omega * v[i]);
            }
            precond(&p, &mut p_hat);
            spmv(matrix, &p_hat, &mut v);

            let r0v = dot(&r0, &v);
            if r0v.abs() < BREAKDOWN {
                return Ok(stats(SolveStatus::Stagnated, iter, r_norm));
            }
            alpha = rho / r0v;

            for i in 0..n {
                s[i] = r[i] - alpha * v[i];
            }
            let s_norm = norm2(&s);
            if s_norm <= tol {
                for i in 0..n {
                    x[i] += alpha * p_hat[i];
                }
                return Ok(stats(SolveStatus::Converged, iter + 1, s_norm));
            }

            precond(&s, &mut s_hat);
            spmv(matrix, &s_hat, &mut t);
            let tt = dot(&t, &t);
            if tt < BREAKDOWN {
                for i in 0..n {
                    x[i] += alpha * p_hat[i];
                }
                return Ok(stats(SolveStatus::Stagnated, iter + 1, s_norm));
            }
            omega = dot(&t, &s) / tt;

            for i in 0..n {
                x[i] += alpha * p_hat[i] + omega * s_hat[i];
                r[i] = s[i] - omega * t[i];
            }
            r_norm = norm2(&r);
            if r_norm <= tol {
                return Ok(stats(SolveStatus::Converged, iter + 1, r_norm));
            }
            if omega.abs() < BREAKDOWN {
                return Ok(stats(SolveStatus::Stagnated, iter + 1, r_norm));
            }
        }

        Ok(stats(
            SolveStatus::MaxIterationsReached,
            self.config.max_iterations,
            r_norm,
        ))
    }

    fn name(&self) -> &str {
        "BiCGSTAB (Jacobi)"
    }
}

/// Select solver based on configuration and problem size.
pub fn select_solver(config: &SolverConfig, n_rows: usize) -> Box<dyn LinearSolver> {
    match config.solver_type {
        SolverType::Direct => Box::new(DenseLuSolver::new()),
        SolverType::Iterative => Box::new(BiCgStabSolver::new(config.clone())),
        SolverType::Auto => {
            if n_rows <= config.auto_threshold {
                Box::new(DenseLuSolver::new())
            } else {
                Box::new(BiCgStabSolver::new(config.clone()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sparse::TripletMatrix;
    use approx::assert_relative_eq;

    fn tridiagonal(n: usize, lower: f64, diag: f64, upper: f64) -> CsrMatrix {
        let mut triplet = TripletMatrix::new(n, n);
        for i in 0..n {
            triplet.add(i, i, diag);
            if i > 0 {
                triplet.add(i, i - 1, lower);
            }
            if i + 1 < n {
                triplet.add(i, i + 1, upper);
            }
        }
        triplet.to_csr().unwrap()
    }

    #[test]
    fn test_dense_lu_simple() {
        // [2 1; 1 3] * [x; y] = [1; 2]  =>  x = 1/5, y = 3/5
        let mut triplet = TripletMatrix::new(2, 2);
        triplet.add(0, 0, 2.0);
        triplet.add(0, 1, 1.0);
        triplet.add(1, 0, 1.0);
        triplet.add(1, 1, 3.0);
        let matrix = triplet.to_csr().unwrap();

        let mut x = vec![0.0; 2];
        let stats = DenseLuSolver::new().solve(&matrix, &[1.0, 2.0], &mut x).unwrap();

        assert!(stats.is_converged());
        assert_relative_eq!(x[0], 0.2, epsilon = 1e-10);
        assert_relative_eq!(x[1], 0.6, epsilon = 1e-10);
    }

    #[test]
    fn test_dense_lu_singular() {
        let mut triplet = TripletMatrix::new(2, 2);
        triplet.add(0, 0, 1.0);
        triplet.add(0, 1, 1.0);
        triplet.add(1, 0, 1.0);
        triplet.add(1, 1, 1.0);
        let matrix = triplet.to_csr().unwrap();

        let mut x = vec![0.0; 2];
        assert!(DenseLuSolver::new().solve(&matrix, &[1.0, 2.0], &mut x).is_err());
    }

    #[test]
    fn test_empty_system() {
        let matrix = TripletMatrix::new(0, 0).to_csr().unwrap();
        let mut x: Vec<f64> = vec![];
        let stats = BiCgStabSolver::default().solve(&matrix, &[], &mut x).unwrap();
        assert!(stats.is_converged());
        assert_eq!(stats.iterations, 0);
    }

    #[test]
    fn test_rhs_mismatch() {
        let matrix = tridiagonal(2, -1.0, 2.0, -1.0);
        let mut x = vec![0.0; 2];
        assert!(BiCgStabSolver::default().solve(&matrix, &[1.0, 2.0, 3.0], &mut x).is_err());
        assert!(DenseLuSolver::new().solve(&matrix, &[1.0, 2.0, 3.0], &mut x).is_err());
    }

    #[test]
    fn test_bicgstab_nonsymmetric_matches_lu() {
        let n = 40;
        let matrix = tridiagonal(n, -1.5, 4.0, -0.5);
        let rhs: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).sin()).collect();

        let mut x_lu = vec![0.0; n];
        DenseLuSolver::new().solve(&matrix, &rhs, &mut x_lu).unwrap();

        let mut x = vec![0.0; n];
        let stats = BiCgStabSolver::default().solve(&matrix, &rhs, &mut x).unwrap();
        assert!(stats.is_converged(), "{:?}", stats);
        assert!(stats.iterations > 0);
        for i in 0..n {
            assert_relative_eq!(x[i], x_lu[i], epsilon = 1e-8);
        }
    }

    #[test]
    fn test_bicgstab_warm_start_at_solution() {
        let matrix = tridiagonal(5, -1.0, 3.0, -1.0);
        let exact = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut rhs = vec![0.0; 5];
        spmv(&matrix, &exact, &mut rhs);

        let mut x = exact.clone();
        let stats = BiCgStabSolver::default().solve(&matrix, &rhs, &mut x).unwrap();
        assert_eq!(stats.iterations, 0);
        assert_eq!(x, exact);
    }

    #[test]
    fn test_bicgstab_reports_iteration_cap() {
        let n = 50;
        let matrix = tridiagonal(n, -1.0, 2.0, -1.0);
        let rhs = vec![1.0; n];
        let mut x = vec![0.0; n];

        let config = SolverConfig::default().with_max_iterations(2).with_tolerance(1e-14);
        let stats = BiCgStabSolver::new(config).solve(&matrix, &rhs, &mut x).unwrap();
        assert_eq!(stats.status, SolveStatus::MaxIterationsReached);
        assert!(stats.residual > 0.0);
    }

    #[test]
    fn test_change_norm_policies() {
        let old = [0.0, 2.0];
        let new = [0.0, 3.0];
        let mixed = ChangeNorm::default().mean_change(&old, &new, 0).unwrap();
        assert_relative_eq!(mixed, 0.25);

        assert_eq!(
            ChangeNorm::Relative.mean_change(&old, &new, 1),
            Err(Error::DivideByZeroResidual { cell: 0, axis: 1 })
        );
        let rel = ChangeNorm::Relative.mean_change(&[1.0, 2.0], &[2.0, 3.0], 0).unwrap();
        assert_relative_eq!(rel, 0.75);
    }

    #[test]
    fn test_select_solver() {
        let config = SolverConfig::default();
        assert_eq!(select_solver(&config, 10).name(), "BiCGSTAB (Jacobi)");

        let auto = SolverConfig::default().with_solver_type(SolverType::Auto);
        assert_eq!(select_solver(&auto, 10).name(), "Dense LU");
        assert_eq!(select_solver(&auto, 10_000).name(), "BiCGSTAB (Jacobi)");
    }
}
