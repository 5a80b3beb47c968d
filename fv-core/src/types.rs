//! Core numeric types.
//!
//! - Geometric primitives (points, vectors, 3x3 tensors)
//! - The [`Value`] trait that lets every field, interpolator and matrix be
//!   written once and monomorphized for scalar (D = 1) and vector (D = 3)
//!   unknowns.

use nalgebra::{Matrix3, Vector3};
use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// A point in 3D space.
pub type Point3 = Vector3<f64>;

/// A 3D vector (normal, velocity, gradient of a scalar).
pub type Vec3 = Vector3<f64>;

/// A 3x3 tensor (gradient of a vector, one row per component).
pub type Tensor3 = Matrix3<f64>;

/// Per-cell or per-face quantity carried by a finite-volume field.
///
/// `DIM` is the number of independent axes; the assembled linear system has
/// one sparse matrix per axis.
pub trait Value:
    Copy
    + Debug
    + PartialEq
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<f64, Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + 'static
{
    /// Number of components.
    const DIM: usize;

    /// Spatial gradient of one value (vector for a scalar, tensor for a vector).
    type Gradient: Copy
        + Debug
        + PartialEq
        + Add<Output = Self::Gradient>
        + AddAssign
        + Mul<f64, Output = Self::Gradient>;

    fn zero() -> Self;

    /// Same number on every axis.
    fn splat(v: f64) -> Self;

    fn axis(&self, axis: usize) -> f64;

    fn set_axis(&mut self, axis: usize, v: f64);

    fn zero_gradient() -> Self::Gradient;

    /// Outer product `self ⊗ n`, the Gauss-theorem contribution of one face.
    fn outer(self, n: &Vec3) -> Self::Gradient;

    /// Directional derivative `g · n`.
    fn project(g: &Self::Gradient, n: &Vec3) -> Self;

    fn is_finite(&self) -> bool {
        (0..Self::DIM).all(|a| self.axis(a).is_finite())
    }
}

impl Value for f64 {
    const DIM: usize = 1;
    type Gradient = Vec3;

    fn zero() -> Self {
        0.0
    }

    fn splat(v: f64) -> Self {
        v
    }

    fn axis(&self, axis: usize) -> f64 {
        debug_assert_eq!(axis, 0);
        *self
    }

    fn set_axis(&mut self, axis: usize, v: f64) {
        debug_assert_eq!(axis, 0);
        *self = v;
    }

    fn zero_gradient() -> Vec3 {
        Vec3::zeros()
    }

    fn outer(self, n: &Vec3) -> Vec3 {
        n * self
    }

    fn project(g: &Vec3, n: &Vec3) -> Self {
        g.dot(n)
    }
}

impl Value for Vec3 {
    const DIM: usize = 3;
    type Gradient = Tensor3;

    fn zero() -> Self {
        Vec3::zeros()
    }

    fn splat(v: f64) -> Self {
        Vec3::repeat(v)
    }

    fn axis(&self, axis: usize) -> f64 {
        self[axis]
    }

    fn set_axis(&mut self, axis: usize, v: f64) {
        self[axis] = v;
    }

    fn zero_gradient() -> Tensor3 {
        Tensor3::zeros()
    }

    fn outer(self, n: &Vec3) -> Tensor3 {
        self * n.transpose()
    }

    fn project(g: &Tensor3, n: &Vec3) -> Self {
        g * n
    }
}
