//! Time-dependent inlet.
//!
//! Face values come from a user profile `u(x, t)` evaluated at face centres.
//! The profile is sampled on construction and on every
//! [`Interpolator::set_time`]; between calls the scheme behaves like a
//! fixed-value inlet.

use super::{dirichlet_face_coeffs, dirichlet_face_grad, dirichlet_face_grad_coeffs, Interpolator};
use crate::error::{Error, Location, Result};
use crate::field::{CellData, Field};
use crate::matrix::FvMatrix;
use crate::patch::Patch;
use crate::types::{Point3, Vec3};
use std::fmt;
use std::ops::Range;

/// Inlet profile: face centre and time to velocity.
pub type Profile = Box<dyn Fn(&Point3, f64) -> Vec3 + Send + Sync>;

pub struct WaveGenerator<'m> {
    patch: Patch<'m>,
    profile: Profile,
    time: f64,
    values: Vec<Vec3>,
}

impl<'m> WaveGenerator<'m> {
    pub fn new(
        patch: Patch<'m>,
        profile: impl Fn(&Point3, f64) -> Vec3 + Send + Sync + 'static,
    ) -> Result<Self> {
        let mut generator = Self {
            patch,
            profile: Box::new(profile),
            time: 0.0,
            values: Vec::with_capacity(patch.count()),
        };
        generator.resample(0.0)?;
        Ok(generator)
    }

    /// Linear wave travelling along `direction`:
    /// `u = amplitude · sin(k·x − ω·t) · direction`.
    pub fn sine(patch: Patch<'m>, amplitude: f64, wave_vector: Vec3, omega: f64, direction: Vec3) -> Result<Self> {
        Self::new(patch, move |x, t| {
            direction * (amplitude * (wave_vector.dot(x) - omega * t).sin())
        })
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    fn resample(&mut self, time: f64) -> Result<()> {
        let mut values = Vec::with_capacity(self.patch.count());
        for f in self.patch.faces() {
            let u = (self.profile)(&self.patch.face_center(f), time);
            if !(u.x.is_finite() && u.y.is_finite() && u.z.is_finite()) {
                return Err(Error::NonFiniteValue {
                    location: Location::FaceSource,
                    index: f,
                });
            }
            values.push(u);
        }
        self.time = time;
        self.values = values;
        log::trace!("wave generator sampled {} faces at t = {}", self.values.len(), time);
        Ok(())
    }

    pub fn values(&self) -> &[Vec3] {
        &self.values
    }
}

impl fmt::Debug for WaveGenerator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaveGenerator")
            .field("faces", &self.patch.faces())
            .field("time", &self.time)
            .finish_non_exhaustive()
    }
}

impl<'m> Interpolator<Vec3> for WaveGenerator<'m> {
    fn faces(&self) -> Range<usize> {
        self.patch.faces()
    }

    fn face_values(&self, out: &mut Field<Vec3>, _data: &CellData<Vec3>) {
        for (i, f) in self.patch.faces().enumerate() {
            out[f] = self.values[i];
        }
    }

    fn face_coeffs(&self, out: &mut FvMatrix<'_, Vec3>, _data: &CellData<Vec3>) -> Result<()> {
        dirichlet_face_coeffs(&self.patch, &self.values, out)
    }

    fn face_grad(&self, out: &mut Field<Vec3>, data: &CellData<Vec3>) {
        dirichlet_face_grad(&self.patch, &self.values, out, data);
    }

    fn face_grad_coeffs(&self, out: &mut FvMatrix<'_, Vec3>, _data: &CellData<Vec3>) -> Result<()> {
        dirichlet_face_grad_coeffs(&self.patch, &self.values, out)
    }

    fn set_time(&mut self, time: f64) -> Result<()> {
        self.resample(time)
    }
}
