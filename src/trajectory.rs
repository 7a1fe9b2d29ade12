//! k-space trajectories: the coordinates at which samples were acquired.
//!
//! Coordinates are normalized so that the Nyquist edge of the final
//! (un-oversampled) image grid lies at ±0.5 along each axis. Any acquisition
//! scheme can be plugged in through the `Sampling` trait; two generators are
//! provided, mostly for simulation and testing.

use std::f64::consts::PI;

use crate::error::InputError;
use crate::types::Coordinate;

#[derive(Clone, Debug, PartialEq, Default)]
pub struct Trajectory(Vec<Coordinate>);

impl Trajectory {

    pub fn new(coordinates: Vec<Coordinate>) -> Self { Self(coordinates) }

    pub fn from_sampling(sampling: &impl Sampling) -> Self { Self(sampling.coordinates()) }

    /// Non-empty, with every component finite
    pub fn validate(&self) -> Result<(), InputError> { validate_coordinates(&self.0) }

    pub fn into_inner(self) -> Vec<Coordinate> { self.0 }
}

impl std::ops::Deref for Trajectory {
    type Target = [Coordinate];
    fn deref(&self) -> &Self::Target { &self.0 }
}

impl From<Vec<Coordinate>> for Trajectory {
    fn from(coordinates: Vec<Coordinate>) -> Self { Self(coordinates) }
}

impl FromIterator<Coordinate> for Trajectory {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self { Self(iter.into_iter().collect()) }
}

pub fn validate_coordinates(coordinates: &[Coordinate]) -> Result<(), InputError> {
    if coordinates.is_empty() { return Err(InputError::Empty) }
    match coordinates.iter().position(|k| !k.iter().all(|c| c.is_finite())) {
        Some(index) => Err(InputError::NonFinite { what: "trajectory coordinate", index }),
        None        => Ok(()),
    }
}

// ----- The trajectory contract ------------------------------------------------------

/// Anything which can enumerate the k-space locations of an acquisition
pub trait Sampling {
    fn coordinates(&self) -> Vec<Coordinate>;
}

/// Concentric spherical shells of equal population, plus one sample at the
/// k-space origin
#[derive(Clone, Copy, Debug)]
pub struct Shells {
    pub n_shells: usize,
    pub points_per_shell: usize,
    pub max_radius: f64,
}

impl Sampling for Shells {
    fn coordinates(&self) -> Vec<Coordinate> {
        let directions = fibonacci_sphere(self.points_per_shell);
        let mut coordinates = Vec::with_capacity(1 + self.n_shells * self.points_per_shell);
        coordinates.push([0.0; 3]);
        for shell in 1..=self.n_shells {
            let r = self.max_radius * shell as f64 / self.n_shells as f64;
            coordinates.extend(directions.iter().map(|d| d.map(|c| c * r)));
        }
        coordinates
    }
}

/// Centre-out radial spokes whose directions spiral over the sphere. The
/// first point of every spoke sits at the k-space origin. Coordinates are
/// ordered projection-major.
#[derive(Clone, Copy, Debug)]
pub struct Radial {
    pub n_projections: usize,
    pub n_points: usize,
    pub max_radius: f64,
}

impl Sampling for Radial {
    fn coordinates(&self) -> Vec<Coordinate> {
        let step = if self.n_points > 1 { self.max_radius / (self.n_points - 1) as f64 } else { 0.0 };
        fibonacci_sphere(self.n_projections)
            .into_iter()
            .flat_map(|d| (0..self.n_points).map(move |j| d.map(|c| c * j as f64 * step)))
            .collect()
    }
}

/// `n` nearly uniformly distributed unit vectors, following the golden-angle
/// spiral
pub fn fibonacci_sphere(n: usize) -> Vec<Coordinate> {
    let golden_angle = PI * (3.0 - 5.0_f64.sqrt());
    (0..n)
        .map(|i| {
            let z = 1.0 - (2 * i + 1) as f64 / n as f64;
            let r = (1.0 - z * z).sqrt();
            let phi = i as f64 * golden_angle;
            [r * phi.cos(), r * phi.sin(), z]
        })
        .collect()
}
