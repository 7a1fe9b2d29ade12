//! Radially symmetric gridding kernels.
//!
//! A kernel maps the distance between a non-uniform sample and a grid point
//! (in cells of the *un-oversampled* grid) to the fraction of the sample's
//! value that is spread onto that grid point. Every kernel is non-negative,
//! maximal at distance 0 and identically zero beyond its `extent`.

use crate::error::ConfigurationError;
use crate::types::{Distance, Weight};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Kernel {
    /// `exp(-(d / sharpness)^2)`, truncated at `extent`
    Gaussian { sharpness: f64, extent: f64 },

    /// Kaiser-Bessel window of half-width `extent` and shape parameter `beta`
    KaiserBessel { beta: f64, extent: f64 },
}

impl Kernel {

    pub fn gaussian(sharpness: f64, extent: f64) -> Result<Self, ConfigurationError> {
        let kernel = Self::Gaussian { sharpness, extent };
        kernel.validate()?;
        Ok(kernel)
    }

    pub fn kaiser_bessel(beta: f64, extent: f64) -> Result<Self, ConfigurationError> {
        let kernel = Self::KaiserBessel { beta, extent };
        kernel.validate()?;
        Ok(kernel)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let positive = |name: &str, x: f64| {
            if x.is_finite() && x > 0.0 { Ok(()) }
            else { Err(ConfigurationError::Kernel(format!("{name} must be positive and finite (got {x})"))) }
        };
        match *self {
            Kernel::Gaussian { sharpness, extent } => {
                positive("sharpness", sharpness)?;
                positive("extent", extent)
            }
            Kernel::KaiserBessel { beta, extent } => {
                if !(beta.is_finite() && beta >= 0.0) {
                    return Err(ConfigurationError::Kernel(format!("beta must be non-negative and finite (got {beta})")));
                }
                positive("extent", extent)
            }
        }
    }

    /// Support radius, beyond which the weight is exactly zero
    pub fn extent(&self) -> Distance {
        match *self {
            Kernel::Gaussian     { extent, .. } => extent,
            Kernel::KaiserBessel { extent, .. } => extent,
        }
    }

    pub fn weight(&self, distance: Distance) -> Weight {
        if !(0.0..=self.extent()).contains(&distance) { return 0.0 }
        match *self {
            Kernel::Gaussian { sharpness, .. } => {
                let y = distance / sharpness;
                (-y * y).exp()
            }
            Kernel::KaiserBessel { beta, extent } => {
                let r = distance / extent;
                bessel_i0(beta * (1.0 - r * r).sqrt()) / bessel_i0(beta)
            }
        }
    }

    /// Tabulate the kernel on `n_samples + 1` uniformly spaced distances
    pub fn tabulate(&self, n_samples: usize) -> Result<KernelTable, ConfigurationError> {
        KernelTable::new(self, n_samples)
    }
}

/// Modified Bessel function of the first kind, order zero, by power series.
///
/// The terms are `((x/2)^k / k!)^2`; the series converges for all `x` and the
/// arguments used by Kaiser-Bessel windows are small enough that summation
/// to machine precision takes a few dozen terms.
pub fn bessel_i0(x: f64) -> f64 {
    let quarter_x2 = 0.25 * x * x;
    let mut term = 1.0;
    let mut sum  = 1.0;
    let mut k = 1.0;
    while term > sum * f64::EPSILON {
        term *= quarter_x2 / (k * k);
        sum += term;
        k += 1.0;
    }
    sum
}

// ----- Tabulated kernel ------------------------------------------------------------

/// Kernel values pre-computed on a uniform grid of distances over `[0,
/// extent]`, linearly interpolated between entries.
#[derive(Clone, Debug)]
pub struct KernelTable {
    extent: Distance,
    inverse_step: f64,
    values: Vec<Weight>,
}

impl KernelTable {

    pub const MIN_SAMPLES: usize = 100;
    pub const DEFAULT_SAMPLES: usize = 2048;

    pub fn new(kernel: &Kernel, n_samples: usize) -> Result<Self, ConfigurationError> {
        kernel.validate()?;
        if n_samples < Self::MIN_SAMPLES {
            return Err(ConfigurationError::KernelTable { requested: n_samples, minimum: Self::MIN_SAMPLES });
        }
        let extent = kernel.extent();
        let step = extent / n_samples as f64;
        let mut values: Vec<Weight> = (0..n_samples)
            .map(|i| kernel.weight(i as f64 * step))
            .collect();
        // Rounding in `i * step` must not push the last entry beyond `extent`
        values.push(kernel.weight(extent));
        Ok(Self { extent, inverse_step: 1.0 / step, values })
    }

    pub fn extent(&self) -> Distance { self.extent }

    #[inline]
    pub fn weight(&self, distance: Distance) -> Weight {
        if !(0.0..=self.extent).contains(&distance) { return 0.0 }
        let t = distance * self.inverse_step;
        let i = t as usize;
        let last = self.values.len() - 1;
        if i >= last { return self.values[last] }
        let frac = t - i as f64;
        self.values[i] + frac * (self.values[i + 1] - self.values[i])
    }
}
