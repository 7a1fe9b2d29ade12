//! Reconstruction of an image volume from density-compensated k-space data.
//!
//! Pipeline: weight the samples by their DCF, grid them onto the oversampled
//! Cartesian grid, inverse FFT, crop the central `image_size`³ block and
//! divide out the apodization caused by the gridding kernel.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, Pass};
use crate::dcf::{DensityWeights, IterativeDcf};
use crate::error::{ConfigurationError, Error, InputError, Result, Stage};
use crate::fft::ifft3_centred;
use crate::image::{all_finite, crop_centre, ImageVolume};
use crate::kernel::Kernel;
use crate::system_model::SystemModel;
use crate::types::{Coordinate, C64};

/// Apodization values smaller than this fraction of the largest one cannot be
/// divided out reliably
pub const APODIZATION_FLOOR: f64 = 1e-8;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Density-compensated gridding followed by an inverse FFT
    #[default]
    Gridded,
    /// Iterative compressed-sensing reconstruction
    CompressedSensing,
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Method::Gridded           => "gridded",
            Method::CompressedSensing => "compressed-sensing",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReconParams {
    pub kernel: Kernel,
    pub overgrid_factor: usize,
    pub image_size: usize,
    pub dcf: IterativeDcf,
}

impl ReconParams {
    pub fn gaussian(sharpness: f64, extent: f64, overgrid_factor: usize, image_size: usize, dcf_iterations: usize) -> Result<Self> {
        Ok(Self {
            kernel: Kernel::gaussian(sharpness, extent)?,
            overgrid_factor,
            image_size,
            dcf: IterativeDcf::new(dcf_iterations),
        })
    }
}

/// A system model paired with the density compensation of its trajectory,
/// ready to reconstruct any data acquired on that trajectory.
pub struct ReconModel {
    system: SystemModel,
    weights: DensityWeights,
    deapodization: ImageVolume,
}

impl ReconModel {

    pub fn new(trajectory: &[Coordinate], params: &ReconParams) -> Result<Self> {
        let system = SystemModel::new(params.kernel, params.overgrid_factor, params.image_size, trajectory)?;
        info!(iterations = params.dcf.iterations, "computing density compensation");
        let weights = params.dcf.compute(&system)?;
        Self::with_weights(system, weights)
    }

    /// Use precomputed density compensation weights
    pub fn with_weights(system: SystemModel, weights: DensityWeights) -> Result<Self> {
        if weights.len() != system.n_samples() {
            return Err(InputError::LengthMismatch { data: weights.len(), trajectory: system.n_samples() }.into())
        }
        let deapodization = deapodization(&system)?;
        Ok(Self { system, weights, deapodization })
    }

    pub fn system(&self) -> &SystemModel { &self.system }

    pub fn weights(&self) -> &[f64] { &self.weights }

    pub fn reconstruct(&self, data: &[C64]) -> Result<ImageVolume> {
        let geometry = self.system.geometry();
        let weighted: Vec<C64> = data
            .par_iter()
            .zip(self.weights.par_iter())
            .map(|(&d, &w)| d * w)
            .collect();
        // Length checked here, before anything is gridded
        let grid = self.system.adjoint(&weighted)?;
        if let Some(i) = grid.data().iter().position(|v| !(v.re.is_finite() && v.im.is_finite())) {
            return Err(Error::degenerate(Stage::Gridding, format!("grid cell {i} is not finite")))
        }
        debug!(grid = geometry.n(), "gridded");

        let image = crop_centre(&ifft3_centred(&grid.into_array()?), geometry.image_size);
        let image = image / &self.deapodization;

        if !all_finite(&image) {
            return Err(Error::degenerate(Stage::Output, "reconstructed image contains non-finite voxels"))
        }
        Ok(image)
    }
}

/// The image-space profile of the gridding kernel, as seen through the same
/// tabulation, grid and crop as the data.
fn deapodization(system: &SystemModel) -> Result<ImageVolume> {
    let geometry = system.geometry();
    let footprint = system.footprint(geometry.position([0.0; 3]));
    let footprint = footprint.into_array()?.mapv(|w| C64::new(w, 0.0));
    let apodization = crop_centre(&ifft3_centred(&footprint), geometry.image_size);

    let max = apodization.iter().map(|v| v.norm()).fold(0.0, f64::max);
    if !(max.is_finite() && max > 0.0) {
        return Err(Error::degenerate(Stage::Deapodization, "kernel has no image-space support"))
    }
    if let Some(smallest) = apodization.iter().map(|v| v.norm()).reduce(f64::min) {
        if smallest < APODIZATION_FLOOR * max {
            return Err(Error::degenerate(
                Stage::Deapodization,
                format!("apodization falls to {smallest:e} of maximum {max:e}"),
            ))
        }
    }
    Ok(apodization)
}

// ----- Entry points ---------------------------------------------------------------

/// Empty, length-mismatched or non-finite input is rejected before any work
/// is done.
pub fn validate_samples(data: &[C64], trajectory: &[Coordinate]) -> std::result::Result<(), InputError> {
    if data.is_empty() { return Err(InputError::Empty) }
    if data.len() != trajectory.len() {
        return Err(InputError::LengthMismatch { data: data.len(), trajectory: trajectory.len() })
    }
    if let Some(index) = data.iter().position(|v| !(v.re.is_finite() && v.im.is_finite())) {
        return Err(InputError::NonFinite { what: "data value", index })
    }
    crate::trajectory::validate_coordinates(trajectory)
}

/// Gridding reconstruction with a Gaussian kernel
pub fn reconstruct(
    data            : &[C64],
    trajectory      : &[Coordinate],
    kernel_sharpness: f64,
    kernel_extent   : f64,
    overgrid_factor : usize,
    image_size      : usize,
    n_dcf_iterations: usize,
) -> Result<ImageVolume> {
    validate_samples(data, trajectory)?;
    let params = ReconParams::gaussian(kernel_sharpness, kernel_extent, overgrid_factor, image_size, n_dcf_iterations)?;
    dispatch(Method::Gridded, data, trajectory, &params)
}

pub fn reconstruct_with(method: Method, data: &[C64], trajectory: &[Coordinate], params: &ReconParams) -> Result<ImageVolume> {
    validate_samples(data, trajectory)?;
    dispatch(method, data, trajectory, params)
}

/// Samples must already have passed `validate_samples`
fn dispatch(method: Method, data: &[C64], trajectory: &[Coordinate], params: &ReconParams) -> Result<ImageVolume> {
    match method {
        Method::Gridded => {
            info!(%method, n_samples = data.len(), image_size = params.image_size, "reconstructing");
            ReconModel::new(trajectory, params)?.reconstruct(data)
        }
        Method::CompressedSensing => Err(ConfigurationError::UnsupportedMethod(method).into()),
    }
}

/// Run every pass of `config` on the same data, in parallel. Passes share
/// nothing: each builds its own system model, grid and weights.
pub fn reconstruct_passes(data: &[C64], trajectory: &[Coordinate], config: &Config) -> Result<Vec<(String, ImageVolume)>> {
    validate_samples(data, trajectory)?;
    let run = |pass: &Pass| -> Result<(String, ImageVolume)> {
        let params = config.params(pass)?;
        let image = dispatch(config.method, data, trajectory, &params)?;
        info!(pass = %pass.name, "pass complete");
        Ok((pass.name.clone(), image))
    };
    config.passes.par_iter().map(run).collect()
}
