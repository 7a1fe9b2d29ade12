//! Configuration file parser for reconstruction runs

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::dcf::IterativeDcf;
use crate::error::{ConfigFileError, ConfigurationError};
use crate::kernel::Kernel;
use crate::recon::{Method, ReconParams};

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {

    /// Voxels along each side of the reconstructed volume
    #[serde(default = "default_image_size")]
    pub image_size: usize,

    /// Oversampling of the gridding grid relative to the image
    #[serde(default = "default_overgrid_factor")]
    pub overgrid_factor: usize,

    /// Number of density compensation iterations
    #[serde(default = "default_dcf_iterations")]
    pub dcf_iterations: usize,

    /// Stop density compensation early, once weights change less than this
    #[serde(default)]
    pub dcf_tolerance: Option<f64>,

    #[serde(default)]
    pub method: Method,

    #[serde(default)]
    pub trajectory: TrajectoryConfig,

    /// Reconstructions to perform on the same data, one per kernel
    #[serde(default = "default_passes")]
    pub passes: Vec<Pass>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TrajectoryConfig {
    /// Site-specific calibration applied to every coordinate
    #[serde(default = "default_scale")]
    pub scale: f64,

    /// Projections discarded from the start of the acquisition, while the
    /// signal approaches steady state
    #[serde(default)]
    pub n_skip_start: usize,

    #[serde(default)]
    pub n_skip_end: usize,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Pass {
    pub name: String,
    pub kernel: KernelConfig,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum KernelConfig {
    /// `extent` defaults to 9 × `sharpness`
    Gaussian { sharpness: f64, extent: Option<f64> },
    KaiserBessel { beta: f64, extent: f64 },
}

impl KernelConfig {
    pub fn kernel(&self) -> Result<Kernel, ConfigurationError> {
        match *self {
            KernelConfig::Gaussian { sharpness, extent } =>
                Kernel::gaussian(sharpness, extent.unwrap_or(DEFAULT_EXTENT_IN_SHARPNESS * sharpness)),
            KernelConfig::KaiserBessel { beta, extent } =>
                Kernel::kaiser_bessel(beta, extent),
        }
    }
}

pub const DEFAULT_EXTENT_IN_SHARPNESS: f64 = 9.0;

impl Config {
    /// Everything needed to run `pass`
    pub fn params(&self, pass: &Pass) -> Result<ReconParams, ConfigurationError> {
        Ok(ReconParams {
            kernel: pass.kernel.kernel()?,
            overgrid_factor: self.overgrid_factor,
            image_size: self.image_size,
            dcf: IterativeDcf {
                iterations: self.dcf_iterations,
                tolerance: self.dcf_tolerance,
                ..IterativeDcf::default()
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_size: default_image_size(),
            overgrid_factor: default_overgrid_factor(),
            dcf_iterations: default_dcf_iterations(),
            dcf_tolerance: None,
            method: Method::default(),
            trajectory: TrajectoryConfig::default(),
            passes: default_passes(),
        }
    }
}

impl Default for TrajectoryConfig {
    fn default() -> Self { Self { scale: default_scale(), n_skip_start: 0, n_skip_end: 0 } }
}

fn default_image_size     () -> usize { 64 }
fn default_overgrid_factor() -> usize {  3 }
fn default_dcf_iterations () -> usize { 20 }
fn default_scale          () -> f64   { 1.0 }

/// A smooth, high-SNR pass and a sharper, high-resolution one
fn default_passes() -> Vec<Pass> {
    let gaussian = |name: &str, sharpness| Pass {
        name: name.into(),
        kernel: KernelConfig::Gaussian { sharpness, extent: None },
    };
    vec![gaussian("high_snr", 0.14), gaussian("high_resolution", 0.32)]
}

pub fn read_config_file(path: &Path) -> Result<Config, ConfigFileError> {
    let config = fs::read_to_string(path)
        .map_err(|source| ConfigFileError::Read { path: path.to_path_buf(), source })?;
    Ok(toml::from_str(&config)?)
}
