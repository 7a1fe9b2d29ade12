//! Error taxonomy of the reconstruction core and its collaborators.
//!
//! Nothing is retried: every error is a consequence of the data or the
//! parameters, and propagates synchronously to the caller. There is no
//! partial output.

use thiserror::Error;

use crate::recon::Method;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("input error: {0}")]
    Input(#[from] InputError),

    #[error("numeric degeneracy during {stage}: {reason}")]
    NumericDegeneracy { stage: Stage, reason: String },

    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl Error {
    pub(crate) fn degenerate(stage: Stage, reason: impl Into<String>) -> Self {
        Self::NumericDegeneracy { stage, reason: reason.into() }
    }
}

/// Problems with the k-space data or trajectory handed to the core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InputError {
    #[error("no samples supplied")]
    Empty,

    #[error("data has {data} samples but trajectory has {trajectory}")]
    LengthMismatch { data: usize, trajectory: usize },

    #[error("non-finite {what} at sample {index}")]
    NonFinite { what: &'static str, index: usize },

    #[error("grid has {actual} cells, expected {expected}")]
    GridShape { expected: usize, actual: usize },

    #[error("acquisition shape mismatch: data {data:?}, trajectory {trajectory:?}")]
    AcquisitionShape { data: [usize; 2], trajectory: [usize; 3] },

    #[error("cannot skip {skip} of {available} projections")]
    Truncation { skip: usize, available: usize },
}

/// Invalid reconstruction parameters, detected before any computation starts
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("overgrid factor must be at least 1 (got {0})")]
    OvergridFactor(usize),

    #[error("image size must be at least 1 (got {0})")]
    ImageSize(usize),

    #[error("invalid kernel: {0}")]
    Kernel(String),

    #[error("kernel table needs at least {minimum} samples (got {requested})")]
    KernelTable { requested: usize, minimum: usize },

    #[error("DCF needs a positive finite epsilon (got {0})")]
    DcfEpsilon(f64),

    #[error("reconstruction method `{0}` is not supported")]
    UnsupportedMethod(Method),
}

/// The pipeline stage in which a numeric post-condition failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Dcf,
    Gridding,
    Deapodization,
    Output,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Dcf           => "density compensation",
            Stage::Gridding      => "gridding",
            Stage::Deapodization => "deapodization",
            Stage::Output        => "output check",
        };
        f.write_str(name)
    }
}

/// Failures while reading a TOML configuration file
#[derive(Error, Debug)]
pub enum ConfigFileError {
    #[error("couldn't read config file `{path}`: {source}")]
    Read { path: std::path::PathBuf, source: std::io::Error },

    #[error("couldn't parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures of external correction/registration processes
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("I/O error while talking to `{program}`: {source}")]
    Io { program: String, source: std::io::Error },

    #[error("`{program}` exited with {status}")]
    Failed { program: String, status: std::process::ExitStatus },

    #[error("`{program}` produced {actual} voxels in `{output}`, expected {expected}")]
    OutputShape { program: String, output: String, expected: usize, actual: usize },

    #[error("image and mask shapes differ: {image:?} vs {mask:?}")]
    MaskShape { image: Vec<usize>, mask: Vec<usize> },
}
