//! Correction stages which run outside the reconstruction core.
//!
//! A collaborator takes an image and a mask and returns a corrected image
//! together with a side output (e.g. the estimated bias field). The same
//! `Collaborator` interface covers in-process implementations and external
//! executables, which exchange data through raw files in a temporary
//! directory.

use std::path::Path;
use std::process::Command;

use ndarray::{Array3, ShapeBuilder};
use tracing::{debug, info};

use crate::error::CollaboratorError;
use crate::io::raw;

pub struct Corrected {
    pub image: Array3<f64>,
    pub side_output: Array3<f64>,
}

pub trait Collaborator {
    fn run(&self, image: &Array3<f64>, mask: &Array3<f64>) -> Result<Corrected, CollaboratorError>;
}

/// An executable invoked on raw `f32` volumes.
///
/// Occurrences of `{image}`, `{mask}`, `{output}` and `{side_output}` in
/// `args` are replaced by the paths of the corresponding files. All volumes
/// share the image's shape and are stored x-fastest.
#[derive(Clone, Debug, PartialEq)]
pub struct ExternalProcess {
    pub program: String,
    pub args: Vec<String>,
}

impl ExternalProcess {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { program: program.into(), args: args.into_iter().map(Into::into).collect() }
    }

    fn io_error(&self) -> impl Fn(std::io::Error) -> CollaboratorError + '_ {
        move |source| CollaboratorError::Io { program: self.program.clone(), source }
    }

    fn read_output(&self, path: &Path, name: &str, dim: (usize, usize, usize)) -> Result<Array3<f64>, CollaboratorError> {
        let values: Vec<f64> = raw::read(path)
            .and_then(|values| values.map(|v| v.map(f64::from)).collect::<std::io::Result<_>>())
            .map_err(self.io_error())?;
        let (nx, ny, nz) = dim;
        let shape_error = |actual| CollaboratorError::OutputShape {
            program: self.program.clone(),
            output: name.into(),
            expected: nx * ny * nz,
            actual,
        };
        let actual = values.len();
        Array3::from_shape_vec(dim.f(), values).map_err(|_| shape_error(actual))
    }
}

impl Collaborator for ExternalProcess {
    fn run(&self, image: &Array3<f64>, mask: &Array3<f64>) -> Result<Corrected, CollaboratorError> {
        if image.dim() != mask.dim() {
            return Err(CollaboratorError::MaskShape { image: image.shape().to_vec(), mask: mask.shape().to_vec() })
        }
        let dir = tempfile::tempdir().map_err(self.io_error())?;
        let path = |name: &str| dir.path().join(format!("{name}.raw"));
        let (image_path, mask_path, output_path, side_path) =
            (path("image"), path("mask"), path("output"), path("side_output"));
        raw::write_volume(image, &image_path).map_err(self.io_error())?;
        raw::write_volume(mask , &mask_path ).map_err(self.io_error())?;

        let args: Vec<String> = self.args
            .iter()
            .map(|arg| arg
                 .replace("{image}"      , &image_path .to_string_lossy())
                 .replace("{mask}"       , &mask_path  .to_string_lossy())
                 .replace("{output}"     , &output_path.to_string_lossy())
                 .replace("{side_output}", &side_path  .to_string_lossy()))
            .collect();
        info!(program = %self.program, ?args, "running external process");

        let status = Command::new(&self.program)
            .args(&args)
            .status()
            .map_err(self.io_error())?;
        if !status.success() {
            return Err(CollaboratorError::Failed { program: self.program.clone(), status })
        }
        debug!(program = %self.program, "external process finished");

        Ok(Corrected {
            image:       self.read_output(&output_path, "output"     , image.dim())?,
            side_output: self.read_output(&side_path  , "side_output", image.dim())?,
        })
    }
}

/// Correction of the receive-coil intensity bias
#[derive(Clone, Debug, PartialEq)]
pub enum BiasField {
    /// Leave the image unchanged; the bias field is uniformly 1
    Skip,
    /// N4-style executable writing the corrected image to `{output}` and the
    /// bias field to `{side_output}`
    External(ExternalProcess),
}

impl Collaborator for BiasField {
    fn run(&self, image: &Array3<f64>, mask: &Array3<f64>) -> Result<Corrected, CollaboratorError> {
        match self {
            BiasField::Skip => {
                if image.dim() != mask.dim() {
                    return Err(CollaboratorError::MaskShape { image: image.shape().to_vec(), mask: mask.shape().to_vec() })
                }
                Ok(Corrected { image: image.clone(), side_output: Array3::ones(image.dim()) })
            }
            BiasField::External(process) => process.run(image, mask),
        }
    }
}
