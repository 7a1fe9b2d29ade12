pub use crate::types::{Coordinate, Distance, GridPosition, Weight, C64};
pub use crate::error::{Error, InputError, ConfigurationError, Stage, Result};
pub use crate::kernel::{Kernel, KernelTable};
pub use crate::grid::{Grid, OversampledGrid};
pub use crate::trajectory::{Trajectory, Sampling, Shells, Radial};
pub use crate::system_model::SystemModel;
pub use crate::dcf::{DensityWeights, IterativeDcf};
pub use crate::image::ImageVolume;
pub use crate::recon::{reconstruct, reconstruct_with, reconstruct_passes, Method, ReconModel, ReconParams};
