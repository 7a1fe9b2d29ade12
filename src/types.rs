pub type Weight = f64;
pub type Distance = f64;

/// A single k-space (or image-space) complex value
pub type C64 = num_complex::Complex<f64>;

/// Position of a sample in normalized k-space: Nyquist of the un-oversampled
/// grid is at ±0.5 in every dimension
pub type Coordinate = [f64; 3];

/// Position of a sample in oversampled-grid cell units
pub type GridPosition = [f64; 3];

pub use crate::index::{BoxDim_u, Index1_u, Index3_u};
