//! Preparation of an acquisition for reconstruction.
//!
//! Data arrive as one free-induction decay per radial projection, with a
//! matching trajectory. Before gridding, unusable projections are dropped,
//! the trajectory is calibrated, and both are flattened into co-indexed
//! sample lists.

use ndarray::{s, Array2, Array3, Axis};

use crate::error::InputError;
use crate::trajectory::Trajectory;
use crate::types::C64;

#[derive(Clone, Debug, PartialEq)]
pub struct Acquisition {
    /// `(n_projections, n_points)`
    data: Array2<C64>,
    /// `(n_projections, n_points, 3)`
    trajectory: Array3<f64>,
}

impl Acquisition {

    pub fn new(data: Array2<C64>, trajectory: Array3<f64>) -> Result<Self, InputError> {
        let (dp, dn) = data.dim();
        let (tp, tn, t3) = trajectory.dim();
        if dp != tp || dn != tn || t3 != 3 {
            return Err(InputError::AcquisitionShape { data: [dp, dn], trajectory: [tp, tn, t3] })
        }
        Ok(Self { data, trajectory })
    }

    pub fn n_projections(&self) -> usize { self.data.len_of(Axis(0)) }
    pub fn n_points     (&self) -> usize { self.data.len_of(Axis(1)) }

    pub fn data      (&self) -> &Array2<C64> { &self.data }
    pub fn trajectory(&self) -> &Array3<f64> { &self.trajectory }

    /// Drop `n_skip_start` projections from the beginning and `n_skip_end`
    /// from the end
    pub fn truncate(self, n_skip_start: usize, n_skip_end: usize) -> Result<Self, InputError> {
        let available = self.n_projections();
        let skip = n_skip_start + n_skip_end;
        if skip >= available {
            return Err(InputError::Truncation { skip, available })
        }
        let keep = n_skip_start..available - n_skip_end;
        Ok(Self {
            data:       self.data      .slice(s![keep.clone(), ..    ]).to_owned(),
            trajectory: self.trajectory.slice(s![keep        , .., ..]).to_owned(),
        })
    }

    /// Multiply every trajectory coordinate by a calibration `factor`
    pub fn scale_trajectory(mut self, factor: f64) -> Self {
        self.trajectory.mapv_inplace(|k| k * factor);
        self
    }

    /// Co-indexed sample values and coordinates, projection-major
    pub fn flatten(&self) -> (Vec<C64>, Trajectory) {
        let data = self.data.iter().cloned().collect();
        let trajectory = self.trajectory
            .lanes(Axis(2))
            .into_iter()
            .map(|k| [k[0], k[1], k[2]])
            .collect();
        (data, trajectory)
    }
}
