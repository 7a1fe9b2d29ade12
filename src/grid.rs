//! The oversampled Cartesian grid on which gridding and FFTs take place.

use ndarray::{Array3, ShapeBuilder};
use num_traits::Zero;

use crate::error::{InputError, ConfigurationError};
use crate::index::{index3_to_1, BoxDim_u, Index1_u, Index3_u};
use crate::types::{Coordinate, GridPosition};

/// Size of the final image and of the oversampled grid used to compute it.
///
/// The k-space origin sits at index `n / 2` along each axis, which is where
/// `ifftshift` expects to find the zero frequency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OversampledGrid {
    pub image_size: usize,
    pub overgrid_factor: usize,
}

impl OversampledGrid {

    pub fn new(image_size: usize, overgrid_factor: usize) -> Result<Self, ConfigurationError> {
        if overgrid_factor < 1 { return Err(ConfigurationError::OvergridFactor(overgrid_factor)) }
        if image_size      < 1 { return Err(ConfigurationError::ImageSize(image_size)) }
        Ok(Self { image_size, overgrid_factor })
    }

    /// Cells per axis of the oversampled grid
    pub fn n(&self) -> usize { self.image_size * self.overgrid_factor }

    pub fn dims(&self) -> BoxDim_u { let n = self.n(); [n, n, n] }

    pub fn len(&self) -> usize { let n = self.n(); n * n * n }

    /// Index of the k-space origin along each axis
    pub fn centre(&self) -> usize { self.n() / 2 }

    /// Map a normalized k-space coordinate onto continuous grid-cell units
    pub fn position(&self, k: Coordinate) -> GridPosition {
        let n = self.n() as f64;
        let c = self.centre() as f64;
        k.map(|k| k * n + c)
    }

    /// Inclusive range of grid indices, along one axis, lying within `radius`
    /// of `x`. `None` if the whole range falls outside the grid.
    ///
    /// Grid points beyond the edges are clipped: contributions that would
    /// land there are dropped.
    pub fn clipped_range(&self, x: f64, radius: f64) -> Option<(usize, usize)> {
        let last = (self.n() - 1) as f64;
        let lo = (x - radius).ceil().max(0.0);
        let hi = (x + radius).floor().min(last);
        if lo > hi { None } else { Some((lo as usize, hi as usize)) }
    }

    pub fn index1(&self, i: Index3_u) -> Index1_u { index3_to_1(i, self.dims()) }
}

/// A complete oversampled grid worth of values, stored x-fastest
#[derive(Clone, Debug, PartialEq)]
pub struct Grid<T> {
    pub geometry: OversampledGrid,
    data: Vec<T>,
}

impl<T: Clone + Zero> Grid<T> {
    pub fn zeros(geometry: OversampledGrid) -> Self {
        Self { geometry, data: vec![T::zero(); geometry.len()] }
    }
}

impl<T> Grid<T> {

    pub fn new(geometry: OversampledGrid, data: Vec<T>) -> Result<Self, InputError> {
        if data.len() != geometry.len() {
            return Err(InputError::GridShape { expected: geometry.len(), actual: data.len() })
        }
        Ok(Self { geometry, data })
    }

    pub fn data(&self) -> &[T] { &self.data }

    pub fn data_mut(&mut self) -> &mut [T] { &mut self.data }

    /// View the grid as an x-fastest (Fortran-order) `Array3`, ready for the FFT
    pub fn into_array(self) -> Result<Array3<T>, InputError> {
        let (expected, actual) = (self.geometry.len(), self.data.len());
        let n = self.geometry.n();
        Array3::from_shape_vec((n, n, n).f(), self.data)
            .map_err(|_| InputError::GridShape { expected, actual })
    }
}

impl<T> core::ops::Index<Index1_u> for Grid<T> {
    type Output = T;
    #[inline]
    fn index(&self, i: Index1_u) -> &Self::Output { &self.data[i] }
}

impl<T> core::ops::IndexMut<Index1_u> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, i: Index1_u) -> &mut Self::Output { &mut self.data[i] }
}

impl<T> core::ops::Index<Index3_u> for Grid<T> {
    type Output = T;
    fn index(&self, i3: Index3_u) -> &Self::Output { &self.data[self.geometry.index1(i3)] }
}

impl<T> core::ops::IndexMut<Index3_u> for Grid<T> {
    fn index_mut(&mut self, i3: Index3_u) -> &mut Self::Output {
        let i1 = self.geometry.index1(i3);
        &mut self.data[i1]
    }
}
