//! Forward and adjoint operators between the oversampled Cartesian grid and
//! non-uniform k-space.
//!
//! The system matrix couples every sample to the grid points lying within the
//! kernel's support. It is far too large to store, so its rows are
//! recalculated on demand, one sample at a time, into a reusable
//! `SystemMatrixRow` buffer.
//!
//! The adjoint (gridding) is a scatter-accumulate of every sample into a
//! shared grid. It is parallelized by giving each chunk of samples its own
//! private grid, and summing the chunk grids afterwards, in chunk order, so
//! that no grid cell is ever written by more than one thread and the result
//! does not depend on scheduling. Each chunk grid is a full copy of the
//! oversampled grid (about 900 MB of `C64` for a 128³ image oversampled 3×),
//! so the number of chunks is capped by `CHUNK_GRID_BUDGET` as well as by the
//! thread count.

use std::ops::{AddAssign, Mul};

use itertools::iproduct;
use num_traits::Zero;
use rayon::prelude::*;
use tracing::debug;

use crate::error::{InputError, Result};
use crate::grid::{Grid, OversampledGrid};
use crate::index::{index3_to_1, Index1_u};
use crate::kernel::{Kernel, KernelTable};
use crate::trajectory::validate_coordinates;
use crate::types::{Coordinate, GridPosition, Weight};

/// Values which can be spread onto, and interpolated from, the grid: `f64`
/// for density estimation, `C64` for k-space data.
pub trait GridValue: Copy + Send + Sync + Zero + AddAssign + Mul<Weight, Output = Self> {}
impl<T> GridValue for T where T: Copy + Send + Sync + Zero + AddAssign + Mul<Weight, Output = T> {}

// ----- Storage of system matrix elements. Only one row is relevant at any single time ------
pub type SystemMatrixElement = (Index1_u, Weight);

pub struct SystemMatrixRow(pub Vec<SystemMatrixElement>);

impl SystemMatrixRow {
    pub fn clear(&mut self) { self.0.clear(); }
    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl<'a> IntoIterator for &'a SystemMatrixRow {
    type Item = SystemMatrixElement;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, Self::Item>>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

// ----- The model ----------------------------------------------------------------------

/// Upper bound, in bytes, on the memory held by the private chunk grids of
/// one `adjoint` call
pub const CHUNK_GRID_BUDGET: usize = 4 << 30;

pub struct SystemModel {
    geometry: OversampledGrid,
    kernel: Kernel,
    table: KernelTable,
    /// Sample locations in oversampled-grid cell units
    positions: Vec<GridPosition>,
}

impl SystemModel {

    pub fn new(
        kernel         : Kernel,
        overgrid_factor: usize,
        image_size     : usize,
        trajectory     : &[Coordinate],
    ) -> Result<Self> {
        let geometry = OversampledGrid::new(image_size, overgrid_factor)?;
        let table = kernel.tabulate(KernelTable::DEFAULT_SAMPLES)?;
        validate_coordinates(trajectory)?;
        let positions = trajectory.iter().map(|&k| geometry.position(k)).collect();
        debug!(n_samples = trajectory.len(), grid = geometry.n(), ?kernel, "built system model");
        Ok(Self { geometry, kernel, table, positions })
    }

    pub fn geometry(&self) -> OversampledGrid { self.geometry }

    pub fn kernel(&self) -> &Kernel { &self.kernel }

    pub fn n_samples(&self) -> usize { self.positions.len() }

    /// Kernel support radius in oversampled-grid cells
    fn radius(&self) -> f64 { self.table.extent() * self.geometry.overgrid_factor as f64 }

    /// Sparse storage of one row of the system matrix. Allocating these anew
    /// for each sample has a noticeable runtime cost, so create them up-front
    /// and reuse them.
    pub fn buffers(&self) -> SystemMatrixRow {
        SystemMatrixRow(Vec::with_capacity(self.row_capacity()))
    }

    /// Most grid points a single sample can couple to: the kernel's bounding
    /// cube, but never more than the whole grid
    fn row_capacity(&self) -> usize {
        let n = self.geometry.n();
        let side = (2.0 * self.radius().ceil() + 1.0).min(n as f64) as usize;
        side * side * side
    }

    /// Place the indices and kernel weights of the grid points coupled to a
    /// sample at `position` into `row`. Grid points outside the grid are
    /// clipped away.
    pub fn update_system_matrix_row(&self, row: &mut SystemMatrixRow, position: GridPosition) {
        row.clear();
        let radius = self.radius();
        let [px, py, pz] = position;
        let g = &self.geometry;
        let (Some((x0, x1)), Some((y0, y1)), Some((z0, z1))) =
            (g.clipped_range(px, radius), g.clipped_range(py, radius), g.clipped_range(pz, radius))
        else { return };

        // Kernel distances are measured in un-oversampled cells
        let scale = 1.0 / g.overgrid_factor as f64;
        let dims = g.dims();
        for (z, y, x) in iproduct!(z0..=z1, y0..=y1, x0..=x1) {
            let dx = (x as f64 - px) * scale;
            let dy = (y as f64 - py) * scale;
            let dz = (z as f64 - pz) * scale;
            let weight = self.table.weight((dx * dx + dy * dy + dz * dz).sqrt());
            if weight > 0.0 {
                row.0.push((index3_to_1([x, y, z], dims), weight));
            }
        }
    }

    /// Does each sample couple to at least one grid point?
    pub fn supported(&self) -> Vec<bool> {
        self.positions
            .par_iter()
            .map_init(|| self.buffers(), |row, &position| {
                self.update_system_matrix_row(row, position);
                !row.is_empty()
            })
            .collect()
    }

    /// Spread every sample onto the grid: non-uniform k-space → Cartesian.
    /// Contributions of different samples to the same cell are summed.
    pub fn adjoint<T: GridValue>(&self, data: &[T]) -> Result<Grid<T>> {
        self.check_length(data.len())?;
        let geometry = self.geometry;

        // Called by `fold_chunks` at the start of every chunk
        let initial_chunk_state = || (Grid::<T>::zeros(geometry), self.buffers());

        let chunk_grids: Vec<Grid<T>> = self.positions
            .par_iter()
            .zip(data.par_iter())
            // Every chunk needs a whole grid as accumulator: keep the number
            // of chunks close to the number of threads.
            .fold_chunks(self.job_size::<T>(), initial_chunk_state, |(mut grid, mut row), (&position, &value)| {
                self.update_system_matrix_row(&mut row, position);
                back_project(grid.data_mut(), &row, value);
                (grid, row)
            })
            .map(|(grid, _row)| grid)
            .collect();

        Ok(chunk_grids
           .into_iter()
           .reduce(elementwise_add)
           .unwrap_or_else(|| Grid::zeros(geometry)))
    }

    /// Interpolate the grid at every sample location: Cartesian → non-uniform
    /// k-space.
    pub fn forward<T: GridValue>(&self, grid: &Grid<T>) -> Result<Vec<T>> {
        if grid.geometry != self.geometry {
            return Err(InputError::GridShape { expected: self.geometry.len(), actual: grid.geometry.len() }.into())
        }
        Ok(self.positions
           .par_iter()
           .map_init(|| self.buffers(), |row, &position| {
               self.update_system_matrix_row(row, position);
               forward_project(row, grid.data())
           })
           .collect())
    }

    /// The adjoint of a single unit sample placed at `position`: the kernel
    /// as it is sampled by the grid.
    pub fn footprint(&self, position: GridPosition) -> Grid<f64> {
        let mut grid = Grid::zeros(self.geometry);
        let mut row = self.buffers();
        self.update_system_matrix_row(&mut row, position);
        back_project(grid.data_mut(), &row, 1.0);
        grid
    }

    fn check_length(&self, n_data: usize) -> std::result::Result<(), InputError> {
        if n_data == self.n_samples() { Ok(()) }
        else { Err(InputError::LengthMismatch { data: n_data, trajectory: self.n_samples() }) }
    }

    fn job_size<T>(&self) -> usize {
        let grid_bytes = self.geometry.len() * std::mem::size_of::<T>();
        chunk_size(self.n_samples(), rayon::current_num_threads(), grid_bytes)
    }
}

/// Samples per `adjoint` chunk: one chunk per thread, unless that many chunk
/// grids would exceed `CHUNK_GRID_BUDGET`
fn chunk_size(n_samples: usize, n_threads: usize, grid_bytes: usize) -> usize {
    let max_chunks = (CHUNK_GRID_BUDGET / grid_bytes.max(1)).max(1);
    let n_chunks = n_threads.clamp(1, max_chunks);
    n_samples.div_ceil(n_chunks).max(1)
}

#[inline]
fn forward_project<T: GridValue>(system_matrix_row: &SystemMatrixRow, grid: &[T]) -> T {
    let mut projection = T::zero();
    for (j, w) in system_matrix_row {
        projection += grid[j] * w;
    }
    projection
}

#[inline]
fn back_project<T: GridValue>(grid: &mut [T], system_matrix_row: &SystemMatrixRow, value: T) {
    for (j, w) in system_matrix_row {
        grid[j] += value * w;
    }
}

fn elementwise_add<T: GridValue>(mut a: Grid<T>, b: Grid<T>) -> Grid<T> {
    a.data_mut()
        .par_iter_mut()
        .zip(b.data().par_iter())
        .for_each(|(l, &r)| *l += r);
    a
}


#[cfg(test)]
mod test {
    use super::*;
    use crate::error::{ConfigurationError, Error};
    use crate::types::C64;
    use float_eq::assert_float_eq;
    use proptest::prelude::*;
    use rstest::rstest;

    fn small_model(trajectory: &[Coordinate]) -> SystemModel {
        let kernel = Kernel::gaussian(0.5, 1.5).unwrap();
        SystemModel::new(kernel, 2, 4, trajectory).unwrap()
    }

    #[test]
    fn single_sample_on_a_grid_node() {
        let model = small_model(&[[0.0; 3]]);
        let grid = model.adjoint(&[1.0]).unwrap();
        let c = model.geometry().centre();
        assert_float_eq!(grid[[c, c, c]], 1.0, abs <= 1e-12);
        // One oversampled cell is half an un-oversampled cell
        let expected = model.kernel().weight(0.5);
        assert_float_eq!(grid[[c + 1, c, c]], expected, abs <= 1e-5);
        assert_float_eq!(grid[[c, c - 1, c]], expected, abs <= 1e-5);
        // Total weight is symmetric about the centre
        assert_float_eq!(grid[[c + 2, c, c]], grid[[c - 2, c, c]], abs <= 1e-12);
    }

    #[test]
    fn coincident_samples_accumulate() {
        let k = [0.1, -0.05, 0.2];
        let once  = small_model(&[k]).adjoint(&[1.0]).unwrap();
        let twice = small_model(&[k, k]).adjoint(&[1.0, 1.0]).unwrap();
        for (a, b) in once.data().iter().zip(twice.data()) {
            assert_float_eq!(2.0 * a, *b, abs <= 1e-12);
        }
    }

    #[test]
    fn samples_outside_the_grid_are_discarded() {
        let model = small_model(&[[2.0, 0.0, 0.0], [0.0; 3]]);
        assert_eq!(model.supported(), vec![false, true]);
        let only_outside = model.adjoint(&[1.0, 0.0]).unwrap();
        assert!(only_outside.data().iter().all(|&v| v == 0.0));
        let resampled = model.forward(&model.adjoint(&[1.0, 1.0]).unwrap()).unwrap();
        assert_eq!(resampled[0], 0.0);
        assert!(resampled[1] > 0.0);
    }

    #[test]
    fn clipping_never_leaves_the_grid() {
        // Samples hugging the edges and corners of k-space
        let trajectory = [[0.5, 0.5, 0.5], [-0.5, -0.5, -0.5], [0.49, -0.5, 0.0], [0.55, 0.0, 0.0]];
        let model = small_model(&trajectory);
        let grid = model.adjoint(&[1.0; 4]).unwrap();
        assert_eq!(grid.data().len(), model.geometry().len());
        assert!(grid.data().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn length_mismatch() {
        let model = small_model(&[[0.0; 3]; 3]);
        let result = model.adjoint(&[1.0; 2]);
        assert!(matches!(result, Err(Error::Input(InputError::LengthMismatch { data: 2, trajectory: 3 }))));
    }

    #[rstest(/**/ overgrid_factor, image_size, expected,
             case(       0       ,     8     , ConfigurationError::OvergridFactor(0)),
             case(       3       ,     0     , ConfigurationError::ImageSize(0)     ),
    )]
    fn invalid_configuration(overgrid_factor: usize, image_size: usize, expected: ConfigurationError) {
        let kernel = Kernel::gaussian(0.32, 2.88).unwrap();
        match SystemModel::new(kernel, overgrid_factor, image_size, &[[0.0; 3]]) {
            Err(Error::Configuration(e)) => assert_eq!(e, expected),
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[rstest(/**/ narrow, wide,
             case(0.14, 0.32),
             case(0.32, 0.50),
             case(0.50, 1.00),
    )]
    fn footprint_widens_with_sharpness(narrow: f64, wide: f64) {
        let footprint = |sharpness: f64| {
            let kernel = Kernel::gaussian(sharpness, 3.0 * sharpness).unwrap();
            let model = SystemModel::new(kernel, 3, 8, &[[0.0; 3]]).unwrap();
            model.footprint(model.geometry().position([0.0; 3]))
        };
        let (narrow, wide) = (footprint(narrow), footprint(wide));
        let c = narrow.geometry.centre();
        assert_eq!(narrow[[c, c, c]], 1.0);
        assert_eq!(wide  [[c, c, c]], 1.0);
        assert!(wide[[c + 1, c, c]] > narrow[[c + 1, c, c]]);
        let total = |g: &Grid<f64>| g.data().iter().sum::<f64>();
        assert!(total(&wide) > total(&narrow));
    }

    #[test]
    fn huge_kernels_are_limited_by_the_grid() {
        let kernel = Kernel::gaussian(0.32, 1.0e4).unwrap();
        let model = SystemModel::new(kernel, 3, 4, &[[0.0; 3], [0.1, 0.0, 0.0]]).unwrap();
        assert_eq!(model.row_capacity(), model.geometry().len());
        let grid = model.adjoint(&[1.0, 1.0]).unwrap();
        assert!(grid.data().iter().all(|&v| v.is_finite() && v >= 0.0));
    }

    #[rstest(/**/ n_samples, n_threads,   grid_bytes   , expected,
             case(   1000  ,     4    ,       1_000     ,   250   ),
             case(   1001  ,     4    ,       1_000     ,   251   ),
             case(      3  ,     8    ,       1_000     ,     1   ),
             case(      0  ,     4    ,       1_000     ,     1   ),
             case(   1000  ,     0    ,       1_000     ,  1000   ),
             // 128³ image, 3× oversampled, complex values: 4 chunk grids fit
             case(   1000  ,    16    , 384*384*384*16  ,   250   ),
             case(   1000  ,    16    , CHUNK_GRID_BUDGET,  1000   ),
             case(   1000  ,    16    , usize::MAX      ,  1000   ),
    )]
    fn chunks_fit_in_the_memory_budget(n_samples: usize, n_threads: usize, grid_bytes: usize, expected: usize) {
        assert_eq!(chunk_size(n_samples, n_threads, grid_bytes), expected);
    }

    #[test]
    fn adjoint_is_deterministic() {
        let trajectory: Vec<Coordinate> = (0..500)
            .map(|i| { let t = i as f64 * 0.01; [0.4 * t.sin(), 0.3 * (1.7 * t).cos(), 0.2 * (0.3 * t).sin()] })
            .collect();
        let data: Vec<C64> = (0..500).map(|i| C64::new((i as f64).cos(), (i as f64).sin())).collect();
        let model = small_model(&trajectory);
        let a = model.adjoint(&data).unwrap();
        let b = model.adjoint(&data).unwrap();
        assert_eq!(a, b);
    }

    // ----- Properties of a linear operator and its adjoint -------------------------------------
    fn coordinate() -> impl Strategy<Value = Coordinate> {
        [-0.45..0.45_f64, -0.45..0.45_f64, -0.45..0.45_f64]
    }

    fn samples() -> impl Strategy<Value = Vec<(Coordinate, (f64, f64), (f64, f64))>> {
        proptest::collection::vec((coordinate(), (-1.0..1.0_f64, -1.0..1.0_f64), (-1.0..1.0_f64, -1.0..1.0_f64)), 1..40)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn adjoint_is_linear(
            samples in samples(),
            a in -2.0..2.0_f64,
            b in -2.0..2.0_f64,
        ) {
            let trajectory: Vec<Coordinate> = samples.iter().map(|s| s.0).collect();
            let x: Vec<C64> = samples.iter().map(|s| C64::new(s.1.0, s.1.1)).collect();
            let y: Vec<C64> = samples.iter().map(|s| C64::new(s.2.0, s.2.1)).collect();
            let combined: Vec<C64> = x.iter().zip(&y).map(|(x, y)| x * a + y * b).collect();

            let model = small_model(&trajectory);
            let lhs = model.adjoint(&combined).unwrap();
            let gx  = model.adjoint(&x).unwrap();
            let gy  = model.adjoint(&y).unwrap();
            for ((l, x), y) in lhs.data().iter().zip(gx.data()).zip(gy.data()) {
                let rhs = x * a + y * b;
                prop_assert!((l - rhs).norm() <= 1e-10 * (1.0 + rhs.norm()));
            }
        }

        // <A^H x, g> == <x, A g>
        #[test]
        fn forward_is_the_transpose_of_adjoint(samples in samples()) {
            let trajectory: Vec<Coordinate> = samples.iter().map(|s| s.0).collect();
            let x: Vec<f64> = samples.iter().map(|s| s.1.0).collect();
            let model = small_model(&trajectory);
            let n = model.geometry().len();
            let g = Grid::new(model.geometry(), (0..n).map(|i| ((i * 7919) % 13) as f64 - 6.0).collect()).unwrap();

            let lhs: f64 = model.adjoint(&x).unwrap().data().iter().zip(g.data()).map(|(a, b)| a * b).sum();
            let rhs: f64 = x.iter().zip(model.forward(&g).unwrap()).map(|(a, b)| a * b).sum();
            prop_assert!((lhs - rhs).abs() <= 1e-9 * (1.0 + lhs.abs()));
        }
    }
}
