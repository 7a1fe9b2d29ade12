//! Centred 3-D Fourier transforms of x-fastest (Fortran order) volumes.
//!
//! The transforms follow NumPy's conventions: the forward transform is
//! unnormalized, the inverse one is scaled by `1/N`, and `fftshift` moves the
//! zero frequency from index `0` to index `n / 2` along each axis.

use std::sync::Arc;

use ndarray::{Array3, Axis, ShapeBuilder, Zip};
use rayon::prelude::*;
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::types::C64;

/// Move the zero frequency from index `0` to index `n / 2` along every axis
pub fn fftshift(a: &Array3<C64>) -> Array3<C64> {
    rotate(a, |n| (n + 1) / 2)
}

/// Inverse of `fftshift`: move index `n / 2` to index `0` along every axis
pub fn ifftshift(a: &Array3<C64>) -> Array3<C64> {
    rotate(a, |n| n / 2)
}

/// `out[i] = a[(i + shift(n)) % n]`, along each axis independently
fn rotate(a: &Array3<C64>, shift: impl Fn(usize) -> usize) -> Array3<C64> {
    let (nx, ny, nz) = a.dim();
    let (sx, sy, sz) = (shift(nx), shift(ny), shift(nz));
    Array3::from_shape_fn((nx, ny, nz).f(), |(i, j, k)| {
        a[[(i + sx) % nx, (j + sy) % ny, (k + sz) % nz]]
    })
}

/// Unnormalized forward transform, in place
pub fn fft3(a: &mut Array3<C64>) { transform(a, FftDirection::Forward) }

/// Inverse transform scaled by `1/N`, in place
pub fn ifft3(a: &mut Array3<C64>) {
    transform(a, FftDirection::Inverse);
    let scale = 1.0 / a.len() as f64;
    a.par_mapv_inplace(|v| v * scale);
}

/// `fftshift(ifftn(ifftshift(a)))`: k-space with its origin at the centre
/// to an image with its origin at the centre
pub fn ifft3_centred(a: &Array3<C64>) -> Array3<C64> {
    let mut shifted = ifftshift(a);
    ifft3(&mut shifted);
    fftshift(&shifted)
}

/// `fftshift(fftn(ifftshift(a)))`
pub fn fft3_centred(a: &Array3<C64>) -> Array3<C64> {
    let mut shifted = ifftshift(a);
    fft3(&mut shifted);
    fftshift(&shifted)
}

/// Apply a 1-D transform along each of the three axes in turn. Lanes are not
/// contiguous (except along x), so each is copied into a per-thread buffer.
fn transform(a: &mut Array3<C64>, direction: FftDirection) {
    let mut planner = FftPlanner::new();
    for axis in 0..3 {
        let n = a.len_of(Axis(axis));
        if n < 2 { continue }
        let plan: Arc<dyn Fft<f64>> = planner.plan_fft(n, direction);
        let zero = C64::new(0.0, 0.0);
        let buffers = || (vec![zero; n], vec![zero; plan.get_inplace_scratch_len()]);
        Zip::from(a.lanes_mut(Axis(axis)))
            .into_par_iter()
            .for_each_init(buffers, |(buffer, scratch), (mut lane,)| {
                buffer.iter_mut().zip(lane.iter()).for_each(|(b, &l)| *b = l);
                plan.process_with_scratch(buffer, scratch);
                lane.iter_mut().zip(buffer.iter()).for_each(|(l, &b)| *l = b);
            });
    }
}
