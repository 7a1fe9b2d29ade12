use ndarray::{s, Array3, ShapeBuilder};

use crate::types::{Index3_u, C64};

/// Complex reconstructed volume, x-fastest
pub type ImageVolume = Array3<C64>;

pub fn magnitude(image: &ImageVolume) -> Array3<f64> {
    image.map(|v| v.norm())
}

/// The voxel at which the k-space origin's contribution is centred
pub fn centre_index(image_size: usize) -> Index3_u {
    let c = image_size / 2;
    [c, c, c]
}

/// Central `size`³ block of a cubic volume whose side is at least `size`.
/// The crop starts at `n/2 - size/2`, so that the centre voxel of the input
/// becomes the centre voxel of the output.
pub fn crop_centre(volume: &ImageVolume, size: usize) -> ImageVolume {
    let n = volume.len_of(ndarray::Axis(0));
    let start = n / 2 - size / 2;
    let end = start + size;
    let mut out = Array3::zeros((size, size, size).f());
    out.assign(&volume.slice(s![start..end, start..end, start..end]));
    out
}

/// Index and value of the voxel of largest magnitude
pub fn peak(image: &ImageVolume) -> Option<(Index3_u, f64)> {
    image
        .indexed_iter()
        .map(|((i, j, k), v)| ([i, j, k], v.norm()))
        .fold(None, |best, (index, m)| match best {
            Some((_, best_m)) if best_m >= m => best,
            _ => Some((index, m)),
        })
}

pub fn all_finite(image: &ImageVolume) -> bool {
    image.iter().all(|v| v.re.is_finite() && v.im.is_finite())
}
