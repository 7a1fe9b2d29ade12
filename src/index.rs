#[allow(non_camel_case_types)] pub type Index1_u = usize;
#[allow(non_camel_case_types)] pub type Index3_u = [usize; 3];
#[allow(non_camel_case_types)] pub type BoxDim_u = [usize; 3];

// --------------------------------------------------------------------------------
//                  Flat indexing of 3d grid buffers
//
// Grid buffers are stored x-fastest, matching `ndarray`'s Fortran layout, so
// flat buffers can be handed to `Array3::from_shape_vec(shape.f(), ..)` as-is.

use std::ops::{Add, Mul};

pub fn index3_to_1<T>([ix, iy, iz]: [T; 3], [nx, ny, _nz]: [T; 3]) -> T
where
    T: Mul<Output = T> + Add<Output = T>
{
    ix + (iy + iz * ny) * nx
}
